//! Connection registry for the match server
//!
//! This module tracks the WebSocket connections behind each player:
//! - Connection lifecycle (connect, disconnect, idle timeout)
//! - Sequential player id assignment and capacity limits
//! - Per-connection outbound queue and preferred frame encoding
//!
//! The player record itself lives in the match; the registry only knows
//! which socket a player id speaks through.

use kickoff_shared::Encoding;
use log::info;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

/// Outbound frame queue drained by the connection's writer task.
pub type FrameSender = mpsc::UnboundedSender<Message>;

/// A connected client and its transport state
#[derive(Debug)]
pub struct Client {
    /// Player id assigned by the server
    pub id: u32,
    /// Remote address of the WebSocket connection
    pub addr: SocketAddr,
    /// Last time any frame arrived from this client
    pub last_seen: Instant,
    /// Encoding of the most recent frame; replies use the same
    pub encoding: Encoding,
    sender: FrameSender,
}

impl Client {
    /// Creates a client that speaks JSON until it sends a binary frame.
    pub fn new(id: u32, addr: SocketAddr, sender: FrameSender) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            encoding: Encoding::Json,
            sender,
        }
    }

    /// Queues a frame for the writer task. Returns false if the connection
    /// has already gone away; the frame is dropped in that case.
    pub fn send(&self, frame: Message) -> bool {
        self.sender.send(frame).is_ok()
    }

    /// Asks the writer task to close the socket.
    pub fn close(&self) {
        let _ = self.sender.send(Message::Close(None));
    }

    /// Checks whether no frame has arrived within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Owns every live connection, keyed by player id
pub struct ClientManager {
    clients: BTreeMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    /// Creates an empty registry. Ids start from 1.
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Registers a connection and returns its player id, or None when the
    /// server is full.
    pub fn add_client(&mut self, addr: SocketAddr, sender: FrameSender) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients
            .insert(client_id, Client::new(client_id, addr, sender));

        Some(client_id)
    }

    /// Removes a client, returning it if it was present.
    pub fn remove_client(&mut self, client_id: u32) -> Option<Client> {
        let client = self.clients.remove(&client_id)?;
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    /// Finds the player id behind a socket address.
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.id)
    }

    /// Looks up a client by player id.
    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    /// Marks activity from a client and remembers the encoding it used.
    pub fn touch(&mut self, client_id: u32, encoding: Encoding) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
            client.encoding = encoding;
        }
    }

    /// Marks activity that carried no game message, such as a pong.
    /// The client's encoding is left alone.
    pub fn mark_seen(&mut self, client_id: u32) {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.last_seen = Instant::now();
        }
    }

    /// Removes and returns every client idle for longer than `timeout`.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Client> {
        let timed_out: Vec<u32> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id)
            .collect();

        timed_out
            .into_iter()
            .filter_map(|id| self.remove_client(id))
            .collect()
    }

    /// Iterates over connected clients in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Client> {
        self.clients.values()
    }

    /// Number of connected clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
