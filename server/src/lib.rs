//! # Kickoff Match Server
//!
//! Authoritative server for a top-down multiplayer soccer match. Clients
//! report their own movement and request ball actions; the server owns the
//! ball, resolves every possession change, detects goals and outs, and
//! pushes the resulting state to everyone at a fixed rate.
//!
//! ## Architecture
//!
//! ### Single Owning Task
//! All match state lives in one [`game::Match`] owned by the server loop in
//! [`network`]. Network events, physics ticks and broadcasts are handled one
//! at a time by that loop, so no locks guard the simulation.
//!
//! ### WebSocket Transport
//! Browsers speak JSON over text frames. Rust clients may use bincode over
//! binary frames; the server replies in whatever encoding a client last used.
//!
//! ## Module Organization
//!
//! - `game`: the match aggregate (roster, ball, score, goals, timers, phase)
//! - `session`: joining, leaving, team balancing and phase transitions
//! - `actions`: kick, pass, dribble, release and tackle resolution
//! - `physics`: the per-tick stepper (resources, ball motion, goals, outs)
//! - `client_manager`: connection registry, ids, capacity and idle timeouts
//! - `config`: server tunables
//! - `network`: WebSocket accept loop, per-connection tasks and broadcasting
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use kickoff_server::config::ServerConfig;
//! use kickoff_server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new(ServerConfig::with_port(3000)).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod actions;
pub mod client_manager;
pub mod config;
pub mod game;
pub mod network;
pub mod physics;
pub mod session;
