//! Network Module
//!
//! TCP server, connection handling and the blocking client.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Worker thread pool for connections, fed over a crossbeam channel
//! - Requests routed through [`Node`](crate::node::Node)

mod client;
mod connection;
mod server;

pub use client::Client;
pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
