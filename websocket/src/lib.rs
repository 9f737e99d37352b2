//! WebSocket push server for real-time delivery notifications.
//!
//! A recipient connects to `/ws/:address` with a signed ticket and receives:
//! - `message_stored` as soon as a message addressed to it is persisted
//! - `message_committed` when a block containing the message is committed
//!
//! The RPC layer publishes into [`PushState`]; this crate owns the socket
//! lifecycle and per-recipient fan-out.

pub mod auth;
pub mod server;

pub use auth::{verify_ticket, TicketError};
pub use server::{PushState, WebSocketServer};
