//! ClickHouse native protocol driver.
//!
//! This module implements the client side of the native TCP protocol: framing, revision
//! negotiation, the packet codecs and the state machine that ties them together.
//!
//! # Overview
//!
//! A [`Connection`] starts with a Hello exchange that fixes the protocol [`Revision`] for the
//! lifetime of the connection. After that it runs one request at a time:
//!
//! - [`Connection::execute`] sends a query and streams every response packet to a
//!   [`QueryEvents`] sink until EndOfStream or an Exception arrives.
//! - [`Connection::insert`] sends an `INSERT` query, waits for the server to describe the
//!   table, then ships one [`Block`](crate::block::Block) of rows.
//! - [`Connection::ping`] checks liveness.
//!
//! # Binary Format
//!
//! Every packet starts with a varint code ([`ClientCode`] / [`ServerCode`]). Packet bodies are
//! made of unsigned LEB128 varints, fixed-width little-endian scalars and varint
//! length-prefixed strings, see [`transport`]. Fields introduced by later server revisions are
//! gated through [`revision::Feature`] on both the read and the write path.
//!
//! Compression is never negotiated and no per-query settings are sent.
//!
//! # Errors
//!
//! Failures surface as [`ClientError`]. Transport and protocol errors leave the connection
//! unusable; server exceptions do not, since the server ends its response after reporting one.
//!
//! # See Also
//!
//! - [`block`](crate::block): columnar data carried by Data packets.
mod connection;
mod data;
mod error;
mod events;
mod exception;
mod options;
mod request;
mod response;
pub mod revision;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use connection::{Connection, ConnectionState, Outcome, Query};
pub use error::{ClientError, ProtocolError};
pub use events::{NoEvents, QueryEvents};
pub use exception::ServerException;
pub use options::{ClientOptions, DEFAULT_PORT, QueryIdGenerator};
pub use request::{ClientCode, ClientInfo};
pub use response::{Profile, Progress, ServerCode, ServerInfo};
pub use revision::Revision;
pub use transport::{ProtocolTransport, TransportError, WireRead, WireWrite};
