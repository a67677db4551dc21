//! Network layer for the fingerlink client
//!
//! This crate owns the single long-lived stream to the server. It wraps
//! the transport in the [`LineCodec`](fingerlink_protocol::LineCodec) and
//! exposes line-level send and receive with timeouts.
//!
//! # Components
//!
//! - **ConnectionManager**: connect with retry, send, receive, disconnect
//! - **Connector**: pluggable stream factory ([`TcpConnector`] in production)
//!
//! # Example
//!
//! ```no_run
//! use fingerlink_network::{ConnectionConfig, ConnectionManager};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConnectionConfig {
//!     server_addr: "127.0.0.1:5050".to_string(),
//!     ..ConnectionConfig::default()
//! };
//!
//! let mut connection = ConnectionManager::new(config);
//! let attempts = connection.connect(&CancellationToken::new()).await?;
//! println!("connected after {attempts} attempt(s)");
//! # Ok(())
//! # }
//! ```

#![allow(async_fn_in_trait)]

mod connection;

pub use connection::{
    ConnectionConfig, ConnectionError, ConnectionManager, ConnectionState, Connector,
    TcpConnector,
};
