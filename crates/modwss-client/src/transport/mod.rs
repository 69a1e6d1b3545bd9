//! Transport layer (WebSocket).
//!
//! The socket sits behind the `Connector`/`Link` traits so the dispatcher can
//! be driven by a fake in tests. `ws` holds the tokio-tungstenite connector,
//! `codec` turns socket messages into link events once, and `connection`
//! owns the single live socket and its lifecycle.

pub mod codec;
pub mod connection;
pub mod link;
pub mod ws;

pub use connection::{ConnectionManager, ConnectionObserver, ConnectionState};
pub use link::{Connector, Link, LinkEvent, Opened};
pub use ws::TungsteniteConnector;
