//! # knx-netip
//!
//! Client side KNXnet/IP protocol engine.
//!
//! The crate reaches a KNX bus through a KNXnet/IP server: it discovers
//! servers on the local networks, opens tunneling or device management
//! connections, exchanges sequence numbered frames over UDP and converts
//! datapoint values to and from their bus encoding.
//!
//! ## Layers
//!
//! - [`protocol`] - wire codecs: structure blocks, frames, one view/builder
//!   pair per service
//! - [`connection`] - one client/server session with heartbeat and
//!   acknowledged sends
//! - [`discovery`] - concurrent per-interface search
//! - [`dpt`] - datapoint type registry and value codecs
//! - [`net`] - the datagram transport seam, a tokio UDP implementation and a
//!   scripted mock
//!
//! ## Example
//!
//! ```rust,no_run
//! use knx_netip::connection::{Connection, ConnectionConfig};
//! use knx_netip::discovery::{DiscoveryAgent, DiscoveryConfig};
//! use knx_netip::net::udp::{TokioUdpTransport, UdpTransportFactory};
//!
//! # async fn run() -> knx_netip::Result<()> {
//! let mut agent = DiscoveryAgent::new(UdpTransportFactory, DiscoveryConfig::default());
//! let servers = agent.start().await?;
//!
//! if let Some(endpoint) = servers.first().and_then(|server| server.endpoint()) {
//!     let mut connection = Connection::new(TokioUdpTransport::new(), ConnectionConfig::default());
//!     connection.connect_tunnel(endpoint).await?;
//!     // L_Data.req for group 1/2/3, switch on
//!     connection.send(&[0x11, 0x00, 0xBC, 0xE0, 0x00, 0x00, 0x0A, 0x03, 0x01, 0x00, 0x81]).await?;
//!     connection.disconnect().await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! The engine logs through the `log` facade under the `knx_netip` target, or
//! through `defmt` with the `defmt` feature.

pub mod addressing;
pub mod connection;
pub mod discovery;
pub mod dpt;
pub mod error;
#[macro_use]
pub mod logging;
pub mod net;
pub mod protocol;

// Re-export commonly used types
#[doc(inline)]
pub use addressing::IndividualAddress;
#[doc(inline)]
pub use connection::{Connection, ConnectionConfig, ConnectionEvent, State};
#[doc(inline)]
pub use discovery::{DiscoveryAgent, DiscoveryConfig, DiscoveryEvent};
#[doc(inline)]
pub use dpt::{DatapointRegistry, DatapointType, DatapointValue};
#[doc(inline)]
pub use error::{KnxError, Result};
#[doc(inline)]
pub use protocol::ServerInfo;
