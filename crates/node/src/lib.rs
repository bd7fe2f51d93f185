//! The node: one owner for every core component, the production and
//! settlement loops, and the process-boundary API offered to the RPC and
//! P2P layers.

pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod node;

pub use config::NodeConfig;
pub use error::NodeError;
pub use metrics::Metrics;
pub use network::{NoopPeerSink, PeerSink};
pub use node::{HealthStatus, Node};
