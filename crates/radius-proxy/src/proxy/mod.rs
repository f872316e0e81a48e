//! RADIUS Proxy Module
//!
//! Forwards RADIUS traffic from access points to upstream servers, spreading
//! load across configured server pools.
//!
//! # Architecture
//!
//! - [`PoolStore`] - Durable pool document and the routing index derived from it
//! - [`router`] - Destination selection (`weighted`, `round_robin`, `random`)
//! - [`Reactor`] / [`Dispatcher`] - Per traffic class listeners that identify the
//!   sending device and hand packets to a [`DeviceRegistry`]
//! - [`Sender`] - Routes and writes outbound datagrams
//!
//! Authentication and accounting are two independent universes: separate
//! ports, separate sockets, separate pools.
//!
//! # Example
//!
//! ```rust,no_run
//! use radius_proxy::proxy::{PoolStore, TrafficClass};
//!
//! let store = PoolStore::new("/var/lib/radius-proxy");
//! store.load()?;
//!
//! let target = "10.0.0.1:1813".parse()?;
//! let actual = store.route(TrafficClass::Accounting, target);
//! println!("sending to {}", actual);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod listener;
pub mod pool;
pub mod router;
pub mod sender;
pub mod stats;
pub mod store;

pub use error::{ProxyError, ProxyResult};
pub use listener::{DeviceRegistry, Dispatch, Dispatcher, Reactor};
pub use pool::{
    ClassPools, Destination, FamilyPools, LoadBalanceStrategy, Pool, PoolConfig, PoolList,
    ServerEntry, ServerPoolConfig,
};
pub use sender::{ProxySockets, Sender};
pub use stats::{DispatchStats, DispatchStatsSnapshot, RoutingSnapshot};
pub use store::{LoadStatus, PoolStore, POOL_CONFIG_FILE};

use serde::{Deserialize, Serialize};
use std::fmt;

/// RADIUS traffic class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficClass {
    Authentication,
    Accounting,
}

impl TrafficClass {
    pub fn as_str(self) -> &'static str {
        match self {
            TrafficClass::Authentication => "authentication",
            TrafficClass::Accounting => "accounting",
        }
    }
}

impl fmt::Display for TrafficClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
