//! RADIUS Pool Proxy
//!
//! Receives RADIUS authentication and accounting traffic from managed access
//! points, identifies the sending device from its vendor attribute, and
//! forwards packets to upstream servers chosen from load-balanced pools.
//!
//! # Features
//!
//! - Dual-stack listeners, one thread per traffic class
//! - Persistent JSON pool document with unknown keys preserved
//! - `weighted`, `round_robin` and `random` server selection
//! - Pluggable device registry
//!
//! # Example
//!
//! ```rust,no_run
//! use radius_proxy::proxy::{DeviceRegistry, PoolStore};
//! use radius_proxy::{Config, RadiusProxy};
//! use std::sync::Arc;
//!
//! struct Registry;
//!
//! impl DeviceRegistry for Registry {
//!     fn submit_accounting(&self, device_id: &str, packet: &[u8]) {
//!         println!("accounting from {} ({} bytes)", device_id, packet.len());
//!     }
//!     fn submit_authentication(&self, device_id: &str, packet: &[u8]) {
//!         println!("authentication from {} ({} bytes)", device_id, packet.len());
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let store = Arc::new(PoolStore::new(&config.data_dir));
//!     store.load()?;
//!
//!     let proxy = RadiusProxy::start(&config, store, Arc::new(Registry))?;
//!     // ... proxy.sender().send(...) from the registry side ...
//!     proxy.stop()?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod proxy;
pub mod server;

pub use config::{Config, ConfigError};
pub use proxy::{DeviceRegistry, PoolStore, ProxyError, ProxyResult, Sender, TrafficClass};
pub use server::{LocalAddrs, RadiusProxy};
