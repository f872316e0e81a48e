//! Pool configuration store
//!
//! Owns the routing document and everything derived from it. The document is
//! persisted as `radius_pool_config.json` under the data directory; the
//! derived per-class, per-family pools are rebuilt from scratch whenever the
//! document changes, which also resets every scheduling counter.
//!
//! One mutex guards the document and the derived state together. Every
//! routing decision takes it, so concurrent senders always observe a
//! consistent pool set and strictly serialized counter updates.

use crate::proxy::error::{ProxyError, ProxyResult};
use crate::proxy::pool::{build_pools, ClassPools, PoolList};
use crate::proxy::router;
use crate::proxy::stats::{ClassSnapshot, RoutingSnapshot};
use crate::proxy::TrafficClass;
use std::fs;
use std::io::ErrorKind;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// File name of the pool document inside the data directory
pub const POOL_CONFIG_FILE: &str = "radius_pool_config.json";

/// Outcome of [`PoolStore::load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// Document read and activated
    Loaded { pools: usize },
    /// No document on disk; the previous configuration is untouched
    NotFound,
}

#[derive(Debug, Default)]
struct RoutingState {
    config: PoolList,
    authentication: ClassPools,
    accounting: ClassPools,
}

impl RoutingState {
    /// Validate `config` and derive its pools. Nothing is shared with the
    /// live state, so a failure here cannot leave it half-updated.
    fn build(config: PoolList) -> ProxyResult<Self> {
        config.validate()?;

        let mut authentication = ClassPools::default();
        let mut accounting = ClassPools::default();
        for pool in &config.pools {
            build_pools(
                &pool.name,
                &pool.auth_config,
                &mut authentication.v4,
                &mut authentication.v6,
            )?;
            build_pools(
                &pool.name,
                &pool.acct_config,
                &mut accounting.v4,
                &mut accounting.v6,
            )?;
        }

        Ok(RoutingState {
            config,
            authentication,
            accounting,
        })
    }

    fn class_mut(&mut self, class: TrafficClass) -> &mut ClassPools {
        match class {
            TrafficClass::Authentication => &mut self.authentication,
            TrafficClass::Accounting => &mut self.accounting,
        }
    }
}

/// Durable routing configuration plus the derived routing index
#[derive(Debug)]
pub struct PoolStore {
    path: PathBuf,
    state: Mutex<RoutingState>,
}

impl PoolStore {
    /// Create an empty store whose document lives under `data_dir`.
    ///
    /// Nothing is read until [`load`](Self::load) is called.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        PoolStore {
            path: data_dir.as_ref().join(POOL_CONFIG_FILE),
            state: Mutex::new(RoutingState::default()),
        }
    }

    /// Path of the pool document
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, RoutingState> {
        // Every mutation builds a complete replacement before swapping it in,
        // so the state behind a poisoned lock is still whole.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the document from disk and activate it.
    ///
    /// A missing file is not an error. A document that fails to parse,
    /// validate or resolve is rejected with [`ProxyError::InvalidDocument`]
    /// and the previously active configuration stays live.
    pub fn load(&self) -> ProxyResult<LoadStatus> {
        let mut state = self.lock();

        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(path = %self.path.display(), "No pool configuration file exists");
                return Ok(LoadStatus::NotFound);
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot read pool configuration file");
                return Err(e.into());
            }
        };

        let rebuilt = serde_json::from_str::<PoolList>(&contents)
            .map_err(ProxyError::from)
            .and_then(RoutingState::build)
            .map_err(|e| {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Pool configuration file is bad, keeping current configuration"
                );
                ProxyError::InvalidDocument {
                    path: self.path.clone(),
                    reason: e.to_string(),
                }
            })?;

        let pools = rebuilt.config.pools.len();
        *state = rebuilt;

        info!(path = %self.path.display(), pools = pools, "Pool configuration loaded");
        Ok(LoadStatus::Loaded { pools })
    }

    /// Replace the configuration, persist it and rebuild the routing index.
    ///
    /// The new document is serialized and fully derived, host resolution
    /// included, before the lock is taken; routing only waits for the write
    /// and the swap. On any error both the disk and the live state keep the
    /// previous configuration.
    pub fn set(&self, config: PoolList) -> ProxyResult<()> {
        let contents = serde_json::to_string_pretty(&config)?;
        let rebuilt = RoutingState::build(config)?;
        let pools = rebuilt.config.pools.len();

        let mut state = self.lock();
        self.persist(&contents)?;
        *state = rebuilt;
        drop(state);

        info!(path = %self.path.display(), pools = pools, "Pool configuration replaced");
        Ok(())
    }

    /// Copy of the active document
    pub fn get(&self) -> PoolList {
        self.lock().config.clone()
    }

    /// Remove the document from disk and drop all routing state.
    ///
    /// A missing file is fine. In-memory state is cleared even when removal
    /// fails; the error is still returned.
    pub fn delete(&self) -> ProxyResult<()> {
        let mut state = self.lock();
        *state = RoutingState::default();

        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "Pool configuration deleted");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Cannot remove pool configuration file");
                Err(e.into())
            }
        }
    }

    /// Pick the address a packet for `original` should actually go to
    pub fn route(&self, class: TrafficClass, original: SocketAddr) -> SocketAddr {
        self.route_with(class, original, |routed| routed)
    }

    /// Route `original` and run `f` on the result before the lock is
    /// released, so no reconfiguration or other routing decision can land
    /// between the choice and whatever `f` does with it.
    pub fn route_with<R>(
        &self,
        class: TrafficClass,
        original: SocketAddr,
        f: impl FnOnce(SocketAddr) -> R,
    ) -> R {
        let mut state = self.lock();
        if state.config.pools.is_empty() {
            return f(original);
        }

        let family = state.class_mut(class).family_mut(&original);
        let routed = router::route(original, family);
        debug!(class = %class, original = %original, routed = %routed, "Routed packet");
        f(routed)
    }

    /// Mark every destination with `address` in `class` as (un)available.
    ///
    /// Hook for a health prober. Returns the number of entries updated;
    /// the flag is reset to available on the next reload.
    pub fn set_available(&self, class: TrafficClass, address: SocketAddr, available: bool) -> usize {
        let mut state = self.lock();
        let family = state.class_mut(class).family_mut(&address);

        let mut updated = 0;
        for dest in family.destinations_mut(&address) {
            dest.available = available;
            updated += 1;
        }

        if updated > 0 {
            info!(class = %class, address = %address, available = available, "Destination availability changed");
        }
        updated
    }

    /// Copy of the derived pools and their scheduling state
    pub fn snapshot(&self) -> RoutingSnapshot {
        let state = self.lock();
        RoutingSnapshot {
            authentication: ClassSnapshot::from(&state.authentication),
            accounting: ClassSnapshot::from(&state.accounting),
        }
    }

    fn persist(&self, contents: &str) -> ProxyResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, contents)?;
        debug!(path = %self.path.display(), bytes = contents.len(), "Pool configuration written");
        Ok(())
    }
}
