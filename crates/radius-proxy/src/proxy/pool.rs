//! Upstream server pools
//!
//! Two layers live here. The *document* types (`PoolList` and friends) are the
//! durable routing configuration, serialized as JSON and preserved
//! round-trip including keys this proxy does not interpret. The *runtime*
//! types (`Pool`, `Destination`, `FamilyPools`) are derived from the document
//! on every load and carry the ephemeral scheduling state the router mutates.

use crate::proxy::error::{ProxyError, ProxyResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use tracing::debug;

/// Scale used to turn relative weights into scheduling steps
pub const STEP_SCALE: u64 = 1000;

/// Load balancing strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
    /// Smooth weighted round-robin driven by per-destination steps
    Weighted,
    /// Strict rotation, weights ignored
    RoundRobin,
    /// Uniform random member
    Random,
}

impl Default for LoadBalanceStrategy {
    fn default() -> Self {
        LoadBalanceStrategy::RoundRobin
    }
}

impl LoadBalanceStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadBalanceStrategy::Weighted => "weighted",
            LoadBalanceStrategy::RoundRobin => "round_robin",
            LoadBalanceStrategy::Random => "random",
        }
    }
}

impl fmt::Display for LoadBalanceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The full routing configuration document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PoolList {
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One named pool with its authentication and accounting halves
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub auth_config: ServerPoolConfig,
    #[serde(default)]
    pub acct_config: ServerPoolConfig,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Server list and selection settings for one traffic class of a pool
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPoolConfig {
    #[serde(default)]
    pub servers: Vec<ServerEntry>,
    #[serde(default)]
    pub strategy: LoadBalanceStrategy,
    /// Health monitoring flag. Carried as data; no prober consumes it yet.
    #[serde(default)]
    pub monitor: bool,
    #[serde(default)]
    pub monitor_method: String,
    #[serde(default)]
    pub method_parameters: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One upstream RADIUS server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
    /// IP literal or resolvable hostname
    pub host: String,
    pub port: u16,
    #[serde(default = "default_weight")]
    pub weight: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_weight() -> u64 {
    1
}

impl ServerEntry {
    pub fn new(host: impl Into<String>, port: u16, weight: u64) -> Self {
        ServerEntry {
            host: host.into(),
            port,
            weight,
            extra: Map::new(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> ProxyResult<()> {
        if self.host.trim().is_empty() {
            return Err(ProxyError::Configuration(
                "Server host cannot be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(ProxyError::Configuration(format!(
                "Server '{}' has port 0",
                self.host
            )));
        }

        Ok(())
    }

    /// Resolve host and port to a socket address.
    ///
    /// IP literals (bracketed IPv6 accepted) are used as-is; anything else
    /// goes through the system resolver and the first answer wins.
    pub fn resolve(&self) -> ProxyResult<SocketAddr> {
        let host = self.host.trim().trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }

        let resolve_error = |reason: String| ProxyError::Resolve {
            host: self.host.clone(),
            port: self.port,
            reason,
        };

        (host, self.port)
            .to_socket_addrs()
            .map_err(|e| resolve_error(e.to_string()))?
            .next()
            .ok_or_else(|| resolve_error("no addresses returned".to_string()))
    }
}

impl ServerPoolConfig {
    pub fn validate(&self, pool: &str, class: &str) -> ProxyResult<()> {
        for server in &self.servers {
            server.validate().map_err(|e| {
                ProxyError::Configuration(format!("Pool '{}' {}: {}", pool, class, e))
            })?;
        }
        Ok(())
    }
}

impl PoolList {
    /// Validate every pool in the document
    pub fn validate(&self) -> ProxyResult<()> {
        for pool in &self.pools {
            pool.auth_config.validate(&pool.name, "authentication")?;
            pool.acct_config.validate(&pool.name, "accounting")?;
        }
        Ok(())
    }
}

/// One upstream server inside a runtime pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Destination {
    pub address: SocketAddr,
    pub weight: u64,
    /// Scheduling increment; smaller steps are picked more often
    pub step: u64,
    /// Scheduling counter, only ever grows until the next reload
    pub state: u64,
    pub available: bool,
}

/// Destinations of one address family sharing one strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pool {
    pub name: String,
    pub strategy: LoadBalanceStrategy,
    pub total_weight: u64,
    /// Configuration order; the router's tie-break depends on it
    pub destinations: Vec<Destination>,
}

/// Pools of a single address family and the index into them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyPools {
    /// Configured destination address -> position in `pools`
    pub index: HashMap<SocketAddr, usize>,
    pub pools: Vec<Pool>,
}

impl FamilyPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Pool governing requests originally addressed to `addr`
    pub fn pool_for_mut(&mut self, addr: &SocketAddr) -> Option<&mut Pool> {
        let position = *self.index.get(addr)?;
        self.pools.get_mut(position)
    }

    /// Every destination entry with the given address, across pools
    pub fn destinations_mut<'a>(
        &'a mut self,
        addr: &'a SocketAddr,
    ) -> impl Iterator<Item = &'a mut Destination> + 'a {
        self.pools
            .iter_mut()
            .flat_map(|pool| pool.destinations.iter_mut())
            .filter(move |dest| dest.address == *addr)
    }
}

/// Runtime pools of one traffic class, split by address family
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassPools {
    pub v4: FamilyPools,
    pub v6: FamilyPools,
}

impl ClassPools {
    pub fn family_mut(&mut self, addr: &SocketAddr) -> &mut FamilyPools {
        if addr.is_ipv4() {
            &mut self.v4
        } else {
            &mut self.v6
        }
    }
}

/// Scheduling step for `weight` out of `total`.
///
/// A zero total yields the full scale; such pools are never eligible for
/// weighted selection anyway.
pub fn compute_step(weight: u64, total: u64) -> u64 {
    if total == 0 {
        return STEP_SCALE;
    }
    let share = (STEP_SCALE as u128 * weight as u128) / total as u128;
    STEP_SCALE.saturating_sub(share.min(STEP_SCALE as u128) as u64)
}

/// Append the pools described by `config` to the per-family collections.
///
/// Servers are split by resolved address family; each non-empty family gets
/// one pool and every server address is indexed to it. Resolution happens
/// before anything is appended, so a failure leaves `v4`/`v6` untouched.
pub fn build_pools(
    name: &str,
    config: &ServerPoolConfig,
    v4: &mut FamilyPools,
    v6: &mut FamilyPools,
) -> ProxyResult<()> {
    let mut dests_v4 = Vec::new();
    let mut dests_v6 = Vec::new();

    for server in &config.servers {
        let address = server.resolve()?;
        let dest = Destination {
            address,
            weight: server.weight,
            step: 0,
            state: 0,
            available: true,
        };
        if address.is_ipv4() {
            dests_v4.push(dest);
        } else {
            dests_v6.push(dest);
        }
    }

    append_pool(name, config.strategy, dests_v4, v4);
    append_pool(name, config.strategy, dests_v6, v6);
    Ok(())
}

fn append_pool(
    name: &str,
    strategy: LoadBalanceStrategy,
    mut destinations: Vec<Destination>,
    family: &mut FamilyPools,
) {
    if destinations.is_empty() {
        return;
    }

    let total_weight = destinations
        .iter()
        .fold(0u64, |total, d| total.saturating_add(d.weight));
    let position = family.pools.len();
    for dest in &mut destinations {
        dest.step = compute_step(dest.weight, total_weight);
        family.index.insert(dest.address, position);
    }

    debug!(
        pool = %name,
        strategy = %strategy,
        destinations = destinations.len(),
        total_weight = total_weight,
        "Built pool"
    );

    family.pools.push(Pool {
        name: name.to_string(),
        strategy,
        total_weight,
        destinations,
    });
}
