//! Routing and listener statistics
//!
//! Point-in-time views for diagnostics: the derived routing state of the
//! pool store, and per traffic class datagram counters.

use crate::proxy::pool::{ClassPools, FamilyPools, Pool};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Copy of every derived pool and its scheduling state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RoutingSnapshot {
    pub authentication: ClassSnapshot,
    pub accounting: ClassSnapshot,
}

/// Derived pools of one traffic class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClassSnapshot {
    pub ipv4: FamilySnapshot,
    pub ipv6: FamilySnapshot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FamilySnapshot {
    pub index: BTreeMap<SocketAddr, usize>,
    pub pools: Vec<Pool>,
}

impl From<&FamilyPools> for FamilySnapshot {
    fn from(family: &FamilyPools) -> Self {
        FamilySnapshot {
            index: family.index.iter().map(|(addr, pos)| (*addr, *pos)).collect(),
            pools: family.pools.clone(),
        }
    }
}

impl From<&ClassPools> for ClassSnapshot {
    fn from(class: &ClassPools) -> Self {
        ClassSnapshot {
            ipv4: FamilySnapshot::from(&class.v4),
            ipv6: FamilySnapshot::from(&class.v6),
        }
    }
}

impl RoutingSnapshot {
    /// Number of derived pools across both classes and families
    pub fn pool_count(&self) -> usize {
        [&self.authentication, &self.accounting]
            .iter()
            .map(|c| c.ipv4.pools.len() + c.ipv6.pools.len())
            .sum()
    }

    /// Same snapshot with every scheduling counter set back to zero
    pub fn without_counters(mut self) -> Self {
        for class in [&mut self.authentication, &mut self.accounting] {
            for family in [&mut class.ipv4, &mut class.ipv6] {
                for pool in &mut family.pools {
                    for dest in &mut pool.destinations {
                        dest.state = 0;
                    }
                }
            }
        }
        self
    }
}

/// Datagram counters for one listener
#[derive(Debug, Default)]
pub struct DispatchStats {
    received: AtomicU64,
    dropped: AtomicU64,
    attributed: AtomicU64,
    receive_errors: AtomicU64,
}

/// Plain copy of [`DispatchStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStatsSnapshot {
    pub received: u64,
    pub dropped: u64,
    pub attributed: u64,
    pub receive_errors: u64,
}

impl DispatchStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attributed(&self) {
        self.attributed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_receive_error(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            attributed: self.attributed.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
        }
    }
}
