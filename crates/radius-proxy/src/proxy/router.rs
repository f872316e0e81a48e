//! Destination selection
//!
//! Given the address a packet was originally meant for, pick the pool member
//! that should actually receive it. Addresses outside pool management, and
//! pools with no eligible member, pass through unchanged.
//!
//! `weighted` and `round_robin` share one scheduler: every destination carries
//! a `state` counter, the available destination with the lowest counter wins
//! (first in configuration order on ties) and its counter grows by an
//! increment. For `weighted` the increment is the destination's `step`, which
//! is smaller for heavier weights, giving a smooth weighted rotation; for
//! `round_robin` it is always 1. Unavailable destinations still have their
//! counter advanced so they do not come back with a backlog of credit.

use crate::proxy::pool::{Destination, FamilyPools, LoadBalanceStrategy};
use rand::Rng;
use std::net::SocketAddr;

/// Route `original` through the pools of its address family
pub fn route(original: SocketAddr, family: &mut FamilyPools) -> SocketAddr {
    route_with_rng(original, family, &mut rand::rng())
}

/// [`route`] with an explicit random source for the `random` strategy
pub fn route_with_rng<R: Rng + ?Sized>(
    original: SocketAddr,
    family: &mut FamilyPools,
    rng: &mut R,
) -> SocketAddr {
    let Some(pool) = family.pool_for_mut(&original) else {
        return original;
    };

    let selected = match pool.strategy {
        LoadBalanceStrategy::Weighted if pool.total_weight == 0 => None,
        LoadBalanceStrategy::Weighted => select_lowest_state(&mut pool.destinations, |d| d.step),
        LoadBalanceStrategy::RoundRobin => select_lowest_state(&mut pool.destinations, |_| 1),
        LoadBalanceStrategy::Random => {
            // A lone member would only ever route to itself.
            if pool.destinations.len() > 1 {
                let index = rng.random_range(0..pool.destinations.len());
                Some(pool.destinations[index].address)
            } else {
                None
            }
        }
    };

    selected.unwrap_or(original)
}

fn select_lowest_state<F>(destinations: &mut [Destination], increment: F) -> Option<SocketAddr>
where
    F: Fn(&Destination) -> u64,
{
    let mut best: Option<(usize, u64)> = None;

    for (index, dest) in destinations.iter_mut().enumerate() {
        if !dest.available {
            dest.state = dest.state.saturating_add(increment(dest));
            continue;
        }
        if best.map_or(true, |(_, state)| dest.state < state) {
            best = Some((index, dest.state));
        }
    }

    let (index, _) = best?;
    let winner = &mut destinations[index];
    winner.state = winner.state.saturating_add(increment(winner));
    Some(winner.address)
}
