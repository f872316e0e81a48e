use crate::config::Config;
use crate::proxy::listener::{DeviceRegistry, Dispatcher, Reactor};
use crate::proxy::sender::{BoundAddrs, ClassSockets, ProxySockets, Sender};
use crate::proxy::stats::{DispatchStats, DispatchStatsSnapshot};
use crate::proxy::{PoolStore, ProxyResult, TrafficClass};
use std::sync::Arc;
use tracing::info;

/// Listening addresses of both traffic classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalAddrs {
    pub authentication: BoundAddrs,
    pub accounting: BoundAddrs,
}

struct ClassListener {
    reactor: Reactor,
    stats: Arc<DispatchStats>,
}

impl ClassListener {
    fn start(
        class: TrafficClass,
        sockets: ClassSockets,
        registry: Arc<dyn DeviceRegistry>,
    ) -> ProxyResult<Self> {
        let dispatcher = Dispatcher::new(class, registry);
        let stats = dispatcher.stats().clone();
        let reactor = Reactor::spawn(dispatcher, Some(sockets.v4), sockets.v6)?;
        Ok(ClassListener { reactor, stats })
    }
}

/// Running proxy: two reactors plus the shared sender
pub struct RadiusProxy {
    store: Arc<PoolStore>,
    sender: Sender,
    local_addrs: LocalAddrs,
    authentication: ClassListener,
    accounting: ClassListener,
}

impl RadiusProxy {
    /// Bind all sockets and start both reactors.
    ///
    /// `store` should already be loaded; the proxy never reloads it on its
    /// own. Bind failures abort startup with nothing left running.
    pub fn start(
        config: &Config,
        store: Arc<PoolStore>,
        registry: Arc<dyn DeviceRegistry>,
    ) -> ProxyResult<Self> {
        let sockets = ProxySockets::bind(config)?;
        let local_addrs = LocalAddrs {
            authentication: sockets.authentication.local_addrs()?,
            accounting: sockets.accounting.local_addrs()?,
        };
        let sender = Sender::new(Arc::clone(&store), sockets.try_clone()?);

        let authentication = ClassListener::start(
            TrafficClass::Authentication,
            sockets.authentication,
            Arc::clone(&registry),
        )?;
        let accounting = ClassListener::start(TrafficClass::Accounting, sockets.accounting, registry)?;

        info!(
            authentication = %local_addrs.authentication.v4,
            accounting = %local_addrs.accounting.v4,
            ipv6 = local_addrs.authentication.v6.is_some(),
            "RADIUS proxy started"
        );

        Ok(RadiusProxy {
            store,
            sender,
            local_addrs,
            authentication,
            accounting,
        })
    }

    /// Outbound handle; clone it freely
    pub fn sender(&self) -> Sender {
        self.sender.clone()
    }

    pub fn store(&self) -> &Arc<PoolStore> {
        &self.store
    }

    pub fn local_addrs(&self) -> LocalAddrs {
        self.local_addrs
    }

    pub fn stats(&self, class: TrafficClass) -> DispatchStatsSnapshot {
        match class {
            TrafficClass::Authentication => self.authentication.stats.snapshot(),
            TrafficClass::Accounting => self.accounting.stats.snapshot(),
        }
    }

    /// Stop both reactors and wait for their threads.
    ///
    /// The listening sockets close with the reactors; sender clones keep
    /// their own handles until dropped.
    pub fn stop(self) -> ProxyResult<()> {
        let authentication = self.authentication.reactor.stop();
        let accounting = self.accounting.reactor.stop();
        authentication?;
        accounting?;

        info!("RADIUS proxy stopped");
        Ok(())
    }
}
