//! Outbound path
//!
//! The proxy owns four UDP sockets: authentication and accounting, each in
//! both address families. They are bound once at startup; the reactors read
//! from them and the [`Sender`] writes through clones of the same sockets, so
//! upstream replies arrive where the reactors are listening.
//!
//! Sending is serialized on the [`PoolStore`] lock: the routing decision and
//! the write happen under one guard.

use crate::config::Config;
use crate::proxy::error::{ProxyError, ProxyResult};
use crate::proxy::store::PoolStore;
use crate::proxy::TrafficClass;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Addresses a traffic class is listening on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddrs {
    pub v4: SocketAddr,
    pub v6: Option<SocketAddr>,
}

/// Sockets of one traffic class
#[derive(Debug)]
pub struct ClassSockets {
    pub v4: UdpSocket,
    pub v6: Option<UdpSocket>,
}

impl ClassSockets {
    fn bind(class: TrafficClass, (v4, v6): (SocketAddr, Option<SocketAddr>)) -> ProxyResult<Self> {
        let sockets = ClassSockets {
            v4: bind_udp(v4)?,
            v6: v6.map(bind_udp).transpose()?,
        };

        let bound = sockets.local_addrs()?;
        info!(class = %class, ipv4 = %bound.v4, ipv6 = ?bound.v6, "Sockets bound");
        Ok(sockets)
    }

    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(ClassSockets {
            v4: self.v4.try_clone()?,
            v6: self.v6.as_ref().map(UdpSocket::try_clone).transpose()?,
        })
    }

    pub fn local_addrs(&self) -> io::Result<BoundAddrs> {
        Ok(BoundAddrs {
            v4: self.v4.local_addr()?,
            v6: self.v6.as_ref().map(UdpSocket::local_addr).transpose()?,
        })
    }

    /// Socket matching the address family of `destination`
    pub fn for_destination(&self, destination: &SocketAddr) -> Option<&UdpSocket> {
        if destination.is_ipv4() {
            Some(&self.v4)
        } else {
            self.v6.as_ref()
        }
    }
}

/// The proxy's bound sockets
#[derive(Debug)]
pub struct ProxySockets {
    pub authentication: ClassSockets,
    pub accounting: ClassSockets,
}

impl ProxySockets {
    /// Bind every socket `config` asks for. Any failure aborts the whole
    /// set; sockets bound so far are closed on return.
    pub fn bind(config: &Config) -> ProxyResult<Self> {
        Ok(ProxySockets {
            authentication: ClassSockets::bind(TrafficClass::Authentication, config.authentication_addrs()?)?,
            accounting: ClassSockets::bind(TrafficClass::Accounting, config.accounting_addrs()?)?,
        })
    }

    pub fn class(&self, class: TrafficClass) -> &ClassSockets {
        match class {
            TrafficClass::Authentication => &self.authentication,
            TrafficClass::Accounting => &self.accounting,
        }
    }

    pub fn try_clone(&self) -> ProxyResult<Self> {
        Ok(ProxySockets {
            authentication: self.authentication.try_clone()?,
            accounting: self.accounting.try_clone()?,
        })
    }
}

/// Bind a UDP socket with `SO_REUSEADDR`. IPv6 sockets are IPv6-only so an
/// IPv4 socket can hold the same port.
pub fn bind_udp(addr: SocketAddr) -> ProxyResult<UdpSocket> {
    let bind = || -> io::Result<UdpSocket> {
        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
        socket.set_reuse_address(true)?;
        if addr.is_ipv6() {
            socket.set_only_v6(true)?;
        }
        socket.bind(&addr.into())?;
        Ok(socket.into())
    };

    bind().map_err(|source| ProxyError::Bind { addr, source })
}

/// Routes datagrams through the pool store and writes them out.
///
/// Cheap to clone; all clones share the store and sockets. The sockets are
/// non-blocking once the reactors own them, so a full send buffer surfaces as
/// a `WouldBlock` error and the datagram is lost like any other UDP drop.
#[derive(Debug, Clone)]
pub struct Sender {
    store: Arc<PoolStore>,
    sockets: Arc<ProxySockets>,
}

impl Sender {
    pub fn new(store: Arc<PoolStore>, sockets: ProxySockets) -> Self {
        Sender {
            store,
            sockets: Arc::new(sockets),
        }
    }

    /// Send `packet`, originally meant for `destination`, to whichever pool
    /// member the router picks. Returns the address actually used.
    ///
    /// The store lock is held until `send_to` returns, so datagrams leave in
    /// the order their routing decisions were made.
    pub fn send(
        &self,
        class: TrafficClass,
        device_id: &str,
        destination: SocketAddr,
        packet: &[u8],
    ) -> ProxyResult<SocketAddr> {
        self.store.route_with(class, destination, |target| -> ProxyResult<SocketAddr> {
            let family = if target.is_ipv4() { "IPv4" } else { "IPv6" };
            let socket = self
                .sockets
                .class(class)
                .for_destination(&target)
                .ok_or(ProxyError::NoSocket(family, target))?;

            match socket.send_to(packet, target) {
                Ok(sent) => {
                    debug!(
                        class = %class,
                        device = %device_id,
                        original = %destination,
                        target = %target,
                        bytes = sent,
                        "Packet forwarded"
                    );
                    Ok(target)
                }
                Err(e) => {
                    warn!(
                        class = %class,
                        device = %device_id,
                        target = %target,
                        error = %e,
                        "Send failed"
                    );
                    Err(e.into())
                }
            }
        })
    }
}
