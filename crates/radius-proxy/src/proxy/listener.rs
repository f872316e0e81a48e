//! Inbound datagram handling
//!
//! Each traffic class gets its own [`Reactor`]: a dedicated OS thread driving
//! a single-threaded Tokio runtime that waits on the class's IPv4 and IPv6
//! sockets. Every datagram is handled to completion before the next read:
//! size gate, device identification, hand-off to the [`DeviceRegistry`].

use crate::proxy::error::{ProxyError, ProxyResult};
use crate::proxy::stats::DispatchStats;
use crate::proxy::TrafficClass;
use radius_proto::{attribute_region, extract_device_id, Code};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

/// Smallest datagram worth inspecting: the 20-byte header plus room for the
/// vendor attribute carrying a device serial number
pub const MIN_PROXY_PACKET: usize = 43;

/// Receive buffer size per socket
pub const RADIUS_BUFFER_SIZE: usize = 2048;

/// Consumer of identified inbound traffic.
///
/// Implementations own what happens next (session lookup, forwarding,
/// dropping unattributed packets). Calls come from the reactor threads and
/// must not block them for long.
pub trait DeviceRegistry: Send + Sync {
    /// Accounting packet from `device_id`, empty when the sender could not be
    /// identified
    fn submit_accounting(&self, device_id: &str, packet: &[u8]);

    /// Authentication packet from `device_id`, empty when the sender could
    /// not be identified
    fn submit_authentication(&self, device_id: &str, packet: &[u8]);
}

/// What [`Dispatcher::dispatch`] did with a datagram
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Too short to be a proxied RADIUS packet
    Dropped,
    /// Handed to the registry. `code` is `None` for codes outside RFC 2865/2866.
    Submitted { device_id: String, code: Option<Code> },
}

/// Per traffic class datagram handler
#[derive(Clone)]
pub struct Dispatcher {
    class: TrafficClass,
    registry: Arc<dyn DeviceRegistry>,
    stats: Arc<DispatchStats>,
}

impl Dispatcher {
    pub fn new(class: TrafficClass, registry: Arc<dyn DeviceRegistry>) -> Self {
        Dispatcher {
            class,
            registry,
            stats: Arc::new(DispatchStats::default()),
        }
    }

    pub fn class(&self) -> TrafficClass {
        self.class
    }

    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }

    /// Identify the device behind `datagram` and submit it to the registry
    pub fn dispatch(&self, datagram: &[u8]) -> Dispatch {
        self.stats.record_received();

        if datagram.len() < MIN_PROXY_PACKET {
            self.stats.record_dropped();
            trace!(class = %self.class, len = datagram.len(), "Dropping undersized datagram");
            return Dispatch::Dropped;
        }

        let device_id = attribute_region(datagram)
            .and_then(extract_device_id)
            .unwrap_or_default();
        if !device_id.is_empty() {
            self.stats.record_attributed();
        }

        match self.class {
            TrafficClass::Accounting => self.registry.submit_accounting(&device_id, datagram),
            TrafficClass::Authentication => {
                self.registry.submit_authentication(&device_id, datagram)
            }
        }

        Dispatch::Submitted {
            device_id,
            code: Code::from_u8(datagram[0]),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("class", &self.class)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Receive loop for one traffic class
#[derive(Debug)]
pub struct Reactor {
    class: TrafficClass,
    shutdown: watch::Sender<bool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl Reactor {
    /// Start the receive thread for `dispatcher`'s traffic class.
    ///
    /// The sockets are switched to non-blocking mode and registered with the
    /// thread's runtime. At least one socket should be given; a reactor
    /// without sockets only waits for [`stop`](Self::stop).
    pub fn spawn(
        dispatcher: Dispatcher,
        v4: Option<std::net::UdpSocket>,
        v6: Option<std::net::UdpSocket>,
    ) -> ProxyResult<Self> {
        let class = dispatcher.class();
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_io()
            .build()?;

        let (v4, v6) = {
            let _guard = runtime.enter();
            (register(v4)?, register(v6)?)
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = thread::Builder::new()
            .name(format!("radius-{}", class))
            .spawn(move || runtime.block_on(receive_loop(dispatcher, v4, v6, shutdown_rx)))
            .map_err(|e| ProxyError::Reactor(format!("cannot start {} reactor: {}", class, e)))?;

        Ok(Reactor {
            class,
            shutdown,
            handle: Some(handle),
        })
    }

    pub fn class(&self) -> TrafficClass {
        self.class
    }

    /// Stop receiving and wait for the thread to exit. Sockets are closed
    /// once the thread is gone.
    pub fn stop(mut self) -> ProxyResult<()> {
        self.shutdown_and_join()
    }

    fn shutdown_and_join(&mut self) -> ProxyResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };

        // The receiver is gone only if the loop already exited.
        let _ = self.shutdown.send(true);
        handle
            .join()
            .map_err(|_| ProxyError::Reactor(format!("{} reactor panicked", self.class)))?;

        info!(class = %self.class, "Reactor stopped");
        Ok(())
    }
}

impl Drop for Reactor {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown_and_join() {
            warn!(error = %e, "Reactor did not shut down cleanly");
        }
    }
}

fn register(socket: Option<std::net::UdpSocket>) -> io::Result<Option<UdpSocket>> {
    socket
        .map(|socket| {
            socket.set_nonblocking(true)?;
            UdpSocket::from_std(socket)
        })
        .transpose()
}

async fn receive_loop(
    dispatcher: Dispatcher,
    v4: Option<UdpSocket>,
    v6: Option<UdpSocket>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf_v4 = [0u8; RADIUS_BUFFER_SIZE];
    let mut buf_v6 = [0u8; RADIUS_BUFFER_SIZE];

    info!(
        class = %dispatcher.class(),
        ipv4 = ?v4.as_ref().and_then(|s| s.local_addr().ok()),
        ipv6 = ?v6.as_ref().and_then(|s| s.local_addr().ok()),
        "Reactor listening"
    );

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            result = recv_from(v4.as_ref(), &mut buf_v4) => {
                handle_datagram(&dispatcher, result, &buf_v4);
            }
            result = recv_from(v6.as_ref(), &mut buf_v6) => {
                handle_datagram(&dispatcher, result, &buf_v6);
            }
        }
    }
}

/// Receive on `socket`, or never complete when the family is not bound
async fn recv_from(socket: Option<&UdpSocket>, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
    match socket {
        Some(socket) => socket.recv_from(buf).await,
        None => std::future::pending().await,
    }
}

fn handle_datagram(dispatcher: &Dispatcher, result: io::Result<(usize, SocketAddr)>, buf: &[u8]) {
    match result {
        Ok((len, source)) => {
            if let Dispatch::Submitted { device_id, code } = dispatcher.dispatch(&buf[..len]) {
                debug!(
                    class = %dispatcher.class(),
                    source = %source,
                    len = len,
                    code = ?code,
                    device = %device_id,
                    "Datagram submitted"
                );
            }
        }
        Err(e) => {
            dispatcher.stats().record_receive_error();
            warn!(class = %dispatcher.class(), error = %e, "Receive failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_proto::{serial_number_attribute, Attribute, AttributeType, Code, Packet};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingRegistry {
        accounting: Mutex<Vec<(String, Vec<u8>)>>,
        authentication: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl DeviceRegistry for RecordingRegistry {
        fn submit_accounting(&self, device_id: &str, packet: &[u8]) {
            self.accounting.lock().unwrap().push((device_id.to_string(), packet.to_vec()));
        }

        fn submit_authentication(&self, device_id: &str, packet: &[u8]) {
            self.authentication.lock().unwrap().push((device_id.to_string(), packet.to_vec()));
        }
    }

    fn tagged_packet(code: Code, serial: &str) -> Vec<u8> {
        let mut packet = Packet::new(code, 7, [0u8; 16]);
        packet.add_attribute(Attribute::string(AttributeType::UserName.as_u8(), "ap").unwrap());
        packet.add_attribute(serial_number_attribute(serial).unwrap());
        packet.encode().unwrap()
    }

    #[test]
    fn test_dispatch_accounting_with_device() {
        let registry = Arc::new(RecordingRegistry::default());
        let dispatcher = Dispatcher::new(TrafficClass::Accounting, registry.clone());
        let packet = tagged_packet(Code::AccountingRequest, "90-3c-b3-bb-24-72");
        assert!(packet.len() >= MIN_PROXY_PACKET);

        assert_eq!(
            dispatcher.dispatch(&packet),
            Dispatch::Submitted {
                device_id: "903cb3bb2472".to_string(),
                code: Some(Code::AccountingRequest),
            }
        );

        let submitted = registry.accounting.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].0, "903cb3bb2472");
        assert_eq!(submitted[0].1, packet);
        assert!(registry.authentication.lock().unwrap().is_empty());
        assert_eq!(dispatcher.stats().snapshot().attributed, 1);
    }

    #[test]
    fn test_dispatch_unidentified_forwards_empty_id() {
        let registry = Arc::new(RecordingRegistry::default());
        let dispatcher = Dispatcher::new(TrafficClass::Authentication, registry.clone());
        let packet = vec![1u8; 60];

        assert_eq!(
            dispatcher.dispatch(&packet),
            Dispatch::Submitted {
                device_id: String::new(),
                code: Some(Code::AccessRequest),
            }
        );
        let submitted = registry.authentication.lock().unwrap();
        assert_eq!(submitted[0].0, "");
        assert_eq!(dispatcher.stats().snapshot().attributed, 0);
    }

    #[test]
    fn test_dispatch_unknown_code_still_submitted() {
        let registry = Arc::new(RecordingRegistry::default());
        let dispatcher = Dispatcher::new(TrafficClass::Authentication, registry.clone());
        let mut packet = tagged_packet(Code::StatusServer, "903cb3bb2472");
        assert_eq!(
            dispatcher.dispatch(&packet),
            Dispatch::Submitted {
                device_id: "903cb3bb2472".to_string(),
                code: Some(Code::StatusServer),
            }
        );

        packet[0] = 0xff;
        assert_eq!(
            dispatcher.dispatch(&packet),
            Dispatch::Submitted {
                device_id: "903cb3bb2472".to_string(),
                code: None,
            }
        );
        assert_eq!(registry.authentication.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_minimum_size_gate() {
        let registry = Arc::new(RecordingRegistry::default());
        let dispatcher = Dispatcher::new(TrafficClass::Accounting, registry.clone());
        let packet = tagged_packet(Code::AccountingRequest, "903cb3bb2472");

        for len in [0, 20, MIN_PROXY_PACKET - 1] {
            assert_eq!(dispatcher.dispatch(&packet[..len]), Dispatch::Dropped);
        }
        assert!(registry.accounting.lock().unwrap().is_empty());

        let stats = dispatcher.stats().snapshot();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.dropped, 3);
    }

    #[test]
    fn test_reactor_receives_and_stops() {
        let registry = Arc::new(RecordingRegistry::default());
        let dispatcher = Dispatcher::new(TrafficClass::Accounting, registry.clone());
        let stats = dispatcher.stats().clone();

        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let listen = socket.local_addr().unwrap();
        let reactor = Reactor::spawn(dispatcher, Some(socket), None).unwrap();

        let client = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        client.send_to(&[0u8; 10], listen).unwrap();
        client
            .send_to(&tagged_packet(Code::AccountingRequest, "903cb3bb2472"), listen)
            .unwrap();

        for _ in 0..200 {
            if stats.snapshot().received == 2 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }
        reactor.stop().unwrap();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 2);
        assert_eq!(snapshot.dropped, 1);
        let submitted = registry.accounting.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].0, "903cb3bb2472");
    }

    #[test]
    fn test_reactor_without_sockets_stops() {
        let registry = Arc::new(RecordingRegistry::default());
        let dispatcher = Dispatcher::new(TrafficClass::Authentication, registry);
        let reactor = Reactor::spawn(dispatcher, None, None).unwrap();
        assert_eq!(reactor.class(), TrafficClass::Authentication);
        reactor.stop().unwrap();
    }
}
