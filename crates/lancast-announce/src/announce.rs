//! The announcer: sender/receiver sockets for every configured group, the
//! periodic announcement fan-out, and one receive loop per receiver socket.

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use lancast_wire::MAX_ANNOUNCEMENT_LEN;

use crate::config::{GroupDescriptor, ScopedAddr};
use crate::error::AnnounceError;
use crate::socket::{create_receiver_socket, create_sender_socket, ReceiverSocket, SenderSocket};

/// How long a receive loop blocks before re-checking the running flag.
const RECV_POLL: Duration = Duration::from_secs(1);

/// Event delivered to the registered consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A peer announced one of its addresses.
    Peer {
        /// The announced address.
        addr: IpAddr,
        /// The datagram's source address.
        from: SocketAddr,
    },
    /// A receive loop hit an unrecoverable read error and exited. Reported
    /// once per loop; the loop is not restarted. Sibling loops keep going.
    ListenerClosed {
        descriptor: GroupDescriptor,
        error: String,
    },
}

/// Outcome of socket setup across all descriptors.
///
/// Setup attempts every descriptor even after a failure; the driver decides
/// whether partial success is acceptable.
#[derive(Debug)]
pub struct SetupReport {
    /// Number of sender sockets built.
    pub senders: usize,
    /// Number of receiver sockets built.
    pub receivers: usize,
    /// Descriptors that could not be fully set up, with their errors.
    pub failures: Vec<(GroupDescriptor, AnnounceError)>,
}

impl SetupReport {
    /// True when no socket of either role could be built.
    pub fn is_total_failure(&self) -> bool {
        self.senders == 0 && self.receivers == 0
    }
}

/// Owns the sockets for a fixed set of announcement groups.
///
/// Lifecycle: [`new`](Announcer::new) → [`setup`](Announcer::setup) (once,
/// before any loop) → [`listen`](Announcer::listen) (once) →
/// [`broadcast_local_addresses`](Announcer::broadcast_local_addresses) on a
/// timer → [`stop`](Announcer::stop).
pub struct Announcer {
    descriptors: Vec<GroupDescriptor>,
    port: u16,
    senders: Vec<SenderSocket>,
    receivers: Vec<ReceiverSocket>,
    started: AtomicBool,
    listening: AtomicBool,
    running: Arc<AtomicBool>,
    decode_failures: Arc<AtomicU64>,
    event_tx: mpsc::UnboundedSender<DiscoveryEvent>,
}

impl Announcer {
    /// Create an announcer for the given descriptors and port, along with
    /// the receiver end of its discovery event channel.
    pub fn new(
        descriptors: Vec<GroupDescriptor>,
        port: u16,
    ) -> (Self, mpsc::UnboundedReceiver<DiscoveryEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        (
            Self {
                descriptors,
                port,
                senders: Vec::new(),
                receivers: Vec::new(),
                started: AtomicBool::new(false),
                listening: AtomicBool::new(false),
                running: Arc::new(AtomicBool::new(true)),
                decode_failures: Arc::new(AtomicU64::new(0)),
                event_tx,
            },
            event_rx,
        )
    }

    /// Build one sender and one receiver socket per descriptor.
    ///
    /// Must run exactly once, before [`listen`](Announcer::listen); a second
    /// call fails with [`AnnounceError::AlreadyStarted`]. A descriptor whose
    /// setup fails is recorded in the report and skipped; the rest are still
    /// attempted.
    pub fn setup(&mut self) -> Result<SetupReport, AnnounceError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(AnnounceError::AlreadyStarted);
        }

        let mut failures = Vec::new();

        for descriptor in &self.descriptors {
            match create_sender_socket(descriptor, self.port) {
                Ok(sender) => self.senders.push(sender),
                Err(e) => {
                    failures.push((descriptor.clone(), e));
                    continue;
                }
            }
            match create_receiver_socket(descriptor, self.port) {
                Ok(receiver) => {
                    debug!(descriptor = %descriptor, "announcement group ready");
                    self.receivers.push(receiver);
                }
                Err(e) => failures.push((descriptor.clone(), e)),
            }
        }

        Ok(SetupReport {
            senders: self.senders.len(),
            receivers: self.receivers.len(),
            failures,
        })
    }

    /// Spawn one independent receive loop per receiver socket.
    ///
    /// Each loop delivers decoded announcements to the event channel and
    /// recovers from malformed datagrams in place; one loop's failure never
    /// halts its siblings. Runs once; a second call fails with
    /// [`AnnounceError::AlreadyStarted`].
    pub fn listen(&mut self) -> Result<(), AnnounceError> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(AnnounceError::AlreadyStarted);
        }

        for receiver in std::mem::take(&mut self.receivers) {
            tokio::spawn(receive_loop(
                receiver,
                self.running.clone(),
                self.decode_failures.clone(),
                self.event_tx.clone(),
            ));
        }

        Ok(())
    }

    /// Announce the given local addresses on every compatible sender.
    ///
    /// Each address is encoded once and sent on senders whose family
    /// matches and whose scope permits it (see
    /// [`GroupDescriptor::permits`]). A send failure on one socket is
    /// logged and does not stop the sweep.
    pub async fn broadcast_local_addresses(&self, addrs: &[ScopedAddr]) {
        for addr in addrs {
            let msg = lancast_wire::encode(addr.ip);

            for sender in &self.senders {
                if !sender.descriptor.permits(addr) {
                    continue;
                }
                match sender.socket.send(&msg).await {
                    Ok(_) => trace!(addr = %addr, descriptor = %sender.descriptor, "announced"),
                    Err(e) => {
                        trace!(descriptor = %sender.descriptor, error = %e, "announce send failed")
                    }
                }
            }
        }
    }

    /// Signal all receive loops to exit.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the announcer has been stopped.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of datagrams discarded as malformed since startup.
    pub fn decode_failures(&self) -> u64 {
        self.decode_failures.load(Ordering::Relaxed)
    }
}

/// One receiver socket's loop: read, decode, deliver; discard malformed
/// datagrams and keep going. Exits when the running flag clears, the
/// consumer goes away, or the socket fails unrecoverably.
async fn receive_loop(
    receiver: ReceiverSocket,
    running: Arc<AtomicBool>,
    decode_failures: Arc<AtomicU64>,
    event_tx: mpsc::UnboundedSender<DiscoveryEvent>,
) {
    let mut buf = [0u8; MAX_ANNOUNCEMENT_LEN];

    while running.load(Ordering::SeqCst) {
        let received =
            match tokio::time::timeout(RECV_POLL, receiver.socket.recv_from(&mut buf)).await {
                Err(_) => continue,
                Ok(received) => received,
            };

        match received {
            Ok((n, from)) => match lancast_wire::decode(&buf[..n]) {
                Ok(addr) => {
                    trace!(addr = %addr, from = %from, "announcement received");
                    if event_tx.send(DiscoveryEvent::Peer { addr, from }).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    decode_failures.fetch_add(1, Ordering::Relaxed);
                    trace!(from = %from, error = %e, "discarding malformed announcement");
                }
            },
            Err(e) => {
                warn!(descriptor = %receiver.descriptor, error = %e, "receive loop terminated");
                let _ = event_tx.send(DiscoveryEvent::ListenerClosed {
                    descriptor: receiver.descriptor.clone(),
                    error: e.to_string(),
                });
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lancast_cache::PeerCache;
    use std::net::Ipv4Addr;

    fn loopback_descriptor() -> GroupDescriptor {
        GroupDescriptor {
            group: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            interface: 0,
            hops: 1,
        }
    }

    /// Receiver bound to an ephemeral loopback port with its loop running,
    /// plus a plain socket to feed it datagrams through.
    async fn spawn_loopback_loop(
        announcer: &Announcer,
    ) -> (
        u16,
        tokio::net::UdpSocket,
        mpsc::UnboundedReceiver<DiscoveryEvent>,
    ) {
        let receiver = create_receiver_socket(&loopback_descriptor(), 0).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(receive_loop(
            receiver,
            announcer.running.clone(),
            announcer.decode_failures.clone(),
            tx,
        ));

        let feed = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        feed.connect(("127.0.0.1", port)).await.unwrap();
        (port, feed, rx)
    }

    #[tokio::test]
    async fn test_setup_runs_once() {
        let (mut announcer, _rx) = Announcer::new(vec![loopback_descriptor()], 0);
        announcer.setup().unwrap();
        assert!(matches!(
            announcer.setup(),
            Err(AnnounceError::AlreadyStarted)
        ));
    }

    #[tokio::test]
    async fn test_setup_reports_partial_failure() {
        // Second descriptor has mismatched families and must not stop the
        // first from coming up.
        let bad = GroupDescriptor {
            group: IpAddr::V4(Ipv4Addr::LOCALHOST),
            bind: "::1".parse().unwrap(),
            interface: 0,
            hops: 1,
        };
        let (mut announcer, _rx) = Announcer::new(vec![loopback_descriptor(), bad.clone()], 0);

        let report = announcer.setup().unwrap();
        assert_eq!(report.senders, 1);
        assert_eq!(report.receivers, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].0, bad);
        assert!(!report.is_total_failure());
    }

    #[tokio::test]
    async fn test_malformed_datagrams_are_counted_not_fatal() {
        let (announcer, _rx) = Announcer::new(Vec::new(), 0);
        let (_port, feed, mut rx) = spawn_loopback_loop(&announcer).await;

        feed.send(&[9, 9, 9]).await.unwrap(); // unknown tag
        feed.send(&[4, 1, 2]).await.unwrap(); // short v4 payload
        feed.send(&lancast_wire::encode("10.0.0.5".parse().unwrap()))
            .await
            .unwrap();

        // Only the valid announcement comes through.
        match rx.recv().await.unwrap() {
            DiscoveryEvent::Peer { addr, .. } => {
                assert_eq!(addr, "10.0.0.5".parse::<IpAddr>().unwrap())
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(announcer.decode_failures(), 2);
        announcer.stop();
    }

    #[tokio::test]
    async fn test_parallel_loops_deliver_in_per_socket_order() {
        let (announcer, _rx) = Announcer::new(Vec::new(), 0);

        let (_p1, feed1, mut rx1) = spawn_loopback_loop(&announcer).await;
        let (_p2, feed2, mut rx2) = spawn_loopback_loop(&announcer).await;

        let a: IpAddr = "10.0.0.1".parse().unwrap();
        let b: IpAddr = "10.0.0.2".parse().unwrap();
        let c: IpAddr = "fe80::3".parse().unwrap();

        feed1.send(&lancast_wire::encode(a)).await.unwrap();
        feed1.send(&[0xff; 8]).await.unwrap();
        feed1.send(&lancast_wire::encode(b)).await.unwrap();
        feed2.send(&lancast_wire::encode(c)).await.unwrap();

        let got = |ev: DiscoveryEvent| match ev {
            DiscoveryEvent::Peer { addr, .. } => addr,
            other => panic!("unexpected event: {:?}", other),
        };

        assert_eq!(got(rx1.recv().await.unwrap()), a);
        assert_eq!(got(rx1.recv().await.unwrap()), b);
        assert_eq!(got(rx2.recv().await.unwrap()), c);
        announcer.stop();
    }

    #[tokio::test]
    async fn test_end_to_end_announce_to_snapshot() {
        // Node B listens on loopback.
        let receiver = create_receiver_socket(&loopback_descriptor(), 0).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let (mut node_b, mut events) = Announcer::new(Vec::new(), 0);
        node_b.receivers.push(receiver);
        node_b.listen().unwrap();

        // Node A announces its address into B's group.
        let (mut node_a, _rx) = Announcer::new(vec![loopback_descriptor()], port);
        let report = node_a.setup().unwrap();
        assert_eq!(report.senders, 1);

        let local: IpAddr = "10.0.0.5".parse().unwrap();
        node_a
            .broadcast_local_addresses(&[ScopedAddr::new(local)])
            .await;

        // B's consumer records the discovery into its peer table.
        let mut peers = PeerCache::default();
        match events.recv().await.unwrap() {
            DiscoveryEvent::Peer { addr, .. } => {
                peers.record(addr);
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(peers.snapshot(), vec![local]);

        node_a.stop();
        node_b.stop();
    }

    #[tokio::test]
    async fn test_scope_filter_applies_to_sends() {
        // One v4 loopback sender; a scoped v6 message must not reach it.
        let receiver = create_receiver_socket(&loopback_descriptor(), 0).unwrap();
        let port = receiver.local_addr().unwrap().port();

        let (mut announcer, _rx) = Announcer::new(vec![loopback_descriptor()], port);
        announcer.setup().unwrap();

        let scoped: ScopedAddr = ScopedAddr::with_scope("fe80::1".parse().unwrap(), 2);
        let plain: ScopedAddr = ScopedAddr::new("10.0.0.5".parse().unwrap());
        announcer.broadcast_local_addresses(&[scoped, plain]).await;

        // Only the unscoped v4 announcement arrives.
        let mut buf = [0u8; MAX_ANNOUNCEMENT_LEN];
        let (n, _) = receiver.socket.recv_from(&mut buf).await.unwrap();
        assert_eq!(lancast_wire::decode(&buf[..n]).unwrap(), plain.ip);

        let no_more =
            tokio::time::timeout(Duration::from_millis(100), receiver.socket.recv_from(&mut buf))
                .await;
        assert!(no_more.is_err());
        announcer.stop();
    }

    #[tokio::test]
    async fn test_listen_runs_once() {
        let (mut announcer, _rx) = Announcer::new(Vec::new(), 0);
        announcer.listen().unwrap();
        assert!(matches!(
            announcer.listen(),
            Err(AnnounceError::AlreadyStarted)
        ));
    }
}
