//! The discovery service: wires the announcer to the peer table and runs
//! the periodic announce and report loops until shutdown.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use lancast_announce::{Announcer, DiscoveryEvent};
use lancast_cache::PeerCache;

use crate::cli::Cli;
use crate::ifaces;

type PeerTable = Arc<Mutex<PeerCache<IpAddr>>>;

/// Run the discovery service until interrupted.
pub async fn run(cli: Cli) -> Result<()> {
    let descriptors = ifaces::resolve_descriptors(!cli.ipv6_only, !cli.ipv4_only, cli.hops);
    ensure!(!descriptors.is_empty(), "no announcement groups resolved");

    let (mut announcer, events) = Announcer::new(descriptors, cli.port);

    let report = announcer
        .setup()
        .context("announcement socket setup failed")?;
    for (descriptor, error) in &report.failures {
        warn!(descriptor = %descriptor, error = %error, "skipping announcement group");
    }
    ensure!(
        !report.is_total_failure(),
        "no announcement socket could be set up"
    );
    info!(
        senders = report.senders,
        receivers = report.receivers,
        port = cli.port,
        "discovery started"
    );

    announcer.listen().context("listen failed")?;
    let announcer = Arc::new(announcer);

    // One bounded table is the single source of truth for observed peers;
    // the lock is held only for the duration of each record or snapshot.
    let peers: PeerTable = Arc::new(Mutex::new(PeerCache::new(cli.capacity)));

    tokio::spawn(record_peers(events, peers.clone()));
    tokio::spawn(announce_loop(
        announcer.clone(),
        cli.announce_min,
        cli.announce_max,
    ));
    tokio::spawn(report_loop(peers, Duration::from_secs(cli.report_interval)));

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for shutdown signal")?;
    info!(
        decode_failures = announcer.decode_failures(),
        "shutting down"
    );
    announcer.stop();

    Ok(())
}

/// Consumer for the discovery channel: every announced address is recorded
/// into the shared peer table.
async fn record_peers(mut events: mpsc::UnboundedReceiver<DiscoveryEvent>, peers: PeerTable) {
    while let Some(event) = events.recv().await {
        match event {
            DiscoveryEvent::Peer { addr, from } => {
                debug!(peer = %addr, from = %from, "peer discovered");
                if let Some(evicted) = peers.lock().record(addr) {
                    debug!(peer = %evicted, "peer aged out");
                }
            }
            DiscoveryEvent::ListenerClosed { descriptor, error } => {
                warn!(descriptor = %descriptor, error = %error, "receive loop closed");
            }
        }
    }
}

/// Announce our addresses on a randomized interval so nodes on the same
/// link do not fire in lockstep.
async fn announce_loop(announcer: Arc<Announcer>, min_secs: u64, max_secs: u64) {
    while announcer.is_running() {
        let addrs = ifaces::local_scoped_addrs();
        announcer.broadcast_local_addresses(&addrs).await;

        let secs = if max_secs > min_secs {
            rand::rng().random_range(min_secs..max_secs)
        } else {
            min_secs
        };
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }
}

/// Print the current peer table on a fixed interval.
async fn report_loop(peers: PeerTable, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    ticker.tick().await; // first tick fires immediately

    loop {
        ticker.tick().await;
        let snapshot = peers.lock().snapshot();

        println!("addresses");
        for peer in snapshot {
            println!("{peer}");
        }
    }
}
