//! CLI definitions for the lancast daemon.

use clap::Parser;

use lancast_announce::{DEFAULT_HOPS, DEFAULT_PORT};
use lancast_cache::DEFAULT_CAPACITY;

/// Local peer discovery over IP multicast
#[derive(Parser)]
#[command(name = "lancast")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// UDP port for announcements
    #[arg(long, short = 'p', default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Multicast hop count / TTL for outgoing announcements
    #[arg(long, default_value_t = DEFAULT_HOPS)]
    pub hops: u32,

    /// Maximum number of peers kept in the peer table
    #[arg(long, default_value_t = DEFAULT_CAPACITY)]
    pub capacity: usize,

    /// Seconds between peer table reports
    #[arg(long, default_value_t = 10)]
    pub report_interval: u64,

    /// Minimum seconds between announcements
    #[arg(long, default_value_t = 30)]
    pub announce_min: u64,

    /// Maximum seconds between announcements
    #[arg(long, default_value_t = 60)]
    pub announce_max: u64,

    /// Only announce and listen on IPv4 groups
    #[arg(long, conflicts_with = "ipv6_only")]
    pub ipv4_only: bool,

    /// Only announce and listen on IPv6 groups
    #[arg(long, conflicts_with = "ipv4_only")]
    pub ipv6_only: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, short = 'L', default_value = "info")]
    pub log_level: String,
}
