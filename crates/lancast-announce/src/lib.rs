//! Multicast announcement transport for lancast peer discovery.
//!
//! Nodes announce their own addresses to well-known multicast (or
//! broadcast) groups and listen for announcements from others on the same
//! link. This crate owns the per-group socket pairs: a connected sender
//! with multicast hops/loopback configured, and a bound, group-joined
//! receiver with its own receive loop. Decoded peer addresses are handed to
//! the application through a channel of [`DiscoveryEvent`]s.

mod announce;
mod config;
mod error;
mod socket;

pub use announce::{Announcer, DiscoveryEvent, SetupReport};
pub use config::{
    GroupDescriptor, ScopedAddr, DEFAULT_HOPS, DEFAULT_IPV4_GROUP, DEFAULT_IPV6_GROUP,
    DEFAULT_PORT,
};
pub use error::AnnounceError;
pub use socket::{create_receiver_socket, create_sender_socket, ReceiverSocket, SenderSocket};
