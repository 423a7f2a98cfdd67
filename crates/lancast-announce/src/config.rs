//! Group descriptors and announcement addressing.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Default announcement port.
pub const DEFAULT_PORT: u16 = 7380;

/// Default IPv4 multicast group.
pub const DEFAULT_IPV4_GROUP: Ipv4Addr = Ipv4Addr::new(239, 71, 79, 83);

/// Default IPv6 multicast group (link-local scope, joined per interface).
pub const DEFAULT_IPV6_GROUP: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0xe74f, 0x5353);

/// Default multicast hop count / TTL.
///
/// The value is always explicit on the descriptor: 0 would confine packets
/// to the local host, so link-scope discovery needs at least 1.
pub const DEFAULT_HOPS: u32 = 1;

/// One announcement group: the address to announce to, the local address to
/// receive on, and the interface carrying link-scoped traffic.
///
/// Each descriptor drives exactly one sender socket and one receiver
/// socket. Descriptors are resolved once at startup and are fixed for the
/// process lifetime. A non-multicast `group` address denotes plain UDP
/// broadcast instead of multicast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDescriptor {
    /// Group (or broadcast) address announcements are sent to.
    pub group: IpAddr,
    /// Local address the receiver socket binds to.
    pub bind: IpAddr,
    /// OS interface index for IPv6 scope and group joins; 0 = unspecified.
    pub interface: u32,
    /// Multicast hop count / TTL for outgoing announcements.
    pub hops: u32,
}

impl GroupDescriptor {
    /// Descriptor for an IPv4 group, bound to the wildcard address.
    pub fn ipv4(group: Ipv4Addr) -> Self {
        Self {
            group: IpAddr::V4(group),
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            interface: 0,
            hops: DEFAULT_HOPS,
        }
    }

    /// Descriptor for an IPv6 group on a specific interface.
    pub fn ipv6(group: Ipv6Addr, interface: u32) -> Self {
        Self {
            group: IpAddr::V6(group),
            bind: IpAddr::V6(Ipv6Addr::UNSPECIFIED),
            interface,
            hops: DEFAULT_HOPS,
        }
    }

    /// Override the receiver bind address.
    pub fn with_bind(mut self, bind: IpAddr) -> Self {
        self.bind = bind;
        self
    }

    /// Override the multicast hop count.
    pub fn with_hops(mut self, hops: u32) -> Self {
        self.hops = hops;
        self
    }

    /// Whether this descriptor denotes a multicast group rather than plain
    /// broadcast.
    pub fn is_multicast(&self) -> bool {
        self.group.is_multicast()
    }

    /// Whether a sender built from this descriptor may carry `msg`.
    ///
    /// Families must match, and a message built from a link-scoped address
    /// may only leave on the IPv6 sender bound to the same interface. An
    /// IPv4 sender never carries a scoped message. This keeps link-local
    /// addresses from leaking across interfaces.
    pub fn permits(&self, msg: &ScopedAddr) -> bool {
        if self.group.is_ipv4() != msg.ip.is_ipv4() {
            return false;
        }
        match msg.scope {
            Some(scope) => self.group.is_ipv6() && self.interface == scope,
            None => true,
        }
    }
}

impl fmt::Display for GroupDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "group {} bind {} interface {}",
            self.group, self.bind, self.interface
        )
    }
}

/// A local address to announce, together with the zone it belongs to.
///
/// The scope is the OS interface index a link-local IPv6 address lives on;
/// global and IPv4 addresses carry no scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScopedAddr {
    pub ip: IpAddr,
    pub scope: Option<u32>,
}

impl ScopedAddr {
    /// An address with no zone.
    pub fn new(ip: IpAddr) -> Self {
        Self { ip, scope: None }
    }

    /// An address scoped to the given interface index.
    pub fn with_scope(ip: IpAddr, scope: u32) -> Self {
        Self {
            ip,
            scope: Some(scope),
        }
    }
}

impl fmt::Display for ScopedAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scope {
            Some(scope) => write!(f, "{}%{}", self.ip, scope),
            None => write!(f, "{}", self.ip),
        }
    }
}
