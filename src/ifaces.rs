//! Startup-time resolution of local interfaces into announcement groups
//! and announceable addresses.
//!
//! Resolution happens explicitly when the service starts (and again on each
//! announce tick for local addresses), never at load time, so the process
//! sees the interfaces that actually exist when it runs.

use std::net::{IpAddr, Ipv6Addr};

use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};
use tracing::warn;

use lancast_announce::{GroupDescriptor, ScopedAddr, DEFAULT_IPV4_GROUP, DEFAULT_IPV6_GROUP};

/// Resolve the announcement groups for this host: one IPv4 descriptor plus
/// one IPv6 link-local descriptor per non-loopback IPv6-capable interface.
pub fn resolve_descriptors(ipv4: bool, ipv6: bool, hops: u32) -> Vec<GroupDescriptor> {
    let mut descriptors = Vec::new();

    if ipv4 {
        descriptors.push(GroupDescriptor::ipv4(DEFAULT_IPV4_GROUP).with_hops(hops));
    }

    if ipv6 {
        for index in ipv6_interface_indices() {
            descriptors.push(GroupDescriptor::ipv6(DEFAULT_IPV6_GROUP, index).with_hops(hops));
        }
    }

    descriptors
}

/// The node's current non-loopback addresses, with link-local IPv6
/// addresses scoped to their interface.
pub fn local_scoped_addrs() -> Vec<ScopedAddr> {
    let mut addrs = Vec::new();

    for iface in interfaces() {
        for addr in &iface.addr {
            match addr {
                Addr::V4(v4) if !v4.ip.is_loopback() => {
                    addrs.push(ScopedAddr::new(IpAddr::V4(v4.ip)));
                }
                Addr::V6(v6) if !v6.ip.is_loopback() => {
                    if is_link_local(&v6.ip) {
                        addrs.push(ScopedAddr::with_scope(IpAddr::V6(v6.ip), iface.index));
                    } else {
                        addrs.push(ScopedAddr::new(IpAddr::V6(v6.ip)));
                    }
                }
                _ => {}
            }
        }
    }

    addrs
}

/// Indices of interfaces carrying at least one non-loopback IPv6 address.
fn ipv6_interface_indices() -> Vec<u32> {
    let mut indices = Vec::new();

    for iface in interfaces() {
        let has_v6 = iface
            .addr
            .iter()
            .any(|a| matches!(a, Addr::V6(v6) if !v6.ip.is_loopback()));

        if has_v6 && !indices.contains(&iface.index) {
            indices.push(iface.index);
        }
    }

    indices
}

fn interfaces() -> Vec<NetworkInterface> {
    match NetworkInterface::show() {
        Ok(ifaces) => ifaces,
        Err(e) => {
            warn!(error = %e, "failed to enumerate network interfaces");
            Vec::new()
        }
    }
}

// fe80::/10
fn is_link_local(ip: &Ipv6Addr) -> bool {
    (ip.segments()[0] & 0xffc0) == 0xfe80
}
