//! Socket construction for announcement groups.
//!
//! Sockets are built with `socket2` so multicast and reuse options can be
//! set before bind/connect, then handed to tokio for nonblocking IO. Each
//! [`GroupDescriptor`](crate::GroupDescriptor) yields one connected sender
//! and one bound, group-joined receiver.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use tokio::net::UdpSocket;

use crate::config::GroupDescriptor;
use crate::error::AnnounceError;

/// A socket announcements are sent from, connected to its group address.
#[derive(Debug)]
pub struct SenderSocket {
    pub(crate) socket: UdpSocket,
    pub(crate) descriptor: GroupDescriptor,
}

impl SenderSocket {
    /// The descriptor this sender was built from.
    pub fn descriptor(&self) -> &GroupDescriptor {
        &self.descriptor
    }
}

/// A socket announcements are received on, bound and joined to its group.
#[derive(Debug)]
pub struct ReceiverSocket {
    pub(crate) socket: UdpSocket,
    pub(crate) descriptor: GroupDescriptor,
}

impl ReceiverSocket {
    /// The descriptor this receiver was built from.
    pub fn descriptor(&self) -> &GroupDescriptor {
        &self.descriptor
    }

    /// The local address the receiver is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

fn new_socket(descriptor: &GroupDescriptor) -> Result<Socket, AnnounceError> {
    if descriptor.group.is_ipv4() != descriptor.bind.is_ipv4() {
        return Err(AnnounceError::FamilyMismatch {
            descriptor: descriptor.clone(),
        });
    }

    let domain = match descriptor.group {
        IpAddr::V4(_) => Domain::IPV4,
        IpAddr::V6(_) => Domain::IPV6,
    };

    Socket::new(domain, Type::DGRAM, Some(Protocol::UDP)).map_err(|source| {
        AnnounceError::SocketSetup {
            descriptor: descriptor.clone(),
            source,
        }
    })
}

/// Allow several discovery processes on one host to share the announcement
/// port. `SO_REUSEPORT` where the platform has it, `SO_REUSEADDR` otherwise.
#[cfg(all(unix, not(any(target_os = "solaris", target_os = "illumos"))))]
fn enable_port_sharing(socket: &Socket) -> io::Result<()> {
    socket.set_reuse_port(true)
}

#[cfg(not(all(unix, not(any(target_os = "solaris", target_os = "illumos")))))]
fn enable_port_sharing(socket: &Socket) -> io::Result<()> {
    socket.set_reuse_address(true)
}

fn group_sockaddr(descriptor: &GroupDescriptor, port: u16) -> SockAddr {
    match descriptor.group {
        IpAddr::V4(v4) => SockAddr::from(SocketAddrV4::new(v4, port)),
        // Link-scoped groups need the interface index as the scope id.
        IpAddr::V6(v6) => SockAddr::from(SocketAddrV6::new(v6, port, 0, descriptor.interface)),
    }
}

fn bind_sockaddr(descriptor: &GroupDescriptor, port: u16) -> SockAddr {
    match descriptor.bind {
        IpAddr::V4(v4) => SockAddr::from(SocketAddrV4::new(v4, port)),
        IpAddr::V6(v6) => SockAddr::from(SocketAddrV6::new(v6, port, 0, 0)),
    }
}

fn into_tokio(socket: Socket) -> io::Result<UdpSocket> {
    socket.set_nonblocking(true)?;
    UdpSocket::from_std(socket.into())
}

/// Build the sender socket for a descriptor, connected to `group:port`.
///
/// Multicast senders get loopback enabled (so co-hosted nodes hear each
/// other) and the descriptor's hop count; IPv6 senders are pinned to the
/// descriptor's interface. Non-multicast senders get `SO_BROADCAST`.
pub fn create_sender_socket(
    descriptor: &GroupDescriptor,
    port: u16,
) -> Result<SenderSocket, AnnounceError> {
    let socket = new_socket(descriptor)?;

    let setup = |source| AnnounceError::SocketSetup {
        descriptor: descriptor.clone(),
        source,
    };

    if descriptor.is_multicast() {
        match descriptor.group {
            IpAddr::V4(_) => {
                socket.set_multicast_loop_v4(true).map_err(setup)?;
                socket.set_multicast_ttl_v4(descriptor.hops).map_err(setup)?;
            }
            IpAddr::V6(_) => {
                socket.set_multicast_loop_v6(true).map_err(setup)?;
                socket
                    .set_multicast_hops_v6(descriptor.hops)
                    .map_err(setup)?;
                socket
                    .set_multicast_if_v6(descriptor.interface)
                    .map_err(setup)?;
            }
        }
    } else {
        socket.set_broadcast(true).map_err(setup)?;
    }

    socket
        .connect(&group_sockaddr(descriptor, port))
        .map_err(setup)?;

    Ok(SenderSocket {
        socket: into_tokio(socket).map_err(setup)?,
        descriptor: descriptor.clone(),
    })
}

/// Build the receiver socket for a descriptor, bound to `bind:port` and
/// joined to the multicast group when the descriptor names one.
pub fn create_receiver_socket(
    descriptor: &GroupDescriptor,
    port: u16,
) -> Result<ReceiverSocket, AnnounceError> {
    let socket = new_socket(descriptor)?;

    let setup = |source| AnnounceError::SocketSetup {
        descriptor: descriptor.clone(),
        source,
    };

    if descriptor.is_multicast() {
        enable_port_sharing(&socket).map_err(setup)?;
    }

    socket
        .bind(&bind_sockaddr(descriptor, port))
        .map_err(setup)?;

    if descriptor.is_multicast() {
        let join = |source| AnnounceError::GroupJoin {
            descriptor: descriptor.clone(),
            source,
        };

        match (descriptor.group, descriptor.bind) {
            (IpAddr::V4(group), IpAddr::V4(bind)) => {
                // Membership is tied to the bind address; the wildcard lets
                // the OS pick the interface.
                let iface = if bind.is_unspecified() {
                    Ipv4Addr::UNSPECIFIED
                } else {
                    bind
                };
                socket.join_multicast_v4(&group, &iface).map_err(join)?;
            }
            (IpAddr::V6(group), _) => {
                socket
                    .join_multicast_v6(&group, descriptor.interface)
                    .map_err(join)?;
            }
            // Families were validated in new_socket.
            (IpAddr::V4(_), IpAddr::V6(_)) => unreachable!(),
        }
    }

    Ok(ReceiverSocket {
        socket: into_tokio(socket).map_err(setup)?,
        descriptor: descriptor.clone(),
    })
}
