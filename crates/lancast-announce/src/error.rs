//! Error types for the announcement transport.

use std::io;

use thiserror::Error;

use crate::config::GroupDescriptor;

/// Errors raised while setting up or running the announcement transport.
///
/// Setup errors carry the descriptor they belong to so a failing interface
/// or missing privilege can be diagnosed from the error alone. A failure on
/// one descriptor never prevents the remaining descriptors from being
/// attempted; see [`SetupReport`](crate::SetupReport).
#[derive(Debug, Error)]
pub enum AnnounceError {
    /// The OS rejected socket creation, an option, bind, or connect.
    #[error("socket setup failed for {descriptor}: {source}")]
    SocketSetup {
        descriptor: GroupDescriptor,
        #[source]
        source: io::Error,
    },

    /// Multicast group membership could not be established.
    #[error("could not join multicast group for {descriptor}: {source}")]
    GroupJoin {
        descriptor: GroupDescriptor,
        #[source]
        source: io::Error,
    },

    /// The descriptor's group and bind addresses are of different families.
    #[error("group and bind address families differ for {descriptor}")]
    FamilyMismatch { descriptor: GroupDescriptor },

    /// Setup or listen was invoked more than once.
    #[error("announcer already started")]
    AlreadyStarted,
}

impl AnnounceError {
    /// The descriptor this error belongs to, if it is descriptor-scoped.
    pub fn descriptor(&self) -> Option<&GroupDescriptor> {
        match self {
            AnnounceError::SocketSetup { descriptor, .. }
            | AnnounceError::GroupJoin { descriptor, .. }
            | AnnounceError::FamilyMismatch { descriptor } => Some(descriptor),
            AnnounceError::AlreadyStarted => None,
        }
    }
}
