//! Allocation errors.
//!
//! Every variant aborts the whole run. Nothing is retried or partially
//! committed; the caller gets the originating error back unchanged.

use super::interface_id::InterfaceId;

/// Errors raised while building pools or allocating pods
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocationError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(
        "{remote_device} {remote_port} can't be mapped to {attempted} because it was already mapped to {existing}"
    )]
    DuplicateMapping {
        remote_device: String,
        remote_port: String,
        existing: InterfaceId,
        attempted: InterfaceId,
    },

    #[error(
        "Cannot allocate pod #{pod}, topology \"{template}\" because an unallocated device with tags {tags:?} (excluding {exclude_tags:?}) and the group \"{group}\" was not found"
    )]
    AllocationFailed {
        pod: u32,
        template: String,
        group: String,
        tags: Vec<String>,
        exclude_tags: Vec<String>,
    },

    #[error("Port {port:?} on the device {device:?} is not available for matrix connection")]
    PortNotFound { device: String, port: String },

    #[error("Port {port:?} on the device {device:?} was already consumed by another connection")]
    PortInUse { device: String, port: String },

    #[error("No more {resource} left for {owner:?}")]
    PoolExhausted { resource: String, owner: String },

    #[error("{interface} already has VLAN {vlan} assigned")]
    AlreadyAssigned { interface: InterfaceId, vlan: u16 },

    #[error("{interface} has mode {mode} instead of \"dot1q-tunnel\"")]
    ModeMismatch { interface: InterfaceId, mode: String },

    #[error("VM {vm:?} already has portgroup {portgroup:?} with VLAN {existing:?}, refusing VLAN {attempted:?}")]
    PortgroupConflict {
        vm: String,
        portgroup: String,
        existing: Option<u16>,
        attempted: Option<u16>,
    },
}

impl AllocationError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        AllocationError::Configuration(message.into())
    }
}
