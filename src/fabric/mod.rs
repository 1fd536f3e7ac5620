//! Allocation and wiring engine.
//!
//! This module turns an inventory snapshot and a list of topology requests
//! into pods: physical devices bound to roles, matrix ports programmed with
//! tunnel VLANs, and VM portgroups for the virtualization side.

pub mod cleanup;
pub mod deployment;
pub mod error;
pub mod interface_id;
pub mod pod;
pub mod port_pool;
pub mod vlan;
pub mod vm;

// Re-export commonly used types
pub use cleanup::shutdown_unused_tunnels;
pub use deployment::{AllocatorState, Deployment};
pub use error::AllocationError;
pub use interface_id::InterfaceId;
pub use pod::Pod;
pub use port_pool::{ManagementPorts, PortPool};
pub use vlan::{roundup, InternetVlans, VlanCounter};
pub use vm::{Portgroup, Vm};
