//! Topology templates.
//!
//! This module contains the pod blueprints: device roles, VMs and the
//! connections that the allocator wires through the matrix fabric.

pub mod types;

pub use types::{
    port_number_slug, Connection, ConnectionEnd, RoleSpec, Service, Template, TopologyRequest,
    VmSpec,
};
