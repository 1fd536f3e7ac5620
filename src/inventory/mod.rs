//! Lab inventory module.
//!
//! Typed device, interface and group records, plus the description
//! annotation applied to infrastructure switches before allocation.

pub mod annotate;
pub mod types;

pub use annotate::annotate_infra_descriptions;
pub use types::{
    ConnectedDevice, Device, Group, Interface, InterfaceMode, InterfaceState, Inventory, RenderData,
};
