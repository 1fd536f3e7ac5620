//! # lab-fabric - Pod allocation for a shared network test lab
//!
//! This library allocates a physical lab to multiple pods, each an
//! independent copy of a topology template. Pods share one pool of physical
//! devices and one patch fabric of matrix switches; the allocator decides
//! which device plays which role, which matrix port carries which link, and
//! which VLAN tags it, without two pods ever colliding.
//!
//! ## Architecture
//!
//! - `settings`: Fabric-wide constants (VLAN start, pod id step, group names)
//! - `inventory`: Typed device/interface records and the group hierarchy
//! - `topology`: Topology templates, roles and connections
//! - `loader`: Inventory and template loading from YAML
//! - `fabric`: The allocation engine (port pools, VLAN pools, pods, cleanup)
//! - `report`: Deployment report for the config renderer
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use lab_fabric::{fabric::Deployment, loader, settings::Settings};
//! use std::path::Path;
//!
//! let inventory = loader::load_inventory(Path::new("inventory/hosts.yml"))?;
//! let requests = loader::load_requests(Path::new("topologies"), &[("basic".to_string(), 2)])?;
//! let deployment = Deployment::new(inventory, &requests, Settings::default())?;
//!
//! for pod in deployment.pods() {
//!     println!("pod #{} uses {:?}", pod.id(), pod.devices());
//! }
//! # Ok::<(), color_eyre::Report>(())
//! ```
//!
//! ## Error Handling
//!
//! The engine returns `fabric::AllocationError`; any error aborts the whole
//! run. Loading and reporting return `color_eyre::Result` with file context.

pub mod settings;
pub mod inventory;
pub mod topology;
pub mod loader;
pub mod fabric;
pub mod report;
