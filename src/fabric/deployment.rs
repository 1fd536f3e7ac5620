//! Fabric allocator.
//!
//! Builds the shared pools from the inventory, instantiates every requested
//! pod in order, and closes whatever tunnel ports remain unused. Pods are
//! numbered per template slot: the Nth requested template owns ids
//! `N * pod_id_step + 1 ..`.

use indexmap::{IndexMap, IndexSet};
use log::{info, warn};

use super::cleanup::shutdown_unused_tunnels;
use super::error::AllocationError;
use super::pod::Pod;
use super::port_pool::{ManagementPorts, PortPool};
use super::vlan::{InternetVlans, VlanCounter};
use super::vm::Vm;
use crate::inventory::Inventory;
use crate::settings::Settings;
use crate::topology::TopologyRequest;

/// Resources shared by every pod of a run
#[derive(Debug, Clone)]
pub struct AllocatorState {
    /// Unallocated pod gear, in inventory order
    pub free_devices: IndexSet<String>,
    pub port_pool: PortPool,
    pub mgmt_ports: ManagementPorts,
    pub vlans: VlanCounter,
    pub internet_vlans: InternetVlans,
}

impl AllocatorState {
    /// Build every pool from the inventory snapshot
    pub fn from_inventory(
        inventory: &Inventory,
        settings: &Settings,
    ) -> Result<Self, AllocationError> {
        let groups = &settings.groups;

        let free_devices: IndexSet<String> = inventory
            .group_members(&groups.pod_gear)
            .into_iter()
            .filter(|name| inventory.device(name).is_some_and(|device| !device.is_allocated()))
            .collect();
        let port_pool = PortPool::from_matrix_switches(inventory, &groups.matrix_switches)?;
        let mgmt_ports = ManagementPorts::from_pod_mgmt_switches(inventory, &groups.pod_mgmt)?;
        let internet_vlans = InternetVlans::from_pair_routers(inventory, &groups.pair_routers)?;

        info!(
            "Fabric pools: {} free devices, {} matrix ports, {} management ports, {} internet VLANs",
            free_devices.len(),
            port_pool.total_available(),
            mgmt_ports.len(),
            internet_vlans.len()
        );

        Ok(Self {
            free_devices,
            port_pool,
            mgmt_ports,
            vlans: VlanCounter::with_reserved(settings.vlan_start, internet_vlans.reserved()),
            internet_vlans,
        })
    }
}

/// The result of one complete allocation run
#[derive(Debug, Clone)]
pub struct Deployment {
    settings: Settings,
    inventory: Inventory,
    state: AllocatorState,
    pods: IndexMap<u32, Pod>,
    closed_ports: usize,
}

impl Deployment {
    /// Run the allocation over an inventory snapshot.
    ///
    /// Templates are validated before anything is allocated. Any error
    /// aborts the whole run and the partially mutated snapshot is dropped.
    pub fn new(
        inventory: Inventory,
        requests: &[TopologyRequest],
        settings: Settings,
    ) -> Result<Self, AllocationError> {
        validate_requests(requests, &settings)?;

        let state = AllocatorState::from_inventory(&inventory, &settings)?;
        let mut deployment = Deployment {
            settings,
            inventory,
            state,
            pods: IndexMap::new(),
            closed_ports: 0,
        };

        deployment.allocate_pod_gear(requests)?;
        deployment.closed_ports = shutdown_unused_tunnels(
            &mut deployment.inventory,
            &deployment.settings.groups.matrix_switches,
        );

        let leftover = deployment.state.free_devices.len();
        if leftover > 0 {
            info!("{} pod devices left unallocated", leftover);
        }
        Ok(deployment)
    }

    fn allocate_pod_gear(&mut self, requests: &[TopologyRequest]) -> Result<(), AllocationError> {
        let step = self.settings.pod_id_step;
        let mut topology_pod_id_start = 0;

        for request in requests {
            topology_pod_id_start += step;
            for i in 0..request.quantity {
                let pod_id = topology_pod_id_start + i + 1;
                let pod = Pod::build(
                    pod_id,
                    i + 1,
                    &request.template,
                    &mut self.state,
                    &mut self.inventory,
                    &self.settings.fallback_group,
                )?;
                info!(
                    "Allocated pod #{}, topology: \"{}\"",
                    pod_id, request.template.name
                );
                self.pods.insert(pod_id, pod);
                self.state.vlans.round_to_decade();
            }
        }
        Ok(())
    }

    pub fn pods(&self) -> impl Iterator<Item = &Pod> {
        self.pods.values()
    }

    pub fn pod(&self, id: u32) -> Option<&Pod> {
        self.pods.get(&id)
    }

    pub fn vms(&self) -> impl Iterator<Item = &Vm> {
        self.pods.values().flat_map(Pod::vms)
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn into_inventory(self) -> Inventory {
        self.inventory
    }

    /// Pools as they stand after the run
    pub fn state(&self) -> &AllocatorState {
        &self.state
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Number of unused tunnel ports closed by the residual cleanup
    pub fn closed_ports(&self) -> usize {
        self.closed_ports
    }
}

fn validate_requests(
    requests: &[TopologyRequest],
    settings: &Settings,
) -> Result<(), AllocationError> {
    if requests.is_empty() {
        warn!("No topologies requested, only the residual cleanup will run");
    }

    let mut seen = IndexSet::new();
    for request in requests {
        let name = &request.template.name;
        if !seen.insert(name.as_str()) {
            return Err(AllocationError::config(format!(
                "topology \"{}\" was requested more than once",
                name
            )));
        }
        if request.quantity == 0 {
            return Err(AllocationError::config(format!(
                "topology \"{}\" was requested with quantity 0",
                name
            )));
        }
        // Sequence numbers must not spill into the next template's id range
        if request.quantity >= settings.pod_id_step {
            return Err(AllocationError::config(format!(
                "topology \"{}\" quantity {} does not fit pod_id_step {}",
                name, request.quantity, settings.pod_id_step
            )));
        }
        request.template.validate()?;
    }
    Ok(())
}
