//! Matrix and management port pools.
//!
//! The matrix pool maps every remote device port that is cabled into a
//! matrix switch to the switch interface backing it. Entries are handed out
//! exactly once, either by exact port name or oldest-first. Insertion order
//! follows the walk over matrix switches and their interfaces, and that order
//! decides which port an implicit connection end receives.

use indexmap::IndexMap;
use log::debug;
use std::collections::BTreeSet;

use super::error::AllocationError;
use super::interface_id::InterfaceId;
use crate::inventory::Inventory;

/// Free matrix ports, grouped by the remote device they are cabled to
#[derive(Debug, Default, Clone)]
pub struct PortPool {
    free: IndexMap<String, IndexMap<String, InterfaceId>>,
    consumed: BTreeSet<(String, String)>,
}

impl PortPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `remote_device remote_port` is patched through `identity`
    pub fn register(
        &mut self,
        remote_device: &str,
        remote_port: &str,
        identity: InterfaceId,
    ) -> Result<(), AllocationError> {
        let ports = self.free.entry(remote_device.to_string()).or_default();
        match ports.get(remote_port) {
            Some(existing) if *existing == identity => Ok(()),
            Some(existing) => Err(AllocationError::DuplicateMapping {
                remote_device: remote_device.to_string(),
                remote_port: remote_port.to_string(),
                existing: existing.clone(),
                attempted: identity,
            }),
            None => {
                ports.insert(remote_port.to_string(), identity);
                Ok(())
            }
        }
    }

    /// Take the matrix interface backing one exact remote port
    pub fn take_named(
        &mut self,
        remote_device: &str,
        remote_port: &str,
    ) -> Result<InterfaceId, AllocationError> {
        let taken = self
            .free
            .get_mut(remote_device)
            .and_then(|ports| ports.shift_remove(remote_port));

        match taken {
            Some(identity) => {
                self.consumed
                    .insert((remote_device.to_string(), remote_port.to_string()));
                Ok(identity)
            }
            None if self
                .consumed
                .contains(&(remote_device.to_string(), remote_port.to_string())) =>
            {
                Err(AllocationError::PortInUse {
                    device: remote_device.to_string(),
                    port: remote_port.to_string(),
                })
            }
            None => Err(AllocationError::PortNotFound {
                device: remote_device.to_string(),
                port: remote_port.to_string(),
            }),
        }
    }

    /// Take the oldest free port of a remote device, returning the remote
    /// port name together with the matrix interface
    pub fn take_any(
        &mut self,
        remote_device: &str,
    ) -> Result<(String, InterfaceId), AllocationError> {
        let (port, identity) = self
            .free
            .get_mut(remote_device)
            .and_then(|ports| ports.shift_remove_index(0))
            .ok_or_else(|| AllocationError::PoolExhausted {
                resource: "matrix free connections".to_string(),
                owner: remote_device.to_string(),
            })?;
        self.consumed
            .insert((remote_device.to_string(), port.clone()));
        Ok((port, identity))
    }

    /// Number of free ports left for a remote device
    pub fn available(&self, remote_device: &str) -> usize {
        self.free.get(remote_device).map_or(0, IndexMap::len)
    }

    /// Remote port names still free for a device, oldest first
    pub fn free_ports(&self, remote_device: &str) -> Vec<&str> {
        self.free
            .get(remote_device)
            .map(|ports| ports.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn total_available(&self) -> usize {
        self.free.values().map(IndexMap::len).sum()
    }

    /// Build the pool from every matrix switch in the inventory.
    ///
    /// A tunnel port without a cabled remote end is a configuration error,
    /// as is any remote port claimed by two matrix interfaces.
    pub fn from_matrix_switches(
        inventory: &Inventory,
        group: &str,
    ) -> Result<Self, AllocationError> {
        let mut pool = PortPool::new();

        for switch_name in inventory.group_members(group) {
            let Some(switch) = inventory.device(&switch_name) else {
                continue;
            };
            for (index, interface) in switch.interfaces.iter().enumerate() {
                match &interface.connected_device {
                    Some(connected) => {
                        let port = connected.port.as_deref().ok_or_else(|| {
                            AllocationError::config(format!(
                                "Interface {} on the switch {} is connected to {} but does not name a port",
                                interface.name, switch.name, connected.name
                            ))
                        })?;
                        pool.register(
                            &connected.name,
                            port,
                            InterfaceId::new(&switch.name, index, &interface.name),
                        )?;
                    }
                    None if interface.is_tunnel() => {
                        return Err(AllocationError::config(format!(
                            "Interface {} on the switch {} is 'dot1q-tunnel' but does not have connected_device variable",
                            interface.name, switch.name
                        )));
                    }
                    None => {}
                }
            }
        }

        debug!(
            "Matrix port pool built with {} ports for {} devices",
            pool.total_available(),
            pool.free.len()
        );
        Ok(pool)
    }
}

/// The single management-switch port of every pod device
#[derive(Debug, Default, Clone)]
pub struct ManagementPorts {
    ports: IndexMap<String, InterfaceId>,
}

impl ManagementPorts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, device: &str, identity: InterfaceId) -> Result<(), AllocationError> {
        match self.ports.get(device) {
            Some(existing) if *existing == identity => Ok(()),
            Some(existing) => Err(AllocationError::DuplicateMapping {
                remote_device: device.to_string(),
                remote_port: "management".to_string(),
                existing: existing.clone(),
                attempted: identity,
            }),
            None => {
                self.ports.insert(device.to_string(), identity);
                Ok(())
            }
        }
    }

    pub fn get(&self, device: &str) -> Option<&InterfaceId> {
        self.ports.get(device)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    /// Build the table from every pod-mgmt switch, skipping their uplinks
    pub fn from_pod_mgmt_switches(
        inventory: &Inventory,
        group: &str,
    ) -> Result<Self, AllocationError> {
        let mut table = ManagementPorts::new();

        for switch_name in inventory.group_members(group) {
            let Some(switch) = inventory.device(&switch_name) else {
                continue;
            };
            for (index, interface) in switch.interfaces.iter().enumerate() {
                if interface.management {
                    continue;
                }
                if let Some(connected) = &interface.connected_device {
                    table.register(
                        &connected.name,
                        InterfaceId::new(&switch.name, index, &interface.name),
                    )?;
                }
            }
        }

        debug!("Management port table built with {} entries", table.len());
        Ok(table)
    }
}
