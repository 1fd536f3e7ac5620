//! Pod construction.
//!
//! A pod binds every role of a template to a free physical device, then
//! wires each declared connection either through the matrix fabric (one VLAN
//! and one matrix port per device end) or onto a VM portgroup. All effects
//! land on the shared inventory records and the allocator state.

use indexmap::IndexMap;
use log::{debug, info};

use super::deployment::AllocatorState;
use super::error::AllocationError;
use super::interface_id::InterfaceId;
use super::vm::{Portgroup, Vm};
use crate::inventory::{Device, Interface, InterfaceState, Inventory};
use crate::topology::{port_number_slug, Connection, ConnectionEnd, RoleSpec, Template};

/// Look up the interface record an identity points at
pub(crate) fn interface_mut<'a>(
    inventory: &'a mut Inventory,
    identity: &InterfaceId,
) -> Result<&'a mut Interface, AllocationError> {
    inventory
        .device_mut(&identity.device)
        .and_then(|device| device.interfaces.get_mut(identity.index))
        .filter(|interface| interface.name == identity.name)
        .ok_or_else(|| AllocationError::config(format!("Interface {} does not exist", identity)))
}

/// One instantiated copy of a template
#[derive(Debug, Clone)]
pub struct Pod {
    id: u32,
    sequence_num: u32,
    template: String,
    hostname_to_device: IndexMap<String, String>,
    vms: IndexMap<String, Vm>,
}

impl Pod {
    /// Allocate and wire a pod.
    ///
    /// # Arguments
    /// * `id` - Unique pod id
    /// * `sequence_num` - Position of this pod among the pods of its template, starting at 1
    /// * `template` - Blueprint to instantiate
    /// * `state` - Free devices, ports and VLANs shared by every pod
    /// * `inventory` - Device records mutated in place
    /// * `fallback_group` - Group used by roles that do not declare one
    pub fn build(
        id: u32,
        sequence_num: u32,
        template: &Template,
        state: &mut AllocatorState,
        inventory: &mut Inventory,
        fallback_group: &str,
    ) -> Result<Self, AllocationError> {
        let mut pod = Pod {
            id,
            sequence_num,
            template: template.name.clone(),
            hostname_to_device: IndexMap::new(),
            vms: IndexMap::new(),
        };

        for vm in &template.vms {
            pod.vm_mut(&vm.name);
        }
        pod.allocate_gear(template, state, inventory, fallback_group)?;
        pod.process_connections(&template.connections, state, inventory)?;
        pod.flatten_template_data(inventory);

        Ok(pod)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn sequence_num(&self) -> u32 {
        self.sequence_num
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Lab hostname to physical device name, in template order
    pub fn devices(&self) -> &IndexMap<String, String> {
        &self.hostname_to_device
    }

    pub fn device_for(&self, hostname: &str) -> Option<&str> {
        self.hostname_to_device.get(hostname).map(String::as_str)
    }

    pub fn vms(&self) -> impl Iterator<Item = &Vm> {
        self.vms.values()
    }

    /// Look up a VM by the short name used in the template
    pub fn vm(&self, name: &str) -> Option<&Vm> {
        self.vms.get(name)
    }

    pub fn vm_name(&self, vm_name: &str) -> String {
        format!("{}__{}__{:02}", self.template, vm_name, self.sequence_num)
    }

    pub fn vm_portgroup_name(&self, vm_name: &str, portgroup_num: Option<u32>) -> String {
        let pod_vm_name = self.vm_name(vm_name);
        match portgroup_num {
            Some(num) => format!("{}__{:02}", pod_vm_name, num),
            None => pod_vm_name,
        }
    }

    fn vm_mut(&mut self, vm_name: &str) -> &mut Vm {
        let full_name = self.vm_name(vm_name);
        let pod_id = self.id;
        self.vms
            .entry(vm_name.to_string())
            .or_insert_with(|| Vm::new(full_name, pod_id))
    }

    fn device_name(&self, hostname: &str) -> Result<&str, AllocationError> {
        self.device_for(hostname).ok_or_else(|| {
            AllocationError::config(format!(
                "Device \"{}\" is not part of topology \"{}\"",
                hostname, self.template
            ))
        })
    }

    fn group_for(&self, spec: &RoleSpec, fallback_group: &str) -> String {
        match &spec.group {
            Some(group) => format!("{}__{:02}", group, self.sequence_num),
            None => fallback_group.to_string(),
        }
    }

    fn allocate_gear(
        &mut self,
        template: &Template,
        state: &mut AllocatorState,
        inventory: &mut Inventory,
        fallback_group: &str,
    ) -> Result<(), AllocationError> {
        for (hostname, spec) in &template.devices {
            let group = self.group_for(spec, fallback_group);

            // First free device wins; earlier roles are never revisited
            let snapshot: &Inventory = inventory;
            let position = state.free_devices.iter().position(|name| {
                snapshot
                    .device(name)
                    .is_some_and(|device| matches_role(snapshot, device, &group, spec))
            });
            let Some(device_name) =
                position.and_then(|position| state.free_devices.shift_remove_index(position))
            else {
                return Err(AllocationError::AllocationFailed {
                    pod: self.id,
                    template: self.template.clone(),
                    group,
                    tags: spec.tags.clone(),
                    exclude_tags: spec.exclude_tags.clone(),
                });
            };

            let device = inventory.device_mut(&device_name).ok_or_else(|| {
                AllocationError::config(format!("Device {} is not in the inventory", device_name))
            })?;
            device.pod = Some(self.id);
            device.lab_hostname = Some(hostname.clone());
            device.template = Some(self.template.clone());
            if let Some(startup_config) = &spec.startup_config {
                device.startup_config = Some(startup_config.clone());
            }
            if spec.special_reset {
                device.special_reset = true;
                self.isolate_management_port(&device_name, state, inventory)?;
            }

            info!(
                "Pod #{}: {} is {} (group {})",
                self.id, hostname, device_name, group
            );
            self.hostname_to_device.insert(hostname.clone(), device_name);
        }
        Ok(())
    }

    /// Shut the management port of a device that needs a clean boot
    fn isolate_management_port(
        &self,
        device_name: &str,
        state: &AllocatorState,
        inventory: &mut Inventory,
    ) -> Result<(), AllocationError> {
        let identity = state.mgmt_ports.get(device_name).cloned().ok_or_else(|| {
            AllocationError::config(format!(
                "Device {} needs a special reset but has no pod-mgmt port",
                device_name
            ))
        })?;
        interface_mut(inventory, &identity)?.shutdown = Some(true);
        debug!("Pod #{}: shut {} for special reset of {}", self.id, identity, device_name);
        Ok(())
    }

    fn process_connections(
        &mut self,
        connections: &[Connection],
        state: &mut AllocatorState,
        inventory: &mut Inventory,
    ) -> Result<(), AllocationError> {
        for connection in connections {
            if connection.is_bypass() {
                self.process_matrix_bypass(connection)?;
                continue;
            }

            let vlan = if connection.is_internet_service() {
                state.internet_vlans.pop()?
            } else {
                state.vlans.next_vlan()?
            };
            for end in connection.ends() {
                self.process_connection_end(end, vlan, state, inventory)?;
            }
        }
        Ok(())
    }

    /// Attach a device port straight to a VM without touching the fabric
    fn process_matrix_bypass(&mut self, connection: &Connection) -> Result<(), AllocationError> {
        let ends = connection.ends();
        if ends.len() != 2 {
            return Err(AllocationError::config(format!(
                "update_vlan is set to False but there are {} devices. Should be exactly 2.",
                ends.len()
            )));
        }

        let mut device_port = None;
        let mut vm_name = None;
        for end in ends {
            match end {
                ConnectionEnd::Device { hostname, port: Some(port), .. } => {
                    device_port = Some((hostname, port));
                }
                ConnectionEnd::Vm { vm, .. } => vm_name = Some(vm),
                _ => {}
            }
        }

        let (Some((hostname, port)), Some(vm_name)) = (device_port, vm_name) else {
            return Err(AllocationError::config(format!(
                "Either 'device' or 'port' or 'vm' was not specified in: {:?}",
                ends
            )));
        };
        let port_num = port_number_slug(port).ok_or_else(|| {
            AllocationError::config(format!(
                "Port {} could not be parsed into an interface number",
                port
            ))
        })?;
        let portgroup =
            Portgroup::new(format!("{}__{}", self.device_name(hostname)?, port_num), None);

        let vm = self.vm_mut(vm_name);
        vm.add_portgroup(portgroup)?;
        vm.show_portgroups = true;
        Ok(())
    }

    fn process_connection_end(
        &mut self,
        end: &ConnectionEnd,
        vlan: u16,
        state: &mut AllocatorState,
        inventory: &mut Inventory,
    ) -> Result<(), AllocationError> {
        match end {
            ConnectionEnd::Device { hostname, port, tag } => {
                let device_name = self.device_name(hostname)?.to_string();
                let (port, matrix_int) = match port {
                    Some(port) => (port.clone(), state.port_pool.take_named(&device_name, port)?),
                    None => {
                        let (port, matrix_int) = state.port_pool.take_any(&device_name)?;
                        if let Some(device) = inventory.device_mut(&device_name) {
                            record_dynamic_port(device, tag.as_deref(), &port)?;
                        }
                        (port, matrix_int)
                    }
                };
                self.program_matrix_interface(inventory, &matrix_int, vlan, hostname, &port)
            }
            ConnectionEnd::Vm { vm, portgroup_num, .. } => {
                let portgroup =
                    Portgroup::new(self.vm_portgroup_name(vm, *portgroup_num), Some(vlan));
                let vm = self.vm_mut(vm);
                vm.add_portgroup(portgroup)?;
                if vm.portgroups.len() > 1 {
                    vm.show_portgroups = true;
                }
                Ok(())
            }
            ConnectionEnd::Service(_) => Ok(()),
        }
    }

    /// Program a matrix tunnel port. The port must be in tunnel mode and must
    /// not carry a VLAN yet.
    fn program_matrix_interface(
        &self,
        inventory: &mut Inventory,
        matrix_int: &InterfaceId,
        vlan: u16,
        hostname: &str,
        port: &str,
    ) -> Result<(), AllocationError> {
        let interface = interface_mut(inventory, matrix_int)?;
        if let Some(existing) = interface.access_vlan {
            return Err(AllocationError::AlreadyAssigned {
                interface: matrix_int.clone(),
                vlan: existing,
            });
        }
        if !interface.is_tunnel() {
            return Err(AllocationError::ModeMismatch {
                interface: matrix_int.clone(),
                mode: interface
                    .mode
                    .map_or_else(|| "unset".to_string(), |mode| mode.to_string()),
            });
        }

        interface.access_vlan = Some(vlan);
        interface.shutdown = Some(false);
        interface.state = Some(InterfaceState::Present);
        interface.dynamic = true;
        interface.append_description(&format!(
            "pod: {} | hostname: {} | port: {}",
            self.id, hostname, port
        ));

        debug!(
            "Pod #{}: {} {} -> {} vlan {}",
            self.id, hostname, port, matrix_int, vlan
        );
        Ok(())
    }

    fn flatten_template_data(&self, inventory: &mut Inventory) {
        for device_name in self.hostname_to_device.values() {
            if let Some(device) = inventory.device_mut(device_name) {
                device.template_data.flatten();
            }
        }
    }
}

fn matches_role(inventory: &Inventory, device: &Device, group: &str, spec: &RoleSpec) -> bool {
    inventory.has_parent_group(device, group)
        && spec.tags.iter().all(|tag| device.has_tag(tag))
        && !spec.exclude_tags.iter().any(|tag| device.has_tag(tag))
}

/// Remember which port an implicit connection end landed on, under its tag
/// or the next `interface_N` name. A name already taken on the device is an
/// error, since the renderer would lose one of the two ports.
fn record_dynamic_port(
    device: &mut Device,
    tag: Option<&str>,
    port: &str,
) -> Result<(), AllocationError> {
    let data = &mut device.template_data;
    let tag = match tag {
        Some(tag) => tag.to_string(),
        None => format!("interface_{}", data.interfaces.len() + 1),
    };
    if let Some(existing) = data.interfaces.get(&tag) {
        return Err(AllocationError::config(format!(
            "{}: '{}' already names port {}, cannot also name {}",
            device.name, tag, existing, port
        )));
    }
    if data.vars.contains_key(&tag) {
        return Err(AllocationError::config(format!(
            "{}: '{}' is already a template variable, cannot name port {}",
            device.name, tag, port
        )));
    }
    data.interfaces.insert(tag, port.to_string());
    Ok(())
}
