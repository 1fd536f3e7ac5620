//! Inventory type definitions.
//!
//! Devices, their interfaces and the group hierarchy as loaded from the
//! inventory file. The allocator mutates these records in place; the
//! renderer reads them back out of the report.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Operating mode of a switch or router port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterfaceMode {
    /// Port available for dynamic VLAN-tagged patching
    Dot1qTunnel,
    Access,
    Trunk,
    Routed,
}

impl InterfaceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterfaceMode::Dot1qTunnel => "dot1q-tunnel",
            InterfaceMode::Access => "access",
            InterfaceMode::Trunk => "trunk",
            InterfaceMode::Routed => "routed",
        }
    }
}

impl fmt::Display for InterfaceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Administrative presence of a port in the rendered configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceState {
    Present,
    Absent,
}

/// The far end of a physical cable plugged into a switch port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedDevice {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
}

/// A single port record of a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<InterfaceMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_vlan: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shutdown: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<InterfaceState>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected_device: Option<ConnectedDevice>,
    /// Uplink of a pod-mgmt switch rather than a pod device's management port
    #[serde(default, skip_serializing_if = "is_false")]
    pub management: bool,
    /// Service carried by a pair-router port, e.g. `internet`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    /// Static VLAN of a pair-router service port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
    /// Set once the allocator has programmed this port
    #[serde(default, skip_serializing_if = "is_false")]
    pub dynamic: bool,
    /// Any other port attributes, passed through untouched
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl Interface {
    /// Create a bare interface with only a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: None,
            access_vlan: None,
            shutdown: None,
            state: None,
            description: String::new(),
            connected_device: None,
            management: false,
            service: None,
            vlan: None,
            dynamic: false,
            extra: IndexMap::new(),
        }
    }

    pub fn is_tunnel(&self) -> bool {
        self.mode == Some(InterfaceMode::Dot1qTunnel)
    }

    /// Append a segment to the description, keeping what is already there
    pub fn append_description(&mut self, segment: &str) {
        if self.description.is_empty() {
            self.description = segment.to_string();
        } else {
            self.description.push_str(" | ");
            self.description.push_str(segment);
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Data handed to the config renderer as-is.
///
/// `interfaces` collects dynamically assigned ports while a pod is being
/// wired; once the pod is complete they are flattened into `vars`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderData {
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub interfaces: IndexMap<String, String>,
    #[serde(flatten)]
    pub vars: IndexMap<String, serde_yaml::Value>,
}

impl RenderData {
    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty() && self.vars.is_empty()
    }

    /// Move collected interface tags into the top-level variables
    pub fn flatten(&mut self) {
        for (tag, port) in self.interfaces.drain(..) {
            self.vars.insert(tag, serde_yaml::Value::String(port));
        }
    }
}

/// A physical lab device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Filled from the inventory key
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rack: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rack_unit: Option<u32>,

    // Allocation results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pod: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lab_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub startup_config: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub special_reset: bool,
    #[serde(default, skip_serializing_if = "RenderData::is_empty")]
    pub template_data: RenderData,

    /// Host variables the allocator does not interpret, e.g. `platform`
    #[serde(flatten)]
    pub extra: IndexMap<String, serde_yaml::Value>,
}

impl Device {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn is_allocated(&self) -> bool {
        self.pod.is_some()
    }
}

/// A named inventory group with its parent groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub groups: Vec<String>,
}

/// On-disk shape of the inventory file
#[derive(Debug, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    groups: IndexMap<String, Group>,
    #[serde(default)]
    hosts: IndexMap<String, Device>,
}

/// All devices and groups of the lab, in file order
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "InventoryFile")]
pub struct Inventory {
    groups: IndexMap<String, Group>,
    hosts: IndexMap<String, Device>,
}

impl From<InventoryFile> for Inventory {
    fn from(file: InventoryFile) -> Self {
        Inventory::new(file.groups, file.hosts)
    }
}

impl Inventory {
    /// Build an inventory, stamping each device with its key
    pub fn new(groups: IndexMap<String, Group>, mut hosts: IndexMap<String, Device>) -> Self {
        for (name, device) in hosts.iter_mut() {
            device.name = name.clone();
        }
        Self { groups, hosts }
    }

    /// Add or replace a device, keyed by its name
    pub fn insert_device(&mut self, device: Device) {
        self.hosts.insert(device.name.clone(), device);
    }

    pub fn insert_group(&mut self, name: impl Into<String>, parents: Vec<String>) {
        self.groups.insert(name.into(), Group { groups: parents });
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.hosts.get(name)
    }

    pub fn device_mut(&mut self, name: &str) -> Option<&mut Device> {
        self.hosts.get_mut(name)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.hosts.values()
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Check whether a device belongs to a group directly or through any
    /// chain of parent groups
    pub fn has_parent_group(&self, device: &Device, group: &str) -> bool {
        let mut visited: Vec<&str> = Vec::new();
        let mut pending: Vec<&str> = device.groups.iter().map(String::as_str).collect();

        while let Some(current) = pending.pop() {
            if current == group {
                return true;
            }
            if visited.contains(&current) {
                continue;
            }
            visited.push(current);
            if let Some(parent) = self.groups.get(current) {
                pending.extend(parent.groups.iter().map(String::as_str));
            }
        }
        false
    }

    /// Names of every device in a group, in inventory order
    pub fn group_members(&self, group: &str) -> Vec<String> {
        self.hosts
            .values()
            .filter(|device| self.has_parent_group(device, group))
            .map(|device| device.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_inventory() -> Inventory {
        let yaml = r#"
groups:
  pod-gear: {}
  routers:
    groups: [pod-gear]
  edge__01:
    groups: [routers]
hosts:
  r1:
    groups: [edge__01]
    tags: [isr4k]
    interfaces:
      - name: Gi0/0/0
        mode: routed
  sw1:
    groups: [matrix-switches]
    interfaces:
      - name: Eth1/1
        mode: dot1q-tunnel
        connected_device:
          name: r1
          port: Gi0/0/0
"#;
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_names_are_stamped_from_keys() {
        let inventory = sample_inventory();
        assert_eq!(inventory.device("r1").unwrap().name, "r1");
        assert_eq!(inventory.device("sw1").unwrap().name, "sw1");
    }

    #[test]
    fn test_parent_group_resolution() {
        let inventory = sample_inventory();
        let r1 = inventory.device("r1").unwrap();
        assert!(inventory.has_parent_group(r1, "edge__01"));
        assert!(inventory.has_parent_group(r1, "routers"));
        assert!(inventory.has_parent_group(r1, "pod-gear"));
        assert!(!inventory.has_parent_group(r1, "matrix-switches"));
        assert_eq!(inventory.group_members("pod-gear"), vec!["r1".to_string()]);
    }

    #[test]
    fn test_group_cycle_terminates() {
        let mut inventory = Inventory::default();
        inventory.insert_group("a", vec!["b".to_string()]);
        inventory.insert_group("b", vec!["a".to_string()]);
        let mut device = Device::new("d1");
        device.groups = vec!["a".to_string()];
        inventory.insert_device(device);

        let d1 = inventory.device("d1").unwrap();
        assert!(inventory.has_parent_group(d1, "b"));
        assert!(!inventory.has_parent_group(d1, "c"));
    }

    #[test]
    fn test_interface_mode_parsing() {
        let inventory = sample_inventory();
        let port = &inventory.device("sw1").unwrap().interfaces[0];
        assert!(port.is_tunnel());
        assert_eq!(port.mode.unwrap().to_string(), "dot1q-tunnel");
    }

    #[test]
    fn test_append_description() {
        let mut interface = Interface::new("Eth1/1");
        interface.append_description("pod: 1001");
        assert_eq!(interface.description, "pod: 1001");
        interface.append_description("hostname: R1");
        assert_eq!(interface.description, "pod: 1001 | hostname: R1");
    }

    #[test]
    fn test_render_data_flatten() {
        let mut data = RenderData::default();
        data.interfaces.insert("interface_1".to_string(), "Gi0/1".to_string());
        data.vars.insert("asn".to_string(), serde_yaml::Value::from(65001));
        data.flatten();
        assert!(data.interfaces.is_empty());
        assert_eq!(
            data.vars.get("interface_1"),
            Some(&serde_yaml::Value::String("Gi0/1".to_string()))
        );
        assert_eq!(data.vars.len(), 2);
    }
}
