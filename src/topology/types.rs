//! Topology template definitions.
//!
//! A template describes one pod: the logical device roles it needs, the VMs
//! it runs and the point-to-point connections between them.

use indexmap::IndexMap;
use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::LazyLock;

use crate::fabric::AllocationError;

static INTERFACE_NAME_RE: LazyLock<Regex> = LazyLock::new(||
    Regex::new(r"(?P<interface_type>[a-zA-Z\-_ ]*)(?P<interface_num>[\d./]*)").unwrap()
);

/// Turn a port name like `Ethernet1/2` into `1-2`
pub fn port_number_slug(port: &str) -> Option<String> {
    let captures = INTERFACE_NAME_RE.captures(port)?;
    let number = captures.name("interface_num")?.as_str();
    if number.is_empty() {
        return None;
    }
    Some(number.replace('/', "-"))
}

/// Constraints a physical device must satisfy to play a role
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleSpec {
    /// Group prefix; the pod sequence number is appended
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub exclude_tags: Vec<String>,
    #[serde(default)]
    pub startup_config: Option<String>,
    /// Isolate the device's management port until its pod config is pushed
    #[serde(default)]
    pub special_reset: bool,
}

/// A VM declared up front by a template
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VmSpec {
    pub name: String,
}

/// Services a connection end can stand for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    Internet,
}

/// On-disk shape of a connection end
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConnectionEnd {
    hostname: Option<String>,
    port: Option<String>,
    tag: Option<String>,
    service: Option<String>,
    vm: Option<String>,
    portgroup_num: Option<u32>,
    update_vlan: Option<bool>,
}

/// One end of a connection
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawConnectionEnd")]
pub enum ConnectionEnd {
    /// A port of a device role; without a port, any free matrix port is used
    Device {
        hostname: String,
        port: Option<String>,
        tag: Option<String>,
    },
    Vm {
        vm: String,
        portgroup_num: Option<u32>,
        /// `false` marks a bypass link that reuses an existing tunnel
        update_vlan: bool,
    },
    Service(Service),
}

impl TryFrom<RawConnectionEnd> for ConnectionEnd {
    type Error = String;

    fn try_from(raw: RawConnectionEnd) -> Result<Self, Self::Error> {
        let kinds = [raw.hostname.is_some(), raw.vm.is_some(), raw.service.is_some()]
            .iter()
            .filter(|present| **present)
            .count();
        if kinds != 1 {
            return Err(
                "connection end must set exactly one of 'hostname', 'vm' or 'service'".to_string(),
            );
        }

        if let Some(hostname) = raw.hostname {
            if raw.portgroup_num.is_some() || raw.update_vlan.is_some() {
                return Err(format!(
                    "connection end '{}' is a device and cannot set portgroup_num or update_vlan",
                    hostname
                ));
            }
            return Ok(ConnectionEnd::Device {
                hostname,
                port: raw.port,
                tag: raw.tag,
            });
        }

        if raw.port.is_some() || raw.tag.is_some() {
            return Err("only device connection ends can set 'port' or 'tag'".to_string());
        }

        if let Some(vm) = raw.vm {
            return Ok(ConnectionEnd::Vm {
                vm,
                portgroup_num: raw.portgroup_num,
                update_vlan: raw.update_vlan.unwrap_or(true),
            });
        }

        match raw.service.as_deref() {
            Some("internet") => Ok(ConnectionEnd::Service(Service::Internet)),
            other => Err(format!("unknown service {:?}", other.unwrap_or_default())),
        }
    }
}

impl ConnectionEnd {
    pub fn device(hostname: &str, port: Option<&str>) -> Self {
        ConnectionEnd::Device {
            hostname: hostname.to_string(),
            port: port.map(str::to_string),
            tag: None,
        }
    }

    pub fn vm(vm: &str, portgroup_num: Option<u32>) -> Self {
        ConnectionEnd::Vm {
            vm: vm.to_string(),
            portgroup_num,
            update_vlan: true,
        }
    }

    fn skips_tunnel(&self) -> bool {
        matches!(self, ConnectionEnd::Vm { update_vlan: false, .. })
    }
}

/// An ordered list of connected ends
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Connection(pub Vec<ConnectionEnd>);

impl Connection {
    pub fn ends(&self) -> &[ConnectionEnd] {
        &self.0
    }

    /// A VM end opted out of a new VLAN, so the link reuses an existing tunnel
    pub fn is_bypass(&self) -> bool {
        self.0.iter().any(ConnectionEnd::skips_tunnel)
    }

    pub fn is_internet_service(&self) -> bool {
        self.0
            .iter()
            .any(|end| *end == ConnectionEnd::Service(Service::Internet))
    }
}

/// A named pod blueprint
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Template {
    /// Filled from the template directory name
    #[serde(skip)]
    pub name: String,
    #[serde(default)]
    pub devices: IndexMap<String, RoleSpec>,
    #[serde(default)]
    pub vms: Vec<VmSpec>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(skip)]
    pub configs_dir: Option<PathBuf>,
}

impl Template {
    /// Check the shape of every connection before anything is allocated
    pub fn validate(&self) -> Result<(), AllocationError> {
        for (index, connection) in self.connections.iter().enumerate() {
            let ends = connection.ends();
            if ends.len() < 2 {
                return Err(AllocationError::config(format!(
                    "connection #{} of topology \"{}\" has {} ends, at least 2 are required",
                    index + 1,
                    self.name,
                    ends.len()
                )));
            }

            for end in ends {
                if let ConnectionEnd::Device { hostname, .. } = end {
                    if !self.devices.contains_key(hostname) {
                        return Err(AllocationError::config(format!(
                            "connection #{} of topology \"{}\" refers to unknown device \"{}\"",
                            index + 1,
                            self.name,
                            hostname
                        )));
                    }
                }
            }

            if connection.is_bypass() {
                Self::validate_bypass(connection)?;
            }
        }
        Ok(())
    }

    fn validate_bypass(connection: &Connection) -> Result<(), AllocationError> {
        let ends = connection.ends();
        if ends.len() != 2 {
            return Err(AllocationError::config(format!(
                "update_vlan is set to False but there are {} devices. Should be exactly 2.",
                ends.len()
            )));
        }

        let ported_device = ends.iter().find_map(|end| match end {
            ConnectionEnd::Device { port: Some(port), .. } => Some(port),
            _ => None,
        });
        let has_vm = ends.iter().any(|end| matches!(end, ConnectionEnd::Vm { .. }));

        match ported_device {
            Some(port) if has_vm => {
                if port_number_slug(port).is_none() {
                    return Err(AllocationError::config(format!(
                        "Port {} could not be parsed into an interface number",
                        port
                    )));
                }
                Ok(())
            }
            _ => Err(AllocationError::config(format!(
                "Either 'device' or 'port' or 'vm' was not specified in: {:?}",
                ends
            ))),
        }
    }
}

/// A template together with how many pods to build from it
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyRequest {
    pub template: Template,
    pub quantity: u32,
}

impl TopologyRequest {
    pub fn new(template: Template, quantity: u32) -> Self {
        Self { template, quantity }
    }
}
