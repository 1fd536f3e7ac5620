//! Virtual machine placeholders and their portgroups.

use serde::{Deserialize, Serialize};

use super::error::AllocationError;

/// A named virtual network attachment of a VM.
///
/// Both the name and the VLAN take part in equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Portgroup {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan: Option<u16>,
}

impl Portgroup {
    pub fn new(name: impl Into<String>, vlan: Option<u16>) -> Self {
        Self {
            name: name.into(),
            vlan,
        }
    }
}

/// A VM instantiated for one pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vm {
    pub name: String,
    pub pod: u32,
    pub portgroups: Vec<Portgroup>,
    pub show_portgroups: bool,
    pub turn_on: bool,
}

impl Vm {
    pub fn new(name: impl Into<String>, pod: u32) -> Self {
        Self {
            name: name.into(),
            pod,
            portgroups: Vec::new(),
            show_portgroups: false,
            turn_on: true,
        }
    }

    /// Attach a portgroup.
    ///
    /// Portgroup names are unique per VM: re-adding an identical portgroup
    /// is a no-op, re-using the name with another VLAN is an error.
    pub fn add_portgroup(&mut self, portgroup: Portgroup) -> Result<(), AllocationError> {
        if let Some(existing) = self.portgroups.iter().find(|pg| pg.name == portgroup.name) {
            if existing.vlan == portgroup.vlan {
                return Ok(());
            }
            return Err(AllocationError::PortgroupConflict {
                vm: self.name.clone(),
                portgroup: portgroup.name,
                existing: existing.vlan,
                attempted: portgroup.vlan,
            });
        }
        self.portgroups.push(portgroup);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_portgroup_equality_includes_vlan() {
        assert_eq!(Portgroup::new("pg", Some(2100)), Portgroup::new("pg", Some(2100)));
        assert_ne!(Portgroup::new("pg", Some(2100)), Portgroup::new("pg", Some(2101)));
    }

    #[test]
    fn test_add_portgroup() {
        let mut vm = Vm::new("basic__jump__01", 1001);
        vm.add_portgroup(Portgroup::new("basic__jump__01__01", Some(2100))).unwrap();
        vm.add_portgroup(Portgroup::new("basic__jump__01__01", Some(2100))).unwrap();
        assert_eq!(vm.portgroups.len(), 1);

        let err = vm
            .add_portgroup(Portgroup::new("basic__jump__01__01", Some(2101)))
            .unwrap_err();
        assert!(matches!(err, AllocationError::PortgroupConflict { .. }));
        assert_eq!(vm.portgroups.len(), 1);
    }
}
