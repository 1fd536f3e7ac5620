//! Residual cleanup of the matrix fabric.

use log::{debug, info};

use crate::inventory::{InterfaceState, Inventory};

/// Shut every matrix tunnel port that no pod programmed, so an unpatched
/// port never stays open. Returns how many ports were closed.
pub fn shutdown_unused_tunnels(inventory: &mut Inventory, matrix_group: &str) -> usize {
    let mut closed = 0;

    for switch_name in inventory.group_members(matrix_group) {
        let Some(switch) = inventory.device_mut(&switch_name) else {
            continue;
        };
        for interface in switch
            .interfaces
            .iter_mut()
            .filter(|interface| interface.is_tunnel() && interface.access_vlan.is_none())
        {
            interface.shutdown = Some(true);
            interface.state = Some(InterfaceState::Absent);
            debug!("Closed unused tunnel port {} {}", switch_name, interface.name);
            closed += 1;
        }
    }

    info!("Closed {} unused matrix tunnel ports", closed);
    closed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{Device, Interface, InterfaceMode};

    #[test]
    fn test_only_unprogrammed_tunnels_are_closed() {
        let mut switch = Device::new("matrix-1");
        switch.groups = vec!["matrix-switches".to_string()];

        let mut programmed = Interface::new("Eth1/1");
        programmed.mode = Some(InterfaceMode::Dot1qTunnel);
        programmed.access_vlan = Some(2100);
        programmed.shutdown = Some(false);

        let mut unused = Interface::new("Eth1/2");
        unused.mode = Some(InterfaceMode::Dot1qTunnel);

        let mut trunk = Interface::new("Eth1/48");
        trunk.mode = Some(InterfaceMode::Trunk);

        switch.interfaces = vec![programmed, unused, trunk];
        let mut inventory = Inventory::default();
        inventory.insert_device(switch);

        assert_eq!(shutdown_unused_tunnels(&mut inventory, "matrix-switches"), 1);

        let interfaces = &inventory.device("matrix-1").unwrap().interfaces;
        assert_eq!(interfaces[0].shutdown, Some(false));
        assert_eq!(interfaces[0].state, None);
        assert_eq!(interfaces[1].shutdown, Some(true));
        assert_eq!(interfaces[1].state, Some(InterfaceState::Absent));
        assert_eq!(interfaces[2].shutdown, None);
    }
}
