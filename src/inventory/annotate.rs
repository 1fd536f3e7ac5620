//! Cabling descriptions for infrastructure switches.
//!
//! Every infra port that is cabled to another device gets a description
//! naming the far end's rack location, so allocation can append pod details
//! to something a technician can read on the switch.

use log::warn;

use super::types::Inventory;
use crate::fabric::AllocationError;

/// Rewrite the description of every cabled port on infra devices.
///
/// Returns the number of descriptions written.
pub fn annotate_infra_descriptions(
    inventory: &mut Inventory,
    infra_group: &str,
) -> Result<usize, AllocationError> {
    let mut annotated = 0;

    for device_name in inventory.group_members(infra_group) {
        let Some(device) = inventory.device(&device_name) else {
            continue;
        };

        // Resolve every description first, then write them back
        let mut descriptions = Vec::new();
        for (index, interface) in device.interfaces.iter().enumerate() {
            let Some(connected) = &interface.connected_device else {
                continue;
            };
            let remote = inventory.device(&connected.name).ok_or_else(|| {
                AllocationError::config(format!(
                    "{} {} is connected to unknown device {}",
                    device_name, interface.name, connected.name
                ))
            })?;
            let (Some(rack), Some(rack_unit)) = (&remote.rack, remote.rack_unit) else {
                warn!(
                    "{} has no rack location, keeping description of {} {}",
                    remote.name, device_name, interface.name
                );
                continue;
            };
            descriptions.push((
                index,
                format!(
                    "To Rack {} RU {} -> {} {}",
                    rack,
                    rack_unit,
                    connected.name,
                    connected.port.as_deref().unwrap_or_default()
                )
                .trim_end()
                .to_string(),
            ));
        }

        if let Some(device) = inventory.device_mut(&device_name) {
            for (index, description) in descriptions {
                device.interfaces[index].description = description;
                annotated += 1;
            }
        }
    }

    Ok(annotated)
}
