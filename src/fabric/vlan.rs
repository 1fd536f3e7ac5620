//! VLAN pools.
//!
//! Tunnel VLANs come from one running counter shared by the whole fabric.
//! Internet uplinks instead draw from a queue of VLANs reserved on the pair
//! routers, which is harvested once and never refilled. The counter skips
//! every reserved VLAN so the two pools never hand out the same tag.

use log::debug;
use std::collections::{BTreeSet, VecDeque};

use super::error::AllocationError;
use crate::inventory::Inventory;
use crate::settings::MAX_VLAN;

/// Service name marking a pair-router port as an internet uplink
pub const INTERNET_SERVICE: &str = "internet";

/// Round up to the next multiple of 10
pub fn roundup(value: u16) -> u16 {
    value.div_ceil(10) * 10
}

/// Fabric-wide tunnel VLAN counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanCounter {
    next: u16,
    reserved: BTreeSet<u16>,
}

impl VlanCounter {
    pub fn new(start: u16) -> Self {
        Self {
            next: start,
            reserved: BTreeSet::new(),
        }
    }

    /// A counter that never hands out any of `reserved`
    pub fn with_reserved(start: u16, reserved: impl IntoIterator<Item = u16>) -> Self {
        Self {
            next: start,
            reserved: reserved.into_iter().collect(),
        }
    }

    /// The VLAN the next normal connection will receive
    pub fn peek(&self) -> u16 {
        self.next
    }

    /// Hand out the current VLAN and advance the counter
    pub fn next_vlan(&mut self) -> Result<u16, AllocationError> {
        while self.next <= MAX_VLAN && self.reserved.contains(&self.next) {
            debug!("Skipping reserved VLAN {}", self.next);
            self.next += 1;
        }
        if self.next > MAX_VLAN {
            return Err(AllocationError::PoolExhausted {
                resource: "tunnel VLANs".to_string(),
                owner: "fabric".to_string(),
            });
        }
        let vlan = self.next;
        self.next += 1;
        Ok(vlan)
    }

    /// Move the counter to the next decade so each pod starts on a clean
    /// boundary. Already aligned values are left alone.
    pub fn round_to_decade(&mut self) {
        self.next = roundup(self.next);
    }
}

/// VLANs reserved for internet uplinks, consumed oldest first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InternetVlans {
    queue: VecDeque<u16>,
}

impl InternetVlans {
    pub fn new(vlans: impl IntoIterator<Item = u16>) -> Self {
        Self {
            queue: vlans.into_iter().collect(),
        }
    }

    pub fn pop(&mut self) -> Result<u16, AllocationError> {
        self.queue.pop_front().ok_or_else(|| AllocationError::PoolExhausted {
            resource: "internet VLANs".to_string(),
            owner: "fabric".to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Every VLAN still held for internet uplinks
    pub fn reserved(&self) -> impl Iterator<Item = u16> + '_ {
        self.queue.iter().copied()
    }

    /// Collect the internet VLANs from every pair router, rejecting ports
    /// without a VLAN and VLANs reserved twice
    pub fn from_pair_routers(
        inventory: &Inventory,
        group: &str,
    ) -> Result<Self, AllocationError> {
        let mut queue = VecDeque::new();
        let mut seen = BTreeSet::new();

        for router_name in inventory.group_members(group) {
            let Some(router) = inventory.device(&router_name) else {
                continue;
            };
            for interface in &router.interfaces {
                if interface.service.as_deref() != Some(INTERNET_SERVICE) {
                    continue;
                }
                let vlan = interface.vlan.ok_or_else(|| {
                    AllocationError::config(format!(
                        "{} {} is an internet service port without a vlan",
                        router.name, interface.name
                    ))
                })?;
                if !seen.insert(vlan) {
                    return Err(AllocationError::config(format!(
                        "{} {} has vlan value {} which is already in use",
                        router.name, interface.name, vlan
                    )));
                }
                queue.push_back(vlan);
            }
        }

        debug!("Harvested {} internet VLANs", queue.len());
        Ok(Self { queue })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{Device, Interface};

    #[test]
    fn test_roundup() {
        assert_eq!(roundup(2100), 2100);
        assert_eq!(roundup(2101), 2110);
        assert_eq!(roundup(2107), 2110);
        assert_eq!(roundup(2109), 2110);
        assert_eq!(roundup(0), 0);
    }

    #[test]
    fn test_counter_post_increments_and_rounds() {
        let mut counter = VlanCounter::new(2100);
        assert_eq!(counter.next_vlan().unwrap(), 2100);
        assert_eq!(counter.next_vlan().unwrap(), 2101);
        counter.round_to_decade();
        assert_eq!(counter.peek(), 2110);
        counter.round_to_decade();
        assert_eq!(counter.peek(), 2110);
    }

    #[test]
    fn test_counter_stops_at_max_vlan() {
        let mut counter = VlanCounter::new(MAX_VLAN);
        assert_eq!(counter.next_vlan().unwrap(), MAX_VLAN);
        assert!(matches!(
            counter.next_vlan(),
            Err(AllocationError::PoolExhausted { .. })
        ));
    }

    #[test]
    fn test_counter_skips_reserved_vlans() {
        let internet = InternetVlans::new([2100, 2102, 901]);
        let mut counter = VlanCounter::with_reserved(2100, internet.reserved());
        assert_eq!(counter.next_vlan().unwrap(), 2101);
        assert_eq!(counter.next_vlan().unwrap(), 2103);
        assert_eq!(counter.peek(), 2104);
    }

    #[test]
    fn test_reserved_max_vlan_exhausts_counter() {
        let mut counter = VlanCounter::with_reserved(MAX_VLAN - 1, [MAX_VLAN]);
        assert_eq!(counter.next_vlan().unwrap(), MAX_VLAN - 1);
        assert!(matches!(
            counter.next_vlan(),
            Err(AllocationError::PoolExhausted { .. })
        ));
    }

    #[test]
    fn test_internet_queue_is_fifo() {
        let mut vlans = InternetVlans::new([900, 901]);
        assert_eq!(vlans.pop().unwrap(), 900);
        assert_eq!(vlans.pop().unwrap(), 901);
        assert!(vlans.pop().is_err());
    }

    fn router(name: &str, vlans: &[Option<u16>]) -> Device {
        let mut device = Device::new(name);
        device.groups = vec!["pair-routers".to_string()];
        for (i, vlan) in vlans.iter().enumerate() {
            let mut interface = Interface::new(format!("Gi0/0/{}", i));
            interface.service = Some(INTERNET_SERVICE.to_string());
            interface.vlan = *vlan;
            device.interfaces.push(interface);
        }
        // Ports without the service are ignored
        let mut other = Interface::new("Gi0/1/0");
        other.vlan = Some(10);
        device.interfaces.push(other);
        device
    }

    #[test]
    fn test_harvest_from_pair_routers() {
        let mut inventory = Inventory::default();
        inventory.insert_device(router("pr-1", &[Some(901), Some(902)]));
        inventory.insert_device(router("pr-2", &[Some(903)]));

        let mut vlans = InternetVlans::from_pair_routers(&inventory, "pair-routers").unwrap();
        assert_eq!(vlans.len(), 3);
        assert_eq!(vlans.pop().unwrap(), 901);
    }

    #[test]
    fn test_harvest_rejects_duplicates_and_missing_vlans() {
        let mut inventory = Inventory::default();
        inventory.insert_device(router("pr-1", &[Some(901)]));
        inventory.insert_device(router("pr-2", &[Some(901)]));
        assert!(InternetVlans::from_pair_routers(&inventory, "pair-routers").is_err());

        let mut inventory = Inventory::default();
        inventory.insert_device(router("pr-1", &[None]));
        assert!(InternetVlans::from_pair_routers(&inventory, "pair-routers").is_err());
    }
}
