//! Interface identity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Addresses one interface record of one device without copying it.
///
/// `index` is the position in the device's interface list; `name` is kept
/// alongside so messages and descriptions stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InterfaceId {
    pub device: String,
    pub index: usize,
    pub name: String,
}

impl InterfaceId {
    pub fn new(device: impl Into<String>, index: usize, name: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            index,
            name: name.into(),
        }
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.device, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_uses_every_field() {
        let a = InterfaceId::new("matrix-1", 0, "Gi0/1");
        assert_eq!(a, InterfaceId::new("matrix-1", 0, "Gi0/1"));
        assert_ne!(a, InterfaceId::new("matrix-1", 1, "Gi0/1"));
        assert_ne!(a, InterfaceId::new("matrix-2", 0, "Gi0/1"));
        assert_ne!(a, InterfaceId::new("matrix-1", 0, "Gi0/2"));
    }

    #[test]
    fn test_display() {
        assert_eq!(InterfaceId::new("matrix-1", 3, "Gi0/4").to_string(), "matrix-1 Gi0/4");
    }
}
