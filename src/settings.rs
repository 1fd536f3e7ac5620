//! Fabric-wide allocation settings.
//!
//! These are the constants the allocator needs that do not belong to any
//! single device or template: where the tunnel VLAN range starts, how pod ids
//! are spaced per template, and which inventory groups mark the special
//! device classes.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;

/// Highest VLAN id usable on the patch fabric.
pub const MAX_VLAN: u16 = 4094;

/// Settings that shape a single allocation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// First VLAN handed out by the running tunnel counter
    pub vlan_start: u16,
    /// Pod ids of the Nth requested template start at `N * pod_id_step + 1`
    pub pod_id_step: u32,
    /// Group used for roles that do not declare one
    pub fallback_group: String,
    pub groups: GroupNames,
}

/// Inventory group names that carry a meaning for the allocator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupNames {
    /// Devices that may be handed to pods
    pub pod_gear: String,
    /// Switches whose tunnel ports make up the patch fabric
    pub matrix_switches: String,
    /// Switches carrying the management port of every pod device
    pub pod_mgmt: String,
    /// Routers whose internet-service interfaces reserve uplink VLANs
    pub pair_routers: String,
    /// Cabling infrastructure whose port descriptions are generated
    pub infra: String,
}

/// Errors found while validating settings
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid VLAN settings: {0}")]
    InvalidVlan(String),
    #[error("Invalid pod settings: {0}")]
    InvalidPod(String),
    #[error("Invalid group settings: {0}")]
    InvalidGroup(String),
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vlan_start: 2100,
            pod_id_step: 1000,
            fallback_group: "dynamic".to_string(),
            groups: GroupNames::default(),
        }
    }
}

impl Default for GroupNames {
    fn default() -> Self {
        Self {
            pod_gear: "pod-gear".to_string(),
            matrix_switches: "matrix-switches".to_string(),
            pod_mgmt: "pod-mgmt".to_string(),
            pair_routers: "pair-routers".to_string(),
            infra: "infra".to_string(),
        }
    }
}

impl Settings {
    /// Validate the settings
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.vlan_start == 0 || self.vlan_start > MAX_VLAN {
            return Err(ValidationError::InvalidVlan(format!(
                "vlan_start must be between 1 and {}, got {}",
                MAX_VLAN, self.vlan_start
            )));
        }

        // Sequence numbers are rendered with two digits and must stay below the step
        if self.pod_id_step < 10 {
            return Err(ValidationError::InvalidPod(format!(
                "pod_id_step must be at least 10, got {}",
                self.pod_id_step
            )));
        }

        if self.fallback_group.is_empty() {
            return Err(ValidationError::InvalidGroup(
                "fallback_group cannot be empty".to_string(),
            ));
        }

        let groups = [
            ("pod_gear", &self.groups.pod_gear),
            ("matrix_switches", &self.groups.matrix_switches),
            ("pod_mgmt", &self.groups.pod_mgmt),
            ("pair_routers", &self.groups.pair_routers),
            ("infra", &self.groups.infra),
        ];
        for (key, value) in groups {
            if value.is_empty() {
                return Err(ValidationError::InvalidGroup(format!(
                    "groups.{} cannot be empty",
                    key
                )));
            }
        }

        Ok(())
    }
}

/// Load settings from a YAML file, or fall back to the defaults when no
/// path is given.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let settings = match path {
        Some(path) => {
            info!("Loading settings from: {:?}", path);
            let file = File::open(path)
                .wrap_err_with(|| format!("Failed to open settings file '{}'", path.display()))?;
            serde_yaml::from_reader(file)
                .wrap_err_with(|| format!("Failed to parse settings file '{}'", path.display()))?
        }
        None => {
            info!("No settings file given, using defaults");
            Settings::default()
        }
    };

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.vlan_start, 2100);
        assert_eq!(settings.pod_id_step, 1000);
        assert_eq!(settings.groups.matrix_switches, "matrix-switches");
    }

    #[test]
    fn test_partial_settings_file() {
        let yaml = r#"
vlan_start: 3000
groups:
  pod_gear: "lab-gear"
"#;
        let mut temp_file = NamedTempFile::new().unwrap();
        write!(temp_file, "{}", yaml).unwrap();

        let settings = load_settings(Some(temp_file.path())).unwrap();
        assert_eq!(settings.vlan_start, 3000);
        assert_eq!(settings.pod_id_step, 1000);
        assert_eq!(settings.groups.pod_gear, "lab-gear");
        assert_eq!(settings.groups.pod_mgmt, "pod-mgmt");
    }

    #[test]
    fn test_invalid_vlan_start() {
        let settings = Settings {
            vlan_start: 4095,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(ValidationError::InvalidVlan(_))));
    }

    #[test]
    fn test_empty_group_name() {
        let mut settings = Settings::default();
        settings.groups.infra.clear();
        assert!(matches!(settings.validate(), Err(ValidationError::InvalidGroup(_))));
    }

    #[test]
    fn test_no_path_uses_defaults() {
        assert_eq!(load_settings(None).unwrap(), Settings::default());
    }
}
