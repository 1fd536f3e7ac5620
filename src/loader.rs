//! Inventory and topology loading.
//!
//! Reads the inventory file (with optional per-host overrides from a
//! `host_vars/` directory next to it) and the requested topology templates
//! from `<topologies>/<name>/topology.yml`.

use crate::inventory::Inventory;
use crate::topology::{Template, TopologyRequest};
use color_eyre::eyre::{bail, eyre, WrapErr};
use color_eyre::Result;
use log::{debug, info};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::{Path, PathBuf};

const YAML_FILENAME_EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Find `<dir>/<stem>.yml` or `<dir>/<stem>.yaml`
fn find_yaml_file(dir: &Path, stem: &str) -> Option<PathBuf> {
    YAML_FILENAME_EXTENSIONS
        .iter()
        .map(|ext| dir.join(format!("{}.{}", stem, ext)))
        .find(|path| path.is_file())
}

fn read_yaml(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path)
        .wrap_err_with(|| format!("Failed to read '{}'", path.display()))?;
    serde_yaml::from_str(&content).wrap_err_with(|| format!("Failed to parse '{}'", path.display()))
}

/// Load the inventory file and merge host variable overrides into it
pub fn load_inventory(inventory_path: &Path) -> Result<Inventory> {
    info!("Loading inventory from: {:?}", inventory_path);
    let mut raw = read_yaml(inventory_path)?;

    let host_vars_dir = inventory_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("host_vars");
    if host_vars_dir.is_dir() {
        if let Some(hosts) = raw.get_mut("hosts").and_then(Value::as_mapping_mut) {
            merge_host_vars(hosts, &host_vars_dir)?;
        }
    }

    let inventory: Inventory = serde_yaml::from_value(raw)
        .wrap_err_with(|| format!("Invalid inventory '{}'", inventory_path.display()))?;
    info!("Loaded {} devices", inventory.len());
    Ok(inventory)
}

/// Override top-level host keys with the contents of `host_vars/<host>.yml`
fn merge_host_vars(hosts: &mut Mapping, host_vars_dir: &Path) -> Result<()> {
    for (name, host) in hosts.iter_mut() {
        let Some(name) = name.as_str() else {
            continue;
        };
        let Some(path) = find_yaml_file(host_vars_dir, name) else {
            continue;
        };

        let overrides = read_yaml(&path)?;
        let Value::Mapping(overrides) = overrides else {
            bail!("Host vars file '{}' must contain a mapping", path.display());
        };

        if host.is_null() {
            *host = Value::Mapping(Mapping::new());
        }
        let host = host
            .as_mapping_mut()
            .ok_or_else(|| eyre!("Host '{}' must be a mapping", name))?;
        for (key, value) in overrides {
            host.insert(key, value);
        }
        debug!("Merged host vars for {} from {:?}", name, path);
    }
    Ok(())
}

/// Load one topology template by directory name.
///
/// Startup configurations are picked up from `configs/<role>.txt`.
pub fn load_template(topologies_dir: &Path, name: &str) -> Result<Template> {
    let topology_dir = topologies_dir.join(name);
    if !topology_dir.is_dir() {
        bail!("Directory \"{}\" was not found", topology_dir.display());
    }
    let topology_path = find_yaml_file(&topology_dir, "topology")
        .ok_or_else(|| eyre!("No topology.yml found in \"{}\"", topology_dir.display()))?;

    info!("Loading topology \"{}\"", name);
    let content = fs::read_to_string(&topology_path)
        .wrap_err_with(|| format!("Failed to read '{}'", topology_path.display()))?;
    let mut template: Template = serde_yaml::from_str(&content)
        .wrap_err_with(|| format!("Invalid topology '{}'", topology_path.display()))?;
    template.name = name.to_string();

    let configs_dir = topology_dir.join("configs");
    for (role, spec) in template.devices.iter_mut() {
        let startup_config_path = configs_dir.join(format!("{}.txt", role));
        if startup_config_path.is_file() {
            let startup_config = fs::read_to_string(&startup_config_path).wrap_err_with(|| {
                format!("Failed to read '{}'", startup_config_path.display())
            })?;
            spec.startup_config = Some(startup_config);
        }
    }
    template.configs_dir = Some(configs_dir);

    Ok(template)
}

/// Parse a `name:quantity` topology argument
pub fn parse_topology_arg(value: &str) -> Result<(String, u32), String> {
    let (name, quantity) = value
        .split_once(':')
        .ok_or_else(|| format!("expected <topology>:<quantity>, got '{}'", value))?;
    if name.is_empty() {
        return Err(format!("missing topology name in '{}'", value));
    }
    let quantity = quantity
        .parse::<u32>()
        .map_err(|e| format!("invalid quantity in '{}': {}", value, e))?;
    Ok((name.to_string(), quantity))
}

/// Load every requested template, keeping the request order
pub fn load_requests(
    topologies_dir: &Path,
    requested: &[(String, u32)],
) -> Result<Vec<TopologyRequest>> {
    requested
        .iter()
        .map(|(name, quantity)| {
            let template = load_template(topologies_dir, name)?;
            Ok(TopologyRequest::new(template, *quantity))
        })
        .collect()
}
