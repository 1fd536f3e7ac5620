//! Deployment report output.
//!
//! The report is what the external renderer consumes: every device the
//! allocator may have touched, the pod table and the VM/portgroup set.
//!
//! ```text
//! <output>/
//! |-- deployment.yaml   # Devices, pods and VMs
//! \-- pods.json         # Pod table only
//! ```

use chrono::{DateTime, Utc};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use indexmap::IndexMap;
use log::info;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::fabric::{Deployment, Vm};
use crate::inventory::Device;

/// Summary of one pod
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PodSummary {
    pub id: u32,
    pub template: String,
    /// Lab hostname to physical device
    pub devices: IndexMap<String, String>,
    pub vms: Vec<String>,
}

/// Everything the renderer needs after a run
#[derive(Serialize, Debug, Clone)]
pub struct DeploymentReport {
    pub generated_at: DateTime<Utc>,
    pub closed_ports: usize,
    pub pods: Vec<PodSummary>,
    pub vms: Vec<Vm>,
    pub devices: IndexMap<String, Device>,
}

impl DeploymentReport {
    pub fn from_deployment(deployment: &Deployment) -> Self {
        let pods = deployment
            .pods()
            .map(|pod| PodSummary {
                id: pod.id(),
                template: pod.template().to_string(),
                devices: pod.devices().clone(),
                vms: pod.vms().map(|vm| vm.name.clone()).collect(),
            })
            .collect();

        // Matrix and management switches first, then the pod gear
        let inventory = deployment.inventory();
        let groups = &deployment.settings().groups;
        let mut devices = IndexMap::new();
        for group in [&groups.matrix_switches, &groups.pod_mgmt, &groups.pod_gear] {
            for name in inventory.group_members(group) {
                if let Some(device) = inventory.device(&name) {
                    devices.entry(name).or_insert_with(|| device.clone());
                }
            }
        }

        Self {
            generated_at: Utc::now(),
            closed_ports: deployment.closed_ports(),
            pods,
            vms: deployment.vms().cloned().collect(),
            devices,
        }
    }
}

/// Write the report files into `output_dir`, creating it if needed
pub fn write_report(report: &DeploymentReport, output_dir: &Path) -> Result<()> {
    fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", output_dir.display()))?;

    let yaml_path = output_dir.join("deployment.yaml");
    let yaml = serde_yaml::to_string(report).wrap_err("Failed to serialize deployment report")?;
    fs::write(&yaml_path, yaml)
        .wrap_err_with(|| format!("Failed to write '{}'", yaml_path.display()))?;

    let json_path = output_dir.join("pods.json");
    let json =
        serde_json::to_string_pretty(&report.pods).wrap_err("Failed to serialize pod table")?;
    fs::write(&json_path, json)
        .wrap_err_with(|| format!("Failed to write '{}'", json_path.display()))?;

    info!("Wrote {:?} and {:?}", yaml_path, json_path);
    Ok(())
}
