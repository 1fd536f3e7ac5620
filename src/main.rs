use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::path::PathBuf;

use lab_fabric::fabric::Deployment;
use lab_fabric::inventory::annotate_infra_descriptions;
use lab_fabric::loader::{self, parse_topology_arg};
use lab_fabric::report::{write_report, DeploymentReport};
use lab_fabric::settings::load_settings;

/// Allocate lab devices, matrix ports and VLANs to topology pods
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the inventory YAML file
    #[arg(short, long)]
    inventory: PathBuf,

    /// Topology name and quantity separated by ':', e.g. --topologies advanced:2 simple:2
    #[arg(short, long, num_args = 1.., required = true, value_parser = parse_topology_arg)]
    topologies: Vec<(String, u32)>,

    /// Directory holding one sub-directory per topology template
    #[arg(short = 'd', long, default_value = "topologies")]
    topologies_dir: PathBuf,

    /// Optional settings YAML file
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Output directory for the deployment report
    #[arg(short, long, default_value = "lab_output")]
    output: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or(args.log_level.as_str())).init();

    info!("Starting lab fabric allocation");
    info!("Inventory file: {:?}", args.inventory);
    info!("Topologies: {:?}", args.topologies);

    let settings = load_settings(args.settings.as_deref())?;
    let mut inventory = loader::load_inventory(&args.inventory)?;
    let requests = loader::load_requests(&args.topologies_dir, &args.topologies)?;

    let annotated = annotate_infra_descriptions(&mut inventory, &settings.groups.infra)
        .wrap_err("Failed to annotate infra descriptions")?;
    info!("Annotated {} infra port descriptions", annotated);

    let deployment = Deployment::new(inventory, &requests, settings).wrap_err("Allocation failed")?;
    info!(
        "Allocated {} pods with {} VMs",
        deployment.pods().count(),
        deployment.vms().count()
    );

    let report = DeploymentReport::from_deployment(&deployment);
    write_report(&report, &args.output)?;

    info!("Allocation completed successfully");
    Ok(())
}
