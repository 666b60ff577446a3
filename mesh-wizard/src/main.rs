use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Parser;
use mesh_wizard::batman::{setup_batman_device_on_network, setup_batman_interface_on_device};
use mesh_wizard::network::network_interfaces;
use mesh_wizard::report::{render_bridge_conflict, render_changes, render_plan, render_summary};
use mesh_wizard::{
    load_inventory, validate_bridge, wifi_device_types, BridgeConflict, Inventory, PlanSummary,
    TopologyError, TopologyPlanner, WizardOptions,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uci_core::{
    diff_packages_with_options, write, ChangeEntry, DiffOptions, Package, StagedStore,
};

mod cli;
mod path_guard;

use cli::{
    BatmanArgs, ChangesArgs, Cli, Command, InspectArgs, OutputFormat, PlanArgs, ValidateArgs,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Command::Plan(args) => run_plan(args),
        Command::Validate(args) => run_validate(args),
        Command::Changes(args) => run_changes(args),
        Command::Inspect(args) => run_inspect(args),
        Command::Batman(args) => run_batman(args),
    }
}

fn load_store(dir: &Path) -> Result<StagedStore> {
    StagedStore::load_dir(dir).with_context(|| format!("failed to load config from {}", dir.display()))
}

fn run_plan(args: PlanArgs) -> Result<()> {
    if let Some(out_dir) = &args.output {
        path_guard::ensure_output_not_same(out_dir, &[&args.config_dir])?;
    }
    let mut store = load_store(&args.config_dir)?;
    let inventory = match &args.inventory {
        Some(path) => load_inventory(path)?,
        None => Inventory::default(),
    };
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let explicit = WizardOptions {
        role: args.role,
        uplink: args.uplink,
        traffic_mode: args.traffic_mode,
        ssid: args.ssid,
        key: args.key,
    };

    let mut planner = TopologyPlanner::new(&mut store, &mut rng, &inventory);
    let inferred = planner
        .load_options()
        .context("failed to read current topology")?;
    debug!(?inferred, "current topology");
    let opts = explicit.or(inferred);

    let summary = match planner.apply(&opts) {
        Ok(summary) => summary,
        Err(TopologyError::BridgeConflict(conflict)) => {
            eprintln!("{}", render_bridge_conflict(&conflict));
            bail!("plan rejected: bridge conflict on network '{}'", conflict.network);
        }
        Err(err) => return Err(err).context("failed to plan topology"),
    };

    let changes = store.changes();
    match args.format {
        OutputFormat::Text => {
            println!("{}", render_plan(&summary));
            println!("{}", render_changes(&changes));
            println!("{}", render_summary(&changes));
        }
        OutputFormat::Json => {
            let report = PlanReport {
                plan: &summary,
                changes: &changes,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if let Some(out_dir) = &args.output {
        commit_to(&mut store, out_dir)?;
    }
    Ok(())
}

fn commit_to(store: &mut StagedStore, out_dir: &Path) -> Result<()> {
    store.commit();
    store
        .write_dir(out_dir)
        .with_context(|| format!("failed to write config to {}", out_dir.display()))
}

fn run_validate(args: ValidateArgs) -> Result<()> {
    let store = load_store(&args.config_dir)?;
    let networks = match args.network {
        Some(network) => vec![network],
        None => network_interfaces(&store),
    };
    let types = wifi_device_types(&store);
    let conflicts: Vec<BridgeConflict> = networks
        .iter()
        .filter_map(|network| validate_bridge(&store, network, &types).err())
        .collect();

    match args.format {
        OutputFormat::Text => {
            for conflict in &conflicts {
                println!("{}", render_bridge_conflict(conflict));
            }
            if conflicts.is_empty() {
                println!("ok: {} network(s) checked", networks.len());
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&conflicts)?),
    }

    if !conflicts.is_empty() {
        bail!("validate failed: {} bridge conflict(s)", conflicts.len());
    }
    Ok(())
}

fn run_changes(args: ChangesArgs) -> Result<()> {
    let before = load_store(&args.before)?;
    let after = load_store(&args.after)?;
    let opts = DiffOptions {
        ignore_paths: args.ignore,
    };

    let mut names: Vec<&str> = before
        .packages()
        .chain(after.packages())
        .map(|p| p.name.as_str())
        .collect();
    names.sort_unstable();
    names.dedup();

    let mut entries = Vec::new();
    for name in names {
        let empty = Package::new(name);
        let old = before.package(name).unwrap_or(&empty);
        let new = after.package(name).unwrap_or(&empty);
        entries.extend(diff_packages_with_options(old, new, &opts));
    }

    if args.summary {
        println!("{}", render_summary(&entries));
        return Ok(());
    }
    match args.format {
        OutputFormat::Text => println!("{}", render_changes(&entries)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
    }
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    let store = load_store(&args.config_dir)?;
    let packages: Vec<&Package> = match &args.package {
        Some(name) => vec![store
            .package(name)
            .with_context(|| format!("package '{name}' not found"))?],
        None => store.packages().collect(),
    };

    for package in packages {
        println!("# {}", package.name);
        print!("{}", write(package));
        println!();
    }
    Ok(())
}

fn run_batman(args: BatmanArgs) -> Result<()> {
    if let Some(out_dir) = &args.output {
        path_guard::ensure_output_not_same(out_dir, &[&args.config_dir])?;
    }
    let mut store = load_store(&args.config_dir)?;

    let device = setup_batman_device_on_network(&mut store, args.gw_mode.as_str(), &args.device)
        .context("failed to set up batman device")?;
    let hardif = setup_batman_interface_on_device(&mut store, &device)
        .context("failed to attach batman hard interface")?;
    debug!(%device, %hardif, "batman configured");

    let changes = store.changes();
    match args.format {
        OutputFormat::Text => {
            println!("{}", render_changes(&changes));
            println!("{}", render_summary(&changes));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&changes)?),
    }

    if let Some(out_dir) = &args.output {
        commit_to(&mut store, out_dir)?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct PlanReport<'a> {
    plan: &'a PlanSummary,
    changes: &'a [ChangeEntry],
}
