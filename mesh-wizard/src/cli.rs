use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use mesh_wizard::batman::BATMAN_DEVICE;
use mesh_wizard::{DeviceRole, TrafficMode, Uplink};

#[derive(Parser, Debug)]
#[command(name = "mesh-wizard")]
#[command(about = "Reconcile EasyMesh topology intents into UCI configuration")]
pub struct Cli {
    /// Log reconciliation decisions (same as RUST_LOG=debug).
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Plan an EasyMesh topology and show the resulting changes.
    Plan(PlanArgs),
    /// Check bridged networks for unsupported non-WDS Wi-Fi clients.
    Validate(ValidateArgs),
    /// Show the changes between two config directories.
    Changes(ChangesArgs),
    /// Print parsed packages back in UCI syntax.
    Inspect(InspectArgs),
    /// Run the HaLow mesh over batman-adv.
    Batman(BatmanArgs),
}

#[derive(Parser, Debug)]
pub struct PlanArgs {
    /// Directory of UCI package files (like /etc/config).
    pub config_dir: PathBuf,
    #[arg(long, value_parser = parse_role)]
    pub role: Option<DeviceRole>,
    /// none, ethernet, ethernet-PORT or wifi-IFACE (controller only).
    #[arg(long, value_parser = parse_uplink)]
    pub uplink: Option<Uplink>,
    /// none, bridge or extender (agent only).
    #[arg(long, value_parser = parse_traffic_mode)]
    pub traffic_mode: Option<TrafficMode>,
    /// HaLow fronthaul SSID (controller only).
    #[arg(long)]
    pub ssid: Option<String>,
    /// HaLow fronthaul passphrase (controller only).
    #[arg(long)]
    pub key: Option<String>,
    /// TOML inventory of detected devices and built-in ethernet ports.
    #[arg(long)]
    pub inventory: Option<PathBuf>,
    /// Commit and write every package to this directory.
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Seed for generated addresses, pool ranges and keys.
    #[arg(long)]
    pub seed: Option<u64>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    pub config_dir: PathBuf,
    /// Only check this network. Defaults to every interface.
    #[arg(long)]
    pub network: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ChangesArgs {
    pub before: PathBuf,
    pub after: PathBuf,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    #[arg(long)]
    pub summary: bool,
    /// Paths (`package`, `package.section`, `package.section.option`) or
    /// option names to leave out.
    #[arg(long)]
    pub ignore: Vec<String>,
}

#[derive(Parser, Debug)]
pub struct InspectArgs {
    pub config_dir: PathBuf,
    #[arg(long)]
    pub package: Option<String>,
}

#[derive(Parser, Debug)]
pub struct BatmanArgs {
    pub config_dir: PathBuf,
    #[arg(long, value_enum, default_value_t = GatewayMode::Off)]
    pub gw_mode: GatewayMode,
    /// batadv interface to create or retune.
    #[arg(long, default_value = BATMAN_DEVICE)]
    pub device: String,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum GatewayMode {
    Off,
    Client,
    Server,
}

impl GatewayMode {
    pub fn as_str(self) -> &'static str {
        match self {
            GatewayMode::Off => "off",
            GatewayMode::Client => "client",
            GatewayMode::Server => "server",
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn parse_role(raw: &str) -> Result<DeviceRole, String> {
    raw.parse().map_err(|e: mesh_wizard::TopologyError| e.to_string())
}

fn parse_uplink(raw: &str) -> Result<Uplink, String> {
    raw.parse().map_err(|e: mesh_wizard::TopologyError| e.to_string())
}

fn parse_traffic_mode(raw: &str) -> Result<TrafficMode, String> {
    raw.parse().map_err(|e: mesh_wizard::TopologyError| e.to_string())
}
