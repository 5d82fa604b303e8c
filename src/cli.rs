use std::fmt;
use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "hfoundry",
    version,
    about = "Deploy Hugging Face models to Microsoft Foundry"
)]
pub struct Args {
    /// Path to a config file (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deploy a Hugging Face model to a managed online endpoint
    Deploy(DeployArgs),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct DeployArgs {
    /// The Hugging Face model ID (e.g., microsoft/deberta-xlarge-mnli)
    #[arg(long)]
    pub model_id: String,

    /// The Azure Machine Learning SKU to deploy the model
    #[arg(long, value_enum)]
    pub instance_type: InstanceType,

    /// The number of instances to deploy
    #[arg(long, default_value_t = 1, value_parser = parse_instance_count, allow_negative_numbers = true)]
    pub instance_count: u32,
}

/// Compute SKUs supported for managed online deployments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum InstanceType {
    #[value(name = "Standard_NC40ads_H100_v5")]
    Nc40adsH100V5,
    #[value(name = "Standard_NC80adis_H100_v5")]
    Nc80adisH100V5,
    #[value(name = "Standard_NC24ads_A100_v4")]
    Nc24adsA100V4,
    #[value(name = "Standard_NC48ads_A100_v4")]
    Nc48adsA100V4,
    #[value(name = "Standard_NC96ads_A100_v4")]
    Nc96adsA100V4,
}

impl InstanceType {
    pub const fn sku(self) -> &'static str {
        match self {
            Self::Nc40adsH100V5 => "Standard_NC40ads_H100_v5",
            Self::Nc80adisH100V5 => "Standard_NC80adis_H100_v5",
            Self::Nc24adsA100V4 => "Standard_NC24ads_A100_v4",
            Self::Nc48adsA100V4 => "Standard_NC48ads_A100_v4",
            Self::Nc96adsA100V4 => "Standard_NC96ads_A100_v4",
        }
    }
}

impl fmt::Display for InstanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sku())
    }
}

fn parse_instance_count(value: &str) -> Result<u32, String> {
    let count: i64 = value
        .parse()
        .map_err(|_| format!("'{value}' is not an integer"))?;
    if count < 1 {
        return Err("--instance-count must be >= 1".to_string());
    }
    u32::try_from(count).map_err(|_| format!("--instance-count must be <= {}", u32::MAX))
}
