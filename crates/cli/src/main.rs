use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pickup_core::{
    mark_refresh_fields, normalize_place, Address, AddressFields, PickupFilter, PickupRules,
    ShippingPackage, CHECKOUT_REFRESH_SCRIPT,
};
use pickup_observability::init_tracing;
use pickup_regions::RegionTable;
use serde::de::DeserializeOwned;
use serde::Serialize;

#[derive(Debug, Parser)]
#[command(name = "pickup")]
#[command(about = "Local pickup visibility rules")]
struct Cli {
    /// JSON rules file overriding the built-in places and region codes.
    #[arg(long, env = "PICKUP_RULES_PATH", global = true)]
    rules: Option<PathBuf>,

    /// JSON region code to label table.
    #[arg(long, env = "PICKUP_REGIONS_PATH", global = true)]
    regions: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the canonical comparison key for a place name.
    Normalize { text: Vec<String> },
    /// Decide whether pickup stays visible for a destination.
    Check {
        #[arg(long)]
        country: String,
        #[arg(long, default_value = "")]
        city: String,
        #[arg(long)]
        region: Option<String>,
    },
    /// Filter a shipping package read from a file or stdin.
    Filter {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Tag address fields so edits recalculate shipping.
    Fields {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Print the checkout refresh script.
    Script,
}

#[derive(Debug, Serialize)]
struct NormalizeOutput {
    raw: String,
    normalized: String,
}

fn main() -> Result<()> {
    init_tracing("pickup_cli");
    let cli = Cli::parse();

    match cli.command {
        Command::Normalize { text } => {
            let raw = text.join(" ");
            let normalized = normalize_place(&raw);
            print_json(&NormalizeOutput { raw, normalized })?;
        }
        Command::Check {
            country,
            city,
            region,
        } => {
            let filter = build_filter(cli.rules.as_deref(), cli.regions.as_deref())?;
            let destination = Address {
                country,
                city,
                region,
            };
            print_json(&filter.evaluate(&destination))?;
        }
        Command::Filter { input } => {
            let filter = build_filter(cli.rules.as_deref(), cli.regions.as_deref())?;
            let package: ShippingPackage = read_json(input.as_deref())?;
            let rates = filter.filter(package.rates, &package.destination);
            print_json(&ShippingPackage {
                destination: package.destination,
                rates,
            })?;
        }
        Command::Fields { input } => {
            let fields: AddressFields = read_json(input.as_deref())?;
            print_json(&mark_refresh_fields(fields))?;
        }
        Command::Script => print!("{CHECKOUT_REFRESH_SCRIPT}"),
    }

    Ok(())
}

fn build_filter(rules: Option<&Path>, regions: Option<&Path>) -> Result<PickupFilter> {
    let rules = match rules {
        Some(path) => Arc::new(
            PickupRules::from_json_file(path)
                .with_context(|| format!("failed loading rules from {}", path.display()))?,
        ),
        None => PickupRules::shared_default(),
    };

    let regions = match regions {
        Some(path) => RegionTable::from_json_file(path)
            .with_context(|| format!("failed loading region table from {}", path.display()))?,
        None => RegionTable::builtin(),
    };

    Ok(PickupFilter::new(rules, Arc::new(regions)))
}

fn read_json<T: DeserializeOwned>(input: Option<&Path>) -> Result<T> {
    let raw = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed reading {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed reading stdin")?;
            buffer
        }
    };

    serde_json::from_str(&raw).context("input is not valid JSON for this command")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
