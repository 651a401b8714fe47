//! autofocus-probe - drive an autofocus implementation from the command line.
//!
//! Runs against the simulated device-control core (a `ZStage` device bound as
//! the autofocus device) or the simulated software sweep.
//!
//! ```bash
//! autofocus-probe --variant hardware list
//! autofocus-probe --variant software set StepSize 0.5
//! autofocus-probe focus --incremental
//! autofocus-probe continuous on
//! RUST_LOG=autofocus_core=debug autofocus-probe --json get Offset
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use autofocus_core::config::{AutofocusConfig, DEFAULT_CONFIG_FILE};
use autofocus_core::mock::{SimulatedCore, SweepAlgorithm};
use autofocus_core::{
    logging, AutofocusCapability, AutofocusHandle, HardwareProxyAutofocus, SoftwareAutofocus,
};

#[derive(Debug, Parser)]
#[command(name = "autofocus-probe", version, about = "Exercise an autofocus implementation")]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Which implementation to drive
    #[arg(long, value_enum, default_value_t = Variant::Hardware)]
    variant: Variant,

    /// Print properties as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Variant {
    Hardware,
    Software,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Toggle {
    On,
    Off,
    Status,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List adjustable property names, or every property with --all
    List {
        #[arg(long)]
        all: bool,
    },
    /// Show one property
    Get { name: String },
    /// Write one property value
    Set { name: String, value: String },
    /// Run a focus search and print the score
    Focus {
        #[arg(long)]
        incremental: bool,
    },
    /// Print the current focus score
    Score,
    /// Control continuous focus
    Continuous {
        #[arg(value_enum)]
        mode: Toggle,
    },
    /// Persist property values
    Save,
    /// Print the effective configuration as TOML
    Config,
}

fn build(variant: Variant, config: &AutofocusConfig) -> Result<AutofocusHandle> {
    let handle = match variant {
        Variant::Hardware => {
            let core = Arc::new(SimulatedCore::demo());
            let proxy = HardwareProxyAutofocus::connect(core)
                .context("binding the core's autofocus device")?
                .with_selection_lock(config.proxy.lock_selection);
            AutofocusHandle::from(proxy)
        }
        Variant::Software => {
            let settings = config
                .settings
                .open()
                .context("opening the settings store")?;
            AutofocusHandle::from(SoftwareAutofocus::new(SweepAlgorithm::default(), settings))
        }
    };
    Ok(handle)
}

fn run(cli: Cli, config: AutofocusConfig) -> Result<()> {
    let mut af = build(cli.variant, &config)?;
    af.initialize()?;
    tracing::info!(variant = af.variant(), name = %af.name(), "Autofocus ready");

    match cli.command {
        Command::List { all: false } => {
            for name in af.property_names()? {
                println!("{name}");
            }
        }
        Command::List { all: true } => {
            let items = af.properties()?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&items)?);
            } else {
                for item in items {
                    println!("{item}");
                }
            }
        }
        Command::Get { name } => {
            let item = af.property(&name)?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&item)?);
            } else {
                println!("{item}");
            }
        }
        Command::Set { name, value } => {
            af.set_property_value(&name, &value)?;
            af.apply_settings()?;
            af.save_settings()?;
            println!("{}", af.property(&name)?);
        }
        Command::Focus { incremental } => {
            let score = if incremental {
                af.incremental_focus()?
            } else {
                af.full_focus()?
            };
            println!("score {score:.4} ({} images)", af.number_of_images()?);
            println!("{}", af.verbose_status());
        }
        Command::Score => println!("{:.4}", af.current_focus_score()?),
        Command::Continuous { mode } => {
            match mode {
                Toggle::On => af.enable_continuous_focus(true)?,
                Toggle::Off => af.enable_continuous_focus(false)?,
                Toggle::Status => {}
            }
            println!(
                "enabled {}, locked {}",
                af.is_continuous_focus_enabled()?,
                af.is_continuous_focus_locked()?
            );
        }
        Command::Save => {
            af.save_settings()?;
            af.dump_properties("Saved autofocus properties");
        }
        Command::Config => print!("{}", config.to_toml()?),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AutofocusConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    logging::init(&config.logging);

    run(cli, config)
}
