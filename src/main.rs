//! Binary entry point for haven.
//!
//! Operator CLI for the emergency session core: send alerts, manage trusted
//! contacts, file incident reports and rehearse a full SOS session.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
// Allow needless_pass_by_value for command functions
#![allow(clippy::needless_pass_by_value)]
// Allow multiple crate versions from transitive dependencies
#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use haven::cli::{
    AlertCommand, ConfigCommand, ContactsAction, ContactsCommand, DrillCommand, ReportCommand,
};
use haven::config::{HavenConfig, StoreBackend};
use haven::models::{Location, NewIncidentReport};
use haven::observability;
use haven::platform::Platform;
use haven::services::ServiceContainer;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Haven - emergency session core for a personal safety app.
#[derive(Parser)]
#[command(name = "haven")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true, env = "HAVEN_CONFIG")]
    config: Option<PathBuf>,

    /// Override the row store backend (memory or supabase).
    #[arg(long, global = true)]
    store: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Send an emergency alert for a user at the given coordinates.
    Alert {
        /// User whose contacts are alerted.
        #[arg(short, long)]
        user: String,

        /// Latitude in decimal degrees.
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,

        /// Longitude in decimal degrees.
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,

        /// Alert text; the map link is appended.
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Manage trusted contacts.
    Contacts {
        /// Owner of the contacts.
        #[arg(short, long)]
        user: String,

        #[command(subcommand)]
        action: ContactsCli,
    },

    /// Submit an incident report.
    Report {
        /// Reporting user.
        #[arg(short, long)]
        user: String,

        /// Short title.
        #[arg(short, long)]
        title: String,

        /// What happened.
        #[arg(short, long)]
        description: String,

        /// Where it happened.
        #[arg(short, long, default_value = "")]
        location: String,

        /// Date of the incident (YYYY-MM-DD); defaults to today.
        #[arg(long, default_value = "")]
        date: String,
    },

    /// Run a full simulated SOS session against the configured backends.
    Drill {
        /// User the session runs for.
        #[arg(short, long)]
        user: String,

        /// Simulated latitude.
        #[arg(long, default_value = "12.83", allow_hyphen_values = true)]
        lat: f64,

        /// Simulated longitude.
        #[arg(long, default_value = "77.65", allow_hyphen_values = true)]
        lng: f64,

        /// How long the session stays active.
        #[arg(long, default_value = "5")]
        hold_secs: u64,

        /// Contact to add first, as NAME=PHONE (repeatable).
        #[arg(long = "contact")]
        contacts: Vec<String>,

        /// Directory the recording is saved to.
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },

    /// Show configuration.
    Config {
        /// Show the effective configuration.
        #[arg(long)]
        show: bool,
    },
}

/// Contact subcommands.
#[derive(Subcommand)]
enum ContactsCli {
    /// List contacts.
    List,

    /// Add a contact.
    Add {
        /// Display name.
        #[arg(short, long)]
        name: String,

        /// Phone number.
        #[arg(short, long)]
        phone: String,

        /// Relationship label.
        #[arg(short, long)]
        relationship: Option<String>,
    },

    /// Remove a contact by ID.
    Remove {
        /// Contact row ID.
        id: String,
    },
}

/// Main entry point.
fn main() -> ExitCode {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let (mut config, source) = match load_config(cli.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            return ExitCode::FAILURE;
        },
    };
    if let Some(store) = cli.store.as_deref() {
        config = config.with_store_backend(StoreBackend::parse(store));
    }

    if let Err(e) = observability::init_from_settings(&config.logging, cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli.command, config, source) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        },
    }
}

/// Runs the selected command.
fn run_command(command: Commands, config: HavenConfig, source: Option<PathBuf>) -> Result<()> {
    match command {
        Commands::Alert {
            user,
            lat,
            lng,
            message,
        } => {
            let container = build_container(&config, Location::new(lat, lng))?;
            let output = AlertCommand::new(user, lat, lng)?
                .with_message(message)
                .run(&container);
            print!("{output}");
            Ok(())
        },

        Commands::Contacts { user, action } => {
            let container = build_container(&config, Location::new(0.0, 0.0))?;
            let action = match action {
                ContactsCli::List => ContactsAction::List,
                ContactsCli::Add {
                    name,
                    phone,
                    relationship,
                } => ContactsAction::Add {
                    name,
                    phone,
                    relationship,
                },
                ContactsCli::Remove { id } => ContactsAction::Remove { id },
            };
            print!("{}", ContactsCommand::new(user, action).run(&container)?);
            Ok(())
        },

        Commands::Report {
            user,
            title,
            description,
            location,
            date,
        } => {
            let container = build_container(&config, Location::new(0.0, 0.0))?;
            let report = NewIncidentReport {
                title,
                description,
                location,
                incident_date: date,
            };
            print!("{}", ReportCommand::new(user, report).run(&container)?);
            Ok(())
        },

        Commands::Drill {
            user,
            lat,
            lng,
            hold_secs,
            contacts,
            output_dir,
        } => cmd_drill(
            config,
            &user,
            Location::checked(lat, lng)?,
            Duration::from_secs(hold_secs),
            contacts,
            output_dir,
        ),

        Commands::Config { show } => {
            if show {
                print!("{}", ConfigCommand::new(source).run(&config));
            } else {
                println!("Use --show to display the effective configuration");
            }
            Ok(())
        },
    }
}

/// Runs a drill on a dedicated runtime.
fn cmd_drill(
    mut config: HavenConfig,
    user: &str,
    location: Location,
    hold: Duration,
    contacts: Vec<String>,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let seeds = contacts
        .iter()
        .map(|c| parse_contact(c))
        .collect::<Result<Vec<_>>>()?;
    if let Some(dir) = output_dir {
        config = config.with_download_dir(dir);
    }

    let container = build_container(&config, location)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start runtime")?;
    let drill = DrillCommand::new(user, hold).with_seed_contacts(seeds);
    let report = runtime.block_on(drill.run(&container))?;
    print!("{}", report.render());
    Ok(())
}

/// Builds the service container on a simulated platform.
fn build_container(config: &HavenConfig, location: Location) -> Result<ServiceContainer> {
    ServiceContainer::from_config(config, Platform::simulated(location))
        .context("failed to initialize backends")
}

/// Parses `NAME=PHONE`.
fn parse_contact(raw: &str) -> Result<(String, String)> {
    let Some((name, phone)) = raw.split_once('=') else {
        bail!("contact '{raw}' must be NAME=PHONE");
    };
    Ok((name.trim().to_string(), phone.trim().to_string()))
}

/// Loads configuration, returning the file it came from.
fn load_config(path: Option<&std::path::Path>) -> Result<(HavenConfig, Option<PathBuf>)> {
    if let Some(config_path) = path {
        let config = HavenConfig::load_from_file(config_path)
            .with_context(|| format!("reading {}", config_path.display()))?;
        return Ok((config, Some(config_path.to_path_buf())));
    }

    let source = HavenConfig::candidate_paths().into_iter().find(|p| p.exists());
    Ok((HavenConfig::load_default(), source))
}
