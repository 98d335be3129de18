//! Greeter CLI
//!
//! Serves and administers a greeting registry kept in a local directory.
//!
//! # Commands
//!
//! - `hello` - Resolve a greeting, recording what was served
//! - `program` - Program a greeting override
//! - `show` - Show the configured and served greeting for a name
//! - `list` - List the entries of a view

mod commands;

use clap::{Parser, Subcommand};
use greeter_core::{RegistryConfig, RootInitPolicy, View};
use greeter_service::ServiceConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Greeting registry tools.
#[derive(Parser)]
#[command(name = "greeter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the registry directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    /// Keep serving when the registry roots cannot be created
    #[arg(global = true, long)]
    lenient: bool,

    /// Flush commits instead of syncing them to disk
    #[arg(global = true, long)]
    no_sync: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the greeting for a name
    Hello {
        /// Name to greet
        name: String,
    },

    /// Program a greeting override
    Program {
        /// Name the override applies to
        name: String,

        /// Greeting to serve for the name
        greeting: String,
    },

    /// Show the greetings stored for a name
    Show {
        /// Name to look up
        name: String,

        /// Only this view (configuration, operational)
        #[arg(long)]
        view: Option<View>,
    },

    /// List the entries of a view
    List {
        /// View to list (configuration, operational)
        #[arg(long, default_value = "operational")]
        view: View,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

impl Cli {
    fn service_config(&self) -> ServiceConfig {
        let policy = if self.lenient {
            RootInitPolicy::Lenient
        } else {
            RootInitPolicy::Strict
        };
        ServiceConfig::new().with_registry(
            RegistryConfig::new()
                .sync_on_commit(!self.no_sync)
                .root_init(policy),
        )
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.service_config();
    match cli.command {
        Commands::Hello { name } => {
            let path = cli.path.ok_or("Registry path required for hello")?;
            commands::hello::run(&path, config, &name)?;
        }
        Commands::Program { name, greeting } => {
            let path = cli.path.ok_or("Registry path required for program")?;
            commands::program::run(&path, config, &name, &greeting)?;
        }
        Commands::Show { name, view } => {
            let path = cli.path.ok_or("Registry path required for show")?;
            commands::show::run(&path, config, &name, view)?;
        }
        Commands::List { view, format } => {
            let path = cli.path.ok_or("Registry path required for list")?;
            commands::list::run(&path, config, view, &format)?;
        }
        Commands::Version => {
            println!("Greeter CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Greeter Core v{}", greeter_core::VERSION);
        }
    }

    Ok(())
}
