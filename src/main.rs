//! relmap CLI - walk through relationship mapping patterns over SQLite

use clap::{Parser, Subcommand};
use relmap::config::{self, RelmapConfig};
use relmap::storage::schema;
use relmap::ui::{self, Icons};
use relmap::{Mapping, SqliteStore, demo};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "relmap")]
#[command(version)]
#[command(about = "Relationship mapping walkthrough over SQLite")]
#[command(long_about = r#"
relmap declares five record kinds and the relationships between them:
  • User.phone_number      scalar, shared by many users
  • User.addresses         one-to-many, back-populates Address.user
  • User.shipping_address  many-to-many through shipping_preferences
  • User.home_address / User.delivery_address
                           two foreign keys into house_addresses

Example usage:
  relmap demo
  relmap demo --database ./relmap.db --json
  relmap relationships
"#)]
struct Cli {
    /// Enable verbose logging (every SQL statement)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to relmap.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON instead of human-readable output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Populate the store, link records, commit and print the results
    Demo {
        /// Connection string (`:memory:` or a file path)
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Print the table definitions
    Schema,

    /// Validate the mapping and list every resolved relationship
    Relationships,

    /// Show row counts for an existing database
    Stats {
        /// Connection string (`:memory:` or a file path)
        #[arg(short, long)]
        database: Option<String>,
    },

    /// Write a default relmap.toml
    InitConfig {
        /// Connection string stored in the config
        #[arg(long, default_value = ":memory:")]
        database: String,

        /// Log SQL statements by default
        #[arg(long)]
        echo: bool,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

fn main() {
    if let Err(e) = run(Cli::parse()) {
        ui::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = config::load_config(cli.config.as_deref())?.unwrap_or_default();

    // Initialize logging
    let filter = if cli.verbose || settings.echo() {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Demo { database } => {
            let url = settings.database_url(database.as_deref());
            config::ensure_db_dir(&url)?;

            let mut store = SqliteStore::open_url(&url)?;
            let mapper = Mapping::tutorial().configure()?;
            let report = demo::run(&mut store, &mapper)?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                ui::header("Relationship walkthrough");
                ui::info(Icons::DATABASE, "Database", &url);

                ui::section("Addresses");
                for row in &report.address_owners {
                    let owner = row.owner.as_ref().map_or_else(|| ui::muted("None"), ToString::to_string);
                    ui::summary_row(&row.address.to_string(), &owner);
                }

                ui::section("Numbers");
                for row in &report.phone_users {
                    println!("{} {}", Icons::PHONE, row.phone);
                    for user in &row.users {
                        println!("   {} {}", Icons::PERSON, user);
                    }
                }

                ui::section("Shipping preferences");
                for row in &report.shipping_preferences {
                    ui::summary_row(
                        &format!("user {}", row.user_id),
                        &format!("{} address {}", Icons::LINK, row.shipping_address_id),
                    );
                }

                ui::section("ZIP");
                for (label, house) in [("home", &report.home_address), ("delivery", &report.delivery_address)] {
                    let zip = house.as_ref().map_or("None".to_string(), |h| h.zip.clone());
                    ui::info(Icons::HOUSE, label, &zip);
                }

                if let Some(reason) = &report.rejected_assignment {
                    ui::section("Cardinality");
                    ui::warn(reason);
                }

                println!();
                println!("{}", ui::stats_table(&report.stats.rows()));
                ui::success("Walkthrough complete");
            }
        }

        Commands::Schema => {
            let statements: Vec<String> = schema::all_schema_statements()
                .into_iter()
                .map(|s| s.trim().to_string())
                .collect();

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&statements)?);
            } else {
                for stmt in statements {
                    println!("{};", stmt);
                    println!();
                }
            }
        }

        Commands::Relationships => {
            let mapper = Mapping::tutorial().configure()?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(mapper.relationships())?);
            } else {
                ui::header(&format!("{} relationships configured", mapper.relationships().len()));
                println!("{}", ui::relationships_table(mapper.relationships()));
            }
        }

        Commands::Stats { database } => {
            let url = settings.database_url(database.as_deref());
            let store = SqliteStore::open_url(&url)?;
            let stats = store.stats()?;

            if cli.json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                ui::info(Icons::STATS, "Database", &url);
                println!("{}", ui::stats_table(&stats.rows()));
            }
        }

        Commands::InitConfig { database, echo, force } => {
            let path = cli.config.unwrap_or_else(config::default_config_path);
            let new_config = RelmapConfig {
                database: Some(database),
                echo: Some(echo),
            };
            config::write_config(&path, &new_config, force)?;
            ui::success(&format!("Wrote {}", path.display()));
        }
    }

    Ok(())
}
