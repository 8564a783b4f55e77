//! WM Funnel CLI
//!
//! Command-line interface for funnel operations:
//! - Classify landing URLs and replay visit sequences
//! - Record and inspect server-side visitor attribution
//! - Grant and revoke the admin role
//! - Generate a default config file

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use wm_funnel::attribution::{
    classify, is_meaningful_touch, AttributionSnapshot, AttributionTracker, LandingPage,
    MemorySlotStore, ResolvedAttribution,
};
use wm_funnel::config::{generate_default_config, Config};
use wm_funnel::db::{Database, ADMIN_ROLE};
use wm_funnel::logging::init_logging;

#[derive(Parser)]
#[command(name = "wm-funnel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Lead funnel attribution and admin tool")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: standard locations, then environment)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format (table, json)
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify a landing URL
    Classify {
        /// Landing URL or path with query string
        url: String,
    },

    /// Replay a sequence of visits and show the resulting slots
    Simulate {
        /// Landing URLs, in visit order
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Record a visit for a visitor in the database
    Visit {
        /// Visitor id
        #[arg(long)]
        visitor: String,
        /// Landing URL
        url: String,
    },

    /// Show a visitor's stored attribution
    Show {
        /// Visitor id
        #[arg(long)]
        visitor: String,
    },

    /// Grant the admin role to a user
    GrantAdmin {
        /// User id from the auth service
        user_id: String,
    },

    /// Revoke the admin role from a user
    RevokeAdmin {
        /// User id from the auth service
        user_id: String,
    },

    /// Generate default config file
    InitConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let json = cli.format.eq_ignore_ascii_case("json");

    match cli.command {
        Commands::Classify { url } => {
            let landing = LandingPage::parse(&url);
            let params = landing.params();
            let channel = classify(&params);
            let meaningful = is_meaningful_touch(&params);
            let snapshot = AttributionSnapshot::capture(&params, &landing, Utc::now());

            if json {
                let out = serde_json::json!({
                    "channel": channel,
                    "meaningful": meaningful,
                    "snapshot": snapshot,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                println!("Channel:     {}", channel);
                println!("Meaningful:  {}", if meaningful { "yes" } else { "no" });
                println!("Landing:     {}", snapshot.landing_page);
                print_campaign(&snapshot);
            }
        }

        Commands::Simulate { urls } => {
            let store = MemorySlotStore::new();
            let tracker = AttributionTracker::new();
            let mut resolved = None;

            for (i, url) in urls.iter().enumerate() {
                let update = tracker.record_visit(&store, "simulation", url)?;
                if !json {
                    println!(
                        "{:>2}. {:<16} {:<11} {}",
                        i + 1,
                        update.channel.to_string(),
                        if update.meaningful { "meaningful" } else { "-" },
                        url
                    );
                }
                resolved = Some(update.state.resolved());
            }

            if let Some(resolved) = resolved {
                print_slots(&resolved, json)?;
            }
        }

        Commands::Visit { visitor, url } => {
            let db = open_database(cli.config.as_deref())?;
            let update = db
                .record_visit(&AttributionTracker::new(), &visitor, &url)
                .await?;

            if !json {
                println!(
                    "Recorded {} visit for {} (first touch {})",
                    update.channel,
                    visitor,
                    if update.changes.first_touch {
                        "written"
                    } else {
                        "kept"
                    }
                );
            }
            print_slots(&update.state.resolved(), json)?;
        }

        Commands::Show { visitor } => {
            let db = open_database(cli.config.as_deref())?;
            let state = db.visitor_attribution(&visitor).await?;

            if state.is_empty() && !json {
                println!("No attribution recorded for {}", visitor);
                return Ok(());
            }
            print_slots(&state.resolved(), json)?;
        }

        Commands::GrantAdmin { user_id } => {
            let db = open_database(cli.config.as_deref())?;
            if db.grant_role(&user_id, ADMIN_ROLE).await? {
                println!("Granted admin to {}", user_id);
            } else {
                println!("{} is already an admin", user_id);
            }
        }

        Commands::RevokeAdmin { user_id } => {
            let db = open_database(cli.config.as_deref())?;
            if db.revoke_role(&user_id, ADMIN_ROLE).await? {
                println!("Revoked admin from {}", user_id);
            } else {
                println!("{} was not an admin", user_id);
            }
        }

        Commands::InitConfig { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, &content)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

fn open_database(config_path: Option<&Path>) -> anyhow::Result<Database> {
    let config = Config::resolve(config_path).context("Failed to load config")?;
    init_logging(&config.logging);

    Database::open(Path::new(&config.database.path))
        .with_context(|| format!("Failed to open database at {}", config.database.path))
}

fn print_campaign(snapshot: &AttributionSnapshot) {
    let fields = [
        ("utm_source", snapshot.utm_source.as_deref()),
        ("utm_medium", snapshot.utm_medium.as_deref()),
        ("utm_campaign", snapshot.utm_campaign.as_deref()),
        ("gclid", snapshot.gclid.as_deref()),
        ("fbc", snapshot.fbc.as_deref()),
        ("msclkid", snapshot.msclkid.as_deref()),
    ];
    for (name, value) in fields {
        if let Some(value) = value {
            println!("  {:<13} {}", name, value);
        }
    }
}

fn print_slots(resolved: &ResolvedAttribution, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(resolved)?);
        return Ok(());
    }

    println!();
    println!("{:<16} {:<16} {}", "Slot", "Channel", "Landing page");
    println!("{}", "-".repeat(60));
    for (slot, snapshot) in [
        ("first_touch", &resolved.first_touch),
        ("last_touch", &resolved.last_touch),
        ("last_non_direct", &resolved.last_non_direct),
    ] {
        println!(
            "{:<16} {:<16} {}",
            slot,
            snapshot.channel.to_string(),
            snapshot.landing_page
        );
        print_campaign(snapshot);
    }
    Ok(())
}
