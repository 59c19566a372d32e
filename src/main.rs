mod api;
mod cli;
mod config;
mod dates;
mod db;
mod model;
mod nutrition;
mod provision;
mod scheduler;
mod stats;

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::config::Config;
use crate::db::Database;
use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Service => run_service(load_config()?).await,
        Commands::Provision { date } => handle_provision(date),
        Commands::Recalculate { user, date } => handle_recalculate(&user, date),
        Commands::Status => handle_status(),
        Commands::Doctor => handle_doctor(),
        Commands::Config { command } => handle_config_command(command),
    }
}

async fn run_service(config: Config) -> Result<()> {
    config.ensure_bootstrap_files()?;
    let _ = Database::open(&config.db_path)?;

    let shared_config = Arc::new(config);
    let scheduler_config = Arc::clone(&shared_config);
    let schedule_fallback = Arc::clone(&shared_config);
    let api_config = Arc::clone(&shared_config);

    info!("VitaTrack service started");

    tokio::select! {
        scheduler_result = scheduler::run_daily_scheduler(move || {
            let provision_time = Config::load()
                .map(|runtime| runtime.provision_time)
                .unwrap_or_else(|_| schedule_fallback.provision_time.clone());

            scheduler::cron_from_provision_time(&provision_time)
        }, move |day| {
            let config = Arc::clone(&scheduler_config);
            async move {
                let database = Database::open(&config.db_path)?;
                provision::run_provisioning(&database, day).map(|_| ())
            }
        }) => {
            scheduler_result?;
        }
        api_result = api::run_server(api_config) => {
            api_result?;
        }
        _ = signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    Ok(())
}

fn handle_provision(date: Option<String>) -> Result<()> {
    let config = load_config()?;
    let day = parse_optional_date(date)?;
    let database = Database::open(&config.db_path)?;

    let summary = provision::run_provisioning(&database, day)?;

    println!("Provisioning run for {}", summary.day);
    println!("- users seen: {}", summary.users_seen);
    println!("- users skipped: {}", summary.users_skipped);
    println!("- records created: {}", summary.records_created);
    println!("- users with failures: {}", summary.users_failed);

    Ok(())
}

fn handle_recalculate(user: &str, date: Option<String>) -> Result<()> {
    let config = load_config()?;
    let day = parse_optional_date(date)?;
    let database = Database::open(&config.db_path)?;

    let resolved = database
        .user_by_identifier(user)?
        .with_context(|| format!("User not found: {user}"))?;

    match stats::recalculate(&database, &resolved.identifier_set(), day)? {
        Some(statistic) => {
            println!("Statistic recalculated for {} on {day}", resolved.uid);
            println!("{}", serde_json::to_string_pretty(&statistic)?);
        }
        None => println!("No daily statistic provisioned for {} on {day}", resolved.uid),
    }

    Ok(())
}

fn handle_status() -> Result<()> {
    let config = load_config()?;
    let database = Database::open(&config.db_path)?;

    println!("VitaTrack status");
    println!("- db_path: {}", config.db_path.display());
    println!("- api_port: {}", config.api_port);
    println!("- provision_time (UTC): {}", config.provision_time);
    println!("- users: {}", database.table_count("users")?);
    println!(
        "- active_subscriptions: {}",
        database.count_active_subscriptions()?
    );
    for collection in db::DailyCollection::ALL {
        println!(
            "- {}: {}",
            collection.table(),
            database.table_count(collection.table())?
        );
    }

    Ok(())
}

fn handle_doctor() -> Result<()> {
    let config_path = Config::config_path();
    let mut issues = Vec::new();

    if config_path.exists() {
        println!("[OK] config.json found: {}", config_path.display());
    } else {
        println!("[WARN] config.json not found: {}", config_path.display());
        issues.push("config missing");
    }

    let config = load_config()?;

    match Database::open(&config.db_path) {
        Ok(_) => println!("[OK] SQLite reachable: {}", config.db_path.display()),
        Err(error) => {
            println!("[WARN] SQLite check failed: {error}");
            issues.push("db unreachable");
        }
    }

    if let Err(error) = config.parse_provision_time() {
        println!("[WARN] invalid provision_time setting: {error}");
        issues.push("invalid provision_time");
    } else {
        println!("[OK] provision_time format valid: {}", config.provision_time);
    }

    if issues.is_empty() {
        println!("doctor result: no issues");
    } else {
        println!("doctor result: {} warning(s)", issues.len());
    }

    Ok(())
}

fn handle_config_command(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Set { key, value } => {
            let mut config = load_config()?;
            config.set_value(&key, &value)?;
            config.ensure_bootstrap_files()?;
            config.save()?;

            println!("Config saved: {key} = {value}");
            Ok(())
        }
        ConfigCommands::Get { key } => {
            let config = load_config()?;
            let Some(value) = config.get_value(&key) else {
                bail!("Unsupported config key: {key}");
            };

            println!("{value}");
            Ok(())
        }
    }
}

fn parse_optional_date(input: Option<String>) -> Result<NaiveDate> {
    input
        .as_deref()
        .map(|date| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .with_context(|| format!("Invalid date format: {date}. Example: 2026-02-18"))
        })
        .transpose()?
        .map_or_else(|| Ok(Utc::now().date_naive()), Ok)
}

fn load_config() -> Result<Config> {
    Config::load().or_else(|_| {
        let config = Config::default();
        config.ensure_bootstrap_files()?;
        config.save()?;
        Ok(config)
    })
}
