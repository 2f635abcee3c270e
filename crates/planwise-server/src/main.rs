mod config;
mod routes;
mod serve_cmd;
#[cfg(test)]
mod test_util;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use planwise_core::llm::{CompletionClient, GeminiBackend};
use planwise_db::config::DbConfig;
use planwise_db::pool;

use config::PlanwiseConfig;

#[derive(Parser)]
#[command(name = "planwise", about = "Task and calendar planner with AI-assisted workflows")]
struct Cli {
    /// Database URL (overrides PLANWISE_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a planwise config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Initialize the planwise database (requires config file or env vars)
    DbInit,
    /// Run the HTTP API
    Serve {
        /// Address to bind (overrides [server].bind)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides [server].port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Send one prompt through the model fallback chain and print the answer
    Ask {
        /// Prompt text
        prompt: String,
    },
}

/// Execute the `planwise init` command: write the config file.
fn cmd_init(db_url: &str, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let cfg = config::ConfigFile {
        database: config::DatabaseSection {
            url: db_url.to_string(),
        },
        ai: config::AiSection::default(),
        server: config::ServerSection::default(),
        app: config::AppSection::default(),
    };

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  ai.models = {}", cfg.ai.models.join(", "));
    println!("  server = {}:{}", cfg.server.bind, cfg.server.port);
    println!();
    println!("Set GEMINI_API_KEY (or [ai].api_key) before running `planwise serve`.");
    println!("Next: run `planwise db-init` to create and migrate the database.");

    Ok(())
}

/// Execute the `planwise db-init` command: create database and run migrations.
async fn cmd_db_init(cli_db_url: Option<&str>) -> anyhow::Result<()> {
    let resolved = PlanwiseConfig::resolve(cli_db_url)?;

    println!("Initializing planwise database...");

    pool::ensure_database_exists(&resolved.db_config).await?;
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    pool::run_migrations(&db_pool).await?;

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;

    println!("planwise db-init complete.");
    Ok(())
}

fn completion_client(resolved: &PlanwiseConfig) -> anyhow::Result<CompletionClient> {
    let backend = GeminiBackend::new(resolved.require_api_key()?);
    Ok(CompletionClient::new(
        Arc::new(backend),
        resolved.completion.clone(),
    ))
}

/// Execute the `planwise serve` command.
async fn cmd_serve(
    cli_db_url: Option<&str>,
    bind: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let resolved = PlanwiseConfig::resolve(cli_db_url)?;
    let completions = completion_client(&resolved)?;

    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let state = serve_cmd::AppState::new(db_pool.clone(), completions, &resolved.time_zone);

    let bind = bind.unwrap_or(resolved.bind);
    let port = port.unwrap_or(resolved.port);
    let result = serve_cmd::run_serve(state, &bind, port).await;

    db_pool.close().await;
    result
}

/// Execute the `planwise ask` command.
async fn cmd_ask(cli_db_url: Option<&str>, prompt: &str) -> anyhow::Result<()> {
    let resolved = PlanwiseConfig::resolve(cli_db_url)?;
    let completions = completion_client(&resolved)?;

    let completion = completions.complete(prompt).await?;
    println!("[{}]", completion.model);
    println!("{}", completion.text);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { db_url, force } => {
            cmd_init(&db_url, force)?;
        }
        Commands::DbInit => {
            cmd_db_init(cli.database_url.as_deref()).await?;
        }
        Commands::Serve { bind, port } => {
            cmd_serve(cli.database_url.as_deref(), bind, port).await?;
        }
        Commands::Ask { prompt } => {
            cmd_ask(cli.database_url.as_deref(), &prompt).await?;
        }
    }

    Ok(())
}
