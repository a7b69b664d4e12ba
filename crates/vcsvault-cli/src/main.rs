//! vcsvault CLI - encrypted repository connection strategies

use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, warn};
use uuid::Uuid;
use vcsvault_core::config::Config;
use vcsvault_core::domain::application::{Application, ApplicationRepository};
use vcsvault_core::domain::strategy::{
    ConnectionStrategy, ConnectionType, PASSWORD_PLACEHOLDER, StrategyStore,
};
use vcsvault_core::storage::Database;

#[derive(Parser)]
#[command(name = "vcsvault")]
#[command(author, version, about = "Encrypted repository connection strategies", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Quiet mode (minimal output)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Database file, overriding the configured one
    #[arg(long, global = true, value_name = "PATH")]
    database: Option<PathBuf>,
}

#[derive(Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage applications
    App {
        #[command(subcommand)]
        action: AppAction,
    },

    /// Manage repository connection strategies
    Strategy {
        #[command(subcommand)]
        action: StrategyAction,
    },

    /// Manage the master encryption key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Run health check
    Doctor,
}

#[derive(Subcommand)]
enum AppAction {
    /// Register an application under a project
    Create { project: String, name: String },
    /// List the applications of a project
    List { project: String },
    /// Show application details
    Show { id: String },
}

#[derive(Subcommand)]
enum StrategyAction {
    /// Write the strategy of an application
    ///
    /// Fields not given keep their stored value.
    Set {
        app_id: String,
        /// Connection type (https or ssh)
        #[arg(long = "type", value_name = "TYPE")]
        connection_type: Option<String>,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        default_branch: Option<String>,
        #[arg(long)]
        user: Option<String>,
        /// Password; prefer --password-stdin
        #[arg(long, conflicts_with = "password_stdin")]
        password: Option<String>,
        /// Read the password from standard input
        #[arg(long)]
        password_stdin: bool,
        /// Name of the SSH key
        #[arg(long)]
        ssh_key: Option<String>,
        /// SSH private key content
        #[arg(long, conflicts_with = "ssh_key_file")]
        ssh_key_content: Option<String>,
        /// Read the SSH private key content from a file
        #[arg(long, value_name = "PATH")]
        ssh_key_file: Option<PathBuf>,
    },
    /// Show the strategy with secrets redacted
    Show { app_id: String },
    /// Show the strategy with secrets decrypted
    Reveal { app_id: String },
}

#[derive(Subcommand)]
enum KeyAction {
    /// Create the master key if none exists
    Init,
    /// Re-seal every stored secret under a fresh master key
    Rotate,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// List all configuration values
    List,
    /// Reset configuration to defaults
    Reset,
    /// Show config file path
    Path,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_tracing(cli.quiet) {
        eprintln!("Warning: failed to initialize logging: {}", e);
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(quiet: bool) -> anyhow::Result<()> {
    let level = if quiet { "warn" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("vcsvault_core={}", level).parse()?),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!(e))
}

fn report_error(error: &anyhow::Error) {
    match error.downcast_ref::<vcsvault_core::Error>() {
        Some(e) => {
            eprintln!("Error [{}]: {}", e.code(), e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Hint: {}", suggestion);
            }
        }
        None => eprintln!("Error: {:#}", error),
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let ctx = Context {
        format: cli.format,
        quiet: cli.quiet,
        database: cli.database,
    };

    match cli.command {
        Commands::App { action } => cmd_app(&ctx, action).await,
        Commands::Strategy { action } => cmd_strategy(&ctx, action).await,
        Commands::Key { action } => cmd_key(&ctx, action).await,
        Commands::Config { action } => cmd_config(action, ctx.quiet),
        Commands::Doctor => cmd_doctor(&ctx).await,
    }
}

/// Global options shared by every command
struct Context {
    format: OutputFormat,
    quiet: bool,
    database: Option<PathBuf>,
}

impl Context {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    async fn open_database(&self, config: &Config) -> anyhow::Result<Database> {
        let mut db_config = config.database_config();
        if let Some(path) = &self.database {
            db_config.path = path.clone();
        }
        debug!(path = %db_config.path.display(), "Opening database");
        Database::new(db_config).await
    }

    async fn open_store(&self) -> anyhow::Result<(Database, StrategyStore)> {
        let config = Config::load()?;
        let db = self.open_database(&config).await?;
        let store = StrategyStore::sqlite(db.pool().clone(), config.master_key_repository());
        Ok((db, store))
    }
}

fn parse_app_id(id: &str) -> anyhow::Result<Uuid> {
    Uuid::parse_str(id.trim()).map_err(|e| {
        vcsvault_core::Error::Validation(format!("invalid application id '{}': {}", id, e)).into()
    })
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn cmd_app(ctx: &Context, action: AppAction) -> anyhow::Result<()> {
    let config = Config::load()?;
    let db = ctx.open_database(&config).await?;
    let repo = ApplicationRepository::new(db.pool().clone());

    match action {
        AppAction::Create { project, name } => {
            let app = Application::new(project, name)?;
            repo.insert(&app).await?;

            if ctx.json() {
                print_json(&json!(app))?;
            } else if ctx.quiet {
                println!("{}", app.id);
            } else {
                println!("Created application '{}' in project {}", app.name, app.project_key);
                println!("  ID: {}", app.id);
            }
        }
        AppAction::List { project } => {
            let apps = repo.list_by_project(&project).await?;

            if ctx.json() {
                print_json(&json!(apps))?;
            } else if apps.is_empty() {
                if !ctx.quiet {
                    println!("No applications in project {}.", project);
                }
            } else {
                for app in apps {
                    println!("{}  {}", app.id, app.name);
                }
            }
        }
        AppAction::Show { id } => {
            let id = parse_app_id(&id)?;
            let app = repo
                .get(id)
                .await?
                .ok_or_else(|| vcsvault_core::Error::ApplicationNotFound(id.to_string()))?;

            if ctx.json() {
                print_json(&json!(app))?;
            } else {
                println!("Application: {}", app.name);
                println!("  ID:      {}", app.id);
                println!("  Project: {}", app.project_key);
                println!("  Created: {}", app.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
    }

    db.close().await;
    Ok(())
}

async fn cmd_strategy(ctx: &Context, action: StrategyAction) -> anyhow::Result<()> {
    let (db, store) = ctx.open_store().await?;

    match action {
        StrategyAction::Set {
            app_id,
            connection_type,
            branch,
            default_branch,
            user,
            password,
            password_stdin,
            ssh_key,
            ssh_key_content,
            ssh_key_file,
        } => {
            let id = parse_app_id(&app_id)?;

            // start from what is stored so omitted fields are kept
            let mut strategy = match store.read_default(id).await {
                Ok(existing) => existing,
                Err(vcsvault_core::Error::StrategyNotFound(_)) => ConnectionStrategy {
                    password: PASSWORD_PLACEHOLDER.to_string(),
                    ..Default::default()
                },
                Err(e) => return Err(e.into()),
            };

            if let Some(connection_type) = connection_type {
                strategy.connection_type = ConnectionType::parse(&connection_type)?;
            }
            if let Some(branch) = branch {
                strategy.branch = branch;
            }
            if let Some(default_branch) = default_branch {
                strategy.default_branch = default_branch;
            }
            if let Some(user) = user {
                strategy.user = user;
            }
            if let Some(ssh_key) = ssh_key {
                strategy.ssh_key = ssh_key;
            }

            if password_stdin {
                strategy.password = read_secret_from_stdin()?;
            } else if let Some(password) = password {
                strategy.password = password;
            }

            if let Some(path) = ssh_key_file {
                strategy.ssh_key_content = read_secret_file(&path)?;
            } else if let Some(content) = ssh_key_content {
                strategy.ssh_key_content = content;
            }

            let shown = store.write(id, &strategy).await?;

            if ctx.json() {
                print_json(&json!({ "application_id": id, "strategy": shown }))?;
            } else if !ctx.quiet {
                println!("Strategy saved.");
                print_strategy(id, &shown, false);
            }
        }
        StrategyAction::Show { app_id } => {
            let id = parse_app_id(&app_id)?;
            let strategy = store.read_default(id).await?;

            if ctx.json() {
                print_json(&json!({ "application_id": id, "strategy": strategy }))?;
            } else {
                print_strategy(id, &strategy, false);
            }
        }
        StrategyAction::Reveal { app_id } => {
            let id = parse_app_id(&app_id)?;
            let strategy = store.read_clear(id).await?;

            if ctx.json() {
                print_json(&json!({ "application_id": id, "strategy": strategy }))?;
            } else {
                print_strategy(id, &strategy, true);
            }
        }
    }

    db.close().await;
    Ok(())
}

fn print_strategy(id: Uuid, strategy: &ConnectionStrategy, revealed: bool) {
    println!("Application: {}", id);
    println!("  Connection type: {}", strategy.connection_type);
    println!("  Branch:          {}", strategy.branch);
    println!("  Default branch:  {}", strategy.default_branch);
    println!("  User:            {}", strategy.user);
    println!("  Password:        {}", strategy.password);

    if strategy.connection_type.is_ssh() {
        println!("  SSH key:         {}", strategy.ssh_key);
        if revealed {
            println!("  SSH key content:");
            println!("{}", strategy.ssh_key_content);
        } else {
            println!("  SSH key content: (hidden, use `vcsvault strategy reveal`)");
        }
    }
}

fn read_secret_from_stdin() -> anyhow::Result<String> {
    let input = std::io::read_to_string(std::io::stdin())?;
    Ok(input.trim_end_matches(['\n', '\r']).to_string())
}

fn read_secret_file(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))
}

async fn cmd_key(ctx: &Context, action: KeyAction) -> anyhow::Result<()> {
    let (db, store) = ctx.open_store().await?;

    match action {
        KeyAction::Init => {
            let created = store.initialize().await?;

            if ctx.json() {
                print_json(&json!({ "created": created }))?;
            } else if !ctx.quiet {
                if created {
                    println!("Generated a new master key.");
                } else {
                    println!("Master key already present.");
                }
            }
        }
        KeyAction::Rotate => {
            let count = store.rotate_master_key().await?;

            if ctx.json() {
                print_json(&json!({ "resealed": count }))?;
            } else if !ctx.quiet {
                println!("Rotated master key; re-sealed {} strategies.", count);
            }
        }
    }

    db.close().await;
    Ok(())
}

fn cmd_config(action: ConfigAction, quiet: bool) -> anyhow::Result<()> {
    match action {
        ConfigAction::Get { key } => {
            let config = Config::load()?;
            let value = config.get(&key)?;
            println!("{}", value);
        }
        ConfigAction::Set { key, value } => {
            let mut config = Config::load()?;
            config.set(&key, &value)?;
            config.save()?;
            if !quiet {
                println!("Set {} = {}", key, value);
            }
        }
        ConfigAction::List => {
            let config = Config::load()?;
            let items = config.list()?;
            for (key, value) in items {
                println!("{} = {}", key, value);
            }
        }
        ConfigAction::Reset => {
            Config::reset()?;
            if !quiet {
                println!("Configuration reset to defaults.");
            }
        }
        ConfigAction::Path => {
            let path = Config::config_path()?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn cmd_doctor(ctx: &Context) -> anyhow::Result<()> {
    let mut checks: Vec<(&str, bool, String)> = Vec::new();

    let config = match Config::load() {
        Ok(config) => {
            checks.push(("configuration", true, "valid".to_string()));
            config
        }
        Err(e) => {
            checks.push(("configuration", false, format!("{:#}", e)));
            Config::default()
        }
    };

    match Config::config_path() {
        Ok(path) if path.exists() => checks.push(("config file", true, path.display().to_string())),
        Ok(path) => checks.push((
            "config file",
            true,
            format!("{} (using defaults)", path.display()),
        )),
        Err(e) => checks.push(("config file", false, e.to_string())),
    }

    match ctx.open_database(&config).await {
        Ok(db) => {
            match db.health_check().await {
                Ok(()) => checks.push(("database", true, db.path().display().to_string())),
                Err(e) => checks.push(("database", false, format!("{:#}", e))),
            }

            match db.migration_status().await {
                Ok(status) if status.needs_migration => checks.push((
                    "schema",
                    false,
                    format!(
                        "migrations pending (v{} -> v{})",
                        status.current_version, status.target_version
                    ),
                )),
                Ok(status) => checks.push(("schema", true, format!("v{}", status.current_version))),
                Err(e) => checks.push(("schema", false, format!("{:#}", e))),
            }

            let store = StrategyStore::sqlite(db.pool().clone(), config.master_key_repository());
            match store.has_master_key().await {
                Ok(true) => checks.push((
                    "master key",
                    true,
                    format!("present ({})", config.security.master_key_source),
                )),
                Ok(false) => checks.push((
                    "master key",
                    false,
                    "not initialized, run `vcsvault key init`".to_string(),
                )),
                Err(e) => checks.push(("master key", false, e.to_string())),
            }

            db.close().await;
        }
        Err(e) => checks.push(("database", false, format!("{:#}", e))),
    }

    let all_ok = checks.iter().all(|(_, ok, _)| *ok);
    if !all_ok {
        warn!("Health check found problems");
    }

    if ctx.json() {
        let items: Vec<_> = checks
            .iter()
            .map(|(name, ok, detail)| json!({ "check": name, "ok": ok, "detail": detail }))
            .collect();
        print_json(&json!({ "ok": all_ok, "checks": items }))?;
    } else if !ctx.quiet {
        println!("vcsvault Health Check");
        println!("=====================");
        println!();
        for (name, ok, detail) in &checks {
            let tag = if *ok { "[OK]" } else { "[!!]" };
            println!("{} {}: {}", tag, name, detail);
        }
        println!();
        if all_ok {
            println!("All checks passed!");
        } else {
            println!("Some checks failed. See above for details.");
        }
    }

    Ok(())
}
