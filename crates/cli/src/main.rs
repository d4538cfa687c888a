//! identdb command-line management tool.
//!
//! Operates an identdb store through the same connector an identity host
//! uses: seed the role and request-right catalogs, create and inspect users,
//! and grant or revoke permissions.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing_subscriber::EnvFilter;

use identdb_core::config::AppConfig;
use identdb_core::models::{PermissionKind, UserProperty, UserToCreate};
use identdb_core::properties;
use identdb_core::Connector;

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// identdb command-line management tool.
#[derive(Parser, Debug)]
#[command(
    name = "identdb",
    version,
    about = "Manage users, roles and request rights in an identdb store"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "./identdb.toml")]
    config: PathBuf,

    /// Host-style connection string; overrides the configuration file.
    #[arg(long, global = true)]
    connection_string: Option<String>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = "./identdb.toml")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,

    /// Create or upgrade the database schema.
    Migrate,

    /// List the properties the connector exposes.
    Properties,

    /// Manage the role and request-right catalogs.
    Catalog {
        #[command(subcommand)]
        action: CatalogAction,
    },

    /// Manage user accounts.
    User {
        #[command(subcommand)]
        action: UserAction,
    },

    /// Manage user permissions.
    Permissions {
        #[command(subcommand)]
        action: PermissionsAction,
    },
}

#[derive(Subcommand, Debug)]
enum CatalogAction {
    /// Add a role.
    AddRole {
        name: String,
        /// Explicit catalog id; assigned automatically when omitted.
        #[arg(long)]
        id: Option<i64>,
    },
    /// Add a request right.
    AddRight {
        name: String,
        #[arg(long)]
        id: Option<i64>,
    },
}

#[derive(Subcommand, Debug)]
enum UserAction {
    /// Create a user. The password is hashed before it is stored.
    Create {
        login: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        middle_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        lead: bool,
    },
    /// Show a user's properties.
    Show { login: String },
    /// Check whether a user exists.
    Exists { login: String },
    /// Update properties, given as `Name=Value` (e.g. "Last name=Smith").
    Update {
        login: String,
        #[arg(long = "set", required = true)]
        set: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum PermissionsAction {
    /// List every role and request right.
    List,
    /// Show the permissions assigned to a user.
    Show { login: String },
    /// Grant permissions given as `Role:<id>` or `Request:<id>`.
    Grant {
        login: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Revoke permissions given as `Role:<id>` or `Request:<id>`.
    Revoke {
        login: String,
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Fall back to the config's level, then to warnings only.
    let default_level = if cli.verbose {
        "debug".to_string()
    } else {
        AppConfig::load_from_file(&cli.config)
            .map(|c| c.connector.log_level)
            .unwrap_or_else(|_| "warn".into())
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&default_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Init { output } => cmd_init(&output),
        Commands::Validate => cmd_validate(&cli.config),
        Commands::Properties => cmd_properties(cli.json),
        command => {
            let connector = open_connector(&cli.config, cli.connection_string.as_deref())?;
            match command {
                Commands::Migrate => {
                    println!("{}", style::success("schema is up to date"));
                    Ok(())
                }
                Commands::Catalog { action } => cmd_catalog(&connector, action),
                Commands::User { action } => cmd_user(&connector, action, cli.json),
                Commands::Permissions { action } => cmd_permissions(&connector, action, cli.json),
                _ => unreachable!(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Open the connector named by the connection string, or by the config file.
/// Opening applies pending migrations.
fn open_connector(config_path: &Path, connection_string: Option<&str>) -> Result<Connector> {
    match connection_string {
        Some(cs) => Connector::start_up(cs).context("failed to start connector"),
        None => {
            let config = AppConfig::load_and_validate(config_path)
                .context("failed to load configuration file")?;
            Connector::open(config.connector).context("failed to open database")
        }
    }
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# identdb configuration

[connector]
provider = "sqlite"
connection = "/var/lib/identdb/identdb.db"
busy_timeout_ms = 5000
log_level = "info"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!("{}", style::success(&format!("configuration written to {}", output.display())));
    println!();
    println!("Next steps:");
    println!("  1. Point `connection` at the database file");
    println!("  2. Create the schema: identdb migrate --config {}", output.display());
    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config = AppConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    match config.connector.validate() {
        Ok(()) => println!("  [OK] All required fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Provider      : {}", config.connector.provider);
    println!("  Connection    : {}", config.connector.connection);
    println!("  Busy timeout  : {}ms", config.connector.busy_timeout_ms);
    println!("  Log level     : {}", config.connector.log_level);
    Ok(())
}

/// The property catalog is fixed, so no store is opened.
fn cmd_properties(json: bool) -> Result<()> {
    let properties = properties::catalog();
    if json {
        println!("{}", serde_json::to_string_pretty(&properties)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Name", "Description"]);
    for p in &properties {
        table.add_row(vec![Cell::new(&p.name), Cell::new(&p.description)]);
    }
    println!("{}", table);
    Ok(())
}

fn cmd_catalog(connector: &Connector, action: CatalogAction) -> Result<()> {
    let (kind, name, id) = match action {
        CatalogAction::AddRole { name, id } => (PermissionKind::Role, name, id),
        CatalogAction::AddRight { name, id } => (PermissionKind::Request, name, id),
    };
    let id = connector
        .add_catalog_entry(kind, id, &name)
        .context("failed to add catalog entry")?;
    println!("{}", style::success(&format!("added {kind}:{id} ({name})")));
    Ok(())
}

fn cmd_user(connector: &Connector, action: UserAction, json: bool) -> Result<()> {
    match action {
        UserAction::Create {
            login,
            password,
            first_name,
            middle_name,
            last_name,
            phone,
            lead,
        } => {
            let hashed_password =
                bcrypt::hash(&password, bcrypt::DEFAULT_COST).context("failed to hash password")?;
            let user = UserToCreate {
                login: login.clone(),
                hashed_password,
                first_name,
                middle_name,
                last_name,
                telephone_number: phone,
                is_lead: Some(lead),
            };
            connector
                .create_user(&user)
                .with_context(|| format!("failed to create user '{login}'"))?;
            println!("{}", style::success(&format!("created user {login}")));
        }
        UserAction::Show { login } => {
            let properties = connector
                .user_properties(&login)
                .with_context(|| format!("failed to read user '{login}'"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&properties)?);
                return Ok(());
            }
            println!("{}", style::header(&login));
            for p in &properties {
                println!("  {:<18}: {}", p.name, p.value);
            }
        }
        UserAction::Exists { login } => {
            if connector.user_exists(&login)? {
                println!("{}", style::success(&format!("{login} exists")));
            } else {
                println!("{}", style::warn(&format!("{login} does not exist")));
            }
        }
        UserAction::Update { login, set } => {
            let changes = set
                .iter()
                .map(|pair| {
                    pair.split_once('=')
                        .map(|(name, value)| UserProperty::new(name.trim(), value))
                        .with_context(|| format!("expected Name=Value, got '{pair}'"))
                })
                .collect::<Result<Vec<_>>>()?;
            connector
                .update_user_properties(&login, &changes)
                .with_context(|| format!("failed to update user '{login}'"))?;
            println!("{}", style::success(&format!("updated {} properties of {login}", changes.len())));
        }
    }
    Ok(())
}

fn cmd_permissions(connector: &Connector, action: PermissionsAction, json: bool) -> Result<()> {
    match action {
        PermissionsAction::List => {
            let permissions = connector
                .all_permissions()
                .context("failed to list permissions")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&permissions)?);
                return Ok(());
            }
            if permissions.is_empty() {
                println!("No roles or request rights defined.");
                return Ok(());
            }

            let mut table = Table::new();
            table.load_preset(UTF8_FULL);
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["Id", "Name", "Category"]);
            for p in &permissions {
                table.add_row(vec![
                    Cell::new(&p.id),
                    Cell::new(&p.name),
                    Cell::new(&p.description),
                ]);
            }
            println!("{}", table);
        }
        PermissionsAction::Show { login } => {
            let permissions = connector
                .user_permissions(&login)
                .with_context(|| format!("failed to read permissions of '{login}'"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&permissions)?);
            } else if permissions.is_empty() {
                println!("{}", style::dim(&format!("{login} has no permissions")));
            } else {
                for p in &permissions {
                    println!("  {p}");
                }
            }
        }
        PermissionsAction::Grant { login, ids } => {
            connector
                .add_user_permissions(&login, &ids)
                .with_context(|| format!("failed to grant permissions to '{login}'"))?;
            println!("{}", style::success(&format!("granted {} permission(s) to {login}", ids.len())));
        }
        PermissionsAction::Revoke { login, ids } => {
            connector
                .remove_user_permissions(&login, &ids)
                .with_context(|| format!("failed to revoke permissions from '{login}'"))?;
            println!("{}", style::success(&format!("revoked {} permission(s) from {login}", ids.len())));
        }
    }
    Ok(())
}
