use std::{path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use warden::{AuditConfig, AuditLogger, PasswordHasher};

/// Command line interface for Warden
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the audit log files
    #[arg(long, env = "WARDEN_AUDIT_DIR", default_value = "logs")]
    audit_dir: PathBuf,

    /// PBKDF2 iteration count used for hashing and verification
    #[arg(long, env = "WARDEN_PBKDF2_ITERATIONS", default_value_t = 100_000)]
    iterations: u32,

    /// Days of audit files kept before they are purged
    #[arg(long, env = "WARDEN_RETENTION_DAYS", default_value_t = 30)]
    retention_days: u32,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Hash a password for storage
    Hash { password: String },
    /// Check a password against a stored hash
    Verify { password: String, hash: String },
    /// Generate a random password
    GeneratePassword {
        #[arg(long, default_value_t = 16)]
        length: usize,
    },
    /// Inspect the audit trail
    #[command(subcommand)]
    Audit(AuditCommands),
    /// Print version information
    Version,
}

#[derive(Subcommand)]
enum AuditCommands {
    /// Show the most recent events of today
    Recent {
        #[arg(long, default_value_t = 20)]
        count: usize,
    },
    /// Search recent audit files, ignoring case
    Search {
        term: String,
        #[arg(long, default_value_t = 100)]
        max_results: usize,
    },
    /// Delete audit files older than the retention period
    Purge,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Password commands never touch the audit directory; only `audit`
/// subcommands read or purge it.
async fn run(cli: Cli) -> Result<ExitCode, String> {
    match &cli.command {
        Commands::Hash { password } => {
            let hash = hasher(&cli)?.hash(password).map_err(|e| e.to_string())?;
            println!("{hash}");
        }
        Commands::Verify { password, hash } => {
            if hasher(&cli)?.verify(password, hash) {
                println!("valid");
            } else {
                println!("invalid");
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::GeneratePassword { length } => {
            let password =
                PasswordHasher::generate_random_password(*length).map_err(|e| e.to_string())?;
            println!("{password}");
        }
        Commands::Audit(AuditCommands::Recent { count }) => {
            let audit = AuditLogger::open(audit_config(&cli)?).await;
            for line in audit.get_recent_events(*count) {
                println!("{line}");
            }
        }
        Commands::Audit(AuditCommands::Search { term, max_results }) => {
            let audit = AuditLogger::new(audit_config(&cli)?);
            for line in audit.search_historical_events(term, *max_results).await {
                println!("{line}");
            }
        }
        Commands::Audit(AuditCommands::Purge) => {
            let audit = AuditLogger::new(audit_config(&cli)?);
            let removed = audit.purge_expired_logs().await;
            println!(
                "Removed {removed} audit files older than {} days",
                audit.config().retention_days
            );
        }
        Commands::Version => println!("Warden v{}", env!("CARGO_PKG_VERSION")),
    }

    Ok(ExitCode::SUCCESS)
}

fn hasher(cli: &Cli) -> Result<PasswordHasher, String> {
    PasswordHasher::with_iterations(cli.iterations).map_err(|e| e.to_string())
}

fn audit_config(cli: &Cli) -> Result<AuditConfig, String> {
    let config = AuditConfig {
        retention_days: cli.retention_days,
        ..AuditConfig::in_dir(&cli.audit_dir)
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}
