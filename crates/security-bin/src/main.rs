// ============================
// crates/security-bin/src/main.rs
// ============================
//! Operator tooling for the security engine: secrets, config checks and token
//! inspection.
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use pacta_security::{
    auth::{hash_password, token_generator::generate_secure_token_with_size, TokenIssuer},
    clock::system_clock,
    config::{Settings, DEFAULT_CONFIG_FILE, MIN_SECRET_LEN},
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "pacta-security", version, about = "Pacta security engine tooling")]
struct Cli {
    /// Configuration file merged with PACTA_* environment variables
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a fresh random signing secret
    GenerateSecret {
        /// Entropy in bytes
        #[arg(long, default_value_t = 48)]
        bytes: usize,
    },
    /// Load and validate the configuration, exiting non-zero if it is unusable
    CheckConfig,
    /// Show the claims of a session token, verifying it when the config allows
    InspectToken { token: String },
    /// Hash a password for seeding the user directory
    HashPassword { password: String },
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // The log level comes from the config when it loads
    let settings = Settings::load_from(&cli.config);
    let level = settings
        .as_ref()
        .map(|s| s.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing(&level);

    match cli.command {
        Command::GenerateSecret { bytes } => {
            if bytes < MIN_SECRET_LEN {
                anyhow::bail!("a signing secret needs at least {MIN_SECRET_LEN} bytes");
            }
            println!("{}", generate_secure_token_with_size(bytes));
        },
        Command::CheckConfig => {
            let settings = settings.context("configuration is not usable")?;
            info!(path = %cli.config.display(), "configuration is valid");
            if settings.allow_bootstrap_accounts {
                warn!("allow_bootstrap_accounts is enabled; development use only");
            }
            println!("{settings:#?}");
        },
        Command::InspectToken { token } => match settings {
            Ok(settings) => {
                let issuer = TokenIssuer::from_settings(&settings, system_clock())?;
                let claims = issuer.verify(&token).context("token rejected")?;
                println!("{}", serde_json::to_string_pretty(&claims)?);
            },
            Err(e) => {
                warn!(error = %e, "no usable configuration, signature not checked");
                let claims = TokenIssuer::decode_unsafe(&token).context("not a session token")?;
                println!("(unverified)");
                println!("{}", serde_json::to_string_pretty(&claims)?);
            },
        },
        Command::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
        },
    }

    Ok(())
}
