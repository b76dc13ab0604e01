//! Service configuration for cantina-sync
//!
//! Resolution priority: command line > environment > TOML > compiled default.
//! clap folds the environment into [`Args`]; the TOML layer comes from
//! `cantina_common::config`.

use cantina_common::config::{resolve_root_folder, RootLayout, TomlConfig};
use cantina_common::{Error, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0";

/// Command-line arguments for cantina-sync
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "cantina-sync")]
#[command(about = "Weekly canteen menu sync and enrichment service")]
#[command(version)]
pub struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "CANTINA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data root holding the database and image assets
    #[arg(short, long, env = "CANTINA_ROOT_FOLDER")]
    pub root_folder: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long, env = "CANTINA_PORT")]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long, env = "CANTINA_BIND_ADDRESS")]
    pub bind_address: Option<String>,

    /// Public URL prefix used in served image links
    #[arg(long, env = "CANTINA_PUBLIC_ADDRESS")]
    pub public_address: Option<String>,

    /// Shared key required by the admin routes
    #[arg(long, env = "CANTINA_ADMIN_KEY", hide_env_values = true)]
    pub admin_key: Option<String>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Run the pipeline and one cleanup pass, then exit
    #[arg(long)]
    pub once: bool,
}

/// Fully resolved service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub layout: RootLayout,
    pub bind_address: String,
    pub port: u16,
    pub public_address: String,
    pub admin_key: Option<String>,
    pub openai_api_key: String,
    pub toml: TomlConfig,
}

/// Validate key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

fn valid(value: Option<&String>) -> Option<String> {
    value.filter(|v| is_valid_key(v)).cloned()
}

/// Resolve the OpenAI API key from arguments/environment, then TOML
pub fn resolve_openai_api_key(args: &Args, toml_config: &TomlConfig) -> Result<String> {
    let arg_key = valid(args.openai_api_key.as_ref());
    let toml_key = valid(toml_config.openai_api_key.as_ref());

    if arg_key.is_some() && toml_key.is_some() {
        warn!("OpenAI API key found in both environment/arguments and TOML. Using environment/arguments.");
    }

    if let Some(key) = arg_key {
        info!("OpenAI API key loaded from environment/arguments");
        return Ok(key);
    }
    if let Some(key) = toml_key {
        info!("OpenAI API key loaded from TOML config");
        return Ok(key);
    }

    Err(Error::Config(
        "OpenAI API key not configured. Please configure using one of:\n\
         1. Environment: OPENAI_API_KEY=your-key-here\n\
         2. Command line: --openai-api-key your-key-here\n\
         3. TOML config: openai_api_key = \"your-key\""
            .to_string(),
    ))
}

impl ServiceConfig {
    /// Merge arguments over a loaded TOML config
    pub fn resolve(args: &Args, toml: TomlConfig) -> Result<Self> {
        let root = resolve_root_folder(args.root_folder.as_deref(), &toml);
        let port = args.port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let bind_address = args
            .bind_address
            .clone()
            .or_else(|| toml.bind_address.clone())
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let public_address = args
            .public_address
            .clone()
            .or_else(|| toml.public_address.clone())
            .unwrap_or_else(|| format!("http://localhost:{}", port));
        let admin_key = valid(args.admin_key.as_ref()).or_else(|| valid(toml.admin_key.as_ref()));
        let openai_api_key = resolve_openai_api_key(args, &toml)?;

        if admin_key.is_none() {
            warn!("No admin key configured, admin routes are open");
        }

        Ok(Self {
            layout: RootLayout::new(root),
            bind_address,
            port,
            public_address,
            admin_key,
            openai_api_key,
            toml,
        })
    }
}
