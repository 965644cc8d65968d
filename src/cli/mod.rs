pub mod client;
pub mod commands;
pub mod utils;

use std::io::IsTerminal;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use client::ApiClient;

#[derive(Parser)]
#[command(name = "tenantctl")]
#[command(about = "Operator CLI for the tenant data-source router")]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        global = true,
        conflicts_with = "json",
        help = "Output in human-readable text format, even when stdout is not a terminal"
    )]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format (default when stdout is not a terminal)")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        env = "TENANT_ROUTER_URL",
        default_value = "http://localhost:3000",
        help = "Base URL of a running router"
    )]
    pub server: String,

    #[arg(long, global = true, env = "TENANT_ROUTER_TOKEN", hide_env_values = true, help = "Root bearer token")]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Check router and registry health")]
    Health,

    #[command(about = "Show resolver cache statistics")]
    Stats,

    #[command(about = "Show a tenant's data-source endpoint, region and pool hints")]
    Info {
        #[arg(help = "Tenant id")]
        tenant: String,
    },

    #[command(about = "Resolve a tenant and make one round trip to its data source")]
    Test {
        #[arg(help = "Tenant id")]
        tenant: String,
    },

    #[command(about = "Evict a tenant's cached config and client (e.g. after rotation)")]
    Invalidate {
        #[arg(help = "Tenant id")]
        tenant: String,
    },

    #[command(about = "Seal a credential under the active key from TENANT_SECRET_KEYS")]
    Seal {
        #[arg(help = "Plaintext credential; read from stdin when omitted")]
        plaintext: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        Self::select(cli.text, cli.json, std::io::stdout().is_terminal())
    }

    /// Explicit flags win; otherwise text for a terminal and JSON for pipes.
    fn select(text: bool, json: bool, interactive: bool) -> Self {
        match (text, json) {
            (true, _) => OutputFormat::Text,
            (_, true) => OutputFormat::Json,
            _ if interactive => OutputFormat::Text,
            _ => OutputFormat::Json,
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    let client = || ApiClient::new(&cli.server, cli.token.clone());

    match cli.command {
        Commands::Seal { plaintext } => commands::seal::handle(plaintext, output_format),
        Commands::Health => commands::server::health(&client()?, output_format).await,
        Commands::Stats => commands::cache::stats(&client()?, output_format).await,
        Commands::Info { tenant } => commands::tenant::info(&client()?, &tenant, output_format).await,
        Commands::Test { tenant } => commands::tenant::test(&client()?, &tenant, output_format).await,
        Commands::Invalidate { tenant } => commands::tenant::invalidate(&client()?, &tenant, output_format).await,
    }
}
