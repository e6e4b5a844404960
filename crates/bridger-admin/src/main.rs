// Thin CLI over the gateway manager (design notes §9: "re-using the same
// component types avoids schema drift between human and bot entry points").

use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rand::RngCore;

use bridger_core::config::{Config, EmqxConfig};
use bridger_core::gateway::{EmqxHttpClient, GatewayManager};

#[derive(Parser)]
#[command(name = "bridger-admin")]
#[command(about = "Bridger CLI - MQTT gateway management")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new gateway user
    CreateUser {
        /// Gateway ID (8 character hex, with or without ! prefix)
        gateway_id: String,
        /// Owner user ID (numeric)
        user_id: u64,
    },
    /// Delete a gateway user
    DeleteUser {
        gateway_id: String,
    },
    /// List all gateway users
    ListUsers,
    /// Generate API keys and an EMQX bootstrap file
    GenerateApikey {
        #[arg(long, short = 'b')]
        bootstrap_file: Option<PathBuf>,
        #[arg(long, short = 'f')]
        force: bool,
    },
}

const DEFAULT_BOOTSTRAP_FILE: &str = "/opt/emqx/etc/api_key.bootstrap";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();
    let manager = build_manager(&config.emqx, &config.mqtt.topic);

    match cli.command {
        Command::CreateUser { gateway_id, user_id } => create_user(&manager, &gateway_id, user_id).await,
        Command::DeleteUser { gateway_id } => delete_user(&manager, &gateway_id).await,
        Command::ListUsers => list_users(&manager).await,
        Command::GenerateApikey { bootstrap_file, force } => generate_apikey(bootstrap_file, force),
    }
}

fn build_manager(emqx: &EmqxConfig, base_topic: &str) -> GatewayManager<EmqxHttpClient> {
    let client = EmqxHttpClient::new(&emqx.admin_url, &emqx.api_key, &emqx.api_secret);
    GatewayManager::new(client, base_topic.to_string())
}

async fn create_user(manager: &GatewayManager<EmqxHttpClient>, gateway_id: &str, user_id: u64) -> Result<()> {
    match manager.create_gateway(gateway_id, user_id).await {
        Ok((record, password)) => {
            println!("Gateway user created successfully!");
            println!("Username: {}", record.user_string());
            println!("Password: {password}");
            Ok(())
        }
        Err(e) => {
            eprintln!("Error creating gateway user: {e}");
            std::process::exit(1);
        }
    }
}

async fn delete_user(manager: &GatewayManager<EmqxHttpClient>, gateway_id: &str) -> Result<()> {
    match manager.delete_gateway(gateway_id).await {
        Ok(true) => {
            println!("Gateway user deleted successfully!");
            Ok(())
        }
        Ok(false) => {
            eprintln!("Failed to delete gateway user");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error deleting gateway user: {e}");
            std::process::exit(1);
        }
    }
}

async fn list_users(manager: &GatewayManager<EmqxHttpClient>) -> Result<()> {
    match manager.list_gateways().await {
        Ok(gateways) if gateways.is_empty() => {
            println!("No gateway users found");
            Ok(())
        }
        Ok(gateways) => {
            println!("{:<24} {:<12}", "Username", "Node ID");
            for gateway in gateways {
                println!("{:<24} !{:<11}", gateway.user_string(), bridger_core::node_id::hex_without_bang(gateway.node_id));
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("Error listing gateway users: {e}");
            std::process::exit(1);
        }
    }
}

fn generate_apikey(bootstrap_file: Option<PathBuf>, force: bool) -> Result<()> {
    let bootstrap_file = bootstrap_file.unwrap_or_else(|| PathBuf::from(DEFAULT_BOOTSTRAP_FILE));
    let env_file = PathBuf::from(".env");

    if bootstrap_file.exists() && !force {
        bail!("Bootstrap file already exists at {}. Use --force to overwrite.", bootstrap_file.display());
    }

    if !force {
        if let Ok(content) = fs::read_to_string(&env_file) {
            let mut existing = Vec::new();
            for key in ["EMQX_API_KEY=", "EMQX_SECRET_KEY=", "INFLUXDB_V2_TOKEN="] {
                if content.contains(key) {
                    existing.push(key.trim_end_matches('='));
                }
            }
            if !existing.is_empty() {
                bail!("Some keys already exist in .env file: {}. Use --force to overwrite.", existing.join(", "));
            }
        }
    }

    let api_key = format!("bridger-{}", hex::encode(random_bytes(8)));
    let secret_key = hex::encode(random_bytes(32));
    let influxdb_token = base64_urlsafe(&random_bytes(48));

    if let Some(parent) = bootstrap_file.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    fs::write(&bootstrap_file, format!("{api_key}:{secret_key}:administrator\n"))
        .with_context(|| format!("writing {}", bootstrap_file.display()))?;

    println!("Generated API and secret keys!");
    println!("API Key: {api_key}");
    println!("Secret Key: {secret_key}");
    println!("InfluxDB Token: {influxdb_token}");
    println!();
    println!("Add these to your .env file:");
    println!("EMQX_API_KEY=\"{api_key}\"");
    println!("EMQX_SECRET_KEY=\"{secret_key}\"");
    println!("INFLUXDB_V2_TOKEN=\"{influxdb_token}\"");
    println!();
    println!("Bootstrap file created at: {}", bootstrap_file.display());

    Ok(())
}

fn random_bytes(len: usize) -> Vec<u8> {
    let mut rng = rand::rngs::OsRng;
    let mut bytes = vec![0u8; len];
    rng.fill_bytes(&mut bytes);
    bytes
}

fn base64_urlsafe(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}
