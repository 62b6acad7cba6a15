use clap::{Parser, Subcommand};

use crate::crypto::Cipher;

#[derive(Parser)]
#[command(name = "atrium")]
#[command(about = "Atrium CLI - administration tools for the multi-tenant backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the API server")]
    Serve {
        #[arg(long, help = "Port to listen on (defaults to ATRIUM_PORT / PORT / 3000)")]
        port: Option<u16>,
    },

    #[command(about = "Generate a fresh base64 tenant-cipher key")]
    Keygen,

    #[command(about = "Encrypt a tenant connection string for storage")]
    Encrypt {
        value: String,
        #[arg(long, help = "Key material; falls back to TENANT_KEY")]
        key: Option<String>,
    },

    #[command(about = "Decrypt a stored tenant connection string")]
    Decrypt {
        value: String,
        #[arg(long, help = "Key material; falls back to TENANT_KEY")]
        key: Option<String>,
    },

    #[command(about = "Ping a running server's health endpoint")]
    Health {
        #[arg(long, default_value = "http://127.0.0.1:3000")]
        url: String,
    },
}

fn cipher_from(key: Option<String>) -> anyhow::Result<Cipher> {
    let material = match key {
        Some(k) => k,
        None => std::env::var("TENANT_KEY")
            .map_err(|_| anyhow::anyhow!("pass --key or set TENANT_KEY"))?,
    };
    Ok(Cipher::from_key_material(&material)?)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port } => crate::server::run(port).await,
        Commands::Keygen => {
            println!("{}", Cipher::generate_key());
            Ok(())
        }
        Commands::Encrypt { value, key } => {
            let cipher = cipher_from(key)?;
            println!("{}", cipher.encrypt(&value)?);
            Ok(())
        }
        Commands::Decrypt { value, key } => {
            let cipher = cipher_from(key)?;
            println!("{}", cipher.decrypt(&value)?);
            Ok(())
        }
        Commands::Health { url } => {
            let response = reqwest::get(format!("{}/health", url.trim_end_matches('/'))).await?;
            let status = response.status();
            let body: serde_json::Value = response.json().await?;
            println!("{} {}", status.as_u16(), serde_json::to_string_pretty(&body)?);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn encrypt_requires_key_material() {
        std::env::remove_var("TENANT_KEY");
        assert!(cipher_from(None).is_err());
        assert!(cipher_from(Some("a passphrase".to_string())).is_ok());
    }
}
