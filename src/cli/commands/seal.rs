use std::io::{self, BufRead};

use anyhow::{bail, Context};
use secrecy::ExposeSecret;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::secrets::{EnvelopeDecryptor, Keyring};

/// Seal a credential locally; nothing is sent to the router.
pub fn handle(plaintext: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let keyring = Keyring::parse(&config.secrets.active_key_id, config.secrets.keys.expose_secret())
        .context("TENANT_SECRET_KEYS is invalid")?;
    if keyring.is_empty() {
        bail!("TENANT_SECRET_KEYS is empty; nothing to seal with");
    }

    let plaintext = match plaintext {
        Some(value) => value,
        None => read_stdin_line()?,
    };
    if plaintext.is_empty() {
        bail!("refusing to seal an empty credential");
    }

    let envelope = EnvelopeDecryptor::new(keyring)
        .seal(&plaintext)
        .context("failed to seal credential")?;

    match output_format {
        OutputFormat::Json => output_success(
            output_format,
            "Credential sealed",
            Some(json!({ "key_id": config.secrets.active_key_id, "envelope": envelope })),
        ),
        OutputFormat::Text => {
            println!("{envelope}");
            Ok(())
        }
    }
}

fn read_stdin_line() -> anyhow::Result<String> {
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("failed to read credential from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
