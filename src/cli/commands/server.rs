use crate::cli::client::ApiClient;
use crate::cli::utils::{output_failure, output_value};
use crate::cli::OutputFormat;

pub async fn health(client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let report = client.get("/health").await?;

    if report.get("status").and_then(|s| s.as_str()) == Some("ok") {
        output_value(output_format, &report)
    } else {
        output_failure(output_format, "Router is degraded", Some(report))?;
        Err(anyhow::anyhow!("registry unavailable"))
    }
}
