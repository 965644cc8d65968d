use crate::cli::client::ApiClient;
use crate::cli::utils::output_value;
use crate::cli::OutputFormat;

pub async fn stats(client: &ApiClient, output_format: OutputFormat) -> anyhow::Result<()> {
    let stats = client.get("/api/root/cache").await?;
    output_value(output_format, &stats)
}
