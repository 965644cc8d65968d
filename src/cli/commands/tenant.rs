use anyhow::anyhow;
use serde_json::Value;

use crate::cli::client::ApiClient;
use crate::cli::utils::{output_failure, output_success, output_value};
use crate::cli::OutputFormat;

pub async fn info(client: &ApiClient, tenant: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let info = client.get(&tenant_path(tenant, "connection")?).await?;
    output_value(output_format, &info)
}

/// Exits non-zero when the probe fails so scripts can gate on it.
pub async fn test(client: &ApiClient, tenant: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let report = client.post(&tenant_path(tenant, "test")?).await?;
    let elapsed = report.get("response_time_ms").and_then(Value::as_u64).unwrap_or_default();

    if report.get("success").and_then(Value::as_bool) == Some(true) {
        output_success(
            output_format,
            &format!("Tenant '{tenant}' reachable in {elapsed} ms"),
            Some(report),
        )
    } else {
        let kind = report
            .pointer("/diagnostics/error_kind")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        output_failure(
            output_format,
            &format!("Tenant '{tenant}' connection test failed: {kind}"),
            Some(report),
        )?;
        Err(anyhow!("connection test failed ({kind})"))
    }
}

pub async fn invalidate(client: &ApiClient, tenant: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let result = client.post(&tenant_path(tenant, "invalidate")?).await?;
    let message = if result.get("evicted").and_then(Value::as_bool) == Some(true) {
        format!("Invalidated cached connection for tenant '{tenant}'")
    } else {
        format!("Nothing cached for tenant '{tenant}'")
    };
    output_success(output_format, &message, Some(result))
}

fn tenant_path(tenant: &str, action: &str) -> anyhow::Result<String> {
    let mut url = url::Url::parse("http://router/api/root/tenant")?;
    url.path_segments_mut()
        .map_err(|()| anyhow!("tenant path cannot be built"))?
        .push(tenant)
        .push(action);
    Ok(url.path().to_string())
}
