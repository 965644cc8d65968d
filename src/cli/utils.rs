use serde_json::{json, Value};

use crate::cli::OutputFormat;

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": true,
                "message": message
            });

            if let Some(data_value) = data {
                response["data"] = data_value;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
        }
    }
    Ok(())
}

/// Output a failure message in the appropriate format
pub fn output_failure(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "success": false,
                "error": message
            });

            if let Some(data_value) = data {
                response["data"] = data_value;
            }

            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            eprintln!("✗ {}", message);
        }
    }
    Ok(())
}

/// Print `data` as pretty JSON, or as aligned `key: value` lines in text mode.
pub fn output_value(output_format: OutputFormat, data: &Value) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
        OutputFormat::Text => {
            for line in text_lines(data, 0) {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn text_lines(value: &Value, depth: usize) -> Vec<String> {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(map) => map
            .iter()
            .flat_map(|(key, value)| match value {
                Value::Object(_) => {
                    let mut lines = vec![format!("{indent}{key}:")];
                    lines.extend(text_lines(value, depth + 1));
                    lines
                }
                scalar => vec![format!("{indent}{key}: {}", scalar_text(scalar))],
            })
            .collect(),
        scalar => vec![format!("{indent}{}", scalar_text(scalar))],
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_objects_indent() {
        let lines = text_lines(
            &json!({ "client": { "entries": 2, "hits": 10 }, "in_flight": 0 }),
            0,
        );
        assert_eq!(lines, vec!["client:", "  entries: 2", "  hits: 10", "in_flight: 0"]);
    }

    #[test]
    fn nulls_and_strings_render_plainly() {
        let lines = text_lines(&json!({ "region": null, "endpoint": "postgres://db/app" }), 0);
        assert_eq!(lines, vec!["endpoint: postgres://db/app", "region: -"]);
    }
}
