use anyhow::{Context, Result};
use std::io::{self, Read};
use std::path::Path;

use fittrack_core::event::{self, FunctionEvent};

use crate::config::Config;

/// Runs one event read from `file` (or stdin) and prints the response.
pub(crate) fn cmd_invoke(config: &Config, file: Option<&Path>) -> Result<()> {
    let raw = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read event file: {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read event from stdin")?;
            buf
        }
    };

    let event = parse_event(&raw)?;
    let response = event::invoke(&config.db_config(), config.user_id, event);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn parse_event(raw: &str) -> Result<FunctionEvent> {
    if raw.trim().is_empty() {
        return Ok(FunctionEvent::default());
    }
    serde_json::from_str(raw).context("Event is not a valid function event")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_input_is_default_event() {
        let event = parse_event("  \n").unwrap();
        assert!(event.http_method.is_none());
        assert!(event.body.is_none());
    }

    #[test]
    fn test_parse_event_fields() {
        let event = parse_event(
            r#"{"httpMethod":"PUT","queryStringParameters":{"action":"goals"},"body":"{}"}"#,
        )
        .unwrap();
        assert_eq!(event.http_method.as_deref(), Some("PUT"));
        assert_eq!(event.body.as_deref(), Some("{}"));
    }

    #[test]
    fn test_parse_event_rejects_garbage() {
        assert!(parse_event("not json").is_err());
    }
}
