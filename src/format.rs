//! Output format resolution for structured results.

use std::io::IsTerminal;
use std::str::FromStr;

use anyhow::{bail, Result};

/// Output format for operation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-friendly multi-line output for terminals.
    Pretty,
    /// Machine-parseable JSON.
    Json,
    /// Compact plain text.
    #[default]
    Text,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "text" => Ok(Self::Text),
            _ => bail!("invalid format '{s}'. Use: text, json, or pretty"),
        }
    }
}

impl OutputFormat {
    /// Resolve the format: explicit flag > `SHIPLINE_FORMAT` env var > TTY
    /// detection (pretty on a terminal, text when piped).
    #[must_use]
    pub fn resolve(explicit: Option<Self>) -> Self {
        if let Some(fmt) = explicit {
            return fmt;
        }
        if let Ok(env_format) = std::env::var("SHIPLINE_FORMAT")
            && let Ok(fmt) = env_format.parse::<Self>()
        {
            return fmt;
        }
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_formats() {
        assert_eq!("json".parse::<OutputFormat>().expect("json"), OutputFormat::Json);
        assert_eq!("PRETTY".parse::<OutputFormat>().expect("pretty"), OutputFormat::Pretty);
        assert_eq!("text".parse::<OutputFormat>().expect("text"), OutputFormat::Text);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn explicit_flag_wins() {
        assert_eq!(
            OutputFormat::resolve(Some(OutputFormat::Json)),
            OutputFormat::Json
        );
    }
}
