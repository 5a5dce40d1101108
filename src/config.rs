use anyhow::anyhow;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Logs go to stderr so stdout stays clean for results. `RUST_LOG` directives
/// override the level given on the command line.
pub fn init_logging(level: LogLevel) -> anyhow::Result<()> {
    let level_filter = EnvFilter::builder()
        .with_default_directive(Level::from(level).into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(level_filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .try_init()
        .map_err(|err| anyhow!("failed to initialise logging: {err}"))
}

/// Parses one `key=value` form field given on the command line.
pub fn parse_field(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing field name in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_fields() {
        assert_eq!(
            parse_field("edad=50"),
            Ok(("edad".to_string(), "50".to_string()))
        );
        assert_eq!(
            parse_field("actividad=no hace"),
            Ok(("actividad".to_string(), "no hace".to_string()))
        );
        assert_eq!(
            parse_field("genero="),
            Ok(("genero".to_string(), String::new()))
        );
    }

    #[test]
    fn rejects_malformed_fields() {
        assert!(parse_field("edad").is_err());
        assert!(parse_field("=50").is_err());
    }

    #[test]
    fn log_levels_map_to_tracing() {
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }
}
