use anyhow::Context;
use clap::{Args, ValueEnum};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per line, with the current span attached.
    Json,
    Text,
}

#[derive(Debug, Clone, Args)]
pub struct LogArgs {
    /// Log filter (tracing-subscriber EnvFilter syntax). Falls back to `RUST_LOG`, then `info`.
    ///
    /// Environment variable: `RAYLINK_LOG`.
    #[arg(long, global = true, env = "RAYLINK_LOG")]
    pub log_level: Option<String>,

    /// Environment variable: `RAYLINK_LOG_FORMAT`.
    #[arg(
        long,
        global = true,
        env = "RAYLINK_LOG_FORMAT",
        value_enum,
        default_value_t = LogFormat::Json
    )]
    pub log_format: LogFormat,
}

impl LogArgs {
    fn filter(&self) -> anyhow::Result<EnvFilter> {
        match &self.log_level {
            Some(directives) => EnvFilter::try_new(directives)
                .with_context(|| format!("invalid log filter {directives:?}")),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))),
        }
    }

    pub fn init(&self) -> anyhow::Result<()> {
        let filter = self.filter()?;
        match self.log_format {
            LogFormat::Json => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_current_span(true)
                .init(),
            LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        }
        Ok(())
    }
}
