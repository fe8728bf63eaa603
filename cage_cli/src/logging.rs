//! tracing setup: console on stderr (pretty or JSON), optional JSON-lines file.

use std::path::Path;

use cage_config::Logging;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::{Cli, FILE_GUARD};

/// Level used when `RUST_LOG` is unset: `--log-level`, then `[logging].level`, then info.
fn default_level<'a>(flag: Option<&'a str>, file: Option<&'a str>) -> &'a str {
    flag.or(file).unwrap_or("info")
}

/// `RUST_LOG` wins over `--log-level`, which wins over `[logging].level`.
pub fn init(cli: &Cli, logging: &Logging) -> eyre::Result<()> {
    let level = default_level(cli.log_level.as_deref(), logging.level.as_deref());
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let (pretty, json) = if cli.json {
        (
            None,
            Some(fmt::layer().json().with_writer(std::io::stderr)),
        )
    } else {
        (
            Some(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            ),
            None,
        )
    };

    let file = match &logging.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
            let appender = match logging.rotation.as_deref() {
                Some("daily") => tracing_appender::rolling::daily(dir, name),
                Some("hourly") => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(file)
        .try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::default_level;
    use rstest::rstest;

    #[rstest]
    #[case(Some("debug"), Some("warn"), "debug")]
    #[case(None, Some("warn"), "warn")]
    #[case(Some("trace"), None, "trace")]
    #[case(None, None, "info")]
    fn flag_beats_config_file(
        #[case] flag: Option<&str>,
        #[case] file: Option<&str>,
        #[case] want: &str,
    ) {
        assert_eq!(default_level(flag, file), want);
    }
}
