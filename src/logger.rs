use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use env_logger::{Builder, Env};

/// Initialise the global logger, `RUST_LOG` overrides the default `info` level.
///
/// Records go to stderr, or are appended to `log_file` when one is given.
pub fn init_logger(log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{:<5}] {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });

    if let Some(path) = log_file {
        // Create the parent dir.
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log dir {}", parent.display()))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    } else {
        builder.target(env_logger::Target::Stderr);
    }

    builder.try_init().context("logger already initialised")?;
    Ok(())
}
