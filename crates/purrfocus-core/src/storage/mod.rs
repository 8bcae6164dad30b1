mod config;
pub mod database;

pub use config::{BackendConfig, BackendKind, CompanionConfig, Config, TimerConfig};
pub use database::{Account, Database};

use std::path::PathBuf;

/// Returns the data directory, creating it if needed.
///
/// `PURRFOCUS_HOME` overrides the location entirely. Otherwise this is
/// `~/.config/purrfocus[-dev]/`, with the `-dev` suffix selected by
/// `PURRFOCUS_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("PURRFOCUS_HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env =
                std::env::var("PURRFOCUS_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("purrfocus-dev")
            } else {
                base_dir.join("purrfocus")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
