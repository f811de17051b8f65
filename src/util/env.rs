//! Environment helpers: centralized dotenv loading and ergonomic getters.
//! Call `init_env()` once early in each binary (or rely on lazy Once).
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Once;
use tracing::{info, warn};

static INIT: Once = Once::new();

/// Load .env exactly once. Safe to call many times.
pub fn init_env() {
    INIT.call_once(|| {
        if dotenv::dotenv().is_ok() {
            return;
        }
        // Fallback to the crate root so `cargo run` from a subdirectory still finds it.
        let candidate = format!("{}/.env", env!("CARGO_MANIFEST_DIR"));
        let _ = dotenv::from_filename(candidate);
    });
}

/// Get optional env var (None if unset or empty).
pub fn env_opt(key: &str) -> Option<String> {
    init_env();
    match std::env::var(key) {
        Ok(v) if !v.trim().is_empty() => Some(v),
        _ => None,
    }
}

/// Get parsed value with default fallback. Unparseable values are logged and ignored.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    init_env();
    match env_opt(key) {
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                warn!(target = "env", key, value = %raw, "ignoring unparseable env value");
                default
            }
        },
        None => default,
    }
}

/// Boolean flag; accepts 1/true/on/yes (case-insensitive) as true.
pub fn env_flag(key: &str, default: bool) -> bool {
    init_env();
    match std::env::var(key) {
        Ok(raw) => {
            let v = raw.trim().to_ascii_lowercase();
            matches!(v.as_str(), "1" | "true" | "on" | "yes")
        }
        Err(_) => default,
    }
}

/// Path from env, else the provided default (relative to the working directory).
pub fn env_path(key: &str, default: &str) -> PathBuf {
    env_opt(key)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Validate that every required input path exists and log a consolidated snapshot.
/// Returns one error naming all missing paths.
pub fn preflight_paths(title: &str, required: &[(&str, &std::path::Path)]) -> anyhow::Result<()> {
    let mut missing: Vec<String> = Vec::new();
    for (label, path) in required {
        if path.exists() {
            info!(target = "preflight", title, input = label, path = %path.display(), "input found");
        } else {
            missing.push(format!("{label} ({})", path.display()));
        }
    }
    if !missing.is_empty() {
        return Err(anyhow::anyhow!(
            "missing required inputs: {}",
            missing.join(", ")
        ));
    }
    Ok(())
}
