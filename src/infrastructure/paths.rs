//! Filesystem locations used by the proxy.

use std::path::{Path, PathBuf};

/// Directory name used under the platform data directory.
const APP_DIR: &str = "storeproxy";

/// Returns the default data directory.
///
/// Resolves to the platform data directory (`~/.local/share/storeproxy` on
/// Linux) and falls back to `./storeproxy-data` when the platform has none.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir().map_or_else(|| PathBuf::from("storeproxy-data"), |dir| dir.join(APP_DIR))
}

/// Expands a leading `~` to the user's home directory.
///
/// Paths without a tilde, and tildes when no home directory is known, are
/// returned unchanged.
///
/// # Examples
///
/// ```
/// use storeproxy::infrastructure::expand_tilde;
///
/// assert_eq!(expand_tilde("/absolute/path"), std::path::PathBuf::from("/absolute/path"));
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    let home = dirs::home_dir();
    expand_tilde_with(path, home.as_deref())
}

fn expand_tilde_with(path: &str, home: Option<&Path>) -> PathBuf {
    match (path, home) {
        ("~", Some(home)) => home.to_path_buf(),
        (p, Some(home)) if p.starts_with("~/") => home.join(&p[2..]),
        (p, _) => PathBuf::from(p),
    }
}

/// Path of the OTLP trace file inside `data_dir`.
#[must_use]
pub fn trace_file(data_dir: &Path) -> PathBuf {
    data_dir.join("storeproxy-otlp.json")
}
