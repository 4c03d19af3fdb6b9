//! Optional RON-based loader for a non-default [`Constants`] ruleset.
//!
//! Mirrors the teacher's `GameConfig` / `RonAssetPlugin` pattern (a plain
//! `serde`-deserializable struct loaded from a `.ron` file) but without the
//! asset-server plumbing that pattern rode in on, since this crate has no
//! asset server. Loading is a one-shot call made once at process startup,
//! identically by server and client; the result is never hot-reloaded.

use crate::constants::Constants;
use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(ron::error::SpannedError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "failed to read constants file: {e}"),
            ConfigError::Parse(e) => write!(f, "failed to parse constants file: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load a [`Constants`] value from a RON file on disk, falling back to
/// nothing — callers that want a default should use
/// [`crate::constants::DEFAULT_CONSTANTS`] directly instead of this loader.
pub fn load_constants(path: impl AsRef<Path>) -> Result<Constants, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
    ron::from_str(&text).map_err(ConfigError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_CONSTANTS;

    #[test]
    fn round_trips_default_constants() {
        let text = ron::ser::to_string(&DEFAULT_CONSTANTS).unwrap();
        let parsed: Constants = ron::from_str(&text).unwrap();
        assert_eq!(parsed, DEFAULT_CONSTANTS);
    }
}
