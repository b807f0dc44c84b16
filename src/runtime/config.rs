use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::runtime::gc::gc_heap::DEFAULT_ARENA_SIZE;

pub const DEFAULT_MAX_FRAMES: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Runtime knobs for one VM instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    pub arena_size: usize,
    pub max_arenas: Option<usize>,
    pub max_frames: usize,
    pub gc_enabled: bool,
    /// Allocations since the last cycle before the top-level loop collects.
    pub gc_threshold: usize,
    pub trace: bool,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            arena_size: DEFAULT_ARENA_SIZE,
            max_arenas: None,
            max_frames: DEFAULT_MAX_FRAMES,
            gc_enabled: true,
            gc_threshold: 0,
            trace: false,
        }
    }
}

impl VmConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::VmConfig;

    #[test]
    fn missing_fields_take_defaults() {
        let config = VmConfig::from_json(r#"{ "max_arenas": 4, "trace": true }"#).unwrap();
        assert_eq!(config.max_arenas, Some(4));
        assert!(config.trace);
        assert_eq!(config.arena_size, 1024);
        assert_eq!(config.max_frames, 10_000);
        assert!(config.gc_enabled);
    }

    #[test]
    fn rejects_unknown_types() {
        assert!(VmConfig::from_json(r#"{ "arena_size": "big" }"#).is_err());
    }
}
