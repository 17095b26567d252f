//! Config file discovery and format-specific deserialization.
//!
//! YAML is always available through the default `yaml` feature; JSON and
//! TOML are gated behind the `json` and `toml` features.

use std::path::{Path, PathBuf};

use crate::config::model::Config;
use crate::error::CentrifugeError;

/// Names tried in the working directory when no `--config` is given.
pub const CANDIDATES: &[&str] = &[
    "centrifuge.yaml",
    "centrifuge.yml",
    "centrifuge.json",
    "centrifuge.toml",
];

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, CentrifugeError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| CentrifugeError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| CentrifugeError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| CentrifugeError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(CentrifugeError::UnsupportedFormat(other.to_string())),
    }
}

/// Read and parse one config file.
pub async fn load_file(path: &Path) -> Result<Config, CentrifugeError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            CentrifugeError::ConfigFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            CentrifugeError::Io(e)
        }
    })?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    parse_config_str(ext, &content, &path.display().to_string())
}

/// The explicit path if given, otherwise the first candidate that exists.
pub async fn discover(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    for name in CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return Some(path);
        }
    }
    None
}
