//! Config file loading.

use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::Config;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("toml: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("validation: {0}")]
    Validation(String),
}

/// On-disk formats, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Json,
    Yaml,
    Toml,
}

impl Format {
    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "json" | "jsonc" => Some(Format::Json),
            "yaml" | "yml" => Some(Format::Yaml),
            "toml" => Some(Format::Toml),
            _ => None,
        }
    }

    fn parse(self, data: &str) -> Result<Config, ConfigError> {
        Ok(match self {
            // Comments are allowed in either extension.
            Format::Json => {
                serde_json::from_reader(json_comments::StripComments::new(data.as_bytes()))?
            }
            Format::Yaml => serde_yaml::from_str(data)?,
            Format::Toml => toml::from_str(data)?,
        })
    }
}

/// Load a config file. Missing sections and fields take their defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let format =
        Format::of(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.to_path_buf()))?;
    let data = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    format.parse(&data)
}

/// Load `path` when given, otherwise start from defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<Config, ConfigError> {
    path.map_or_else(|| Ok(Config::default()), load_config)
}
