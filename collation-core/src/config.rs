//! Configuration for collation runs

use crate::CollationError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# Collation Configuration

[collation]
# Language of the witnesses; selects the standard normalizers
lang = "la"
# Leave punctuation out of the table and the engine input
ignore_punctuation = false
# Drop columns where every witness is empty after alignment
remove_empty_columns = false
# Normalizers to apply; empty means the standard set for the language
normalizers = []

[engine]
# "http" for a CollateX server, "process" to run the CollateX jar
kind = "http"
url = "http://127.0.0.1:7369"
# Upper bound for one alignment call (e.g., "30s", "2m")
timeout = "30s"
java = "/usr/bin/java"
jar = "/opt/collatex/collatex-tools.jar"
temp_dir = "/tmp"

[service]
bind = "127.0.0.1"
port = 3000
"#;

/// Collation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub collation: CollationConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub service: ServiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollationConfig {
    #[serde(default = "default_lang")]
    pub lang: String,
    #[serde(default)]
    pub ignore_punctuation: bool,
    #[serde(default)]
    pub remove_empty_columns: bool,
    #[serde(default)]
    pub normalizers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Http,
    Process,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_kind")]
    pub kind: EngineKind,
    #[serde(default = "default_engine_url")]
    pub url: String,
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default = "default_java")]
    pub java: PathBuf,
    #[serde(default = "default_jar")]
    pub jar: PathBuf,
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

// Default value functions
fn default_lang() -> String {
    crate::collation_table::DEFAULT_LANGUAGE.to_string()
}
fn default_engine_kind() -> EngineKind {
    EngineKind::Http
}
fn default_engine_url() -> String {
    "http://127.0.0.1:7369".to_string()
}
fn default_timeout() -> String {
    "30s".to_string()
}
fn default_java() -> PathBuf {
    PathBuf::from("/usr/bin/java")
}
fn default_jar() -> PathBuf {
    PathBuf::from("/opt/collatex/collatex-tools.jar")
}
fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}
fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3000
}

impl Default for CollationConfig {
    fn default() -> Self {
        Self {
            lang: default_lang(),
            ignore_punctuation: false,
            remove_empty_columns: false,
            normalizers: Vec::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: default_engine_kind(),
            url: default_engine_url(),
            timeout: default_timeout(),
            java: default_java(),
            jar: default_jar(),
            temp_dir: default_temp_dir(),
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl EngineConfig {
    /// Get timeout as Duration
    pub fn timeout_duration(&self) -> crate::Result<Duration> {
        match parse_duration(&self.timeout) {
            Some(d) if !d.is_zero() => Ok(d),
            _ => Err(CollationError::ConfigParse(format!(
                "invalid engine timeout {:?}; expected a positive duration such as \"500ms\", \"30s\", \"2m\" or \"1h\"",
                self.timeout
            ))),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| CollationError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values serde cannot. Call again after applying command-line
    /// overrides.
    pub fn validate(&self) -> crate::Result<()> {
        if self.collation.lang.trim().is_empty() {
            return Err(CollationError::InvalidLanguage);
        }
        self.engine.timeout_duration()?;
        Ok(())
    }
}

/// Parse duration string (e.g., "500ms", "30s", "2m", "1h")
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        return ms.parse().ok().map(Duration::from_millis);
    }
    if s.is_empty() {
        return None;
    }

    let (split, _) = s.char_indices().last()?;
    let (num_str, unit) = s.split_at(split);
    let num: u64 = num_str.parse().ok()?;

    let secs = match unit {
        "s" => Some(num),
        "m" => num.checked_mul(60),
        "h" => num.checked_mul(3600),
        _ => None,
    }?;
    Some(Duration::from_secs(secs))
}
