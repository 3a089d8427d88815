//! Response pipeline configuration.
//!
//! Loaded from the `[response]` table of a client TOML file:
//!
//! ```toml
//! [response]
//! aggregate_body = true
//! max_body_bytes = 10485760
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Collect body chunks into the completed `Response` (default: true).
    pub aggregate_body: bool,
    /// Fail the response once the aggregated body would exceed this many
    /// bytes. Unlimited when absent; ignored without aggregation.
    pub max_body_bytes: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            aggregate_body: true,
            max_body_bytes: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ClientFile {
    #[serde(default)]
    response: PipelineConfig,
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let file: ClientFile = toml::from_str(content)?;
        Ok(file.response)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(&ClientFile {
            response: self.clone(),
        })?)
    }

    /// Builder method: cap the aggregated body size.
    pub fn with_max_body_bytes(self, limit: usize) -> Self {
        Self {
            max_body_bytes: Some(limit),
            ..self
        }
    }

    /// Builder method: deliver the body through the data hook only.
    pub fn streaming(self) -> Self {
        Self {
            aggregate_body: false,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_aggregate_without_limit() {
        let config = PipelineConfig::default();
        assert!(config.aggregate_body);
        assert_eq!(config.max_body_bytes, None);
    }

    #[test]
    fn parse_full() {
        let config = PipelineConfig::from_toml_str(
            r#"
[response]
aggregate_body = false
max_body_bytes = 1024
"#,
        )
        .unwrap();
        assert!(!config.aggregate_body);
        assert_eq!(config.max_body_bytes, Some(1024));
    }

    #[test]
    fn missing_table_uses_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());

        let partial = PipelineConfig::from_toml_str("[response]\nmax_body_bytes = 8\n").unwrap();
        assert!(partial.aggregate_body);
        assert_eq!(partial.max_body_bytes, Some(8));
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(PipelineConfig::from_toml_str("[response]\naggregate_body = \"yes\"\n").is_err());
    }

    #[test]
    fn toml_round_trip() {
        let config = PipelineConfig::default().with_max_body_bytes(64).streaming();
        let rendered = config.to_toml_string().unwrap();
        assert!(rendered.contains("[response]"));
        assert_eq!(PipelineConfig::from_toml_str(&rendered).unwrap(), config);
    }

    #[test]
    fn from_file_reads_response_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.toml");
        std::fs::write(&path, "[response]\nmax_body_bytes = 4096\n").unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.max_body_bytes, Some(4096));
        assert!(PipelineConfig::from_file(&dir.path().join("missing.toml")).is_err());
    }
}
