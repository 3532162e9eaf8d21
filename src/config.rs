use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Root directory holding one subdirectory of documents per client.
#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: i64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> i64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// `"local"` (deterministic hash projection, no network) or `"openai"`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: default_dims(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_dims() -> usize {
    256
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// `"gemini"` or `"disabled"`. The API key comes from `GEMINI_API_KEY`;
    /// a missing key degrades the collaborator to disabled at construction.
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    /// Upper bound on generated tokens per brief.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            temperature: default_temperature(),
            timeout_secs: default_generation_timeout_secs(),
            max_output_tokens: default_max_output_tokens(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_model() -> String {
    "gemini-2.5-pro".to_string()
}
fn default_temperature() -> f64 {
    0.1
}
fn default_generation_timeout_secs() -> u64 {
    120
}
fn default_max_output_tokens() -> u32 {
    8192
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "local" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be local or openai.",
            other
        ),
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.provider == "openai" && config.embedding.model.is_none() {
        anyhow::bail!("embedding.model must be specified when provider is 'openai'");
    }

    match config.generation.provider.as_str() {
        "gemini" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be gemini or disabled.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        anyhow::bail!("generation.temperature must be in [0.0, 2.0]");
    }
    if config.generation.max_output_tokens == 0 {
        anyhow::bail!("generation.max_output_tokens must be > 0");
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let f = write_config(
            r#"
[db]
path = "/tmp/prep.sqlite"

[data]
dir = "/tmp/clients"

[server]
bind = "127.0.0.1:8000"
"#,
        );
        let cfg = load_config(f.path()).unwrap();
        assert_eq!(cfg.retrieval.top_k, 10);
        assert_eq!(cfg.embedding.provider, "local");
        assert_eq!(cfg.embedding.dims, 256);
        assert_eq!(cfg.generation.model, "gemini-2.5-pro");
        assert!((cfg.generation.temperature - 0.1).abs() < 1e-9);
        assert_eq!(cfg.generation.max_output_tokens, 8192);
    }

    #[test]
    fn rejects_zero_max_output_tokens() {
        let f = write_config(
            r#"
[db]
path = "/tmp/prep.sqlite"

[data]
dir = "/tmp/clients"

[generation]
max_output_tokens = 0

[server]
bind = "127.0.0.1:8000"
"#,
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn rejects_unknown_embedding_provider() {
        let f = write_config(
            r#"
[db]
path = "/tmp/prep.sqlite"

[data]
dir = "/tmp/clients"

[embedding]
provider = "cohere"

[server]
bind = "127.0.0.1:8000"
"#,
        );
        assert!(load_config(f.path()).is_err());
    }

    #[test]
    fn openai_provider_requires_model() {
        let f = write_config(
            r#"
[db]
path = "/tmp/prep.sqlite"

[data]
dir = "/tmp/clients"

[embedding]
provider = "openai"
dims = 1536

[server]
bind = "127.0.0.1:8000"
"#,
        );
        assert!(load_config(f.path()).is_err());
    }
}
