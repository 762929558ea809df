//! Configuration structures and loading.

use crate::error::{ConfigError, ConfigResult};
use crate::paths::AppPaths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub ollama: OllamaConfig,

    #[serde(default)]
    pub ingest: IngestConfig,

    #[serde(default)]
    pub processing: ProcessingConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> ConfigResult<Self> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&paths.config_file)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> ConfigResult<()> {
        let paths = AppPaths::new().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&paths.config_file)
    }

    /// Save configuration to a specific path.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Create a default config file with comments.
    pub fn create_default_file(path: &PathBuf) -> ConfigResult<()> {
        let default_config = Self::default_config_string();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, default_config)?;
        Ok(())
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> ConfigResult<()> {
        let p = &self.processing;
        if p.chunk_size == 0 {
            return Err(ConfigError::Invalid("processing.chunk_size must be > 0".into()));
        }
        if p.chunk_overlap >= p.chunk_size {
            return Err(ConfigError::Invalid(
                "processing.chunk_overlap must be smaller than chunk_size".into(),
            ));
        }
        if p.max_concurrent_jobs == 0 {
            return Err(ConfigError::Invalid(
                "processing.max_concurrent_jobs must be > 0".into(),
            ));
        }
        if p.max_attempts == 0 {
            return Err(ConfigError::Invalid("processing.max_attempts must be > 0".into()));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::Invalid("retrieval.top_k must be > 0".into()));
        }
        if !(-1.0..=1.0).contains(&self.retrieval.min_similarity) {
            return Err(ConfigError::Invalid(
                "retrieval.min_similarity must be within [-1, 1]".into(),
            ));
        }
        Ok(())
    }

    /// Set a single value by dotted key, e.g. `ollama.model`.
    pub fn set(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();

        match parts.as_slice() {
            ["general", "data_dir"] => self.general.data_dir = Some(value.to_string()),
            ["ollama", "host"] => self.ollama.host = value.to_string(),
            ["ollama", "model"] => self.ollama.model = value.to_string(),
            ["ollama", "embedding_model"] => self.ollama.embedding_model = value.to_string(),
            ["ollama", "timeout_seconds"] => self.ollama.timeout_seconds = parse(key, value)?,
            ["ingest", "max_upload_bytes"] => self.ingest.max_upload_bytes = parse(key, value)?,
            ["processing", "ocr_enabled"] => self.processing.ocr_enabled = parse(key, value)?,
            ["processing", "ocr_language"] => self.processing.ocr_language = value.to_string(),
            ["processing", "transcribe"] => self.processing.transcribe = parse(key, value)?,
            ["processing", "whisper_model"] => {
                self.processing.whisper_model = value.to_string()
            }
            ["processing", "chunk_size"] => self.processing.chunk_size = parse(key, value)?,
            ["processing", "chunk_overlap"] => self.processing.chunk_overlap = parse(key, value)?,
            ["processing", "max_concurrent_jobs"] => {
                self.processing.max_concurrent_jobs = parse(key, value)?
            }
            ["processing", "max_attempts"] => self.processing.max_attempts = parse(key, value)?,
            ["processing", "retry_base_seconds"] => {
                self.processing.retry_base_seconds = parse(key, value)?
            }
            ["processing", "retry_max_seconds"] => {
                self.processing.retry_max_seconds = parse(key, value)?
            }
            ["processing", "poll_interval_ms"] => {
                self.processing.poll_interval_ms = parse(key, value)?
            }
            ["processing", "job_lease_seconds"] => {
                self.processing.job_lease_seconds = parse(key, value)?
            }
            ["retrieval", "top_k"] => self.retrieval.top_k = parse(key, value)?,
            ["retrieval", "min_similarity"] => self.retrieval.min_similarity = parse(key, value)?,
            ["retrieval", "context_char_budget"] => {
                self.retrieval.context_char_budget = parse(key, value)?
            }
            ["retrieval", "temperature"] => self.retrieval.temperature = parse(key, value)?,
            ["retrieval", "timeout_seconds"] => {
                self.retrieval.timeout_seconds = parse(key, value)?
            }
            ["server", "host"] => self.server.host = value.to_string(),
            ["server", "port"] => self.server.port = parse(key, value)?,
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }

        self.validate()
    }

    /// Generate a default config file with helpful comments.
    pub fn default_config_string() -> String {
        r#"# MuRAG Configuration
# Local multimodal retrieval-augmented generation

[general]
# Data directory for database and blob storage
# data_dir = "~/.local/share/murag"

[ollama]
# Ollama server address
host = "http://localhost:11434"

# Model used to write answers
model = "llama3.2"

# Model for generating embeddings
embedding_model = "nomic-embed-text"

# Request timeout in seconds
timeout_seconds = 120

[ingest]
# Largest accepted upload, in bytes
max_upload_bytes = 104857600

[processing]
# OCR for images and scanned PDF pages (tesseract)
ocr_enabled = true
ocr_language = "eng"

# Speech-to-text for audio (whisper)
transcribe = true
# Whisper model size: tiny, base, small, medium, large
whisper_model = "base"

# Text chunking
chunk_size = 512               # Characters per chunk
chunk_overlap = 50             # Overlap between chunks

# Pipeline worker
max_concurrent_jobs = 2
max_attempts = 3
retry_base_seconds = 5         # Backoff doubles on every failed attempt
retry_max_seconds = 300
poll_interval_ms = 1000
job_lease_seconds = 3600       # Jobs claimed longer ago are requeued on worker startup

[retrieval]
top_k = 5
min_similarity = 0.3
context_char_budget = 6000     # Source text sent to the model per question
temperature = 0.2
timeout_seconds = 60

[server]
host = "127.0.0.1"
port = 8080
"#
        .to_string()
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GeneralConfig {
    pub data_dir: Option<String>,
}

/// Ollama LLM settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
    pub embedding_model: String,
    pub timeout_seconds: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "http://localhost:11434".to_string(),
            model: "llama3.2".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
            timeout_seconds: 120,
        }
    }
}

/// Upload limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub max_upload_bytes: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

/// Extraction pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub ocr_enabled: bool,
    pub ocr_language: String,
    pub transcribe: bool,
    pub whisper_model: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_concurrent_jobs: usize,
    pub max_attempts: u32,
    pub retry_base_seconds: u64,
    pub retry_max_seconds: u64,
    pub poll_interval_ms: u64,
    /// Seconds before a claimed job is considered abandoned by its worker.
    pub job_lease_seconds: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            ocr_enabled: true,
            ocr_language: "eng".to_string(),
            transcribe: true,
            whisper_model: "base".to_string(),
            chunk_size: 512,
            chunk_overlap: 50,
            max_concurrent_jobs: 2,
            max_attempts: 3,
            retry_base_seconds: 5,
            retry_max_seconds: 300,
            poll_interval_ms: 1000,
            job_lease_seconds: 3600,
        }
    }
}

/// Retrieval and answering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub min_similarity: f32,
    pub context_char_budget: usize,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_similarity: 0.3,
            context_char_budget: 6000,
            temperature: 0.2,
            timeout_seconds: 60,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
