//! Model traits used by the pipeline and the answerer, and their Ollama implementation.

use crate::client::OllamaClient;
use crate::error::OllamaResult;
use crate::types::GenerateRequest;
use async_trait::async_trait;
use murag_config::OllamaConfig;

/// Turns text into a fixed-size vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> OllamaResult<Vec<f32>>;

    /// Name recorded next to stored vectors.
    fn embedding_model(&self) -> &str;
}

/// Produces an answer from a system prompt and a user prompt.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str, temperature: f32) -> OllamaResult<String>;

    fn generation_model(&self) -> &str;
}

/// Ollama-backed [`Embedder`] and [`Generator`].
#[derive(Clone)]
pub struct OllamaBackend {
    client: OllamaClient,
    model: String,
    embedding_model: String,
}

impl OllamaBackend {
    pub fn from_config(config: &OllamaConfig) -> OllamaResult<Self> {
        Ok(Self {
            client: OllamaClient::from_config(config)?,
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
        })
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }
}

#[async_trait]
impl Embedder for OllamaBackend {
    async fn embed(&self, text: &str) -> OllamaResult<Vec<f32>> {
        self.client.embed(&self.embedding_model, text).await
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}

#[async_trait]
impl Generator for OllamaBackend {
    async fn generate(&self, system: &str, prompt: &str, temperature: f32) -> OllamaResult<String> {
        let request = GenerateRequest::new(&self.model, prompt, temperature).with_system(system);
        let response = self.client.generate(request).await?;
        Ok(response.response.trim().to_string())
    }

    fn generation_model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_uses_configured_models() {
        let config = OllamaConfig {
            model: "mistral".to_string(),
            embedding_model: "mxbai-embed-large".to_string(),
            ..OllamaConfig::default()
        };
        let backend = OllamaBackend::from_config(&config).unwrap();
        assert_eq!(backend.generation_model(), "mistral");
        assert_eq!(backend.embedding_model(), "mxbai-embed-large");
        assert_eq!(backend.client().host(), "http://localhost:11434");
    }
}
