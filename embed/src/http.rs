use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::config::EmbedConfig;
use crate::embed::AudioEmbedder;
use crate::error::EmbedError;
use crate::fbank_embedder::FBANK_EMBEDDING_DIM;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Response body of the remote embedding service.
#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f64>,
}

/// Embedder backed by a remote service.
///
/// The clip is posted as-is to `{base_url}/embed` with content type
/// `audio/wav`; the service answers `{"embedding": [...]}`.
pub struct HttpEmbedder {
    client: Client,
    url: String,
    api_key: Option<String>,
    dim: usize,
}

impl HttpEmbedder {
    pub fn new(base_url: &str) -> Self {
        Self::with_config(EmbedConfig::default().with_base_url(base_url))
    }

    pub fn with_config(cfg: EmbedConfig) -> Self {
        let timeout = if cfg.timeout_secs == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            cfg.timeout_secs
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: format!("{}/embed", cfg.base_url.trim_end_matches('/')),
            api_key: cfg.api_key,
            dim: if cfg.dimension == 0 {
                FBANK_EMBEDDING_DIM
            } else {
                cfg.dimension
            },
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Parse and validate a service response body.
fn parse_response(body: &[u8], want: usize) -> Result<Vec<f32>, EmbedError> {
    let resp: EmbedResponse =
        serde_json::from_slice(body).map_err(|e| EmbedError::Api(format!("bad response: {e}")))?;
    if resp.embedding.len() != want {
        return Err(EmbedError::DimensionMismatch {
            got: resp.embedding.len(),
            want,
        });
    }
    if resp.embedding.iter().any(|v| !v.is_finite()) {
        return Err(EmbedError::Api("non-finite value in embedding".into()));
    }
    Ok(resp.embedding.iter().map(|&v| v as f32).collect())
}

#[async_trait::async_trait]
impl AudioEmbedder for HttpEmbedder {
    async fn embed(&self, audio: &[u8]) -> Result<Vec<f32>, EmbedError> {
        if audio.is_empty() {
            return Err(EmbedError::EmptyInput);
        }

        let mut req = self
            .client
            .post(&self.url)
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec());
        if let Some(key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        let resp = req.send().await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EmbedError::Api(format!("HTTP {status}: {body}")));
        }

        let body = resp.bytes().await?;
        parse_response(&body, self.dim)
    }

    fn dimension(&self) -> usize {
        self.dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_is_joined() {
        let e = HttpEmbedder::new("http://localhost:9000/");
        assert_eq!(e.url(), "http://localhost:9000/embed");
        assert_eq!(e.dimension(), 768);

        let e = HttpEmbedder::with_config(
            EmbedConfig::default()
                .with_base_url("http://h")
                .with_dimension(4),
        );
        assert_eq!(e.dimension(), 4);
    }

    #[test]
    fn parses_valid_response() {
        let v = parse_response(br#"{"embedding":[0.5,-1.0,2.0]}"#, 3).unwrap();
        assert_eq!(v, vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn rejects_wrong_dimension() {
        assert!(matches!(
            parse_response(br#"{"embedding":[0.5]}"#, 3),
            Err(EmbedError::DimensionMismatch { got: 1, want: 3 })
        ));
    }

    #[test]
    fn rejects_malformed_body() {
        assert!(matches!(parse_response(b"<html>", 3), Err(EmbedError::Api(_))));
    }

    #[tokio::test]
    async fn empty_audio_rejected_before_network() {
        let e = HttpEmbedder::new("http://127.0.0.1:9");
        assert!(matches!(e.embed(&[]).await, Err(EmbedError::EmptyInput)));
    }
}
