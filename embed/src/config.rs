/// Builder-style configuration for [`crate::HttpEmbedder`].
#[derive(Debug, Clone, Default)]
pub struct EmbedConfig {
    pub base_url: String,
    pub dimension: usize,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl EmbedConfig {
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_dimension(mut self, dim: usize) -> Self {
        self.dimension = dim;
        self
    }

    pub fn with_api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}
