use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub struct EmbedResult {
    pub vectors: Vec<Vec<f32>>,
    pub dimensions: usize,
}

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<EmbedResult>;
    fn dimensions(&self) -> usize;
    fn name(&self) -> &str;
    fn is_available(&self) -> bool;
    async fn check_availability(&self) -> Result<()>;
}

#[async_trait]
pub trait SummarizationProvider: Send + Sync {
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String>;
    fn name(&self) -> &str;
}
