pub mod error;
mod openai_compatible;
mod traits;

pub use error::{Error, Result};
pub use openai_compatible::OpenAiCompatibleProvider;
pub use traits::{EmbedResult, EmbeddingProvider, SummarizationProvider};
