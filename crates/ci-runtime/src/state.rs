use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use ci_codeindex::{Indexer, SqliteVectorStore, VectorStore};
use ci_core::{CiConfig, CiPaths};
use ci_engine::{MemoryVectorStore, Processor, RetrievalEngine};
use ci_llm::{EmbeddingProvider, OpenAiCompatibleProvider, SummarizationProvider};
use ci_providers::ManifestRegistry;
use ci_store::Database;
use ci_types::{MachineId, ProjectRoot};

use crate::cors::DynamicOrigins;
use crate::dedup::DedupCache;
use crate::error::Result;
use crate::tunnel::TunnelManager;

/// Everything a route handler needs, assembled once at startup and shared
/// behind `Arc` across every axum handler. Config is the only field that
/// changes after startup — it sits behind its own lock so a `PUT
/// /api/config` can hot-swap provider settings without restarting the
/// processor or the HTTP listener.
#[derive(Clone)]
pub struct AppState {
    pub project_root: ProjectRoot,
    pub machine_id: MachineId,
    pub paths: Arc<CiPaths>,
    pub config: Arc<RwLock<CiConfig>>,
    pub db: Arc<Database>,
    pub code_store: Arc<dyn VectorStore>,
    pub memory_store: Arc<MemoryVectorStore>,
    pub indexer: Arc<Indexer>,
    pub retrieval: Arc<RetrievalEngine>,
    pub processor: Arc<Processor>,
    pub manifests: Arc<ManifestRegistry>,
    pub dedup: Arc<DedupCache>,
    pub cors_origins: DynamicOrigins,
    pub tunnel: Arc<TunnelManager>,
    pub port: u16,
    pub started_at: Instant,
}

impl AppState {
    /// Builds the provider pair, storage layer, and engine objects from a
    /// loaded config. Does not touch the network beyond what the providers
    /// themselves lazily do on first use.
    pub fn assemble(
        project_root: ProjectRoot,
        machine_id: MachineId,
        config: CiConfig,
        port: u16,
    ) -> Result<Self> {
        let paths = Arc::new(CiPaths::new(project_root.clone()));
        paths.ensure_data_dir()?;

        let db = Arc::new(Database::open(&paths.activities_db())?);
        let code_store: Arc<dyn VectorStore> = Arc::new(SqliteVectorStore::open(&paths.vector_dir().join("code.db"))?);
        let memory_store = Arc::new(MemoryVectorStore::open(&paths.vector_dir().join("memory.db"))?);

        let embedder = build_embedder(&config);
        let summarizer = build_summarizer(&config);

        let indexer = Arc::new(Indexer::new(embedder.clone(), code_store.clone(), None));
        let retrieval = Arc::new(RetrievalEngine::new(embedder.clone(), code_store.clone(), memory_store.clone()));
        let processor = Arc::new(Processor::new(db.clone(), memory_store.clone(), summarizer, embedder));

        let dedup = Arc::new(DedupCache::new(config.dedup_cache_size));

        Ok(Self {
            project_root,
            machine_id,
            paths,
            config: Arc::new(RwLock::new(config)),
            db,
            code_store,
            memory_store,
            indexer,
            retrieval,
            processor,
            manifests: Arc::new(ManifestRegistry::new()),
            dedup,
            cors_origins: DynamicOrigins::new(port),
            tunnel: Arc::new(TunnelManager::new()),
            port,
            started_at: Instant::now(),
        })
    }

    pub fn config_snapshot(&self) -> CiConfig {
        self.config.read().expect("config lock poisoned").clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

pub fn build_embedder(config: &CiConfig) -> Arc<dyn EmbeddingProvider> {
    Arc::new(OpenAiCompatibleProvider::new(
        config.embedding.base_url.clone(),
        config.embedding.model.clone(),
        config.embedding.api_key.clone(),
        Duration::from_secs(config.embedding.timeout_secs),
    ))
}

pub fn build_summarizer(config: &CiConfig) -> Arc<dyn SummarizationProvider> {
    Arc::new(OpenAiCompatibleProvider::new(
        config.summarization.base_url.clone(),
        config.summarization.model.clone(),
        config.summarization.api_key.clone(),
        Duration::from_secs(config.summarization.timeout_secs),
    ))
}
