//! Long-lived collaborators shared by the commands.

use ragbot_core::{AppConfig, AppResult};
use ragbot_knowledge::{
    create_provider, create_web_search, DocumentIngestor, EmbeddingProvider, PipelineSettings,
    RagPipeline, Retriever, SqliteVectorStore, VectorStore, WebSearchProvider,
};
use ragbot_llm::{create_client, LlmClient};
use ragbot_prompt::PromptBuilder;
use std::sync::Arc;

/// Every collaborator, built once per process from configuration.
pub struct Services {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn LlmClient>,
    pub web: Arc<dyn WebSearchProvider>,
    pub pipeline: RagPipeline,
    pub ingestor: DocumentIngestor,
}

impl Services {
    /// Construct the clients and wire them into the pipeline and ingestor.
    ///
    /// Nothing here touches the network; remote services are probed on use.
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        config.validate()?;

        let embedder = create_provider(&config.embedding)?;
        let store: Arc<dyn VectorStore> =
            Arc::new(SqliteVectorStore::open(&config.vector_store_path())?);
        let llm = create_client(&config.llm)?;
        let web = create_web_search(&config.web_search, config.resolve_web_api_key())?;
        let prompts = PromptBuilder::from_workspace(&config.workspace)?;

        tracing::debug!(
            "Services: llm={}, embedding={}/{}, store={}, web={}",
            llm.provider_name(),
            embedder.provider_name(),
            embedder.model_name(),
            store.backend_name(),
            web.provider_name()
        );

        let retriever = Retriever::new(embedder.clone(), store.clone())
            .with_timeouts(config.embedding_timeout(), config.vector_store_timeout());

        let pipeline = RagPipeline::new(
            retriever,
            llm.clone(),
            Some(web.clone()),
            prompts,
            PipelineSettings::from_config(config),
        );

        let ingestor = DocumentIngestor::from_config(config, embedder.clone(), store.clone());

        Ok(Self {
            embedder,
            store,
            llm,
            web,
            pipeline,
            ingestor,
        })
    }
}
