//! Caller-facing entry point.

use std::sync::Arc;

use bon::Builder;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::agent_loop::{SessionEventSink, SessionLimits, SessionOutcome, SessionRequest, SessionRunner};
use crate::config::QuarryConfig;
use crate::datasource::{DriverRegistry, SourceRegistry};
use crate::error::Result;
use crate::learning::{HttpLearningClient, LearningCollaborator};
use crate::models::{ModelSelector, DEFAULT_MODEL};
use crate::output::TypeDescriptor;
use crate::provider::{ModelProvider, ProviderRegistry};
use crate::search::SearchEngine;
use crate::tools::{builtin_catalog, QueryContext};

/// One question to answer.
///
/// ```
/// use quarry::output::TypeDescriptor;
/// use quarry::AskRequest;
///
/// let request = AskRequest::builder()
///     .question("How many orders shipped last week?")
///     .output_type(TypeDescriptor::optional(TypeDescriptor::Integer))
///     .model("ollama:llama3.1")
///     .max_turns(10)
///     .build();
/// assert_eq!(request.max_turns, Some(10));
/// ```
#[derive(Debug, Clone, Builder)]
pub struct AskRequest {
    #[builder(into)]
    pub question: String,
    pub output_type: TypeDescriptor,
    /// Extra caller knowledge included in the instructions.
    #[builder(into)]
    pub context: Option<String>,
    /// `provider:model` selector overriding the configured model.
    #[builder(into)]
    pub model: Option<String>,
    pub max_turns: Option<usize>,
    pub cancel: Option<CancellationToken>,
}

impl AskRequest {
    pub fn new(question: impl Into<String>, output_type: TypeDescriptor) -> Self {
        Self {
            question: question.into(),
            output_type,
            context: None,
            model: None,
            max_turns: None,
            cancel: None,
        }
    }
}

/// Answers questions over a fixed set of sources.
///
/// Cheap to clone; every `ask` runs an independent session with its own
/// transcript and search index.
#[derive(Clone)]
pub struct Quarry {
    config: QuarryConfig,
    providers: ProviderRegistry,
    sources: Arc<SourceRegistry>,
    learning: Option<Arc<dyn LearningCollaborator>>,
    provider_override: Option<Arc<dyn ModelProvider>>,
    event_sink: Option<SessionEventSink>,
}

impl Quarry {
    /// Use already-connected sources.
    pub fn new(config: QuarryConfig, sources: SourceRegistry) -> Self {
        let learning = config.learning.as_ref().map(|settings| {
            Arc::new(HttpLearningClient::from_settings(settings)) as Arc<dyn LearningCollaborator>
        });
        Self {
            config,
            providers: ProviderRegistry::default(),
            sources: Arc::new(sources),
            learning,
            provider_override: None,
            event_sink: None,
        }
    }

    /// Validate the config and connect every configured source.
    pub async fn from_config(config: QuarryConfig, drivers: &DriverRegistry) -> Result<Self> {
        config.validate()?;
        let sources = SourceRegistry::from_config(&config, drivers).await?;
        Ok(Self::new(config, sources))
    }

    /// Answer every question with this provider, ignoring model selectors.
    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider_override = Some(provider);
        self
    }

    pub fn with_provider_registry(mut self, providers: ProviderRegistry) -> Self {
        self.providers = providers;
        self
    }

    pub fn with_learning(mut self, learning: Arc<dyn LearningCollaborator>) -> Self {
        self.learning = Some(learning);
        self
    }

    pub fn with_event_sink(mut self, sink: SessionEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &QuarryConfig {
        &self.config
    }

    pub fn sources(&self) -> &Arc<SourceRegistry> {
        &self.sources
    }

    fn resolve_provider(&self, model: Option<&str>) -> Result<Arc<dyn ModelProvider>> {
        if let Some(provider) = &self.provider_override {
            return Ok(provider.clone());
        }
        let selector = model
            .or(self.config.model.as_deref())
            .unwrap_or(DEFAULT_MODEL);
        let model = ModelSelector::parse(selector)?;
        debug!(%model, "resolving provider");
        self.providers.resolve(&model, &self.config)
    }

    /// Run a full session.
    ///
    /// Errors here are setup failures (no usable provider). Failures inside
    /// the session are reported by [`SessionOutcome::error`].
    pub async fn run(&self, request: AskRequest) -> Result<SessionOutcome> {
        let provider = self.resolve_provider(request.model.as_deref())?;
        let limits = SessionLimits::resolve(request.max_turns, &self.config.agent);

        let context = QueryContext::new(
            self.sources.clone(),
            SearchEngine::new(self.config.search.limit),
            self.config.data.clone(),
        )
        .with_learning(self.learning.clone());
        let catalog = builtin_catalog(Arc::new(context));

        let mut runner = SessionRunner::new(provider, catalog, self.sources.clone(), limits);
        if let Some(sink) = &self.event_sink {
            runner = runner.with_event_sink(sink.clone());
        }

        let session = SessionRequest {
            question: request.question,
            output_type: request.output_type,
            context: request.context,
            cancel: request.cancel.unwrap_or_default(),
        };
        Ok(runner.run(&session).await)
    }

    /// Answer a question, returning the coerced value.
    ///
    /// An exhausted session yields `null` for nullable types and a
    /// validation error otherwise.
    pub async fn ask(&self, request: AskRequest) -> Result<Value> {
        self.run(request).await?.into_result()
    }
}

impl std::fmt::Debug for Quarry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Quarry")
            .field("config", &self.config)
            .field("sources", &self.sources)
            .field("learning", &self.learning.is_some())
            .field("provider_override", &self.provider_override.is_some())
            .finish()
    }
}
