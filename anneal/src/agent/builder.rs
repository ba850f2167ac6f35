//! Config-driven assembly of the built-in pipelines.
//!
//! `RefineConfig` holds the knobs (model, iteration cap, retry); callers
//! build it from env or CLI args. `RefineryBuilder` wires the collaborators
//! into the story pipeline (planner → writer → {editor → refiner} loop) or
//! the retrieval fallback pipeline (retrieval → {evaluator → enrichment}).

use std::sync::Arc;
use std::time::Duration;

use crate::llm::{ChatOpenAI, LlmClient, RetryPolicy};
use crate::pipeline::{BuildError, LoopBuilder, Pipeline, PipelineBuilder};

use super::critic::{CriticStep, LlmCritic};
use super::generate::LlmStep;
use super::prompts;
use super::revise::ReviserStep;
use super::{CRITIQUE_KEY, PLAN_KEY, RAG_ANSWER_KEY, STORY_KEY};

/// Knobs for a refinement pipeline. Build by hand or via [`from_env`].
///
/// [`from_env`]: RefineConfig::from_env
#[derive(Clone, Debug)]
pub struct RefineConfig {
    /// Chat model name (e.g. gpt-4o-mini).
    pub model: String,
    /// Iteration cap for the refinement loop.
    pub max_iterations: u32,
    /// Retry attempts for transient backend failures (0 disables retry).
    pub retry_attempts: usize,
    /// Initial delay for exponential backoff between retries.
    pub retry_initial: Duration,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_iterations: 3,
            retry_attempts: 0,
            retry_initial: Duration::from_millis(500),
        }
    }
}

impl RefineConfig {
    /// Builds config from environment variables; unset vars keep defaults.
    ///
    /// Reads: `ANNEAL_MODEL`, `ANNEAL_MAX_ITERATIONS`, `ANNEAL_RETRY_ATTEMPTS`,
    /// `ANNEAL_RETRY_INITIAL_MS`. Use after loading `.env` if desired
    /// (`dotenv::dotenv().ok()`). `OPENAI_API_KEY` and `OPENAI_BASE_URL` are
    /// consumed by the OpenAI client itself.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            model: std::env::var("ANNEAL_MODEL").unwrap_or(defaults.model),
            max_iterations: std::env::var("ANNEAL_MAX_ITERATIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_iterations),
            retry_attempts: std::env::var("ANNEAL_RETRY_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_attempts),
            retry_initial: std::env::var("ANNEAL_RETRY_INITIAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_initial),
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        if self.retry_attempts == 0 {
            RetryPolicy::None
        } else {
            RetryPolicy::exponential(
                self.retry_attempts,
                self.retry_initial,
                Duration::from_secs(30),
                2.0,
            )
        }
    }
}

/// Assembles the built-in pipelines from a [`RefineConfig`].
///
/// Without an explicit client, OpenAI clients are built from the config (the
/// critic's client gets the `approve` tool attached). Tests and offline runs
/// inject a shared client with [`with_llm`].
///
/// [`with_llm`]: RefineryBuilder::with_llm
pub struct RefineryBuilder {
    config: RefineConfig,
    llm: Option<Arc<dyn LlmClient>>,
}

impl RefineryBuilder {
    pub fn new(config: RefineConfig) -> Self {
        Self { config, llm: None }
    }

    /// Uses one shared client for every collaborator (e.g. a `MockLlm`).
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    fn generator_client(&self) -> Arc<dyn LlmClient> {
        match &self.llm {
            Some(llm) => llm.clone(),
            None => Arc::new(
                ChatOpenAI::new(&self.config.model).with_retry(self.config.retry_policy()),
            ),
        }
    }

    fn critic_client(&self) -> Arc<dyn LlmClient> {
        match &self.llm {
            Some(llm) => llm.clone(),
            None => Arc::new(
                ChatOpenAI::new(&self.config.model)
                    .with_tools(vec![LlmCritic::tool_spec()])
                    .with_retry(self.config.retry_policy()),
            ),
        }
    }

    /// Planner → writer → bounded {editor → refiner} loop.
    pub fn story_pipeline(&self) -> Result<Pipeline, BuildError> {
        let generator = self.generator_client();

        let refinement_loop = LoopBuilder::new(self.config.max_iterations)
            .id("refinement_loop")
            .step(CriticStep::new(
                "editor",
                Arc::new(LlmCritic::new(self.critic_client(), prompts::EDITOR_INSTRUCTION)
                    .named("editor")),
                STORY_KEY,
                CRITIQUE_KEY,
            ))
            .step(ReviserStep::new(
                "refiner",
                generator.clone(),
                prompts::REFINER_INSTRUCTION,
                STORY_KEY,
                CRITIQUE_KEY,
            ))
            .build()?;

        PipelineBuilder::new()
            .id("story_pipeline")
            .step(LlmStep::new(
                "planner",
                generator.clone(),
                prompts::PLANNER_INSTRUCTION,
                PLAN_KEY,
            ))
            .step(LlmStep::new(
                "writer",
                generator,
                prompts::WRITER_INSTRUCTION,
                STORY_KEY,
            ))
            .step(refinement_loop)
            .build()
    }

    /// Retrieval → single-pass {evaluator → enrichment} fallback loop.
    ///
    /// One pass is the point: the evaluator either approves the retrieved
    /// answer or the enrichment step supplements it, exactly once.
    pub fn rag_pipeline(&self) -> Result<Pipeline, BuildError> {
        let generator = self.generator_client();

        let fallback_loop = LoopBuilder::new(1)
            .id("fallback_loop")
            .step(CriticStep::new(
                "evaluator",
                Arc::new(
                    LlmCritic::new(self.critic_client(), prompts::EVALUATOR_INSTRUCTION)
                        .named("evaluator"),
                ),
                RAG_ANSWER_KEY,
                CRITIQUE_KEY,
            ))
            .step(ReviserStep::new(
                "enrichment",
                generator.clone(),
                prompts::ENRICHMENT_INSTRUCTION,
                RAG_ANSWER_KEY,
                CRITIQUE_KEY,
            ))
            .build()?;

        PipelineBuilder::new()
            .id("rag_pipeline")
            .step(LlmStep::new(
                "retrieval",
                generator,
                prompts::RETRIEVAL_INSTRUCTION,
                RAG_ANSWER_KEY,
            ))
            .step(fallback_loop)
            .build()
    }
}
