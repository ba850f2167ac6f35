//! Anneal CLI binary: run a refinement pipeline from the command line.
//!
//! Pipelines: `story` (planner → writer → editor/refiner loop) and `rag`
//! (retrieval → evaluator/enrichment fallback). Backend: OpenAI-compatible
//! by default (`OPENAI_API_KEY`, optional `OPENAI_BASE_URL`), or `--mock`
//! for an offline dry run with canned responses.

use std::collections::HashSet;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use tokio_stream::StreamExt;

use anneal::{
    Blackboard, MockLlm, MockResponse, PipelineEvent, RefineConfig, RefineryBuilder, StreamMode,
    Task, CRITIQUE_KEY, RAG_ANSWER_KEY, STORY_KEY,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum PipelineKind {
    /// Planner → writer → bounded {editor → refiner} loop.
    Story,
    /// Retrieval → single-pass {evaluator → enrichment} fallback.
    Rag,
}

#[derive(Parser, Debug)]
#[command(name = "anneal")]
#[command(about = "Anneal — run a bounded refinement pipeline from the CLI")]
struct Args {
    /// The task, e.g. "a short story about a lighthouse keeper"
    task: String,

    /// Which built-in pipeline to run
    #[arg(short, long, value_enum, default_value_t = PipelineKind::Story)]
    pipeline: PipelineKind,

    /// Iteration cap for the refinement loop (overrides ANNEAL_MAX_ITERATIONS)
    #[arg(short = 'n', long, value_name = "N")]
    max_iterations: Option<u32>,

    /// Chat model name (overrides ANNEAL_MODEL)
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// Use a canned mock backend instead of the OpenAI API
    #[arg(long)]
    mock: bool,

    /// Print step-by-step progress while running
    #[arg(short, long)]
    verbose: bool,

    /// Print the full final blackboard as JSON instead of just the artifact
    #[arg(long)]
    json: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "anneal=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn mock_llm(kind: PipelineKind) -> Arc<MockLlm> {
    let script = match kind {
        PipelineKind::Story => vec![
            MockResponse::text("Outline: a keeper, a storm, a failing lamp."),
            MockResponse::text("Draft: the keeper climbed the stairs as the storm rose..."),
            MockResponse::text("The middle drags; raise the stakes sooner."),
            MockResponse::text("Revised: the storm struck before the keeper reached the lamp..."),
            MockResponse::tool_call("approve"),
        ],
        PipelineKind::Rag => vec![
            MockResponse::text("The corpus does not cover this question."),
            MockResponse::text("Answer lacks specifics; enrichment needed."),
            MockResponse::text("Enriched answer synthesized from search results."),
        ],
    };
    Arc::new(MockLlm::scripted(script))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_logging(args.verbose);

    let mut config = RefineConfig::from_env();
    if let Some(n) = args.max_iterations {
        config.max_iterations = n;
    }
    if let Some(model) = args.model.clone() {
        config.model = model;
    }

    let mut builder = RefineryBuilder::new(config);
    if args.mock {
        builder = builder.with_llm(mock_llm(args.pipeline));
    }
    let pipeline = match args.pipeline {
        PipelineKind::Story => builder.story_pipeline()?,
        PipelineKind::Rag => builder.rag_pipeline()?,
    };

    let task = Task::new(&args.task);
    let mut modes = HashSet::from([StreamMode::Values]);
    if args.verbose {
        modes.insert(StreamMode::Tasks);
    }

    let mut stream = pipeline.stream(task, Blackboard::new(), modes);
    let mut final_board = Blackboard::new();
    let mut run_error: Option<String> = None;
    while let Some(event) = stream.next().await {
        match event {
            PipelineEvent::StepStart { step_id } if args.verbose => {
                eprintln!("▶ {step_id}");
            }
            PipelineEvent::StepEnd { step_id, result } if args.verbose => match result {
                Ok(()) => eprintln!("✔ {step_id}"),
                Err(message) => eprintln!("✘ {step_id}: {message}"),
            },
            PipelineEvent::Values(board) => {
                final_board = board;
            }
            PipelineEvent::RunEnd { outcome, reason } if args.verbose => match reason {
                Some(reason) => eprintln!("outcome: {outcome:?} ({reason})"),
                None => eprintln!("outcome: {outcome:?}"),
            },
            PipelineEvent::RunFailed { message } => {
                run_error = Some(message);
            }
            _ => {}
        }
    }

    if let Some(message) = run_error {
        eprintln!("error: {message}");
        std::process::exit(1);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&final_board)?);
        return Ok(());
    }

    let artifact_key = match args.pipeline {
        PipelineKind::Story => STORY_KEY,
        PipelineKind::Rag => RAG_ANSWER_KEY,
    };
    match final_board.get_str(artifact_key) {
        Some(artifact) => println!("{artifact}"),
        None => eprintln!("no artifact produced (key '{artifact_key}' missing)"),
    }
    if let Some(critique) = final_board.get_str(CRITIQUE_KEY) {
        eprintln!("\nunresolved critique: {critique}");
    }
    Ok(())
}
