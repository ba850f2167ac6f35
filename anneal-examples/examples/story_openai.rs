//! Story pipeline against the OpenAI API, streaming step events as it runs.
//!
//! Needs `OPENAI_API_KEY` (and optionally `OPENAI_BASE_URL`, `ANNEAL_MODEL`)
//! in the environment or a `.env` file.
//!
//! Run: `cargo run -p anneal-examples --example story_openai -- "a story about a retired astronaut"`

use tokio_stream::StreamExt;

use anneal::{
    Blackboard, PipelineEvent, RefineConfig, RefineryBuilder, StreamMode, Task, STORY_KEY,
};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let input = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "a story about a retired astronaut".to_string());

    let pipeline = RefineryBuilder::new(RefineConfig::from_env())
        .story_pipeline()
        .expect("pipeline builds");

    let mut stream = pipeline.stream(
        Task::new(input),
        Blackboard::new(),
        [StreamMode::Tasks, StreamMode::Values],
    );

    let mut final_board = Blackboard::new();
    while let Some(event) = stream.next().await {
        match event {
            PipelineEvent::StepStart { step_id } => eprintln!("running {step_id}..."),
            PipelineEvent::StepEnd {
                step_id,
                result: Err(message),
            } => eprintln!("{step_id} failed: {message}"),
            PipelineEvent::Values(board) => final_board = board,
            _ => {}
        }
    }

    match final_board.get_str(STORY_KEY) {
        Some(story) => println!("\n{story}"),
        None => {
            eprintln!("no story produced");
            std::process::exit(1);
        }
    }
}
