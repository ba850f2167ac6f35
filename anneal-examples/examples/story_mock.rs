//! Story pipeline with a scripted mock model: planner → writer → {editor →
//! refiner} loop, no API key needed.
//!
//! The scripted editor critiques the first draft and approves the revision,
//! so the loop ends after two passes.
//!
//! Run: `cargo run -p anneal-examples --example story_mock -- "a story about a lighthouse keeper"`

use std::sync::Arc;

use anneal::{
    Blackboard, MockLlm, MockResponse, RefineConfig, RefineryBuilder, RunContext, Task, STORY_KEY,
};

#[tokio::main]
async fn main() {
    let input = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "a story about a lighthouse keeper".to_string());

    // Call order: planner, writer, editor, refiner, editor again.
    let llm = Arc::new(MockLlm::scripted(vec![
        MockResponse::text("Outline: a keeper, a storm, a failing lamp."),
        MockResponse::text("The keeper climbed the stairs as the storm rose over the point."),
        MockResponse::text("The ending is rushed; let the storm arrive earlier."),
        MockResponse::text(
            "The storm struck before the keeper reached the lamp, and the climb became a race.",
        ),
        MockResponse::tool_call("approve"),
    ]));

    let pipeline = RefineryBuilder::new(RefineConfig::default())
        .with_llm(llm.clone())
        .story_pipeline()
        .expect("pipeline builds");

    match pipeline
        .run(&Task::new(input), Blackboard::new(), &RunContext::new())
        .await
    {
        Ok(report) => {
            println!("outcome: {:?} after {} step(s)", report.outcome, report.iterations);
            println!("model calls: {}", llm.call_count());
            match report.blackboard.get_str(STORY_KEY) {
                Some(story) => println!("\n{story}"),
                None => {
                    eprintln!("no story produced");
                    std::process::exit(1);
                }
            }
        }
        Err(failure) => {
            eprintln!("error: {failure}");
            std::process::exit(1);
        }
    }
}
