//! Retrieval fallback pipeline with a scripted mock model.
//!
//! The evaluator finds the retrieved answer insufficient, so the enrichment
//! step supplements it exactly once before the single-pass cap ends the loop.
//!
//! Run: `cargo run -p anneal-examples --example rag_fallback -- "what changed in the latest release?"`

use std::sync::Arc;

use anneal::{
    Blackboard, MockLlm, MockResponse, RefineConfig, RefineryBuilder, RunContext, Task,
    RAG_ANSWER_KEY,
};

#[tokio::main]
async fn main() {
    let input = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "what changed in the latest release?".to_string());

    // Call order: retrieval, evaluator, enrichment.
    let llm = Arc::new(MockLlm::scripted(vec![
        MockResponse::text("The indexed corpus does not cover this question."),
        MockResponse::text("The answer lacks specifics; supplement it from a broader search."),
        MockResponse::text("The latest release adds streaming runs and a per-loop iteration cap."),
    ]));

    let pipeline = RefineryBuilder::new(RefineConfig::default())
        .with_llm(llm.clone())
        .rag_pipeline()
        .expect("pipeline builds");

    match pipeline
        .run(&Task::new(input), Blackboard::new(), &RunContext::new())
        .await
    {
        Ok(report) => {
            println!("outcome: {:?}, model calls: {}", report.outcome, llm.call_count());
            match report.blackboard.get_str(RAG_ANSWER_KEY) {
                Some(answer) => println!("\n{answer}"),
                None => {
                    eprintln!("no answer produced");
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
