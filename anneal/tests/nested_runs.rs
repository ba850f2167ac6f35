//! Integration test: composition across runners — streaming a pipeline with
//! a nested loop, and cancelling the outer run while the inner loop works.


use std::time::Duration;

use async_trait::async_trait;
use tokio_stream::StreamExt;

use anneal::{
    Blackboard, LoopBuilder, PipelineBuilder, PipelineError, PipelineEvent, RunContext, Step,
    StepOutput, StreamMode, Task,
};

/// Writes a fixed value; sleeps first when `delay` is set.
struct SlowWrite {
    id: &'static str,
    key: &'static str,
    value: &'static str,
    delay: Option<Duration>,
}

#[async_trait]
impl Step for SlowWrite {
    fn id(&self) -> &str {
        self.id
    }

    async fn run(&self, _task: &Task, _board: &Blackboard) -> Result<StepOutput, PipelineError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(StepOutput::unchanged().write_str(self.key, self.value))
    }
}

fn quick(id: &'static str, key: &'static str, value: &'static str) -> SlowWrite {
    SlowWrite {
        id,
        key,
        value,
        delay: None,
    }
}

/// **Scenario**: streaming a pipeline containing a loop emits step events for
/// the outer steps and ends with the stream closing after the run finishes.
#[tokio::test]
async fn pipeline_with_nested_loop_streams_step_events() {
    let inner = LoopBuilder::new(2)
        .id("polish_loop")
        .step(quick("polish", "artifact", "polished"))
        .build()
        .expect("loop builds");

    let pipeline = PipelineBuilder::new()
        .step(quick("draft", "artifact", "draft"))
        .step(inner)
        .build()
        .expect("pipeline builds");

    let mut stream = pipeline.stream(Task::new("t"), Blackboard::new(), [StreamMode::Tasks]);

    let mut step_ids = Vec::new();
    while let Some(event) = stream.next().await {
        if let PipelineEvent::StepEnd { step_id, result } = event {
            assert!(result.is_ok());
            step_ids.push(step_id);
        }
    }
    // The nested loop shares the context, so its inner step events appear
    // between the outer ones.
    assert_eq!(step_ids, vec!["draft", "polish", "polish", "polish_loop"]);
}

/// **Scenario**: cancelling the outer context while the nested loop is mid
/// step drops the pending step; the outer board keeps only committed work.
#[tokio::test]
async fn outer_cancellation_reaches_nested_loop() {
    let inner = LoopBuilder::new(3)
        .id("slow_loop")
        .step(SlowWrite {
            id: "slow",
            key: "never",
            value: "lands",
            delay: Some(Duration::from_secs(60)),
        })
        .build()
        .expect("loop builds");

    let pipeline = PipelineBuilder::new()
        .step(quick("fast", "done", "yes"))
        .step(inner)
        .build()
        .expect("pipeline builds");

    let ctx = RunContext::new();
    let cancel = ctx.cancel.clone();
    let handle = tokio::spawn({
        let pipeline = pipeline.clone();
        let ctx = ctx.clone();
        async move { pipeline.run(&Task::new("t"), Blackboard::new(), &ctx).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();

    let report = handle
        .await
        .expect("join")
        .expect("cancellation is not a failure");
    assert_eq!(report.outcome, anneal::Outcome::Cancelled);
    assert_eq!(report.blackboard.get_str("done"), Some("yes"));
    assert!(!report.blackboard.contains_key("never"));
}
