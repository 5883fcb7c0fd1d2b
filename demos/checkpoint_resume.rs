//! Checkpoint and Resume
//!
//! This example saves a running service and resumes it from both
//! serialization formats.
//!
//! Key concepts:
//! - Checkpoints capture active states, context, history and metadata
//! - JSON for readability, binary for compactness
//! - Restoring does not re-run entry actions
//! - Checkpoints are checked against the chart they are restored into
//!
//! Run with: cargo run --example checkpoint_resume

use serde_json::json;
use statechart::{
    ChartBuilder, Checkpoint, Implementations, Service, StateBuilder, StateChart,
    TransitionBuilder,
};

fn pipeline() -> StateChart {
    ChartBuilder::new("pipeline")
        .context(json!({ "processed": 0 }))
        .initial("mapping")
        .state(
            "mapping",
            StateBuilder::atomic()
                .entry("log")
                .on("ITEM", TransitionBuilder::new().action("count"))
                .on("MAPPED", "reducing"),
        )
        .state(
            "reducing",
            StateBuilder::atomic().entry("log").on("REDUCED", "complete"),
        )
        .state("complete", StateBuilder::final_state())
        .build(
            Implementations::new()
                .effect("log", |scope| {
                    println!("  [entry] after {}", scope.event().event_type());
                    Ok(())
                })
                .assign_field("count", "processed", |ctx, _event| {
                    json!(ctx["processed"].as_u64().unwrap_or(0) + 1)
                }),
        )
        .unwrap()
}

fn main() {
    println!("=== Checkpoint and Resume ===\n");

    let mut service = Service::new(pipeline());
    service.start().unwrap();
    for event in ["ITEM", "ITEM", "ITEM", "MAPPED"] {
        service.send(event).unwrap();
    }

    let checkpoint = service.checkpoint().unwrap();
    let json = checkpoint.to_json().unwrap();
    let binary = checkpoint.to_binary().unwrap();
    println!("\nCheckpoint taken in {:?}", checkpoint.configuration);
    println!("  JSON:   {} bytes", json.len());
    println!("  binary: {} bytes", binary.len());

    println!("\nSimulating interruption...");
    drop(service);

    let restored = Checkpoint::from_binary(&binary).unwrap();
    let mut resumed = Service::restore(pipeline(), &restored).unwrap();
    println!("Resumed in {}", resumed.state_value().unwrap());
    println!("  processed so far: {}", resumed.context()["processed"]);

    resumed.send("REDUCED").unwrap();
    println!("\nDone: {}", resumed.is_done());
    println!(
        "Events processed across both runs: {}",
        resumed.metadata().events_processed
    );

    let foreign = ChartBuilder::new("other")
        .initial("idle")
        .state("idle", StateBuilder::atomic())
        .build(Implementations::new())
        .unwrap();
    let from_json = Checkpoint::from_json(&json).unwrap();
    match Service::restore(foreign, &from_json) {
        Ok(_) => println!("Unexpectedly restored into a different chart"),
        Err(error) => println!("Restoring into another chart fails: {error}"),
    }

    println!("\n=== Example Complete ===");
}
