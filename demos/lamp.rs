//! Lamp Statechart
//!
//! This example drives a hierarchical, parallel chart through a service.
//!
//! Key concepts:
//! - Compound and parallel states defined as JSON
//! - Named entry actions, guards and context assignments
//! - Observers receiving a snapshot after every event
//! - Final states absorbing further events
//!
//! Run with: cargo run --example lamp

use serde_json::json;
use statechart::{ChartDefinition, Event, Implementations, Service, StateChart};

fn main() {
    println!("=== Lamp Statechart ===\n");

    let definition = ChartDefinition::from_value(json!({
        "id": "lamp",
        "initial": "unlit",
        "context": { "color": "#fff" },
        "states": {
            "unlit": { "on": { "TURN_ON": "lit" } },
            "lit": {
                "type": "parallel",
                "entry": "announce",
                "on": {
                    "TURN_OFF": "unlit",
                    "BREAK": { "target": "broken", "cond": "isFragile" },
                    "CHANGE_COLOR": { "actions": "updateColor" }
                },
                "states": {
                    "pattern": {
                        "initial": "steady",
                        "states": {
                            "steady": { "on": { "PULSE": "pulsing" } },
                            "pulsing": { "on": { "STEADY": "steady" } }
                        }
                    },
                    "movement": {
                        "initial": "stationary",
                        "states": {
                            "stationary": { "on": { "MOVE": "oscillating" } },
                            "oscillating": { "on": { "HALT": "stationary" } }
                        }
                    }
                }
            },
            "broken": { "type": "final" }
        }
    }))
    .unwrap();

    let implementations = Implementations::new()
        .effect("announce", |scope| {
            println!("  [entry] lamp lit in {}", scope.context()["color"]);
            Ok(())
        })
        .assign_field("updateColor", "color", |ctx, event| {
            event.get("color").cloned().unwrap_or_else(|| ctx["color"].clone())
        })
        .guard("isFragile", |_ctx, _event| true);

    let chart = StateChart::new(definition, implementations).unwrap();
    let mut service = Service::new(chart);
    service.on_transition(|snapshot| {
        println!(
            "  {:<14} -> {}",
            snapshot.event.event_type(),
            snapshot.value()
        );
    });

    service.start().unwrap();
    for event in [
        Event::new("TURN_ON"),
        Event::new("PULSE"),
        Event::new("MOVE"),
        Event::new("CHANGE_COLOR").with("color", "#f00"),
        Event::new("TURN_OFF"),
        Event::new("TURN_ON"),
        Event::new("BREAK"),
        Event::new("TURN_ON"),
    ] {
        service.send(event).unwrap();
    }

    println!("\nFinal context: {}", service.context());
    println!("Done: {}", service.is_done());
    println!("Transitions recorded: {}", service.history().len());

    println!("\n=== Example Complete ===");
}
