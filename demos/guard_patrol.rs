//! Guard Patrol
//!
//! This example builds a small hierarchical AI for a guard.
//!
//! Key concepts:
//! - A sub-graph nested inside the `Patrol` unit
//! - Any-state transitions reacting to scoped events
//! - An injected world event bus with filtered subscriptions
//! - Loading runtime tunables from JSON
//!
//! Run with: cargo run --example guard_patrol

use framestate::builder::{after, go_to_when, TransitionBuilder};
use framestate::config::RuntimeConfig;
use framestate::events::{EventBus, EventChannel, EventFilter};
use framestate::{Machine, StateUnit};
use serde_json::json;
use std::cell::Cell;
use std::rc::Rc;

fn announce(unit: &StateUnit, path: &str) {
    let entered = format!("{path}/{}", unit.name());
    unit.on_enter(move |_| println!("  enter {entered}"));
}

fn main() {
    println!("=== Guard Patrol ===\n");

    let config = RuntimeConfig::from_json_str(
        r#"{ "max_transitions_per_tick": 8, "history_capacity": 64 }"#,
    )
    .unwrap();
    let machine = Machine::with_config("guard", config);
    let world: Rc<dyn EventBus> = Rc::new(EventChannel::new("world"));

    let brain = machine.create_graph("brain").unwrap();
    let patrol = brain.add_unit("Patrol").unwrap();
    let chase = brain.add_unit("Chase").unwrap();
    let search = brain.add_unit("Search").unwrap();
    for unit in [&patrol, &chase, &search] {
        announce(unit, "brain");
    }

    // Patrol loops over waypoints in its own graph.
    let route = patrol.create_sub_graph("route").unwrap();
    let waypoints: Vec<StateUnit> = ["Gate", "Tower", "Yard"]
        .iter()
        .map(|name| route.add_unit(*name).unwrap())
        .collect();
    for (i, waypoint) in waypoints.iter().enumerate() {
        announce(waypoint, "brain/Patrol/route");
        let next = &waypoints[(i + 1) % waypoints.len()];
        waypoint.add_transition(after(next, 2.0)).unwrap();
    }

    // Seeing the intruder interrupts whatever the guard is doing.
    brain
        .add_any_transition(TransitionBuilder::new().on_event("spotted").to(&chase))
        .unwrap();
    chase
        .add_transition(TransitionBuilder::new().on_event("lost").to(&search))
        .unwrap();
    let gave_up = Rc::new(Cell::new(false));
    let flag = Rc::clone(&gave_up);
    search
        .add_transition(go_to_when(&patrol, move |elapsed| {
            let done = elapsed >= 3.0;
            flag.set(flag.get() || done);
            done
        }))
        .unwrap();

    // Only noises near the guard matter, and only while searching.
    search
        .subscribe(
            Rc::clone(&world),
            "noise",
            Some(EventFilter::new("zone", "yard")),
            |event| println!("  heard {} while searching", event.payload),
        )
        .unwrap();

    machine.start().unwrap();
    for second in 0..14 {
        match second {
            5 => machine.local_raise("spotted", &json!({ "at": "Tower" })).unwrap(),
            7 => machine.local_raise("lost", &json!({})).unwrap(),
            8 => {
                world.publish("noise", &json!({ "zone": "gate" }));
                world.publish("noise", &json!({ "zone": "yard", "volume": 0.7 }));
            }
            _ => {}
        }
        machine.update(1.0).unwrap();
    }

    println!("\nGave up searching: {}", gave_up.get());
    println!("Brain: {}", brain.history().path().join(" -> "));
    println!("Route: {}", route.history().path().join(" -> "));
    println!("\nHistory as JSON:\n{}", brain.history().to_json().unwrap());

    machine.dispose().unwrap();
    println!("\n=== Example Complete ===");
}
