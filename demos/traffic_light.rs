//! Traffic Light
//!
//! This example drives a cyclic graph from a fixed-step frame loop.
//!
//! Key concepts:
//! - Timed transitions with `after`
//! - A pedestrian button wired in as a `Signal`
//! - Periodic callbacks (the blinking "walk" lamp)
//! - Reading the transition history afterwards
//!
//! Run with: cargo run --example traffic_light

use framestate::builder::{after, TransitionBuilder};
use framestate::events::Signal;
use framestate::{Machine, TickDriver};
use std::cell::Cell;
use std::rc::Rc;

const FRAME: f32 = 0.25;

fn main() {
    println!("=== Traffic Light ===\n");

    let machine = Machine::new("crossing");
    let graph = machine.create_graph("light").unwrap();
    let red = graph.add_unit("Red").unwrap();
    let green = graph.add_unit("Green").unwrap();
    let yellow = graph.add_unit("Yellow").unwrap();

    red.add_transition(after(&green, 3.0)).unwrap();
    green.add_transition(after(&yellow, 4.0)).unwrap();
    yellow.add_transition(after(&red, 1.0)).unwrap();

    // Pressing the button cuts a green phase short once it has run for a second.
    let button = Signal::new();
    green
        .add_transition(
            TransitionBuilder::new()
                .on_signal(&button)
                .when(|elapsed| elapsed >= 1.0)
                .to(&yellow),
        )
        .unwrap();

    let blinks = Rc::new(Cell::new(0));
    let counter = Rc::clone(&blinks);
    red.every(0.5, move |ctx| {
        counter.set(counter.get() + 1);
        println!("  [walk lamp blinks at {:.2}s]", ctx.elapsed);
    });
    for unit in [&red, &green, &yellow] {
        let name = unit.name().to_string();
        unit.on_enter(move |_| println!("-> {name}"));
    }

    machine.start().unwrap();
    for frame in 0..48 {
        if frame == 20 {
            println!("  (pedestrian presses the button)");
            button.fire();
        }
        machine.run_frame(FRAME, FRAME).unwrap();
    }

    println!("\nWalk lamp blinked {} times", blinks.get());
    println!("Sequence: {}", graph.history().path().join(" -> "));

    machine.dispose().unwrap();
    println!("\n=== Example Complete ===");
}
