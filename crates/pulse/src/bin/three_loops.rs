//! # Three Loops Demo
//!
//! Wires three independently-rated loops together:
//! 1. Physics (120 Hz) integrates a falling body and emits Modified
//! 2. Render (30 Hz) drains only the latest state from its inbox
//! 3. Input feed pushes KeyPress events through a channel bridge
//!
//! The render loop is a child of the physics loop, so stopping physics
//! cascades. Run with: `cargo run --bin three_loops`

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use pulse::{
    Event, EventKind, EventPayload, IdAllocator, LogSink, LoopUnit, MemorySink, ThreadUnit,
    UnitStatus,
};

fn main() {
    println!("PULSE three-loops demo");
    println!("  physics @ 120 Hz -> Modified events");
    println!("  render  @  30 Hz -> drain_latest");
    println!("  input poll       -> channel bridge");
    println!();

    let ids = IdAllocator::new();
    let sink = Arc::new(MemorySink::new());

    // Physics: integrate a falling body, publish its height.
    let mut height = 100.0_f64;
    let mut velocity = 0.0_f64;
    let physics = LoopUnit::new(
        "physics",
        move |unit: &ThreadUnit| {
            let dt = 1.0 / 120.0;
            velocity -= 9.81 * dt;
            height = (height + velocity * dt).max(0.0);
            unit.hub()
                .emit(Event::new(EventKind::Modified).with_payload(EventPayload::Scalar(height)));
        },
        1000.0 / 120.0,
        &ids,
        Arc::clone(&sink) as Arc<dyn LogSink>,
    );
    physics.enable_rate_tracking(true);

    // Render: replay only the most recent state per frame.
    let render = LoopUnit::new(
        "render",
        |unit: &ThreadUnit| {
            unit.hub().inbox().drain_latest();
        },
        1000.0 / 30.0,
        &ids,
        Arc::clone(&sink) as Arc<dyn LogSink>,
    );
    physics.hub().connect(EventKind::Modified, render.hub(), |e| {
        if let EventPayload::Scalar(height) = e.payload {
            println!("render: body at {height:6.2} m");
        }
    });

    // Input: poll key events from a channel bridge on the main thread.
    let keys = physics.hub().connect_channel(EventKind::KeyPress, 64);

    // Render follows physics' lifecycle.
    physics.unit().add_child(render.unit());
    physics.start(false);

    for code in [32_u32, 27] {
        thread::sleep(Duration::from_millis(400));
        physics.hub().emit(Event::new(EventKind::KeyPress).with_payload(EventPayload::Key {
            code,
            pressed: true,
        }));
        for event in keys.try_iter() {
            if let EventPayload::Key { code, .. } = event.payload {
                println!("input:  key {code}");
            }
        }
    }

    println!("physics rate: {:.1} updates/s", physics.rate());
    physics.stop(true);
    assert_eq!(physics.status(), UnitStatus::Inactive);
    assert_eq!(render.status(), UnitStatus::Inactive);

    for warning in sink.warnings() {
        println!("warn:   {warning}");
    }
    println!("stopped cleanly");
}
