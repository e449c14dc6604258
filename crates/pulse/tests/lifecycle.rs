//! # Lifecycle Integration Tests
//!
//! End-to-end scenarios spanning both crates:
//!
//! 1. **Dispatch ordering**: direct observers fire before `emit`
//!    returns, queued observers wait in the receiver's inbox
//! 2. **Cascade**: stopping a parent unit stops its loop children
//! 3. **Driver barrier**: `wait_for_init` holds until every module
//!    has finished `init`
//! 4. **Driver fan-out**: a single status request reaches all modules
//!
//! Run with: cargo test --test lifecycle -- --nocapture

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use pulse::{
    DriverStatus, Event, EventHub, EventKind, EventPayload, ExecutionType, IdAllocator, LogSink,
    LoopUnit, MemorySink, Module, ModuleBehavior, ModuleDriver, ModuleStatus, ThreadUnit,
    UnitStatus,
};

fn sink() -> Arc<dyn LogSink> {
    Arc::new(MemorySink::new())
}

fn wait_for_status(module: &Module, target: ModuleStatus) {
    let deadline = std::time::Instant::now() + Duration::from_secs(2);
    while module.status() != target {
        assert!(
            std::time::Instant::now() < deadline,
            "module '{}' never reached {:?}",
            module.name(),
            target
        );
        thread::sleep(Duration::from_millis(1));
    }
}

// ============================================================================
// DISPATCH ORDERING ACROSS HUBS
// ============================================================================

#[test]
fn direct_observers_run_inline_queued_wait_for_drain() {
    let ids = IdAllocator::new();
    let sender = EventHub::new(&ids, sink());
    let receiver = EventHub::new(&ids, sink());

    let direct_log = Arc::new(Mutex::new(Vec::new()));
    let queued_log = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&direct_log);
    let _sub = sender.connect_direct(EventKind::Modified, move |e| {
        if let EventPayload::Scalar(v) = e.payload {
            log.lock().push(v);
        }
    });
    let log = Arc::clone(&queued_log);
    sender.connect(EventKind::Modified, &receiver, move |e| {
        if let EventPayload::Scalar(v) = e.payload {
            log.lock().push(v);
        }
    });

    sender.emit(Event::new(EventKind::Modified).with_payload(EventPayload::Scalar(1.0)));
    sender.emit(Event::new(EventKind::Modified).with_payload(EventPayload::Scalar(2.0)));

    // Direct side already ran on the emitting thread; queued side is
    // parked in the receiver's inbox until it chooses to drain.
    assert_eq!(*direct_log.lock(), vec![1.0, 2.0]);
    assert!(queued_log.lock().is_empty());
    assert_eq!(receiver.inbox().len(), 2);

    receiver.inbox().drain_all();
    assert_eq!(*queued_log.lock(), vec![1.0, 2.0]);
    assert!(receiver.inbox().is_empty());
}

#[test]
fn channel_bridge_delivers_across_threads() {
    let ids = IdAllocator::new();
    let hub = Arc::new(EventHub::new(&ids, sink()));
    let rx = hub.connect_channel(EventKind::KeyPress, 16);

    let emitter = Arc::clone(&hub);
    let handle = thread::spawn(move || {
        for code in 0..4u32 {
            emitter.emit(
                Event::new(EventKind::KeyPress)
                    .with_payload(EventPayload::Key { code, pressed: true }),
            );
        }
    });
    handle.join().unwrap();

    let codes: Vec<u32> = rx
        .try_iter()
        .filter_map(|e| match e.payload {
            EventPayload::Key { code, .. } => Some(code),
            _ => None,
        })
        .collect();
    assert_eq!(codes, vec![0, 1, 2, 3]);
}

// ============================================================================
// PARENT / CHILD CASCADE
// ============================================================================

#[test]
fn stopping_parent_cascades_to_loop_children() {
    let ids = IdAllocator::new();
    let parent = ThreadUnit::new("root", |_: &ThreadUnit| {}, &ids, sink());

    let steps = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&steps);
    let child = LoopUnit::new(
        "worker",
        move |_: &ThreadUnit| {
            counter.fetch_add(1, Ordering::Relaxed);
        },
        1.0,
        &ids,
        sink(),
    );
    parent.add_child(child.unit());

    // Starting the parent brings the child up with it.
    parent.start(false);
    thread::sleep(Duration::from_millis(50));
    assert!(steps.load(Ordering::Relaxed) > 0);

    parent.stop(true);
    assert_eq!(parent.status(), UnitStatus::Inactive);
    assert_eq!(child.status(), UnitStatus::Inactive);

    // Child no longer runs once stopped.
    let settled = steps.load(Ordering::Relaxed);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(steps.load(Ordering::Relaxed), settled);
}

#[test]
fn end_event_reaches_observer_on_cascade() {
    let ids = IdAllocator::new();
    let parent = ThreadUnit::new("root", |_: &ThreadUnit| {}, &ids, sink());
    let child = ThreadUnit::new("leaf", |_: &ThreadUnit| {}, &ids, sink());
    parent.add_child(&child);

    let ends = Arc::new(AtomicU32::new(0));
    let seen = Arc::clone(&ends);
    let _sub = child.hub().connect_direct(EventKind::End, move |_| {
        seen.fetch_add(1, Ordering::Relaxed);
    });

    parent.start(false);
    thread::sleep(Duration::from_millis(20));
    parent.stop(true);

    assert!(ends.load(Ordering::Relaxed) >= 1);
}

// ============================================================================
// DRIVER BARRIER AND FAN-OUT
// ============================================================================

struct CountingBehavior {
    init_delay: Duration,
    inits: Arc<AtomicUsize>,
    updates: Arc<AtomicUsize>,
}

impl ModuleBehavior for CountingBehavior {
    fn init(&mut self) {
        thread::sleep(self.init_delay);
        self.inits.fetch_add(1, Ordering::SeqCst);
    }

    fn update(&mut self, _dt: f64) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn uninit(&mut self) {}
}

#[test]
fn driver_barrier_waits_for_slow_module_init() {
    let ids = IdAllocator::new();
    let inits = Arc::new(AtomicUsize::new(0));
    let updates = Arc::new(AtomicUsize::new(0));

    let fast = Module::new(
        "fast",
        ExecutionType::Parallel,
        CountingBehavior {
            init_delay: Duration::ZERO,
            inits: Arc::clone(&inits),
            updates: Arc::clone(&updates),
        },
        1.0,
        &ids,
        sink(),
    );
    let slow = Module::new(
        "slow",
        ExecutionType::Parallel,
        CountingBehavior {
            init_delay: Duration::from_millis(60),
            inits: Arc::clone(&inits),
            updates: Arc::clone(&updates),
        },
        1.0,
        &ids,
        sink(),
    );

    let driver = Arc::new(ModuleDriver::new(sink()));
    driver.add_module(&fast);
    driver.add_module(&slow);

    let fast_runner = Arc::clone(&fast);
    let slow_runner = Arc::clone(&slow);
    let t1 = thread::spawn(move || fast_runner.start());
    let t2 = thread::spawn(move || slow_runner.start());

    driver.wait_for_init();
    assert_eq!(inits.load(Ordering::SeqCst), 2);
    assert!(fast.is_initialized());
    assert!(slow.is_initialized());

    driver.request_status(DriverStatus::Stopped);
    t1.join().unwrap();
    t2.join().unwrap();
    assert_eq!(fast.status(), ModuleStatus::Inactive);
    assert_eq!(slow.status(), ModuleStatus::Inactive);
}

#[test]
fn driver_pause_and_resume_fan_out_to_all_modules() {
    let ids = IdAllocator::new();
    let inits = Arc::new(AtomicUsize::new(0));
    let updates = Arc::new(AtomicUsize::new(0));

    let modules: Vec<Arc<Module>> = (0..2)
        .map(|i| {
            Module::new(
                format!("mod-{i}"),
                ExecutionType::Sequential,
                CountingBehavior {
                    init_delay: Duration::ZERO,
                    inits: Arc::clone(&inits),
                    updates: Arc::clone(&updates),
                },
                1.0,
                &ids,
                sink(),
            )
        })
        .collect();

    let driver = Arc::new(ModuleDriver::new(sink()));
    let mut runners = Vec::new();
    for module in &modules {
        driver.add_module(module);
        let runner = Arc::clone(module);
        runners.push(thread::spawn(move || runner.start()));
    }

    driver.wait_for_init();
    thread::sleep(Duration::from_millis(30));
    assert!(updates.load(Ordering::SeqCst) > 0);

    driver.request_status(DriverStatus::Paused);
    for module in &modules {
        wait_for_status(module, ModuleStatus::Paused);
    }
    let paused_at = updates.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(updates.load(Ordering::SeqCst), paused_at);

    driver.request_status(DriverStatus::Running);
    thread::sleep(Duration::from_millis(30));
    assert!(updates.load(Ordering::SeqCst) > paused_at);

    driver.request_status(DriverStatus::Stopped);
    for runner in runners {
        runner.join().unwrap();
    }
}

#[test]
fn driver_start_blocks_until_stop_requested() {
    let ids = IdAllocator::new();
    let module = Module::new(
        "solo",
        ExecutionType::Sequential,
        CountingBehavior {
            init_delay: Duration::ZERO,
            inits: Arc::new(AtomicUsize::new(0)),
            updates: Arc::new(AtomicUsize::new(0)),
        },
        1.0,
        &ids,
        sink(),
    );

    let driver = Arc::new(ModuleDriver::new(sink()));
    driver.add_module(&module);

    let runner = Arc::clone(&module);
    let module_thread = thread::spawn(move || runner.start());

    let blocking = Arc::clone(&driver);
    let driver_thread = thread::spawn(move || blocking.start());

    module.wait_initialized();
    thread::sleep(Duration::from_millis(30));
    assert!(!driver_thread.is_finished());
    assert_eq!(driver.status(), DriverStatus::Running);

    driver.request_status(DriverStatus::Stopped);
    driver_thread.join().unwrap();
    module_thread.join().unwrap();
    assert_eq!(module.status(), ModuleStatus::Inactive);
}
