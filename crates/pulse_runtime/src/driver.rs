//! # Module Driver
//!
//! Orchestrates a set of [`Module`]s from one control thread. The
//! driver owns no thread: each module runs on whatever thread its
//! caller gave to [`Module::start`], and the driver's own
//! [`ModuleDriver::start`] blocks the thread that calls it.
//!
//! ```text
//! thread A ──> physics.start()  ─┐
//! thread B ──> sensors.start()  ─┤   modules run where started
//! control  ──> driver.start()   ─┘   parked until Stopped requested
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use pulse_core::LogSink;

use crate::module::{Module, ModuleStatus};
use crate::status::{AtomicState, StateCell};

/// Global state requested of the driven modules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverStatus {
    /// All modules should be stepping.
    Running,
    /// All modules should be parked.
    Paused,
    /// All modules should terminate.
    Stopped,
}

impl AtomicState for DriverStatus {
    fn to_bits(self) -> u8 {
        match self {
            DriverStatus::Running => 0,
            DriverStatus::Paused => 1,
            DriverStatus::Stopped => 2,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits {
            0 => DriverStatus::Running,
            1 => DriverStatus::Paused,
            _ => DriverStatus::Stopped,
        }
    }
}

/// Owns a set of modules and fans lifecycle requests out to them.
pub struct ModuleDriver {
    modules: Mutex<Vec<Arc<Module>>>,
    status: StateCell<DriverStatus>,
    sink: Arc<dyn LogSink>,
}

impl ModuleDriver {
    /// Creates a driver with no modules, in the Stopped state.
    #[must_use]
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            modules: Mutex::new(Vec::new()),
            status: StateCell::new(DriverStatus::Stopped),
            sink,
        }
    }

    /// Registers a module. Registering the same module twice is a
    /// logic error: it is reported as fatal and the driver's set is
    /// left unchanged.
    pub fn add_module(&self, module: &Arc<Module>) {
        let mut modules = self.modules.lock();
        if modules.iter().any(|m| m.id() == module.id()) {
            self.sink.fatal(&format!(
                "driver: module '{}' registered twice",
                module.name()
            ));
            return;
        }
        modules.push(Arc::clone(module));
    }

    /// Number of registered modules.
    #[must_use]
    pub fn module_count(&self) -> usize {
        self.modules.lock().len()
    }

    /// Current requested global state.
    #[must_use]
    pub fn status(&self) -> DriverStatus {
        self.status.get()
    }

    /// Blocks until every registered module has finished initializing.
    ///
    /// The synchronization barrier between application setup and the
    /// run phase: modules init on their own threads at their own pace.
    pub fn wait_for_init(&self) {
        let modules = self.modules.lock().clone();
        for module in modules {
            module.wait_initialized();
        }
    }

    /// Fans a global state request out to every module. Pausing and
    /// resuming use the modules' own (blocking) transitions; stopping
    /// requests termination on all modules first, then waits for each,
    /// so slow modules unwind in parallel.
    pub fn request_status(&self, status: DriverStatus) {
        tracing::debug!(target: "pulse", ?status, "driver request");
        let modules = self.modules.lock().clone();
        match status {
            DriverStatus::Running => {
                for module in &modules {
                    module.run();
                }
            }
            DriverStatus::Paused => {
                for module in &modules {
                    module.pause();
                }
            }
            DriverStatus::Stopped => {
                for module in &modules {
                    module.request_end();
                }
                for module in &modules {
                    if module.status() != ModuleStatus::Inactive {
                        module.end();
                    }
                }
            }
        }
        self.status.set(status);
    }

    /// Runs the driver on the calling thread: waits for every module
    /// to initialize, marks the driver Running, then parks until some
    /// other thread requests Stopped. Returns once every module has
    /// unwound.
    pub fn start(&self) {
        self.wait_for_init();
        self.status.set(DriverStatus::Running);
        tracing::debug!(target: "pulse", "driver running");
        self.status.wait_for(DriverStatus::Stopped);
    }
}

impl std::fmt::Debug for ModuleDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDriver")
            .field("modules", &self.module_count())
            .field("status", &self.status.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{ExecutionType, ModuleBehavior, ModuleStatus};
    use pulse_core::{IdAllocator, MemorySink};
    use std::thread;
    use std::time::Duration;

    struct SlowInit {
        delay: Duration,
    }

    impl ModuleBehavior for SlowInit {
        fn init(&mut self) {
            thread::sleep(self.delay);
        }

        fn update(&mut self, _dt: f64) {}

        fn uninit(&mut self) {}
    }

    fn module(name: &str, init_delay_ms: u64, ids: &IdAllocator) -> Arc<Module> {
        Module::new(
            name,
            ExecutionType::Sequential,
            SlowInit {
                delay: Duration::from_millis(init_delay_ms),
            },
            1.0,
            ids,
            Arc::new(MemorySink::new()),
        )
    }

    #[test]
    fn test_add_module_rejects_duplicates() {
        let ids = IdAllocator::new();
        let sink = Arc::new(MemorySink::new());
        let driver = ModuleDriver::new(Arc::clone(&sink) as Arc<dyn LogSink>);
        let m = module("dup", 0, &ids);

        driver.add_module(&m);
        driver.add_module(&m);
        assert_eq!(driver.module_count(), 1);
        assert_eq!(sink.fatals().len(), 1);
    }

    #[test]
    fn test_wait_for_init_blocks_until_all_initialized() {
        let ids = IdAllocator::new();
        let driver = ModuleDriver::new(Arc::new(MemorySink::new()));
        let fast = module("fast", 0, &ids);
        let slow = module("slow", 50, &ids);
        driver.add_module(&fast);
        driver.add_module(&slow);

        let runners: Vec<_> = [&fast, &slow]
            .into_iter()
            .map(|m| {
                let m = Arc::clone(m);
                thread::spawn(move || m.start())
            })
            .collect();

        driver.wait_for_init();
        assert!(fast.is_initialized());
        assert!(slow.is_initialized());

        driver.request_status(DriverStatus::Stopped);
        for runner in runners {
            runner.join().unwrap();
        }
    }

    #[test]
    fn test_start_blocks_until_stop_requested() {
        let ids = IdAllocator::new();
        let driver = Arc::new(ModuleDriver::new(
            Arc::new(MemorySink::new()) as Arc<dyn LogSink>
        ));
        let m = module("driven", 0, &ids);
        driver.add_module(&m);

        let module_runner = {
            let m = Arc::clone(&m);
            thread::spawn(move || m.start())
        };
        let driver_runner = {
            let driver = Arc::clone(&driver);
            thread::spawn(move || driver.start())
        };

        thread::sleep(Duration::from_millis(30));
        assert_eq!(driver.status(), DriverStatus::Running);
        assert!(!driver_runner.is_finished());

        driver.request_status(DriverStatus::Stopped);
        driver_runner.join().unwrap();
        module_runner.join().unwrap();
        assert_eq!(m.status(), ModuleStatus::Inactive);
    }

    #[test]
    fn test_pause_and_resume_fan_out() {
        let ids = IdAllocator::new();
        let driver = ModuleDriver::new(Arc::new(MemorySink::new()));
        let a = module("a", 0, &ids);
        let b = module("b", 0, &ids);
        driver.add_module(&a);
        driver.add_module(&b);

        let runners: Vec<_> = [&a, &b]
            .into_iter()
            .map(|m| {
                let m = Arc::clone(m);
                thread::spawn(move || m.start())
            })
            .collect();
        driver.wait_for_init();

        driver.request_status(DriverStatus::Paused);
        assert_eq!(a.status(), ModuleStatus::Paused);
        assert_eq!(b.status(), ModuleStatus::Paused);

        driver.request_status(DriverStatus::Running);
        driver.request_status(DriverStatus::Stopped);
        for runner in runners {
            runner.join().unwrap();
        }
    }
}
