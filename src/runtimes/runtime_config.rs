//! Runtime configuration for compiled workflows.
//!
//! Resolution order for every knob: explicit builder call, then
//! environment (via `dotenvy`), then the built-in default.

use std::path::PathBuf;

use crate::event_bus::{EventBus, EventHub, EventSink, MemorySink, StdOutSink};
use crate::utils::id_generator::IdGenerator;

/// Environment variable overriding the superstep ceiling.
pub const MAX_SUPERSTEPS_ENV: &str = "TREADLE_MAX_SUPERSTEPS";
/// Environment variable enabling file-backed checkpoints in a directory.
pub const CHECKPOINT_DIR_ENV: &str = "TREADLE_CHECKPOINT_DIR";

const DEFAULT_MAX_SUPERSTEPS: u64 = 64;

#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    /// Run id for the next `run()`; generated when `None`.
    pub run_id: Option<String>,
    /// Superstep ceiling before the run fails with a convergence error.
    pub max_supersteps: u64,
    /// Write a checkpoint after every superstep when storage is attached.
    pub autosave: bool,
    /// Directory for the default file-backed checkpoint store; `None`
    /// leaves the workflow without storage unless one is attached
    /// explicitly.
    pub checkpoint_dir: Option<PathBuf>,
    pub event_bus: EventBusConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        dotenvy::dotenv().ok();
        let max_supersteps = std::env::var(MAX_SUPERSTEPS_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_SUPERSTEPS);
        let checkpoint_dir = std::env::var(CHECKPOINT_DIR_ENV).ok().map(PathBuf::from);
        Self {
            run_id: Some(IdGenerator::new().run_id()),
            max_supersteps,
            autosave: true,
            checkpoint_dir,
            event_bus: EventBusConfig::default(),
        }
    }
}

impl RuntimeConfig {
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    #[must_use]
    pub fn with_max_supersteps(mut self, max_supersteps: u64) -> Self {
        self.max_supersteps = max_supersteps;
        self
    }

    #[must_use]
    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    #[must_use]
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_event_bus(mut self, event_bus: EventBusConfig) -> Self {
        self.event_bus = event_bus;
        self
    }

    #[must_use]
    pub fn quiet(self) -> Self {
        self.with_event_bus(EventBusConfig::new(
            EventBusConfig::DEFAULT_BUFFER_CAPACITY,
            vec![],
        ))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SinkConfig {
    StdOut,
    Memory,
}

#[derive(Clone, Debug)]
pub struct EventBusConfig {
    pub buffer_capacity: usize,
    pub sinks: Vec<SinkConfig>,
}

impl EventBusConfig {
    pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

    #[must_use]
    pub fn new(buffer_capacity: usize, sinks: Vec<SinkConfig>) -> Self {
        Self {
            buffer_capacity: if buffer_capacity == 0 {
                Self::DEFAULT_BUFFER_CAPACITY
            } else {
                buffer_capacity
            },
            sinks,
        }
    }

    #[must_use]
    pub fn with_stdout_only() -> Self {
        Self::new(Self::DEFAULT_BUFFER_CAPACITY, vec![SinkConfig::StdOut])
    }

    #[must_use]
    pub fn add_sink(mut self, sink: SinkConfig) -> Self {
        if !self.sinks.contains(&sink) {
            self.sinks.push(sink);
        }
        self
    }

    /// Materialize the configured bus. The hub capacity doubles as the
    /// subscriber buffer size.
    #[must_use]
    pub fn build(&self) -> EventBus {
        let hub = EventHub::new(self.buffer_capacity);
        let sinks: Vec<Box<dyn EventSink>> = self
            .sinks
            .iter()
            .map(|sink| match sink {
                SinkConfig::StdOut => Box::new(StdOutSink::default()) as Box<dyn EventSink>,
                SinkConfig::Memory => Box::new(MemorySink::new()) as Box<dyn EventSink>,
            })
            .collect();
        EventBus::with_sinks(sinks, hub)
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::with_stdout_only()
    }
}
