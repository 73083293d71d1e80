//! # Treadle: Superstep-Driven Workflow Engine
//!
//! Treadle runs a directed graph of typed processing nodes ("executors")
//! connected by routing edge groups, coordinating message passing in
//! discrete synchronized rounds ("supersteps"). Runs can checkpoint
//! durably, suspend mid-flight for external input (human-in-the-loop), and
//! resume later, potentially in a different process.
//!
//! ## Core Concepts
//!
//! - **Executors**: Named units of computation with typed message handlers
//! - **Edge groups**: Single, fan-out, fan-in, and switch-case routing
//! - **Supersteps**: One synchronous round of delivery and invocation
//! - **Checkpoints**: Durable snapshots of run state and in-flight messages
//! - **Interrupts**: Request/response suspension for external input
//! - **Handoff**: Multi-agent orchestration with runtime re-routing
//!
//! ## Quick Start
//!
//! ```rust
//! use treadle::executors::FnExecutor;
//! use treadle::graphs::WorkflowBuilder;
//! use treadle::message::Payload;
//! use treadle::runtimes::RuntimeConfig;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let greet = FnExecutor::new("greet")
//!     .emits("text")
//!     .on("text", |message, ctx| {
//!         let name: String = message.payload.decode()?;
//!         ctx.send(Payload::text(format!("hello, {name}")));
//!         Ok(())
//!     });
//! let announce = FnExecutor::new("announce").on("text", |message, ctx| {
//!     ctx.yield_output(message.payload);
//!     Ok(())
//! });
//!
//! let mut workflow = WorkflowBuilder::new("greeter")
//!     .add_executor(greet)
//!     .add_executor(announce)
//!     .with_start("greet")
//!     .add_edge("greet", "announce")
//!     .with_runtime_config(RuntimeConfig::default().quiet())
//!     .build()
//!     .unwrap();
//!
//! let report = workflow.run(Payload::text("ada")).await.unwrap();
//! assert_eq!(report.outputs.len(), 1);
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - Identifier types and the run-state machine
//! - [`message`] - Tagged payloads and workflow messages
//! - [`executors`] - The `Executor` trait, registry, and closure executors
//! - [`graphs`] - Graph builder, edge groups, and static validation
//! - [`runtimes`] - Superstep runner, interrupts, checkpointing, config
//! - [`workflow`] - The compiled artifact and its run/resume entry points
//! - [`event_bus`] - Typed run events, sinks, and subscriber streams
//! - [`handoff`] - Multi-agent handoff orchestration
//! - [`telemetry`] - Event formatting and tracing setup

pub mod event_bus;
pub mod executors;
pub mod graphs;
pub mod handoff;
pub mod message;
pub mod runtimes;
pub mod telemetry;
pub mod types;
pub mod utils;
pub mod workflow;
