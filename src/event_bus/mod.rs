//! Event plumbing: typed run events, the bus, sinks, and subscriber streams.
//!
//! The runner buffers the events of each superstep and flushes them to the
//! [`EventBus`] only once the superstep completes, giving observers
//! whole-superstep atomicity. From the bus, events flow to registered
//! [`EventSink`]s (stdout, memory, channels) and to broadcast
//! [`EventStream`] subscribers for streaming consumption.

pub mod bus;
pub mod emitter;
pub mod event;
pub mod hub;
pub mod sink;

pub use bus::EventBus;
pub use emitter::{BusEmitter, EmitterError, EventEmitter};
pub use event::{ROUTING_SCOPE, STREAM_END_SCOPE, WorkflowEvent};
pub use hub::{EventHub, EventStream};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
