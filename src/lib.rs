// Activity record model
pub mod activity;

// Durable execution host (key-value state + one-shot wake)
pub mod host;

// Cursor and initialization checkpoint
pub mod checkpoint;

// Configuration loading
pub mod config;

pub use activity::{Activity, ActivityPage};
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use host::{DurableExecutionHost, MemoryHost, SqliteHost};
