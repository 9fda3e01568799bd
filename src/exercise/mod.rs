pub mod task;

pub use task::{CefrLevel, Task, TaskKind, TaskMetadata};
