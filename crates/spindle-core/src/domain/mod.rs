//! Domain model (ids, task row, state machine, errors).

pub mod errors;
pub mod ids;
pub mod state;
pub mod task;

pub use self::errors::{QueueError, Result};
pub use self::ids::{Id, IdMarker, TaskId};
pub use self::state::{TaskState, UnknownState};
pub use self::task::{Task, TaskName};
