//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use worldsync::prelude::*;
//! ```

pub use crate::config::TrackerConfig;
pub use crate::entity::{Entity, EntityId, EntityRef, WorldId};
pub use crate::error::{Result, SyncError};
pub use crate::messaging::{EntityListener, EventSource, MessageChannel, PayloadEncoder, WorldIndex};
pub use crate::strategy::{select_strategy, ExecutionStrategy, HostEnvironment, StrategyKind};
pub use crate::task::{Affinity, ScheduledTask, Task};
pub use crate::tracker::{TrackerContext, WorldChangeTracker};
