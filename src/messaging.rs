//! Host collaborators at the edge of the tracker: event delivery, world
//! numbering, payload encoding and the outbound message channel.

use crate::entity::{EntityId, EntityRef, WorldId};
use crate::error::Result;
use std::sync::Arc;

/// Outbound plugin-message channel to connected clients.
///
/// Delivery is best effort; a successful `send` does not mean the client got it.
pub trait MessageChannel: Send + Sync {
    fn register_outgoing(&self, channel: &str) -> Result<()>;

    fn unregister_outgoing(&self, channel: &str);

    fn send(&self, entity: EntityId, channel: &str, payload: &[u8]) -> Result<()>;
}

/// Host-assigned integer index of a world
pub trait WorldIndex: Send + Sync {
    fn index_of(&self, world: WorldId) -> i32;
}

/// Turns a world index into the bytes clients expect. Opaque to the tracker.
pub trait PayloadEncoder: Send + Sync {
    fn encode(&self, world_index: i32) -> Vec<u8>;
}

impl<F> PayloadEncoder for F
where
    F: Fn(i32) -> Vec<u8> + Send + Sync,
{
    fn encode(&self, world_index: i32) -> Vec<u8> {
        self(world_index)
    }
}

/// Receiver of entity lifecycle events
pub trait EntityListener: Send + Sync {
    fn on_entity_join(&self, entity: &EntityRef);

    fn on_entity_leave(&self, entity: EntityId);
}

/// Handle returned by [`EventSource::register`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Host event dispatcher
pub trait EventSource: Send + Sync {
    fn register(&self, listener: Arc<dyn EntityListener>) -> ListenerId;

    fn unregister(&self, id: ListenerId);
}
