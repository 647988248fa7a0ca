//! Concurrent last-known-world map.
//!
//! Join, leave and poll callbacks for the same entity may run on different
//! host threads at once. Entries are spread over independently locked shards
//! so unrelated entities never contend; every operation touches exactly one
//! shard under one lock acquisition.

use crate::entity::{EntityId, WorldId};
use ahash::RandomState;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

const SHARD_COUNT: usize = 16;

/// Tracked state of one entity.
///
/// `epoch` identifies the join that created the entry. A poll chain started by
/// an older join sees a different epoch and stops, so duplicate or repeated
/// joins never leave two chains running for one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedEntry {
    pub world: WorldId,
    pub epoch: u64,
}

/// Outcome of comparing a fresh world read with the tracked value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldUpdate {
    /// No entry; nothing was inserted
    Untracked,
    /// Entry belongs to a newer join
    Superseded,
    Unchanged,
    Changed { previous: WorldId },
}

type Shard = RwLock<FxHashMap<EntityId, TrackedEntry>>;

pub struct TrackedWorlds {
    shards: Box<[Shard]>,
    hasher: RandomState,
}

impl TrackedWorlds {
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT)
            .map(|_| RwLock::new(FxHashMap::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            shards,
            hasher: RandomState::new(),
        }
    }

    fn shard(&self, id: &EntityId) -> &Shard {
        let index = (self.hasher.hash_one(id) as usize) % self.shards.len();
        &self.shards[index]
    }

    /// Start (or restart) tracking; returns the replaced entry, if any
    pub fn insert(&self, id: EntityId, entry: TrackedEntry) -> Option<TrackedEntry> {
        self.shard(&id).write().insert(id, entry)
    }

    pub fn get(&self, id: &EntityId) -> Option<TrackedEntry> {
        self.shard(id).read().get(id).copied()
    }

    pub fn world(&self, id: &EntityId) -> Option<WorldId> {
        self.get(id).map(|entry| entry.world)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.shard(id).read().contains_key(id)
    }

    pub fn remove(&self, id: &EntityId) -> Option<TrackedEntry> {
        self.shard(id).write().remove(id)
    }

    /// Remove the entry only if it still belongs to `epoch`
    pub fn remove_epoch(&self, id: &EntityId, epoch: u64) -> bool {
        let mut shard = self.shard(id).write();
        let owned = shard.get(id).is_some_and(|entry| entry.epoch == epoch);
        if owned {
            shard.remove(id);
        }
        owned
    }

    /// Overwrite the tracked world with `current` if the entry still belongs to `epoch`
    pub fn update(&self, id: EntityId, epoch: u64, current: WorldId) -> WorldUpdate {
        let mut shard = self.shard(&id).write();
        match shard.get_mut(&id) {
            None => WorldUpdate::Untracked,
            Some(entry) if entry.epoch != epoch => WorldUpdate::Superseded,
            Some(entry) if entry.world == current => WorldUpdate::Unchanged,
            Some(entry) => {
                let previous = std::mem::replace(&mut entry.world, current);
                WorldUpdate::Changed { previous }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.read().is_empty())
    }

    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.write().clear();
        }
    }
}

impl Default for TrackedWorlds {
    fn default() -> Self {
        Self::new()
    }
}
