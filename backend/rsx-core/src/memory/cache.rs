use crate::memory::View;
use rustc_hash::FxHashMap;

/// Previously resolved views keyed by start address.
///
/// Entries live until they are superseded by a resolution at the same address or until the
/// provider's generation changes, at which point the whole cache is dropped.
#[derive(Debug, Clone, Default)]
pub struct ViewCache {
    entries: FxHashMap<u32, View>,
    generation: u64,
}

impl ViewCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached view starting at `address` truncated to `length`, if one exists that is at least
    /// that long.
    #[must_use]
    pub fn get(&self, address: u32, length: u32) -> Option<View> {
        let cached = self.entries.get(&address)?;
        if cached.len() < length {
            return None;
        }

        cached.truncated(length)
    }

    pub fn insert(&mut self, address: u32, view: View) {
        self.entries.insert(address, view);
    }

    /// Flush every entry if `generation` differs from the generation the entries were resolved
    /// under. Returns whether a flush happened.
    pub fn sync_generation(&mut self, generation: u64) -> bool {
        if generation == self.generation {
            return false;
        }

        log::debug!(
            "Memory map generation changed from {} to {generation}; dropping {} cached views",
            self.generation,
            self.entries.len()
        );

        self.entries.clear();
        self.generation = generation;
        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
