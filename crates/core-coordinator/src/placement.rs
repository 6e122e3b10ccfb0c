//! The placement table: the coordinator's map from `BlockId` to the
//! fragments a block is striped across, plus the per-worker capacity
//! vector it is allocated against.

use core_protocol::BlockId;

/// One contiguous run of a block's positions living on a single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub rank: usize,
    pub logical_start: u64,
    pub length: u64,
}

pub type FragmentList = Vec<Fragment>;

/// Dense, append-mostly map from `BlockId` to its fragment list.
///
/// Implemented as a growable vector of `Option<FragmentList>` keyed by id
/// (per the Re-architecture guidance) rather than a hash map: ids are
/// assigned by a monotonic counter starting at zero, so a vector gives O(1)
/// lookup with no hashing overhead.
#[derive(Debug, Default)]
pub struct PlacementTable {
    entries: Vec<Option<FragmentList>>,
}

impl PlacementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: BlockId) -> Option<&FragmentList> {
        self.entries.get(id as usize).and_then(|slot| slot.as_ref())
    }

    /// Total size of a live block: the sum of its fragment lengths.
    pub fn size_of(&self, id: BlockId) -> Option<u64> {
        self.get(id).map(|fragments| fragments.iter().map(|f| f.length).sum())
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.get(id).is_some()
    }

    /// Inserts the fragment list for a freshly allocated id. `id` must equal
    /// `self.next_id()` at the time of the call: ids are assigned strictly
    /// in order by the coordinator's monotonic counter.
    pub fn insert(&mut self, id: BlockId, fragments: FragmentList) {
        debug_assert_eq!(id as usize, self.entries.len(), "ids must be assigned in order");
        self.entries.push(Some(fragments));
    }

    /// Removes a block's placement, leaving its slot vacant. The id is never
    /// reused: later allocations keep growing the vector past this slot.
    pub fn remove(&mut self, id: BlockId) -> Option<FragmentList> {
        self.entries.get_mut(id as usize).and_then(|slot| slot.take())
    }

    pub fn next_id(&self) -> BlockId {
        self.entries.len() as BlockId
    }
}

/// Per-worker free-element counters, indexed by worker ordinal (`rank - 2`).
#[derive(Debug, Clone)]
pub struct CapacityVector {
    free: Vec<u64>,
    max_size: u64,
}

impl CapacityVector {
    pub fn new(worker_count: usize, max_size: u64) -> Self {
        Self {
            free: vec![max_size; worker_count],
            max_size,
        }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    pub fn total_free(&self) -> u64 {
        self.free.iter().sum()
    }

    pub fn worker_count(&self) -> usize {
        self.free.len()
    }

    pub fn free_at(&self, ordinal: usize) -> u64 {
        self.free[ordinal]
    }

    fn take_at(&mut self, ordinal: usize, amount: u64) {
        debug_assert!(amount <= self.free[ordinal]);
        self.free[ordinal] -= amount;
    }

    /// First-fit placement across workers in ascending rank order. Mutates
    /// `free[]` in place and returns the resulting fragment list. Caller must
    /// have already verified `total_free() >= size`.
    pub fn place(&mut self, size: u64) -> FragmentList {
        let mut fragments = Vec::new();
        let mut remaining = size;
        let mut cursor = 0u64;
        for ordinal in 0..self.free.len() {
            if remaining == 0 {
                break;
            }
            let take = self.free_at(ordinal).min(remaining);
            if take == 0 {
                continue;
            }
            let rank = ordinal + 2;
            fragments.push(Fragment {
                rank,
                logical_start: cursor,
                length: take,
            });
            self.take_at(ordinal, take);
            cursor += take;
            remaining -= take;
        }
        fragments
    }

    /// Returns freed elements to their original workers. Only called when
    /// capacity restoration on delete is enabled (it is not, by default —
    /// see DESIGN.md's resolution of the corresponding open question).
    pub fn restore(&mut self, fragments: &FragmentList) {
        for fragment in fragments {
            let ordinal = fragment.rank - 2;
            self.free[ordinal] += fragment.length;
        }
    }
}
