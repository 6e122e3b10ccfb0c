//! Per-worker element store: one resizable `Vec<i64>` per live `BlockId`,
//! keyed by the coordinator-assigned id. Freshly allocated elements start at
//! `0`: nothing in the wire protocol can read a position before the
//! coordinator has routed a write to it, so the placeholder value is
//! unobservable.

use std::collections::HashMap;

use core_protocol::BlockId;

#[derive(Debug, Default)]
pub struct ElementStore {
    blocks: HashMap<BlockId, Vec<i64>>,
}

impl ElementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn malloc(&mut self, key: BlockId, length: u64) {
        self.blocks.insert(key, vec![0; length as usize]);
    }

    /// Reads the local slice `start..stop` by `step`. Panics if `key` is
    /// unknown: the coordinator never routes a directive for a block it
    /// hasn't already asked every worker to allocate.
    pub fn get_item(&self, key: BlockId, start: i64, stop: i64, step: i64) -> Vec<i64> {
        let block = self.blocks.get(&key).expect("get on unallocated block");
        slice_indices(start, stop, step, block.len())
            .map(|i| block[i])
            .collect()
    }

    pub fn set_item(&mut self, key: BlockId, start: i64, stop: i64, step: i64, values: &[i64]) {
        let block = self.blocks.get_mut(&key).expect("set on unallocated block");
        let indices: Vec<usize> = slice_indices(start, stop, step, block.len()).collect();
        debug_assert_eq!(indices.len(), values.len(), "value count must match slice length");
        for (i, value) in indices.into_iter().zip(values) {
            block[i] = *value;
        }
    }

    pub fn del_item(&mut self, key: BlockId) {
        self.blocks.remove(&key);
    }
}

fn slice_indices(start: i64, stop: i64, step: i64, len: usize) -> impl Iterator<Item = usize> {
    debug_assert!(step >= 1);
    let stop = stop.min(len as i64).max(start);
    (start..stop).step_by(step as usize).map(|i| i as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malloc_then_roundtrip_contiguous() {
        let mut store = ElementStore::new();
        store.malloc(0, 4);
        store.set_item(0, 0, 4, 1, &[1, 2, 3, 4]);
        assert_eq!(store.get_item(0, 0, 4, 1), vec![1, 2, 3, 4]);
    }

    #[test]
    fn strided_set_and_get() {
        let mut store = ElementStore::new();
        store.malloc(0, 6);
        store.set_item(0, 0, 6, 2, &[10, 20, 30]);
        assert_eq!(store.get_item(0, 0, 6, 2), vec![10, 20, 30]);
        assert_eq!(store.get_item(0, 1, 6, 2), vec![0, 0, 0]);
    }

    #[test]
    fn delete_then_malloc_reuse_is_independent() {
        let mut store = ElementStore::new();
        store.malloc(0, 2);
        store.set_item(0, 0, 2, 1, &[5, 6]);
        store.del_item(0);
        store.malloc(0, 2);
        assert_eq!(store.get_item(0, 0, 2, 1), vec![0, 0]);
    }
}
