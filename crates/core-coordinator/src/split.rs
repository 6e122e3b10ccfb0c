//! Conformance checking and request splitting.
//!
//! Splitting is the subtlest part of the coordinator: it rewrites a
//! block-relative slice descriptor into one worker-local subrequest per
//! fragment the stride visits, carrying the global stride across fragment
//! boundaries so that, reassembled, the subrequests visit exactly the same
//! positions the original descriptor would over an unfragmented block.
//!
//! Implementation note: rather than the per-fragment `cum mod step` phase
//! update, this walks a `cursor` holding the next not-yet-visited *global*
//! aligned position (`start`, `start + step`, `start + 2*step`, ...) and, for
//! each fragment, computes how many of those positions fall within the
//! fragment's window before advancing the cursor past them. This is
//! equivalent for a descriptor confined to one fragment, but unlike a
//! per-fragment-length modulo it stays correct across three or more
//! fragments — see DESIGN.md for why the literal `cum mod step` phase
//! arithmetic was not carried over unmodified.

use core_protocol::{BlockId, ErrorCode, SliceDescriptor, WorkerSubrequest};

use crate::placement::PlacementTable;

/// Validates a batch of descriptors against the placement table, resolving
/// any `stop = -1` sentinel to the block's current size in place.
///
/// Fails `UnknownKey` on the first descriptor naming a block that does not
/// exist, or `OutOfMemory` (reused for "too large": both conditions share the
/// same wire code `-1`) once the running cardinality total exceeds
/// `max_size`.
pub fn conformance_check(
    placement: &PlacementTable,
    max_size: u64,
    descriptors: &mut [SliceDescriptor],
) -> Result<(), ErrorCode> {
    let mut total: u64 = 0;
    for descriptor in descriptors.iter_mut() {
        let size = placement.size_of(descriptor.key).ok_or(ErrorCode::UnknownKey)?;
        if !descriptor.is_resolved() {
            descriptor.stop = size as i64;
        }
        total += descriptor.cardinality();
        if total > max_size {
            return Err(ErrorCode::OutOfMemory);
        }
    }
    Ok(())
}

/// Rewrites one descriptor into per-fragment worker-local subrequests.
///
/// Returns an empty list if the block is unknown (callers run this only
/// after `conformance_check` has already validated every descriptor) or if
/// the descriptor is empty (`cardinality() == 0`).
pub fn split(placement: &PlacementTable, descriptor: SliceDescriptor) -> Vec<WorkerSubrequest> {
    let Some(fragments) = placement.get(descriptor.key) else {
        return Vec::new();
    };

    let step = descriptor.step;
    let mut subrequests = Vec::new();
    let mut cursor = descriptor.start;

    for fragment in fragments {
        if cursor >= descriptor.stop {
            break;
        }
        let fstart = fragment.logical_start as i64;
        let fend = fstart + fragment.length as i64;
        if cursor < fstart || cursor >= fend {
            continue;
        }

        let window_end = fend.min(descriptor.stop);
        let count = ((window_end - cursor) as u64).div_ceil(step as u64);
        let local_start = cursor - fstart;
        let local_stop = local_start + (count as i64) * step;

        subrequests.push(WorkerSubrequest {
            rank: fragment.rank,
            key: descriptor.key,
            local_start,
            local_stop,
            step,
        });

        cursor += count as i64 * step;
    }

    subrequests
}

/// Splits every descriptor in order and flattens the results, as the read
/// and write paths both do.
pub fn split_all(placement: &PlacementTable, descriptors: &[SliceDescriptor]) -> Vec<WorkerSubrequest> {
    descriptors
        .iter()
        .flat_map(|descriptor| split(placement, *descriptor))
        .collect()
}

/// Convenience used by delete: the set of distinct ranks holding a
/// fragment of the given block, in placement order.
pub fn ranks_for(placement: &PlacementTable, key: BlockId) -> Vec<usize> {
    placement
        .get(key)
        .map(|fragments| fragments.iter().map(|f| f.rank).collect())
        .unwrap_or_default()
}
