// Interval merge - combines a new take with the existing note list

use crate::sequencer::note::{Note, NoteList, clone_list, overlaps};

/// Merge `new_notes` into `old_notes`, returning a list without same-pitch overlaps
///
/// Each incoming note absorbs every note it overlaps (widening to the union
/// of both intervals and keeping the incoming velocity). The scan restarts
/// after each absorption because a wider note can reach notes that were not
/// adjacent before. The result is inserted after every note starting at or
/// before it, which keeps the list sorted by `start`.
///
/// O(n²) per call; a performance holds thousands of notes, not millions.
pub fn merge(old_notes: &[Note], new_notes: &[Note]) -> NoteList {
    let mut result = clone_list(old_notes);

    for incoming in new_notes {
        let mut candidate = *incoming;

        while let Some(index) = result.iter().position(|n| overlaps(n, &candidate)) {
            let absorbed = result.remove(index);
            candidate.start = candidate.start.min(absorbed.start);
            candidate.end = candidate.end.max(absorbed.end);
        }

        let insert_at = result
            .iter()
            .position(|n| n.start > candidate.start)
            .unwrap_or(result.len());
        result.insert(insert_at, candidate);
    }

    result
}
