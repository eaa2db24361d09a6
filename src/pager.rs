//! Windowing of candidate insertions into a page.
use crate::models::{Insertion, InsertionPageType, Paging};

/// Cut a page out of `insertions` and assign positions.
///
/// - `offset` defaults to `0` and is clamped to be non-negative.
/// - `size` defaults to "everything"; non-positive sizes also mean "everything".
/// - [`InsertionPageType::Unpaged`] windows start at `offset`; [`InsertionPageType::PrePaged`]
///   windows start at `0` because `insertions` already is the page.
///
/// Positions are numbered from `offset`. Positions already present on the input are kept.
pub fn apply_paging(
    insertions: &[Insertion],
    page_type: InsertionPageType,
    paging: Option<&Paging>,
) -> Vec<Insertion> {
    apply_paging_from(insertions, page_type, paging, 0)
}

/// Like [`apply_paging`], for callers that pass only a slice of the full result list.
///
/// `retrieval_insertion_offset` is the position of `insertions[0]` in the full list, so an
/// [`InsertionPageType::Unpaged`] window starts at `offset - retrieval_insertion_offset`.
pub fn apply_paging_from(
    insertions: &[Insertion],
    page_type: InsertionPageType,
    paging: Option<&Paging>,
    retrieval_insertion_offset: i64,
) -> Vec<Insertion> {
    let offset = paging.and_then(|p| p.offset).unwrap_or(0).max(0);
    let size = paging
        .and_then(|p| p.size)
        .filter(|&size| size > 0)
        .map_or(insertions.len(), |size| {
            usize::try_from(size).unwrap_or(usize::MAX)
        });

    let window_start = match page_type {
        InsertionPageType::Unpaged => (offset - retrieval_insertion_offset.max(0)).max(0),
        InsertionPageType::PrePaged => 0,
    };
    let window_start = usize::try_from(window_start).unwrap_or(usize::MAX);
    let Some(remaining) = insertions.len().checked_sub(window_start) else {
        return Vec::new();
    };

    // offset is non-negative here
    let first_position = offset as u64;
    insertions[window_start..]
        .iter()
        .take(size.min(remaining))
        .zip(first_position..)
        .map(|(insertion, position)| {
            let mut insertion = insertion.clone();
            insertion.position.get_or_insert(position);
            insertion
        })
        .collect()
}
