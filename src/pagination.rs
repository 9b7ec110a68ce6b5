//! Pagination window arithmetic.
//!
//! The displayed window is always anchor-relative: a run of heights
//! counting down from the anchor, truncated at height 0 and at the page
//! size. An out-of-range anchor (negative, or at/above the chain height)
//! clamps to the live head, so a head-tracking window slides naturally as
//! new blocks arrive.

/// Heights to materialize for display, descending from the anchor.
pub fn compute_window(anchor: i64, chain_height: u64, page_size: usize) -> Vec<u64> {
    if chain_height == 0 {
        return Vec::new();
    }
    let anchor = if anchor < 0 || anchor as u64 >= chain_height {
        chain_height - 1
    } else {
        anchor as u64
    };
    let mut heights = Vec::with_capacity(page_size);
    for offset in 0..page_size as u64 {
        match anchor.checked_sub(offset) {
            Some(height) => heights.push(height),
            None => break,
        }
    }
    heights
}

/// Anchor that keeps a selected block visible with some lookahead above it.
///
/// `min(chain_height - 1, selected + distance)` - the selection sits a few
/// rows below the top of the window rather than at the very edge.
pub fn anchor_for_selection(selected: u64, chain_height: u64, distance: u64) -> i64 {
    (chain_height as i64 - 1).min((selected + distance) as i64)
}
