//! Change tracking over a week's blocks.
//!
//! Nothing here holds state: every answer is derived from the blocks'
//! current and snapshot form values.

use crate::folder::BlockFormState;

/// Blocks whose form differs from their snapshot, in block order
pub fn dirty_blocks(blocks: &[BlockFormState]) -> impl Iterator<Item = &BlockFormState> {
    blocks.iter().filter(|block| block.has_changes())
}

/// Number of blocks with unsaved edits
pub fn pending_change_count(blocks: &[BlockFormState]) -> usize {
    dirty_blocks(blocks).count()
}

pub fn has_pending_changes(blocks: &[BlockFormState]) -> bool {
    dirty_blocks(blocks).next().is_some()
}
