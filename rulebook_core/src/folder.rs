//! Block folder: turns the flat rule list of a week into editable blocks.

use crate::catalog::variant;
use crate::exercises::ExerciseLookup;
use crate::form::FormValue;
use crate::{BlockType, ProgressionRule};
use std::collections::BTreeMap;

/// Editable state of one block of a program week
#[derive(Clone, Debug)]
pub struct BlockFormState {
    pub key: String,
    pub block_order: u32,
    pub block_type: BlockType,
    pub block_name: Option<String>,
    /// Rows in slot order; unpersisted stand-ins have no id
    pub rules: Vec<ProgressionRule>,
    pub form_value: FormValue,
    original_form_value: FormValue,
    /// Folded from another week's rows; saving creates rows for this week
    pub is_placeholder: bool,
}

impl BlockFormState {
    /// Fold one block's rows. The snapshot is a deep copy of the folded form.
    pub fn fold(
        block_order: u32,
        rows: &[ProgressionRule],
        is_placeholder: bool,
        exercises: Option<&dyn ExerciseLookup>,
    ) -> Self {
        let block_type = block_type_of(block_order, rows);
        let spec = variant(block_type);
        let rules = spec.arrange(rows);

        let mut form_value = spec.fold_slots(&rules);
        if let Some(lookup) = exercises {
            form_value.resolve_exercises(lookup);
        }

        let block_name = rules.iter().find_map(|row| row.block_name.clone());

        BlockFormState {
            key: format!("block-{}", block_order),
            block_order,
            block_type,
            block_name,
            rules,
            original_form_value: form_value.clone(),
            form_value,
            is_placeholder,
        }
    }

    /// Snapshot taken when the block was folded
    pub fn original_form_value(&self) -> &FormValue {
        &self.original_form_value
    }

    /// Derived dirty flag: the form differs from its snapshot
    pub fn has_changes(&self) -> bool {
        self.form_value != self.original_form_value
    }

    /// Apply an edit to the form value
    pub fn edit<F>(&mut self, f: F)
    where
        F: FnOnce(&mut FormValue),
    {
        f(&mut self.form_value);
    }

    /// Discard all edits
    pub fn revert(&mut self) {
        self.form_value = self.original_form_value.clone();
    }
}

/// The block type of a group; the first row in exercise order wins on disagreement
fn block_type_of(block_order: u32, rows: &[ProgressionRule]) -> BlockType {
    let mut sorted: Vec<&ProgressionRule> = rows.iter().collect();
    sorted.sort_by_key(|row| (row.exercise_order, row.exercise_letter.clone(), row.id.clone()));

    let block_type = sorted.first().map(|row| row.block_type).unwrap_or_default();
    if sorted.iter().any(|row| row.block_type != block_type) {
        tracing::warn!(
            "Block {} mixes block types; folding it as {}",
            block_order,
            block_type
        );
    }
    block_type
}

/// Group rows by `block_order` and fold each group.
///
/// The result is sorted by block order and does not depend on the order
/// rows were supplied in.
pub fn fold_blocks(
    rows: &[ProgressionRule],
    is_placeholder: bool,
    exercises: Option<&dyn ExerciseLookup>,
) -> Vec<BlockFormState> {
    let mut groups: BTreeMap<u32, Vec<ProgressionRule>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.block_order).or_default().push(row.clone());
    }

    let blocks: Vec<BlockFormState> = groups
        .into_iter()
        .map(|(block_order, group)| {
            BlockFormState::fold(block_order, &group, is_placeholder, exercises)
        })
        .collect();

    tracing::debug!(
        "Folded {} rows into {} blocks (placeholder: {})",
        rows.len(),
        blocks.len(),
        is_placeholder
    );
    blocks
}
