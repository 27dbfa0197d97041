//! Diff builder: turns dirty blocks into row operations for the store.

use crate::catalog::variant;
use crate::folder::BlockFormState;
use crate::{NewRuleRow, ProgressionRule, RuleField, RulePatch, RuleUpdateCandidate};
use serde::Serialize;

/// One store call produced by a save
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RowOperation {
    /// Field-level update of an existing row
    Update {
        block_order: u32,
        rule_id: String,
        patch: RulePatch,
    },
    /// Insert of a full row
    Create { block_order: u32, row: NewRuleRow },
}

impl RowOperation {
    pub fn block_order(&self) -> u32 {
        match self {
            RowOperation::Update { block_order, .. } | RowOperation::Create { block_order, .. } => {
                *block_order
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RowOperation::Update { .. } => "update",
            RowOperation::Create { .. } => "create",
        }
    }
}

/// Drop every update whose value the row already holds
pub fn strip_unchanged(candidate: &mut RuleUpdateCandidate) {
    let RuleUpdateCandidate {
        original, updates, ..
    } = candidate;
    updates.retain(|field, value| !field.get(original).same_as(value));
}

/// True when a row carries anything beyond its block keys
fn has_values(row: &ProgressionRule) -> bool {
    RuleField::ALL
        .iter()
        .filter(|field| **field != RuleField::BlockName)
        .any(|field| !field.get(row).is_null())
}

/// Row operations for one block, in the catalog's slot order.
///
/// Persisted rows are updated only when something changed. Unpersisted
/// rows are created when edited, or, for placeholder blocks, when they were
/// borrowed with values so the whole block lands in the new week.
pub fn plan_block(block: &BlockFormState) -> Vec<RowOperation> {
    let spec = variant(block.block_type);

    spec.unfold(&block.form_value, &block.rules)
        .into_iter()
        .filter_map(|mut candidate| {
            strip_unchanged(&mut candidate);
            let borrowed = has_values(&candidate.original);
            let RuleUpdateCandidate {
                original,
                updates,
                create_payload,
            } = candidate;

            match (original.id, create_payload) {
                (Some(rule_id), _) => (!updates.is_empty()).then(|| RowOperation::Update {
                    block_order: block.block_order,
                    rule_id,
                    patch: updates,
                }),
                (None, Some(row)) => {
                    let wanted = !updates.is_empty() || (block.is_placeholder && borrowed);
                    wanted.then(|| RowOperation::Create {
                        block_order: block.block_order,
                        row,
                    })
                }
                (None, None) => None,
            }
        })
        .collect()
}

/// Row operations for a whole week, blocks in block order.
///
/// Only dirty blocks are unfolded, except in a placeholder week: once any
/// block there is edited, every block is written so the week stops
/// borrowing from another week as a whole.
pub fn build_save_plan(blocks: &[BlockFormState]) -> Vec<RowOperation> {
    let materialize = blocks
        .iter()
        .any(|block| block.is_placeholder && block.has_changes());

    let mut selected: Vec<&BlockFormState> = blocks
        .iter()
        .filter(|block| block.has_changes() || (materialize && block.is_placeholder))
        .collect();
    selected.sort_by_key(|block| block.block_order);

    let plan: Vec<RowOperation> = selected.into_iter().flat_map(plan_block).collect();
    tracing::debug!("Save plan has {} row operation(s)", plan.len());
    plan
}
