//! Variant catalog: how each block type maps between rows and a form.
//!
//! Every block type has one [`VariantSpec`] entry in [`VARIANTS`]. A spec
//! says how many rows the block spans, how rows are told apart, and which
//! row column backs each form field. Folding and unfolding are driven
//! entirely by these tables, so a new block type is one new entry.

use crate::form::FormValue;
use crate::{BlockType, FieldValue, NewRuleRow, ProgressionRule, RuleField, RulePatch, RuleUpdateCandidate};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Letters used to address rows of lettered blocks
pub const LETTERS: [&str; 4] = ["A", "B", "C", "D"];

/// How the rows of a block are told apart
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RowKey {
    /// Exactly one row
    Single,
    /// By `exercise_letter` (A, B, C, D)
    Letter,
    /// By `exercise_order`
    Order,
}

/// Which rows a form field reads from and writes to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// One row, by slot index
    Slot(usize),
    /// Read from the first row that has a value, written to every row
    Shared,
    /// One value per row, held in the form's entry list
    Entry,
}

/// Binding between a form key and a row column
#[derive(Clone, Copy, Debug)]
pub struct FieldMap {
    pub form_key: &'static str,
    pub field: RuleField,
    pub scope: Scope,
}

const fn slot(index: usize, form_key: &'static str, field: RuleField) -> FieldMap {
    FieldMap {
        form_key,
        field,
        scope: Scope::Slot(index),
    }
}

const fn shared(form_key: &'static str, field: RuleField) -> FieldMap {
    FieldMap {
        form_key,
        field,
        scope: Scope::Shared,
    }
}

const fn entry(form_key: &'static str, field: RuleField) -> FieldMap {
    FieldMap {
        form_key,
        field,
        scope: Scope::Entry,
    }
}

/// Row layout and field mapping of one block type
#[derive(Debug)]
pub struct VariantSpec {
    pub block_type: BlockType,
    pub row_key: RowKey,
    pub min_rows: usize,
    pub max_rows: usize,
    pub fields: &'static [FieldMap],
}

// ============================================================================
// Mapping tables
// ============================================================================

const STRAIGHT_SET: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    slot(0, "exercise_id", RuleField::ExerciseId),
    slot(0, "sets", RuleField::Sets),
    slot(0, "reps", RuleField::Reps),
    slot(0, "rest_seconds", RuleField::RestSeconds),
    slot(0, "tempo", RuleField::Tempo),
    slot(0, "rir", RuleField::Rir),
    slot(0, "load_percentage", RuleField::LoadPercentage),
    slot(0, "weight_kg", RuleField::WeightKg),
    slot(0, "notes", RuleField::Notes),
];

const SUPERSET: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    shared("sets", RuleField::Sets),
    shared("rest_seconds", RuleField::RestBetweenPairs),
    shared("notes", RuleField::Notes),
    slot(0, "exercise_id", RuleField::ExerciseId),
    slot(0, "reps", RuleField::FirstExerciseReps),
    slot(0, "load_percentage", RuleField::LoadPercentage),
    slot(0, "weight_kg", RuleField::WeightKg),
    slot(1, "superset_exercise_id", RuleField::ExerciseId),
    slot(1, "superset_reps", RuleField::SecondExerciseReps),
    slot(1, "superset_load_percentage", RuleField::LoadPercentage),
    slot(1, "superset_weight_kg", RuleField::WeightKg),
];

const GIANT_SET: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    shared("sets", RuleField::Sets),
    shared("rest_seconds", RuleField::RestSeconds),
    shared("notes", RuleField::Notes),
    entry("exercise_id", RuleField::ExerciseId),
    entry("reps", RuleField::Reps),
    entry("load_percentage", RuleField::LoadPercentage),
    entry("weight_kg", RuleField::WeightKg),
];

const DROP_SET: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    slot(0, "exercise_id", RuleField::ExerciseId),
    slot(0, "sets", RuleField::Sets),
    slot(0, "reps", RuleField::Reps),
    slot(0, "drop_percentage", RuleField::DropPercentage),
    slot(0, "drop_set_reps", RuleField::DropSetReps),
    slot(0, "rest_seconds", RuleField::RestSeconds),
    slot(0, "load_percentage", RuleField::LoadPercentage),
    slot(0, "weight_kg", RuleField::WeightKg),
    slot(0, "notes", RuleField::Notes),
];

const CLUSTER_SET: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    slot(0, "exercise_id", RuleField::ExerciseId),
    slot(0, "sets", RuleField::Sets),
    slot(0, "cluster_reps", RuleField::ClusterReps),
    slot(0, "clusters_per_set", RuleField::ClustersPerSet),
    slot(0, "intra_cluster_rest", RuleField::IntraClusterRest),
    slot(0, "rest_seconds", RuleField::RestSeconds),
    slot(0, "load_percentage", RuleField::LoadPercentage),
    slot(0, "weight_kg", RuleField::WeightKg),
    slot(0, "notes", RuleField::Notes),
];

const REST_PAUSE: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    slot(0, "exercise_id", RuleField::ExerciseId),
    slot(0, "sets", RuleField::Sets),
    slot(0, "reps", RuleField::Reps),
    slot(0, "rest_pause_duration", RuleField::RestPauseDuration),
    slot(0, "max_rest_pauses", RuleField::MaxRestPauses),
    slot(0, "rest_seconds", RuleField::RestSeconds),
    slot(0, "load_percentage", RuleField::LoadPercentage),
    slot(0, "weight_kg", RuleField::WeightKg),
    slot(0, "notes", RuleField::Notes),
];

const PRE_EXHAUSTION: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    shared("sets", RuleField::Sets),
    shared("rest_seconds", RuleField::RestBetweenPairs),
    shared("notes", RuleField::Notes),
    slot(0, "isolation_exercise_id", RuleField::ExerciseId),
    slot(0, "isolation_reps", RuleField::IsolationReps),
    slot(0, "isolation_weight_kg", RuleField::WeightKg),
    slot(1, "compound_exercise_id", RuleField::ExerciseId),
    slot(1, "compound_reps", RuleField::CompoundReps),
    slot(1, "compound_weight_kg", RuleField::WeightKg),
];

const AMRAP: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    slot(0, "exercise_id", RuleField::ExerciseId),
    slot(0, "duration_minutes", RuleField::DurationMinutes),
    slot(0, "target_reps", RuleField::TargetReps),
    slot(0, "weight_kg", RuleField::WeightKg),
    slot(0, "notes", RuleField::Notes),
];

const EMOM: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    slot(0, "exercise_id", RuleField::ExerciseId),
    slot(0, "duration_minutes", RuleField::DurationMinutes),
    slot(0, "reps", RuleField::Reps),
    slot(0, "weight_kg", RuleField::WeightKg),
    slot(0, "notes", RuleField::Notes),
];

const TABATA: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    slot(0, "exercise_id", RuleField::ExerciseId),
    slot(0, "work_seconds", RuleField::WorkSeconds),
    slot(0, "rest_seconds", RuleField::RestSeconds),
    slot(0, "rounds", RuleField::Rounds),
    slot(0, "weight_kg", RuleField::WeightKg),
    slot(0, "notes", RuleField::Notes),
];

const FOR_TIME: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    slot(0, "exercise_id", RuleField::ExerciseId),
    slot(0, "target_reps", RuleField::TargetReps),
    slot(0, "time_cap_minutes", RuleField::TimeCapMinutes),
    slot(0, "weight_kg", RuleField::WeightKg),
    slot(0, "notes", RuleField::Notes),
];

const PYRAMID: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    slot(0, "exercise_id", RuleField::ExerciseId),
    slot(0, "sets", RuleField::Sets),
    slot(0, "reps", RuleField::Reps),
    slot(0, "pyramid_order", RuleField::PyramidOrder),
    slot(0, "rest_seconds", RuleField::RestSeconds),
    slot(0, "load_percentage", RuleField::LoadPercentage),
    slot(0, "weight_kg", RuleField::WeightKg),
    slot(0, "notes", RuleField::Notes),
];

const LADDER: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    slot(0, "exercise_id", RuleField::ExerciseId),
    slot(0, "sets", RuleField::Sets),
    slot(0, "reps", RuleField::Reps),
    slot(0, "ladder_order", RuleField::LadderOrder),
    slot(0, "rest_seconds", RuleField::RestSeconds),
    slot(0, "weight_kg", RuleField::WeightKg),
    slot(0, "notes", RuleField::Notes),
];

const CIRCUIT: &[FieldMap] = &[
    shared("block_name", RuleField::BlockName),
    shared("rounds", RuleField::Rounds),
    shared("rest_seconds", RuleField::RestSeconds),
    shared("notes", RuleField::Notes),
    entry("exercise_id", RuleField::ExerciseId),
    entry("reps", RuleField::Reps),
    entry("work_seconds", RuleField::WorkSeconds),
    entry("weight_kg", RuleField::WeightKg),
];

const fn single(block_type: BlockType, fields: &'static [FieldMap]) -> VariantSpec {
    VariantSpec {
        block_type,
        row_key: RowKey::Single,
        min_rows: 1,
        max_rows: 1,
        fields,
    }
}

/// The registry, in `BlockType` declaration order
pub static VARIANTS: [VariantSpec; 14] = [
    single(BlockType::StraightSet, STRAIGHT_SET),
    VariantSpec {
        block_type: BlockType::Superset,
        row_key: RowKey::Letter,
        min_rows: 2,
        max_rows: 2,
        fields: SUPERSET,
    },
    VariantSpec {
        block_type: BlockType::GiantSet,
        row_key: RowKey::Letter,
        min_rows: 2,
        max_rows: 4,
        fields: GIANT_SET,
    },
    single(BlockType::DropSet, DROP_SET),
    single(BlockType::ClusterSet, CLUSTER_SET),
    single(BlockType::RestPause, REST_PAUSE),
    VariantSpec {
        block_type: BlockType::PreExhaustion,
        row_key: RowKey::Letter,
        min_rows: 2,
        max_rows: 2,
        fields: PRE_EXHAUSTION,
    },
    single(BlockType::Amrap, AMRAP),
    single(BlockType::Emom, EMOM),
    single(BlockType::Tabata, TABATA),
    single(BlockType::ForTime, FOR_TIME),
    single(BlockType::Pyramid, PYRAMID),
    single(BlockType::Ladder, LADDER),
    VariantSpec {
        block_type: BlockType::Circuit,
        row_key: RowKey::Order,
        min_rows: 2,
        max_rows: 4,
        fields: CIRCUIT,
    },
];

/// Look up the variant for a block type
pub fn variant(block_type: BlockType) -> &'static VariantSpec {
    &VARIANTS[block_type as usize]
}

/// Storage order of rows inside a block
fn row_order(a: &ProgressionRule, b: &ProgressionRule) -> Ordering {
    a.exercise_order
        .cmp(&b.exercise_order)
        .then_with(|| a.exercise_letter.cmp(&b.exercise_letter))
        .then_with(|| a.id.cmp(&b.id))
}

fn letter_slot(letter: Option<&str>) -> Option<usize> {
    let letter = letter?.trim().to_uppercase();
    LETTERS.iter().position(|l| *l == letter)
}

impl VariantSpec {
    /// True when per-row values live in the form's entry list
    pub fn has_entries(&self) -> bool {
        self.fields.iter().any(|m| m.scope == Scope::Entry)
    }

    /// Block-level form keys
    pub fn field_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|m| m.scope != Scope::Entry)
            .map(|m| m.form_key)
    }

    /// Per-entry form keys
    pub fn entry_keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(|m| m.scope == Scope::Entry)
            .map(|m| m.form_key)
    }

    /// Number of rows a form of this variant spans
    pub fn rows_for(&self, form: &FormValue) -> usize {
        if self.has_entries() {
            form.entries.len().clamp(self.min_rows, self.max_rows)
        } else {
            self.min_rows
        }
    }

    /// Mappings that read from or write to the row in `slot`
    fn mappings_for_slot(&self, slot: usize) -> impl Iterator<Item = &'static FieldMap> {
        self.fields.iter().filter(move |m| match m.scope {
            Scope::Slot(index) => index == slot,
            Scope::Shared | Scope::Entry => true,
        })
    }

    /// Unpersisted row for `slot`, keyed like `reference`
    pub fn stand_in(&self, reference: Option<&ProgressionRule>, slot: usize) -> ProgressionRule {
        self.stand_in_at(reference, slot, slot as u32 + 1)
    }

    /// Exercise order for a stand-in placed after `earlier`.
    ///
    /// Order-keyed rows have no letter to pin their slot, so the new row must
    /// sort after every row already in the block.
    fn following_order(&self, earlier: &[ProgressionRule], slot: usize) -> u32 {
        match self.row_key {
            RowKey::Order => earlier
                .iter()
                .map(|row| row.exercise_order)
                .max()
                .map_or(slot as u32 + 1, |last| last + 1),
            RowKey::Single | RowKey::Letter => slot as u32 + 1,
        }
    }

    fn stand_in_at(
        &self,
        reference: Option<&ProgressionRule>,
        slot: usize,
        order: u32,
    ) -> ProgressionRule {
        let letter = match self.row_key {
            RowKey::Letter => LETTERS.get(slot).map(|l| l.to_string()),
            RowKey::Single | RowKey::Order => None,
        };
        let mut row = match reference {
            Some(reference) => reference.stand_in(order, letter),
            None => ProgressionRule {
                exercise_order: order,
                exercise_letter: letter,
                ..Default::default()
            },
        };
        row.block_type = self.block_type;
        row
    }

    /// Put rows into slot order.
    ///
    /// Rows are sorted by `exercise_order` then `exercise_letter`, so the
    /// result never depends on storage order. Lettered rows land on their
    /// letter's slot whatever their `exercise_order`. Slots missing below
    /// `min_rows` are filled with stand-ins; rows beyond `max_rows` are left out.
    pub fn arrange(&self, rows: &[ProgressionRule]) -> Vec<ProgressionRule> {
        let mut sorted: Vec<&ProgressionRule> = rows.iter().collect();
        sorted.sort_by(|a, b| row_order(a, b));

        let mut slots: Vec<Option<&ProgressionRule>> = vec![None; self.max_rows];
        let mut overflow = Vec::new();

        match self.row_key {
            RowKey::Letter => {
                let mut unlettered = Vec::new();
                for row in &sorted {
                    match letter_slot(row.exercise_letter.as_deref()) {
                        Some(index) if index < self.max_rows && slots[index].is_none() => {
                            slots[index] = Some(*row);
                        }
                        _ => unlettered.push(*row),
                    }
                }
                for row in unlettered {
                    match slots.iter().position(Option::is_none) {
                        Some(free) => slots[free] = Some(row),
                        None => overflow.push(row),
                    }
                }
            }
            RowKey::Single | RowKey::Order => {
                for (index, row) in sorted.iter().enumerate() {
                    if index < self.max_rows {
                        slots[index] = Some(*row);
                    } else {
                        overflow.push(*row);
                    }
                }
            }
        }

        if !overflow.is_empty() {
            tracing::warn!(
                "{} block has {} row(s) beyond its {} slot(s); leaving them untouched",
                self.block_type,
                overflow.len(),
                self.max_rows
            );
        }

        let used = slots
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |last| last + 1)
            .max(self.min_rows);
        let reference = sorted.first().copied();

        let mut arranged: Vec<ProgressionRule> = Vec::with_capacity(used);
        for (index, row) in slots.into_iter().take(used).enumerate() {
            let row = match row {
                Some(row) => row.clone(),
                None => {
                    let order = self.following_order(&arranged, index);
                    self.stand_in_at(reference, index, order)
                }
            };
            arranged.push(row);
        }
        arranged
    }

    /// Fold the rows of one block into a form value
    pub fn fold(&self, rows: &[ProgressionRule]) -> FormValue {
        self.fold_slots(&self.arrange(rows))
    }

    /// Fold rows that are already in slot order
    pub fn fold_slots(&self, slots: &[ProgressionRule]) -> FormValue {
        let mut form = FormValue::default();

        for map in self.fields {
            match map.scope {
                Scope::Slot(index) => {
                    let value = slots
                        .get(index)
                        .map(|row| map.field.get(row).format())
                        .unwrap_or_default();
                    form.set_field(map.form_key, value);
                }
                Scope::Shared => {
                    let value = slots
                        .iter()
                        .map(|row| map.field.get(row))
                        .find(|value| !value.is_null())
                        .map(|value| value.format())
                        .unwrap_or_default();
                    form.set_field(map.form_key, value);
                }
                Scope::Entry => {}
            }
        }

        if self.has_entries() {
            for (index, row) in slots.iter().enumerate() {
                for map in self.fields.iter().filter(|m| m.scope == Scope::Entry) {
                    form.set_entry_field(index, map.form_key, map.field.get(row).format());
                }
            }
        }

        form
    }

    /// Unfold an edited form back onto the rows it was folded from.
    ///
    /// A field is written only when its parsed form value differs from what
    /// the rows themselves fold to. Keys absent from the form are left
    /// alone. Persisted rows without changes produce no candidate; every
    /// unpersisted row produces one carrying a full create payload.
    pub fn unfold(&self, form: &FormValue, rows: &[ProgressionRule]) -> Vec<RuleUpdateCandidate> {
        let mut slots = self.arrange(rows);
        if self.has_entries() {
            let wanted = form.entries.len().min(self.max_rows);
            while slots.len() < wanted {
                let order = self.following_order(&slots, slots.len());
                let next = self.stand_in_at(slots.first(), slots.len(), order);
                slots.push(next);
            }
        }

        let baseline = self.fold_slots(&slots);

        slots
            .into_iter()
            .enumerate()
            .filter_map(|(index, row)| {
                let updates = self.diff_slot(form, &baseline, index);
                if row.is_persisted() {
                    if updates.is_empty() {
                        return None;
                    }
                    return Some(RuleUpdateCandidate {
                        original: row,
                        updates,
                        create_payload: None,
                    });
                }
                let payload = self.merge(form, &row, index);
                Some(RuleUpdateCandidate {
                    original: row,
                    updates,
                    create_payload: Some(payload),
                })
            })
            .collect()
    }

    fn diff_slot(&self, form: &FormValue, baseline: &FormValue, index: usize) -> RulePatch {
        let mut updates = RulePatch::new();
        for map in self.mappings_for_slot(index) {
            let (edited, folded) = match map.scope {
                Scope::Entry => (
                    form.entries.get(index).and_then(|e| e.get(map.form_key)),
                    baseline.entries.get(index).and_then(|e| e.get(map.form_key)),
                ),
                Scope::Slot(_) | Scope::Shared => {
                    (form.fields.get(map.form_key), baseline.fields.get(map.form_key))
                }
            };
            let Some(edited) = edited else {
                continue;
            };

            let kind = map.field.kind();
            let new_value = FieldValue::parse(kind, edited);
            let old_value = FieldValue::parse(kind, folded.map(String::as_str).unwrap_or(""));
            if !new_value.same_as(&old_value) {
                updates.insert(map.field, new_value);
            }
        }
        updates
    }

    /// Full row for `slot`: `row` with every form value that maps to it applied
    pub fn merge(&self, form: &FormValue, row: &ProgressionRule, index: usize) -> NewRuleRow {
        let mut merged = row.clone();
        for map in self.mappings_for_slot(index) {
            let raw = match map.scope {
                Scope::Entry => form.entries.get(index).and_then(|e| e.get(map.form_key)),
                Scope::Slot(_) | Scope::Shared => form.fields.get(map.form_key),
            };
            if let Some(raw) = raw {
                map.field.set(&mut merged, FieldValue::parse(map.field.kind(), raw));
            }
        }
        NewRuleRow::new(merged)
    }
}

/// Validate the registry for consistency
///
/// Returns a list of validation errors, or empty Vec if valid.
pub fn validate_catalog() -> Vec<String> {
    let mut errors = Vec::new();

    if VARIANTS.len() != BlockType::ALL.len() {
        errors.push(format!(
            "Catalog has {} variants for {} block types",
            VARIANTS.len(),
            BlockType::ALL.len()
        ));
    }

    for (index, spec) in VARIANTS.iter().enumerate() {
        let name = spec.block_type;

        if BlockType::ALL.get(index) != Some(&spec.block_type) {
            errors.push(format!("Variant '{}' is out of table order at {}", name, index));
        }
        if spec.min_rows == 0 || spec.min_rows > spec.max_rows {
            errors.push(format!(
                "Variant '{}': invalid row bounds {}..={}",
                name, spec.min_rows, spec.max_rows
            ));
        }
        if spec.max_rows > LETTERS.len() {
            errors.push(format!("Variant '{}': more than {} rows", name, LETTERS.len()));
        }
        if spec.row_key == RowKey::Single && spec.max_rows != 1 {
            errors.push(format!("Variant '{}': single-row key with {} rows", name, spec.max_rows));
        }
        if spec.has_entries() && spec.row_key == RowKey::Single {
            errors.push(format!("Variant '{}': entry fields on a single-row block", name));
        }
        if !spec
            .fields
            .iter()
            .any(|m| m.field == RuleField::BlockName && m.scope == Scope::Shared)
        {
            errors.push(format!("Variant '{}' does not map block_name", name));
        }

        let mut keys = HashSet::new();
        for map in spec.fields {
            let entry_key = map.scope == Scope::Entry;
            if !keys.insert((entry_key, map.form_key)) {
                errors.push(format!("Variant '{}': duplicate form key '{}'", name, map.form_key));
            }
            if let Scope::Slot(index) = map.scope {
                if index >= spec.min_rows {
                    errors.push(format!(
                        "Variant '{}': '{}' maps to optional slot {}",
                        name, map.form_key, index
                    ));
                }
            }
        }

        // A column may only be written by one form key per row
        for index in 0..spec.max_rows {
            let mut columns = HashSet::new();
            for map in spec.mappings_for_slot(index) {
                if !columns.insert(map.field) {
                    errors.push(format!(
                        "Variant '{}': column '{}' mapped twice for slot {}",
                        name, map.field, index
                    ));
                }
            }
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn superset_rows() -> Vec<ProgressionRule> {
        vec![
            ProgressionRule {
                id: Some("r1".into()),
                program_id: "p1".into(),
                program_schedule_id: "s1".into(),
                week_number: 1,
                block_order: 1,
                block_type: BlockType::Superset,
                exercise_order: 1,
                exercise_letter: Some("A".into()),
                exercise_id: Some("e1".into()),
                sets: Some(4),
                first_exercise_reps: Some("10".into()),
                rest_between_pairs: Some(60),
                ..Default::default()
            },
            ProgressionRule {
                id: Some("r2".into()),
                program_id: "p1".into(),
                program_schedule_id: "s1".into(),
                week_number: 1,
                block_order: 1,
                block_type: BlockType::Superset,
                exercise_order: 2,
                exercise_letter: Some("B".into()),
                exercise_id: Some("e2".into()),
                second_exercise_reps: Some("12".into()),
                rest_between_pairs: Some(60),
                ..Default::default()
            },
        ]
    }

    fn giant_set_rows(letters: &[&str]) -> Vec<ProgressionRule> {
        letters
            .iter()
            .enumerate()
            .map(|(i, letter)| ProgressionRule {
                id: Some(format!("g{}", i + 1)),
                block_order: 2,
                block_type: BlockType::GiantSet,
                exercise_order: i as u32 + 1,
                exercise_letter: Some(letter.to_string()),
                exercise_id: Some(format!("ex_{}", letter.to_lowercase())),
                reps: Some(format!("{}", 8 + i)),
                sets: Some(3),
                rest_seconds: Some(90),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_catalog_validates() {
        let errors = validate_catalog();
        assert!(errors.is_empty(), "Catalog has validation errors: {:?}", errors);
    }

    #[test]
    fn test_every_block_type_has_its_own_entry() {
        for bt in BlockType::ALL {
            assert_eq!(variant(bt).block_type, bt);
        }
    }

    #[test]
    fn test_superset_fold() {
        let form = variant(BlockType::Superset).fold(&superset_rows());

        assert_eq!(form.field("exercise_id"), "e1");
        assert_eq!(form.field("reps"), "10");
        assert_eq!(form.field("superset_exercise_id"), "e2");
        assert_eq!(form.field("superset_reps"), "12");
        assert_eq!(form.field("rest_seconds"), "60");
        assert_eq!(form.field("sets"), "4");
        assert_eq!(form.field("weight_kg"), "");
    }

    #[test]
    fn test_superset_single_edit_touches_one_row() {
        let rows = superset_rows();
        let spec = variant(BlockType::Superset);
        let mut form = spec.fold(&rows);
        form.set_field("superset_reps", "15");

        let candidates = spec.unfold(&form, &rows);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].original.id.as_deref(), Some("r2"));
        let expected: RulePatch = [(
            RuleField::SecondExerciseReps,
            FieldValue::Text(Some("15".into())),
        )]
        .into_iter()
        .collect();
        assert_eq!(candidates[0].updates, expected);
        assert!(candidates[0].create_payload.is_none());
    }

    #[test]
    fn test_superset_fold_is_independent_of_storage_order() {
        let rows = superset_rows();
        let reversed: Vec<_> = rows.iter().rev().cloned().collect();
        let spec = variant(BlockType::Superset);
        assert_eq!(spec.fold(&rows), spec.fold(&reversed));
    }

    #[test]
    fn test_shared_field_written_to_every_row() {
        let rows = superset_rows();
        let spec = variant(BlockType::Superset);
        let mut form = spec.fold(&rows);
        form.set_field("rest_seconds", "90");

        let candidates = spec.unfold(&form, &rows);
        assert_eq!(candidates.len(), 2);
        for candidate in &candidates {
            assert_eq!(candidate.updates.len(), 1);
            assert_eq!(
                candidate.updates.get(RuleField::RestBetweenPairs),
                Some(&FieldValue::Int(Some(90)))
            );
        }
    }

    #[test]
    fn test_empty_string_unfolds_to_null() {
        let rows = superset_rows();
        let spec = variant(BlockType::Superset);
        let mut form = spec.fold(&rows);
        form.set_field("sets", "");

        let candidates = spec.unfold(&form, &rows);
        // Only r1 carries sets, but the shared write targets both rows;
        // r2 already has no sets, which the diff builder strips later.
        let r1 = candidates
            .iter()
            .find(|c| c.original.id.as_deref() == Some("r1"))
            .unwrap();
        assert_eq!(r1.updates.get(RuleField::Sets), Some(&FieldValue::Int(None)));
    }

    #[test]
    fn test_non_numeric_input_unfolds_to_null() {
        let rows = vec![ProgressionRule {
            id: Some("s1".into()),
            block_type: BlockType::StraightSet,
            sets: Some(3),
            weight_kg: Some(80.0),
            ..Default::default()
        }];
        let spec = variant(BlockType::StraightSet);
        let mut form = spec.fold(&rows);
        form.set_field("weight_kg", "heavy");

        let candidates = spec.unfold(&form, &rows);
        assert_eq!(candidates.len(), 1);
        assert_eq!(
            candidates[0].updates.get(RuleField::WeightKg),
            Some(&FieldValue::Num(None))
        );
        assert!(candidates[0].updates.get(RuleField::Sets).is_none());
    }

    #[test]
    fn test_short_superset_folds_with_stand_in() {
        let rows = vec![superset_rows().remove(0)];
        let spec = variant(BlockType::Superset);

        let slots = spec.arrange(&rows);
        assert_eq!(slots.len(), 2);
        assert!(slots[1].id.is_none());
        assert_eq!(slots[1].exercise_letter.as_deref(), Some("B"));
        assert_eq!(slots[1].block_order, 1);

        let form = spec.fold(&rows);
        assert_eq!(form.field("superset_exercise_id"), "");
        assert_eq!(form.field("superset_reps"), "");
    }

    #[test]
    fn test_short_superset_edit_creates_missing_row() {
        let rows = vec![superset_rows().remove(0)];
        let spec = variant(BlockType::Superset);
        let mut form = spec.fold(&rows);
        form.set_field("superset_exercise_id", "e9");
        form.set_field("superset_reps", "8");

        let candidates = spec.unfold(&form, &rows);
        assert_eq!(candidates.len(), 1);
        let payload = candidates[0].create_payload.as_ref().unwrap().rule();
        assert_eq!(payload.exercise_id.as_deref(), Some("e9"));
        assert_eq!(payload.second_exercise_reps.as_deref(), Some("8"));
        assert_eq!(payload.rest_between_pairs, Some(60));
        assert_eq!(payload.sets, Some(4));
        assert_eq!(payload.program_id, "p1");
        assert_eq!(payload.exercise_letter.as_deref(), Some("B"));
    }

    #[test]
    fn test_giant_set_sorted_by_letter() {
        let mut rows = giant_set_rows(&["A", "B", "C"]);
        rows.reverse();
        let form = variant(BlockType::GiantSet).fold(&rows);

        assert_eq!(form.entries.len(), 3);
        assert_eq!(form.entry_field(0, "exercise_id"), "ex_a");
        assert_eq!(form.entry_field(2, "exercise_id"), "ex_c");
        assert_eq!(form.field("sets"), "3");
    }

    #[test]
    fn test_giant_set_letter_decides_slot_over_exercise_order() {
        let mut rows = giant_set_rows(&["A", "B"]);
        rows[0].exercise_order = 2;
        rows[1].exercise_order = 1;
        let spec = variant(BlockType::GiantSet);
        let form = spec.fold(&rows);

        assert_eq!(form.entry_field(0, "exercise_id"), "ex_a");
        assert_eq!(form.entry_field(1, "exercise_id"), "ex_b");
        assert!(spec.unfold(&form, &rows).is_empty());
    }

    #[test]
    fn test_giant_set_entry_edit_touches_one_row() {
        let rows = giant_set_rows(&["A", "B", "C"]);
        let spec = variant(BlockType::GiantSet);
        let mut form = spec.fold(&rows);
        form.set_entry_field(1, "reps", "20");

        let candidates = spec.unfold(&form, &rows);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].original.id.as_deref(), Some("g2"));
        assert_eq!(
            candidates[0].updates.get(RuleField::Reps),
            Some(&FieldValue::Text(Some("20".into())))
        );
    }

    #[test]
    fn test_giant_set_added_entry_becomes_create() {
        let rows = giant_set_rows(&["A", "B"]);
        let spec = variant(BlockType::GiantSet);
        let mut form = spec.fold(&rows);
        form.set_entry_field(2, "exercise_id", "plank");
        form.set_entry_field(2, "reps", "30s");

        let candidates = spec.unfold(&form, &rows);
        assert_eq!(candidates.len(), 1);
        let payload = candidates[0].create_payload.as_ref().unwrap().rule();
        assert_eq!(payload.exercise_letter.as_deref(), Some("C"));
        assert_eq!(payload.exercise_order, 3);
        assert_eq!(payload.reps.as_deref(), Some("30s"));
        assert_eq!(payload.sets, Some(3));
        assert_eq!(payload.block_type, BlockType::GiantSet);
    }

    fn circuit_rows(orders: &[u32]) -> Vec<ProgressionRule> {
        orders
            .iter()
            .zip(["burpee", "box_jump"])
            .map(|(order, exercise)| ProgressionRule {
                id: Some(format!("c-{}", exercise)),
                block_order: 3,
                block_type: BlockType::Circuit,
                exercise_order: *order,
                exercise_id: Some(exercise.into()),
                reps: Some("10".into()),
                rounds: Some(3),
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn test_circuit_appended_entry_sorts_after_existing_rows() {
        let spec = variant(BlockType::Circuit);
        for (orders, expected_order) in [(&[1, 2], 3), (&[5, 6], 7), (&[1, 3], 4)] {
            let mut rows = circuit_rows(orders);
            let mut form = spec.fold(&rows);
            form.set_entry_field(2, "exercise_id", "push_up");

            let candidates = spec.unfold(&form, &rows);
            assert_eq!(candidates.len(), 1, "{:?}", orders);
            let mut created = candidates[0].create_payload.clone().unwrap().into_rule();
            assert_eq!(created.exercise_order, expected_order, "{:?}", orders);

            // A fresh id sorting before the others must not matter
            created.id = Some("a-new".into());
            rows.insert(0, created);
            let reloaded = spec.fold(&rows);
            let exercises: Vec<&str> = (0..3)
                .map(|i| reloaded.entry_field(i, "exercise_id"))
                .collect();
            assert_eq!(exercises, ["burpee", "box_jump", "push_up"], "{:?}", orders);
        }
    }

    #[test]
    fn test_circuit_stand_in_follows_single_row() {
        let rows = circuit_rows(&[5]);
        let spec = variant(BlockType::Circuit);
        let arranged = spec.arrange(&rows);

        assert_eq!(arranged.len(), 2);
        assert_eq!(arranged[1].exercise_order, 6);
        assert!(!arranged[1].is_persisted());
    }

    #[test]
    fn test_removed_entry_leaves_row_untouched() {
        let rows = giant_set_rows(&["A", "B", "C"]);
        let spec = variant(BlockType::GiantSet);
        let mut form = spec.fold(&rows);
        form.entries.truncate(2);

        assert!(spec.unfold(&form, &rows).is_empty());
    }

    #[test]
    fn test_missing_form_key_is_not_a_change() {
        let rows = superset_rows();
        let spec = variant(BlockType::Superset);
        let mut form = spec.fold(&rows);
        form.fields.remove("sets");
        form.fields.remove("reps");

        assert!(spec.unfold(&form, &rows).is_empty());
    }

    #[test]
    fn test_rows_beyond_capacity_are_ignored() {
        let rows = vec![
            ProgressionRule {
                id: Some("a".into()),
                block_type: BlockType::DropSet,
                exercise_order: 1,
                reps: Some("10".into()),
                ..Default::default()
            },
            ProgressionRule {
                id: Some("b".into()),
                block_type: BlockType::DropSet,
                exercise_order: 2,
                reps: Some("99".into()),
                ..Default::default()
            },
        ];
        let spec = variant(BlockType::DropSet);
        assert_eq!(spec.arrange(&rows).len(), 1);
        assert_eq!(spec.fold(&rows).field("reps"), "10");
    }

    #[test]
    fn test_fold_of_no_rows_is_empty_form() {
        for bt in BlockType::ALL {
            let spec = variant(bt);
            let form = spec.fold(&[]);
            assert!(form.fields.values().all(String::is_empty), "{}", bt);
            assert_eq!(spec.arrange(&[]).len(), spec.min_rows);
        }
    }

    #[test]
    fn test_rows_for_clamps_entries() {
        let spec = variant(BlockType::Circuit);
        let form = FormValue::default().with_entry(&[("exercise_id", "burpee")]);
        assert_eq!(spec.rows_for(&form), 2);
        assert_eq!(variant(BlockType::Tabata).rows_for(&form), 1);
    }
}
