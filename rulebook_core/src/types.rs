//! Core domain types for the Rulebook engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Block types (the fourteen training structures)
//! - Flat progression rule rows and their addressable fields
//! - Sparse patches and create payloads exchanged with the rule store
//! - Program schedules, week template assignments and workout templates

use crate::form::{parse_int, parse_num, parse_text, FormValue};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Block Types
// ============================================================================

/// Training structure occupying one `block_order` slot of a program week.
///
/// The declaration order is the variant catalog's table order.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum BlockType {
    #[default]
    StraightSet,
    Superset,
    GiantSet,
    DropSet,
    ClusterSet,
    RestPause,
    PreExhaustion,
    Amrap,
    Emom,
    Tabata,
    ForTime,
    Pyramid,
    Ladder,
    Circuit,
}

impl BlockType {
    pub const ALL: [BlockType; 14] = [
        BlockType::StraightSet,
        BlockType::Superset,
        BlockType::GiantSet,
        BlockType::DropSet,
        BlockType::ClusterSet,
        BlockType::RestPause,
        BlockType::PreExhaustion,
        BlockType::Amrap,
        BlockType::Emom,
        BlockType::Tabata,
        BlockType::ForTime,
        BlockType::Pyramid,
        BlockType::Ladder,
        BlockType::Circuit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BlockType::StraightSet => "straight_set",
            BlockType::Superset => "superset",
            BlockType::GiantSet => "giant_set",
            BlockType::DropSet => "drop_set",
            BlockType::ClusterSet => "cluster_set",
            BlockType::RestPause => "rest_pause",
            BlockType::PreExhaustion => "pre_exhaustion",
            BlockType::Amrap => "amrap",
            BlockType::Emom => "emom",
            BlockType::Tabata => "tabata",
            BlockType::ForTime => "for_time",
            BlockType::Pyramid => "pyramid",
            BlockType::Ladder => "ladder",
            BlockType::Circuit => "circuit",
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BlockType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace(['-', ' '], "_");
        BlockType::ALL
            .iter()
            .copied()
            .find(|bt| bt.as_str() == wanted)
            .ok_or_else(|| Error::Other(format!("Unknown block type: {}", s)))
    }
}

// ============================================================================
// Progression Rule Rows
// ============================================================================

/// One persisted row: a single exercise slot inside a block of a program week.
///
/// `id` is `None` for rows that only exist in memory (placeholder stand-ins,
/// missing block slots, rows about to be created).
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgressionRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub program_id: String,
    pub program_schedule_id: String,
    pub week_number: u32,
    pub block_order: u32,
    pub block_type: BlockType,
    pub block_name: Option<String>,
    pub exercise_order: u32,
    pub exercise_letter: Option<String>,
    pub exercise_id: Option<String>,

    pub sets: Option<i64>,
    pub reps: Option<String>,
    pub rest_seconds: Option<i64>,
    pub tempo: Option<String>,
    pub rir: Option<i64>,
    pub load_percentage: Option<f64>,
    pub weight_kg: Option<f64>,
    pub notes: Option<String>,

    pub first_exercise_reps: Option<String>,
    pub second_exercise_reps: Option<String>,
    pub rest_between_pairs: Option<i64>,
    pub drop_percentage: Option<f64>,
    pub drop_set_reps: Option<String>,
    pub clusters_per_set: Option<i64>,
    pub cluster_reps: Option<String>,
    pub intra_cluster_rest: Option<i64>,
    pub rest_pause_duration: Option<i64>,
    pub max_rest_pauses: Option<i64>,
    pub isolation_reps: Option<String>,
    pub compound_reps: Option<String>,
    pub duration_minutes: Option<i64>,
    pub target_reps: Option<String>,
    pub work_seconds: Option<i64>,
    pub rounds: Option<i64>,
    pub time_cap_minutes: Option<i64>,
    pub pyramid_order: Option<String>,
    pub ladder_order: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ProgressionRule {
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// An unpersisted copy of this row's block keys for another slot
    pub fn stand_in(&self, exercise_order: u32, exercise_letter: Option<String>) -> Self {
        ProgressionRule {
            program_id: self.program_id.clone(),
            program_schedule_id: self.program_schedule_id.clone(),
            week_number: self.week_number,
            block_order: self.block_order,
            block_type: self.block_type,
            block_name: self.block_name.clone(),
            exercise_order,
            exercise_letter,
            ..Default::default()
        }
    }
}

// ============================================================================
// Addressable Rule Fields
// ============================================================================

/// Storage type of a rule field
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Num,
    Text,
}

/// A field value as stored on a row. `None` means unset, never zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(Option<i64>),
    Num(Option<f64>),
    Text(Option<String>),
}

impl FieldValue {
    /// Parse a form string for a field of the given kind
    pub fn parse(kind: FieldKind, raw: &str) -> Self {
        match kind {
            FieldKind::Int => FieldValue::Int(parse_int(raw)),
            FieldKind::Num => FieldValue::Num(parse_num(raw)),
            FieldKind::Text => FieldValue::Text(parse_text(raw)),
        }
    }

    /// Render for a text control; unset renders as an empty string
    pub fn format(&self) -> String {
        match self {
            FieldValue::Int(Some(v)) => v.to_string(),
            FieldValue::Num(Some(v)) => v.to_string(),
            FieldValue::Text(Some(v)) => v.clone(),
            _ => String::new(),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            FieldValue::Int(v) => v.is_none(),
            FieldValue::Num(v) => v.is_none(),
            FieldValue::Text(v) => v.as_deref().map_or(true, |s| s.trim().is_empty()),
        }
    }

    /// Equality that treats blank text as unset and all unset values as equal
    pub fn same_as(&self, other: &FieldValue) -> bool {
        if self.is_null() || other.is_null() {
            return self.is_null() && other.is_null();
        }
        self == other
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        FieldValue::Int(value)
    }
}

impl From<Option<f64>> for FieldValue {
    fn from(value: Option<f64>) -> Self {
        FieldValue::Num(value)
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        FieldValue::Text(value)
    }
}

/// Conversion from a field value into a row column, tolerant of kind mismatch
trait FromFieldValue: Sized {
    fn from_field_value(value: FieldValue) -> Self;
}

impl FromFieldValue for Option<i64> {
    fn from_field_value(value: FieldValue) -> Self {
        match value {
            FieldValue::Int(v) => v,
            FieldValue::Num(Some(v)) if v.fract() == 0.0 => parse_int(&v.to_string()),
            FieldValue::Num(_) => None,
            FieldValue::Text(v) => v.as_deref().and_then(parse_int),
        }
    }
}

impl FromFieldValue for Option<f64> {
    fn from_field_value(value: FieldValue) -> Self {
        match value {
            FieldValue::Num(v) => v,
            FieldValue::Int(v) => v.map(|v| v as f64),
            FieldValue::Text(v) => v.as_deref().and_then(parse_num),
        }
    }
}

impl FromFieldValue for Option<String> {
    fn from_field_value(value: FieldValue) -> Self {
        match value {
            FieldValue::Text(v) => v.as_deref().and_then(parse_text),
            other => parse_text(&other.format()),
        }
    }
}

macro_rules! rule_fields {
    ($( $variant:ident => $field:ident : $kind:ident ),* $(,)?) => {
        /// A row column the variant catalog can map to a form field
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum RuleField {
            $($variant),*
        }

        impl RuleField {
            pub const ALL: &'static [RuleField] = &[$(RuleField::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(RuleField::$variant => stringify!($field)),*
                }
            }

            pub fn kind(self) -> FieldKind {
                match self {
                    $(RuleField::$variant => FieldKind::$kind),*
                }
            }

            pub fn get(self, rule: &ProgressionRule) -> FieldValue {
                match self {
                    $(RuleField::$variant => FieldValue::from(rule.$field.clone())),*
                }
            }

            pub fn set(self, rule: &mut ProgressionRule, value: FieldValue) {
                match self {
                    $(RuleField::$variant => rule.$field = FromFieldValue::from_field_value(value)),*
                }
            }
        }
    };
}

rule_fields! {
    BlockName => block_name: Text,
    ExerciseId => exercise_id: Text,
    Sets => sets: Int,
    Reps => reps: Text,
    RestSeconds => rest_seconds: Int,
    Tempo => tempo: Text,
    Rir => rir: Int,
    LoadPercentage => load_percentage: Num,
    WeightKg => weight_kg: Num,
    Notes => notes: Text,
    FirstExerciseReps => first_exercise_reps: Text,
    SecondExerciseReps => second_exercise_reps: Text,
    RestBetweenPairs => rest_between_pairs: Int,
    DropPercentage => drop_percentage: Num,
    DropSetReps => drop_set_reps: Text,
    ClustersPerSet => clusters_per_set: Int,
    ClusterReps => cluster_reps: Text,
    IntraClusterRest => intra_cluster_rest: Int,
    RestPauseDuration => rest_pause_duration: Int,
    MaxRestPauses => max_rest_pauses: Int,
    IsolationReps => isolation_reps: Text,
    CompoundReps => compound_reps: Text,
    DurationMinutes => duration_minutes: Int,
    TargetReps => target_reps: Text,
    WorkSeconds => work_seconds: Int,
    Rounds => rounds: Int,
    TimeCapMinutes => time_cap_minutes: Int,
    PyramidOrder => pyramid_order: Text,
    LadderOrder => ladder_order: Text,
}

impl fmt::Display for RuleField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RuleField {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RuleField::ALL
            .iter()
            .copied()
            .find(|field| field.name() == s)
            .ok_or_else(|| Error::Other(format!("Unknown rule field: {}", s)))
    }
}

// ============================================================================
// Patches and Create Payloads
// ============================================================================

/// Sparse field-level update for one persisted row
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RulePatch(BTreeMap<RuleField, FieldValue>);

impl RulePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, field: RuleField, value: FieldValue) {
        self.0.insert(field, value);
    }

    pub fn get(&self, field: RuleField) -> Option<&FieldValue> {
        self.0.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = RuleField> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RuleField, &FieldValue)> {
        self.0.iter().map(|(field, value)| (*field, value))
    }

    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(RuleField, &FieldValue) -> bool,
    {
        self.0.retain(|field, value| keep(*field, value));
    }

    pub fn apply_to(&self, rule: &mut ProgressionRule) {
        for (field, value) in &self.0 {
            field.set(rule, value.clone());
        }
    }
}

impl FromIterator<(RuleField, FieldValue)> for RulePatch {
    fn from_iter<I: IntoIterator<Item = (RuleField, FieldValue)>>(iter: I) -> Self {
        RulePatch(iter.into_iter().collect())
    }
}

/// Full row to insert; never carries an id or store timestamps
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NewRuleRow(ProgressionRule);

impl NewRuleRow {
    pub fn new(mut rule: ProgressionRule) -> Self {
        rule.id = None;
        rule.created_at = None;
        rule.updated_at = None;
        NewRuleRow(rule)
    }

    pub fn rule(&self) -> &ProgressionRule {
        &self.0
    }

    pub fn into_rule(self) -> ProgressionRule {
        self.0
    }
}

/// Save-time instruction for one row of a block
#[derive(Clone, Debug, PartialEq)]
pub struct RuleUpdateCandidate {
    pub original: ProgressionRule,
    pub updates: RulePatch,
    /// Present when `original` has no id and must be inserted
    pub create_payload: Option<NewRuleRow>,
}

// ============================================================================
// Weeks, Schedules and Templates
// ============================================================================

/// Identifies one editable program week
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekKey {
    pub program_id: String,
    pub program_schedule_id: String,
    pub week_number: u32,
}

impl WeekKey {
    pub fn new(
        program_id: impl Into<String>,
        program_schedule_id: impl Into<String>,
        week_number: u32,
    ) -> Self {
        Self {
            program_id: program_id.into(),
            program_schedule_id: program_schedule_id.into(),
            week_number,
        }
    }

    pub fn with_week(&self, week_number: u32) -> Self {
        Self {
            week_number,
            ..self.clone()
        }
    }
}

impl fmt::Display for WeekKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "program {} / schedule {} / week {}",
            self.program_id, self.program_schedule_id, self.week_number
        )
    }
}

/// A recurring workout slot of a program (e.g. "Monday"), repeated every week
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProgramSchedule {
    pub id: String,
    pub program_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Template every week of this slot is copied from unless overridden
    #[serde(default)]
    pub template_id: Option<String>,
}

/// Per-week template override recorded by a workout replacement
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WeekTemplate {
    pub program_schedule_id: String,
    pub week_number: u32,
    pub template_id: String,
}

/// Exercise metadata used to decorate folded forms
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExerciseSummary {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub muscle_group: Option<String>,
}

/// One block of a workout template, expressed as a block form value
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TemplateBlock {
    pub block_type: BlockType,
    #[serde(default)]
    pub block_name: Option<String>,
    #[serde(default)]
    pub form: FormValue,
}

/// A reusable workout that can be copied into any program week
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutTemplate {
    pub id: String,
    pub name: String,
    pub blocks: Vec<TemplateBlock>,
}
