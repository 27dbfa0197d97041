//! CSV export of progression rules for printing or spreadsheet review.

use crate::{ProgressionRule, Result, RuleField};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Fields with their own column; everything else goes into `details`
const COLUMN_FIELDS: [RuleField; 8] = [
    RuleField::BlockName,
    RuleField::ExerciseId,
    RuleField::Sets,
    RuleField::Reps,
    RuleField::RestSeconds,
    RuleField::LoadPercentage,
    RuleField::WeightKg,
    RuleField::Notes,
];

/// A row in the CSV output
#[derive(Debug, serde::Serialize)]
struct CsvRow {
    week: u32,
    block_order: u32,
    block_type: String,
    block_name: Option<String>,
    exercise_order: u32,
    exercise_letter: Option<String>,
    exercise_id: Option<String>,
    sets: Option<i64>,
    reps: Option<String>,
    rest_seconds: Option<i64>,
    load_percentage: Option<f64>,
    weight_kg: Option<f64>,
    notes: Option<String>,
    details: String,
}

impl From<&ProgressionRule> for CsvRow {
    fn from(rule: &ProgressionRule) -> Self {
        let details = RuleField::ALL
            .iter()
            .filter(|field| !COLUMN_FIELDS.contains(field))
            .filter_map(|field| {
                let value = field.get(rule);
                (!value.is_null()).then(|| format!("{}={}", field, value.format()))
            })
            .collect::<Vec<_>>()
            .join("; ");

        CsvRow {
            week: rule.week_number,
            block_order: rule.block_order,
            block_type: rule.block_type.to_string(),
            block_name: rule.block_name.clone(),
            exercise_order: rule.exercise_order,
            exercise_letter: rule.exercise_letter.clone(),
            exercise_id: rule.exercise_id.clone(),
            sets: rule.sets,
            reps: rule.reps.clone(),
            rest_seconds: rule.rest_seconds,
            load_percentage: rule.load_percentage,
            weight_kg: rule.weight_kg,
            notes: rule.notes.clone(),
            details,
        }
    }
}

/// Write `rules` as CSV with a header row, in week, block and exercise order
pub fn write_rules_csv<W: Write>(rules: &[ProgressionRule], writer: W) -> Result<usize> {
    let mut sorted: Vec<&ProgressionRule> = rules.iter().collect();
    sorted.sort_by_key(|r| {
        (
            r.week_number,
            r.block_order,
            r.exercise_order,
            r.exercise_letter.clone(),
        )
    });

    let mut writer = csv::Writer::from_writer(writer);
    for rule in &sorted {
        writer.serialize(CsvRow::from(*rule))?;
    }
    writer.flush()?;
    Ok(sorted.len())
}

/// Export `rules` to a CSV file at `path`, replacing any existing file
pub fn export_rules_csv(rules: &[ProgressionRule], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = File::create(path)?;
    let count = write_rules_csv(rules, &file)?;
    file.sync_all()?;

    tracing::info!("Exported {} rules to {:?}", count, path);
    Ok(count)
}
