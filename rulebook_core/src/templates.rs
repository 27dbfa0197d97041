//! Workout template library and template expansion.
//!
//! A template is a list of blocks, each written as the block form value the
//! editor would produce. Expanding a template into a week reuses the variant
//! catalog, so templates and edited weeks always agree on how forms map to
//! rows.

use crate::catalog::variant;
use crate::exercises::ExerciseLookup;
use crate::form::FormValue;
use crate::{
    BlockType, Error, NewRuleRow, ProgressionRule, Result, TemplateBlock, WeekKey,
    WorkoutTemplate,
};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::path::Path;

/// Cached built-in template library
static DEFAULT_TEMPLATES: Lazy<TemplateLibrary> = Lazy::new(build_builtin_templates);

/// Templates keyed by id
#[derive(Clone, Debug, Default)]
pub struct TemplateLibrary {
    templates: BTreeMap<String, WorkoutTemplate>,
}

impl TemplateLibrary {
    pub fn default_library() -> &'static TemplateLibrary {
        &DEFAULT_TEMPLATES
    }

    pub fn builtin() -> TemplateLibrary {
        build_builtin_templates()
    }

    /// Built-in templates plus any found in `templates.json` under `dir`.
    ///
    /// Templates in the file replace built-ins with the same id. A malformed
    /// file is logged and ignored.
    pub fn load(dir: &Path) -> Result<TemplateLibrary> {
        let mut library = Self::builtin();
        let path = dir.join("templates.json");
        if !path.exists() {
            return Ok(library);
        }

        let contents = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<Vec<WorkoutTemplate>>(&contents) {
            Ok(custom) => {
                tracing::info!("Loaded {} custom templates from {:?}", custom.len(), path);
                for template in custom {
                    library.insert(template);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse templates at {:?}: {}. Using built-in templates.",
                    path,
                    e
                );
            }
        }
        Ok(library)
    }

    pub fn insert(&mut self, template: WorkoutTemplate) {
        self.templates.insert(template.id.clone(), template);
    }

    pub fn get(&self, template_id: &str) -> Option<&WorkoutTemplate> {
        self.templates.get(template_id)
    }

    /// Templates in id order
    pub fn iter(&self) -> impl Iterator<Item = &WorkoutTemplate> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Check every template against the variant catalog and `exercises`.
    ///
    /// Returns a list of problems, or an empty Vec if all templates are usable.
    pub fn validate(&self, exercises: &dyn ExerciseLookup) -> Vec<String> {
        let mut errors = Vec::new();

        for template in self.iter() {
            if template.blocks.is_empty() {
                errors.push(format!("Template '{}' has no blocks", template.id));
            }

            for (index, block) in template.blocks.iter().enumerate() {
                let label = format!("Template '{}' block {}", template.id, index + 1);
                let spec = variant(block.block_type);

                for key in block.form.fields.keys() {
                    if !spec.field_keys().any(|k| k == key) {
                        errors.push(format!(
                            "{}: '{}' is not a {} field",
                            label, key, block.block_type
                        ));
                    }
                }
                if spec.has_entries() {
                    let count = block.form.entries.len();
                    if count < spec.min_rows || count > spec.max_rows {
                        errors.push(format!(
                            "{}: {} entries, expected {}..={}",
                            label, count, spec.min_rows, spec.max_rows
                        ));
                    }
                    for key in block.form.entries.iter().flat_map(|e| e.keys()) {
                        if !spec.entry_keys().any(|k| k == key) {
                            errors.push(format!(
                                "{}: '{}' is not a {} entry field",
                                label, key, block.block_type
                            ));
                        }
                    }
                } else if !block.form.entries.is_empty() {
                    errors.push(format!("{}: {} blocks take no entries", label, block.block_type));
                }

                for exercise_id in block.form.exercise_ids() {
                    if exercises.lookup(exercise_id).is_none() {
                        errors.push(format!("{}: unknown exercise '{}'", label, exercise_id));
                    }
                }
            }
        }

        errors
    }
}

/// New rows for every block of `template` in `week`.
///
/// Blocks are numbered from 1 in template order.
pub fn expand_template(template: &WorkoutTemplate, week: &WeekKey) -> Result<Vec<NewRuleRow>> {
    if template.blocks.is_empty() {
        return Err(Error::Template(format!(
            "Template '{}' has no blocks",
            template.id
        )));
    }

    let mut rows = Vec::new();
    for (index, block) in template.blocks.iter().enumerate() {
        let spec = variant(block.block_type);
        if block.form.entries.len() > spec.max_rows {
            return Err(Error::Template(format!(
                "Template '{}' block {} has {} entries; {} allows at most {}",
                template.id,
                index + 1,
                block.form.entries.len(),
                block.block_type,
                spec.max_rows
            )));
        }

        let reference = ProgressionRule {
            program_id: week.program_id.clone(),
            program_schedule_id: week.program_schedule_id.clone(),
            week_number: week.week_number,
            block_order: index as u32 + 1,
            block_type: block.block_type,
            block_name: block.block_name.clone(),
            ..Default::default()
        };

        for slot in 0..spec.rows_for(&block.form) {
            let stand_in = spec.stand_in(Some(&reference), slot);
            rows.push(spec.merge(&block.form, &stand_in, slot));
        }
    }

    tracing::debug!(
        "Expanded template {} into {} rows for {}",
        template.id,
        rows.len(),
        week
    );
    Ok(rows)
}

fn block(block_type: BlockType, name: &str, form: FormValue) -> TemplateBlock {
    TemplateBlock {
        block_type,
        block_name: Some(name.to_string()),
        form,
    }
}

/// Build the built-in template library
fn build_builtin_templates() -> TemplateLibrary {
    let mut library = TemplateLibrary::default();

    library.insert(WorkoutTemplate {
        id: "upper_strength".into(),
        name: "Upper Body Strength".into(),
        blocks: vec![
            block(
                BlockType::StraightSet,
                "Main press",
                FormValue::from_pairs(&[
                    ("exercise_id", "bench_press"),
                    ("sets", "5"),
                    ("reps", "5"),
                    ("rest_seconds", "180"),
                    ("tempo", "20X1"),
                    ("rir", "2"),
                    ("load_percentage", "80"),
                ]),
            ),
            block(
                BlockType::Superset,
                "Back and shoulders",
                FormValue::from_pairs(&[
                    ("sets", "4"),
                    ("rest_seconds", "90"),
                    ("exercise_id", "barbell_row"),
                    ("reps", "10"),
                    ("superset_exercise_id", "overhead_press"),
                    ("superset_reps", "8"),
                ]),
            ),
            block(
                BlockType::DropSet,
                "Arm finisher",
                FormValue::from_pairs(&[
                    ("exercise_id", "bicep_curl"),
                    ("sets", "2"),
                    ("reps", "12"),
                    ("drop_percentage", "25"),
                    ("drop_set_reps", "AMRAP"),
                    ("rest_seconds", "60"),
                ]),
            ),
        ],
    });

    library.insert(WorkoutTemplate {
        id: "lower_strength".into(),
        name: "Lower Body Strength".into(),
        blocks: vec![
            block(
                BlockType::StraightSet,
                "Squat",
                FormValue::from_pairs(&[
                    ("exercise_id", "back_squat"),
                    ("sets", "4"),
                    ("reps", "6"),
                    ("rest_seconds", "180"),
                    ("load_percentage", "75"),
                ]),
            ),
            block(
                BlockType::PreExhaustion,
                "Quads",
                FormValue::from_pairs(&[
                    ("sets", "3"),
                    ("rest_seconds", "120"),
                    ("isolation_exercise_id", "leg_extension"),
                    ("isolation_reps", "15"),
                    ("compound_exercise_id", "leg_press"),
                    ("compound_reps", "10"),
                ]),
            ),
            block(
                BlockType::GiantSet,
                "Posterior chain",
                FormValue::from_pairs(&[("sets", "3"), ("rest_seconds", "120")])
                    .with_entry(&[("exercise_id", "romanian_deadlift"), ("reps", "10")])
                    .with_entry(&[("exercise_id", "walking_lunge"), ("reps", "12")])
                    .with_entry(&[("exercise_id", "kettlebell_swing"), ("reps", "15")]),
            ),
        ],
    });

    library.insert(WorkoutTemplate {
        id: "conditioning".into(),
        name: "Conditioning".into(),
        blocks: vec![
            block(
                BlockType::Emom,
                "Swings",
                FormValue::from_pairs(&[
                    ("exercise_id", "kettlebell_swing"),
                    ("duration_minutes", "10"),
                    ("reps", "12"),
                ]),
            ),
            block(
                BlockType::Tabata,
                "Bike",
                FormValue::from_pairs(&[
                    ("exercise_id", "air_bike"),
                    ("work_seconds", "20"),
                    ("rest_seconds", "10"),
                    ("rounds", "8"),
                ]),
            ),
            block(
                BlockType::Circuit,
                "Finisher",
                FormValue::from_pairs(&[("rounds", "3"), ("rest_seconds", "60")])
                    .with_entry(&[("exercise_id", "burpee"), ("reps", "10")])
                    .with_entry(&[("exercise_id", "box_jump"), ("reps", "8")])
                    .with_entry(&[("exercise_id", "push_up"), ("reps", "15")]),
            ),
        ],
    });

    library
}
