//! Exercise metadata lookup.
//!
//! Folded forms only carry exercise ids; this module resolves them to names
//! and descriptions for display. A missing exercise is never an error.

use crate::{ExerciseSummary, Result};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::Path;

/// Resolves exercise ids to display metadata
pub trait ExerciseLookup {
    fn lookup(&self, exercise_id: &str) -> Option<ExerciseSummary>;
}

/// Cached built-in exercise list
static DEFAULT_EXERCISES: Lazy<ExerciseCatalog> = Lazy::new(build_builtin_exercises);

/// In-memory exercise catalog
#[derive(Clone, Debug, Default)]
pub struct ExerciseCatalog {
    exercises: HashMap<String, ExerciseSummary>,
}

impl ExerciseCatalog {
    /// Get a reference to the cached built-in catalog
    pub fn default_catalog() -> &'static ExerciseCatalog {
        &DEFAULT_EXERCISES
    }

    /// Build a fresh copy of the built-in catalog
    pub fn builtin() -> ExerciseCatalog {
        build_builtin_exercises()
    }

    /// Built-in exercises plus any found in `exercises.json` under `dir`.
    ///
    /// Entries in the file replace built-ins with the same id. A malformed
    /// file is logged and ignored.
    pub fn load(dir: &Path) -> Result<ExerciseCatalog> {
        let mut catalog = Self::builtin();
        let path = dir.join("exercises.json");
        if !path.exists() {
            return Ok(catalog);
        }

        let contents = std::fs::read_to_string(&path)?;
        match serde_json::from_str::<Vec<ExerciseSummary>>(&contents) {
            Ok(custom) => {
                tracing::info!("Loaded {} custom exercises from {:?}", custom.len(), path);
                for exercise in custom {
                    catalog.insert(exercise);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse exercises at {:?}: {}. Using built-in exercises.",
                    path,
                    e
                );
            }
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, exercise: ExerciseSummary) {
        self.exercises.insert(exercise.id.clone(), exercise);
    }

    pub fn contains(&self, exercise_id: &str) -> bool {
        self.exercises.contains_key(exercise_id)
    }

    pub fn len(&self) -> usize {
        self.exercises.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exercises.is_empty()
    }
}

impl ExerciseLookup for ExerciseCatalog {
    fn lookup(&self, exercise_id: &str) -> Option<ExerciseSummary> {
        self.exercises.get(exercise_id).cloned()
    }
}

fn exercise(id: &str, name: &str, muscle_group: &str, description: &str) -> ExerciseSummary {
    ExerciseSummary {
        id: id.into(),
        name: name.into(),
        description: Some(description.into()),
        muscle_group: Some(muscle_group.into()),
    }
}

fn build_builtin_exercises() -> ExerciseCatalog {
    let mut catalog = ExerciseCatalog::default();

    for summary in [
        exercise("bench_press", "Barbell Bench Press", "chest", "Flat bench, bar to mid-chest"),
        exercise("incline_db_press", "Incline Dumbbell Press", "chest", "30 degree bench"),
        exercise("barbell_row", "Barbell Row", "back", "Hinge to 45 degrees, row to navel"),
        exercise("lat_pulldown", "Lat Pulldown", "back", "Shoulder-width grip"),
        exercise("pull_up", "Pull-up", "back", "Full hang to chin over bar"),
        exercise("overhead_press", "Overhead Press", "shoulders", "Standing, strict"),
        exercise("lateral_raise", "Lateral Raise", "shoulders", "Dumbbells, slight bend"),
        exercise("bicep_curl", "Dumbbell Curl", "arms", "Supinate at the top"),
        exercise("tricep_pushdown", "Cable Pushdown", "arms", "Elbows pinned"),
        exercise("back_squat", "Back Squat", "legs", "High bar, below parallel"),
        exercise("leg_extension", "Leg Extension", "legs", "Pause at lockout"),
        exercise("leg_press", "Leg Press", "legs", "Feet mid-platform"),
        exercise("romanian_deadlift", "Romanian Deadlift", "posterior_chain", "Soft knees, bar close"),
        exercise("walking_lunge", "Walking Lunge", "legs", "Alternate legs each step"),
        exercise("kettlebell_swing", "Kettlebell Swing", "posterior_chain", "Two-hand, hip snap"),
        exercise("burpee", "Burpee", "full_body", "Chest to floor"),
        exercise("box_jump", "Box Jump", "legs", "Step down between reps"),
        exercise("push_up", "Push-up", "chest", "Body in a straight line"),
        exercise("plank", "Plank", "core", "Forearms, squeeze glutes"),
        exercise("air_bike", "Air Bike", "conditioning", "Arms and legs"),
    ] {
        catalog.insert(summary);
    }

    catalog
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = ExerciseCatalog::builtin();
        let bench = catalog.lookup("bench_press").unwrap();
        assert_eq!(bench.name, "Barbell Bench Press");
        assert!(catalog.lookup("nope").is_none());
        assert_eq!(catalog.len(), ExerciseCatalog::default_catalog().len());
    }

    #[test]
    fn test_load_merges_custom_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("exercises.json"),
            r#"[{"id": "sled_push", "name": "Sled Push"},
                {"id": "bench_press", "name": "Paused Bench"}]"#,
        )
        .unwrap();

        let catalog = ExerciseCatalog::load(temp_dir.path()).unwrap();
        assert!(catalog.contains("sled_push"));
        assert_eq!(catalog.lookup("bench_press").unwrap().name, "Paused Bench");
    }

    #[test]
    fn test_load_ignores_malformed_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join("exercises.json"), "{ not json").unwrap();

        let catalog = ExerciseCatalog::load(temp_dir.path()).unwrap();
        assert_eq!(catalog.len(), ExerciseCatalog::builtin().len());
    }
}
