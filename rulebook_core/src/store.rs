//! Rule store boundary and a file-backed implementation.
//!
//! The engine talks to persistence only through [`RuleStore`]. The
//! [`FileRuleStore`] keeps every rule, schedule and week template
//! assignment in one JSON document, guarded by file locks.

use crate::templates::{expand_template, TemplateLibrary};
use crate::{
    Error, NewRuleRow, ProgramSchedule, ProgressionRule, Result, RulePatch, WeekKey, WeekTemplate,
};
use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Persistence operations the engine relies on
pub trait RuleStore {
    /// Rows of one program week, any order
    fn fetch_rules(
        &self,
        program_id: &str,
        week_number: u32,
        schedule_id: &str,
    ) -> Result<Vec<ProgressionRule>>;

    /// Insert a row and return it with its new id
    fn create_rule(&self, row: &NewRuleRow) -> Result<ProgressionRule>;

    /// Apply a sparse update to one row
    fn update_rule(&self, id: &str, patch: &RulePatch) -> Result<()>;

    /// Remove every row of a schedule's week, returning how many were removed
    fn delete_rules_for_week(&self, schedule_id: &str, week_number: u32) -> Result<usize>;

    /// Expand a template into rows for a week, returning how many were created
    fn copy_template_into_week(
        &self,
        program_id: &str,
        schedule_id: &str,
        template_id: &str,
        week_number: u32,
    ) -> Result<usize>;

    /// Template a week is sourced from, if any
    fn template_for_week(&self, schedule_id: &str, week_number: u32) -> Result<Option<String>>;

    /// Make `template_id` the source of one week only
    fn set_week_template(&self, schedule_id: &str, week_number: u32, template_id: &str)
        -> Result<()>;
}

/// On-disk layout of the file store
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StoreDocument {
    #[serde(default)]
    pub rules: Vec<ProgressionRule>,
    #[serde(default)]
    pub schedules: Vec<ProgramSchedule>,
    #[serde(default)]
    pub week_templates: Vec<WeekTemplate>,
}

/// JSON document store with file locking
pub struct FileRuleStore {
    path: PathBuf,
    templates: TemplateLibrary,
}

impl FileRuleStore {
    /// Store kept as `rules.json` in `data_dir`
    pub fn open(data_dir: &Path, templates: TemplateLibrary) -> Self {
        Self {
            path: data_dir.join("rules.json"),
            templates,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn templates(&self) -> &TemplateLibrary {
        &self.templates
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    /// Read the whole document under a shared lock.
    ///
    /// A missing file is an empty store; a corrupt one is an error, since
    /// writing over it would lose every rule.
    pub fn read(&self) -> Result<StoreDocument> {
        if !self.path.exists() {
            tracing::debug!("No rule store at {:?}, starting empty", self.path);
            return Ok(StoreDocument::default());
        }

        let file = File::open(&self.path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        serde_json::from_str(&contents)
            .map_err(|e| Error::Store(format!("Corrupt rule store {:?}: {}", self.path, e)))
    }

    /// Atomically replace the document on disk
    fn write(&self, document: &StoreDocument) -> Result<()> {
        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "store path missing parent")
        })?;
        std::fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(document)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }

    /// Load, modify and save the document while holding the store lock
    pub fn update<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut StoreDocument) -> Result<T>,
    {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(self.lock_path())?;
        lock.lock_exclusive()?;

        let result = self.read().and_then(|mut document| {
            let value = f(&mut document)?;
            self.write(&document)?;
            Ok(value)
        });

        lock.unlock()?;
        result
    }

    /// Add or replace a schedule slot
    pub fn register_schedule(&self, schedule: ProgramSchedule) -> Result<()> {
        if let Some(template_id) = &schedule.template_id {
            if self.templates.get(template_id).is_none() {
                return Err(Error::NotFound(format!("template '{}'", template_id)));
            }
        }
        self.update(|document| {
            document.schedules.retain(|s| s.id != schedule.id);
            tracing::info!("Registered schedule {} for program {}", schedule.id, schedule.program_id);
            document.schedules.push(schedule);
            Ok(())
        })
    }

    pub fn schedules(&self) -> Result<Vec<ProgramSchedule>> {
        Ok(self.read()?.schedules)
    }

    /// Insert rows as given, assigning ids to rows that have none
    pub fn import_rules(&self, rules: Vec<ProgressionRule>) -> Result<usize> {
        self.update(|document| {
            let now = Utc::now();
            let count = rules.len();
            for mut rule in rules {
                if rule.id.is_none() {
                    rule.id = Some(Uuid::new_v4().to_string());
                }
                if document.rules.iter().any(|r| r.id == rule.id) {
                    return Err(Error::Store(format!(
                        "Duplicate rule id {}",
                        rule.id.as_deref().unwrap_or_default()
                    )));
                }
                rule.created_at.get_or_insert(now);
                rule.updated_at.get_or_insert(now);
                document.rules.push(rule);
            }
            tracing::info!("Imported {} rules", count);
            Ok(count)
        })
    }
}

fn persist_new(document: &mut StoreDocument, row: NewRuleRow) -> ProgressionRule {
    let now = Utc::now();
    let mut rule = row.into_rule();
    rule.id = Some(Uuid::new_v4().to_string());
    rule.created_at = Some(now);
    rule.updated_at = Some(now);
    document.rules.push(rule.clone());
    rule
}

impl RuleStore for FileRuleStore {
    fn fetch_rules(
        &self,
        program_id: &str,
        week_number: u32,
        schedule_id: &str,
    ) -> Result<Vec<ProgressionRule>> {
        let mut rules: Vec<ProgressionRule> = self
            .read()?
            .rules
            .into_iter()
            .filter(|r| {
                r.program_id == program_id
                    && r.program_schedule_id == schedule_id
                    && r.week_number == week_number
            })
            .collect();
        rules.sort_by_key(|r| (r.block_order, r.exercise_order, r.exercise_letter.clone()));
        tracing::debug!(
            "Fetched {} rules for program {} schedule {} week {}",
            rules.len(),
            program_id,
            schedule_id,
            week_number
        );
        Ok(rules)
    }

    fn create_rule(&self, row: &NewRuleRow) -> Result<ProgressionRule> {
        self.update(|document| {
            let rule = persist_new(document, row.clone());
            tracing::debug!(
                "Created rule {:?} (block {}, slot {})",
                rule.id,
                rule.block_order,
                rule.exercise_order
            );
            Ok(rule)
        })
    }

    fn update_rule(&self, id: &str, patch: &RulePatch) -> Result<()> {
        self.update(|document| {
            let rule = document
                .rules
                .iter_mut()
                .find(|r| r.id.as_deref() == Some(id))
                .ok_or_else(|| Error::NotFound(format!("rule '{}'", id)))?;
            patch.apply_to(rule);
            rule.updated_at = Some(Utc::now());
            tracing::debug!("Updated {} field(s) of rule {}", patch.len(), id);
            Ok(())
        })
    }

    fn delete_rules_for_week(&self, schedule_id: &str, week_number: u32) -> Result<usize> {
        self.update(|document| {
            let before = document.rules.len();
            document
                .rules
                .retain(|r| !(r.program_schedule_id == schedule_id && r.week_number == week_number));
            let removed = before - document.rules.len();
            tracing::info!(
                "Deleted {} rules for schedule {} week {}",
                removed,
                schedule_id,
                week_number
            );
            Ok(removed)
        })
    }

    fn copy_template_into_week(
        &self,
        program_id: &str,
        schedule_id: &str,
        template_id: &str,
        week_number: u32,
    ) -> Result<usize> {
        let template = self
            .templates
            .get(template_id)
            .ok_or_else(|| Error::NotFound(format!("template '{}'", template_id)))?;
        let rows = expand_template(template, &WeekKey::new(program_id, schedule_id, week_number))?;

        self.update(|document| {
            let count = rows.len();
            for row in rows {
                persist_new(document, row);
            }
            tracing::info!(
                "Copied template {} into schedule {} week {} ({} rules)",
                template_id,
                schedule_id,
                week_number,
                count
            );
            Ok(count)
        })
    }

    fn template_for_week(&self, schedule_id: &str, week_number: u32) -> Result<Option<String>> {
        let document = self.read()?;
        let assigned = document
            .week_templates
            .iter()
            .find(|w| w.program_schedule_id == schedule_id && w.week_number == week_number)
            .map(|w| w.template_id.clone());
        if assigned.is_some() {
            return Ok(assigned);
        }
        Ok(document
            .schedules
            .iter()
            .find(|s| s.id == schedule_id)
            .and_then(|s| s.template_id.clone()))
    }

    fn set_week_template(
        &self,
        schedule_id: &str,
        week_number: u32,
        template_id: &str,
    ) -> Result<()> {
        if self.templates.get(template_id).is_none() {
            return Err(Error::NotFound(format!("template '{}'", template_id)));
        }
        self.update(|document| {
            document
                .week_templates
                .retain(|w| !(w.program_schedule_id == schedule_id && w.week_number == week_number));
            document.week_templates.push(WeekTemplate {
                program_schedule_id: schedule_id.to_string(),
                week_number,
                template_id: template_id.to_string(),
            });
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BlockType, FieldValue, RuleField};

    fn store(dir: &Path) -> FileRuleStore {
        FileRuleStore::open(dir, TemplateLibrary::builtin())
    }

    fn new_row(week: u32, block_order: u32) -> NewRuleRow {
        NewRuleRow::new(ProgressionRule {
            program_id: "p1".into(),
            program_schedule_id: "s1".into(),
            week_number: week,
            block_order,
            block_type: BlockType::StraightSet,
            exercise_order: 1,
            exercise_id: Some("bench_press".into()),
            sets: Some(3),
            ..Default::default()
        })
    }

    #[test]
    fn test_empty_store_fetches_nothing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let rules = store(temp_dir.path()).fetch_rules("p1", 1, "s1").unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_create_assigns_id_and_fetches() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());

        let created = store.create_rule(&new_row(1, 1)).unwrap();
        assert!(created.id.is_some());
        assert!(created.created_at.is_some());

        let rules = store.fetch_rules("p1", 1, "s1").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].id, created.id);
        assert!(store.fetch_rules("p1", 2, "s1").unwrap().is_empty());
    }

    #[test]
    fn test_update_applies_patch_only() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        let created = store.create_rule(&new_row(1, 1)).unwrap();
        let id = created.id.unwrap();

        let patch: RulePatch = [(RuleField::Reps, FieldValue::Text(Some("8".into())))]
            .into_iter()
            .collect();
        store.update_rule(&id, &patch).unwrap();

        let rule = &store.fetch_rules("p1", 1, "s1").unwrap()[0];
        assert_eq!(rule.reps.as_deref(), Some("8"));
        assert_eq!(rule.sets, Some(3));
        assert_eq!(rule.exercise_id.as_deref(), Some("bench_press"));
    }

    #[test]
    fn test_update_unknown_rule_is_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = store(temp_dir.path()).update_rule("missing", &RulePatch::new());
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_delete_only_touches_one_week() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        store.create_rule(&new_row(1, 1)).unwrap();
        store.create_rule(&new_row(2, 1)).unwrap();
        store.create_rule(&new_row(2, 2)).unwrap();

        assert_eq!(store.delete_rules_for_week("s1", 2).unwrap(), 2);
        assert_eq!(store.fetch_rules("p1", 1, "s1").unwrap().len(), 1);
        assert!(store.fetch_rules("p1", 2, "s1").unwrap().is_empty());
    }

    #[test]
    fn test_copy_template_creates_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());

        let count = store
            .copy_template_into_week("p1", "s1", "upper_strength", 3)
            .unwrap();
        let rules = store.fetch_rules("p1", 3, "s1").unwrap();
        assert_eq!(rules.len(), count);
        assert!(rules.iter().all(|r| r.id.is_some() && r.week_number == 3));
    }

    #[test]
    fn test_copy_unknown_template_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = store(temp_dir.path()).copy_template_into_week("p1", "s1", "nope", 1);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_week_template_overrides_schedule_template() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        store
            .register_schedule(ProgramSchedule {
                id: "s1".into(),
                program_id: "p1".into(),
                name: Some("Monday".into()),
                template_id: Some("upper_strength".into()),
            })
            .unwrap();

        assert_eq!(
            store.template_for_week("s1", 4).unwrap().as_deref(),
            Some("upper_strength")
        );

        store.set_week_template("s1", 4, "conditioning").unwrap();
        assert_eq!(
            store.template_for_week("s1", 4).unwrap().as_deref(),
            Some("conditioning")
        );
        assert_eq!(
            store.template_for_week("s1", 5).unwrap().as_deref(),
            Some("upper_strength")
        );
        assert_eq!(store.template_for_week("other", 1).unwrap(), None);
    }

    #[test]
    fn test_register_schedule_rejects_unknown_template() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = store(temp_dir.path()).register_schedule(ProgramSchedule {
            id: "s1".into(),
            program_id: "p1".into(),
            name: None,
            template_id: Some("missing".into()),
        });
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_import_keeps_ids_and_rejects_duplicates() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        let mut rule = new_row(1, 1).into_rule();
        rule.id = Some("r1".into());

        assert_eq!(store.import_rules(vec![rule.clone()]).unwrap(), 1);
        assert_eq!(
            store.fetch_rules("p1", 1, "s1").unwrap()[0].id.as_deref(),
            Some("r1")
        );
        assert!(matches!(store.import_rules(vec![rule]), Err(Error::Store(_))));
    }

    #[test]
    fn test_corrupt_store_is_an_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        std::fs::write(store.path(), "{ not json").unwrap();

        assert!(matches!(store.fetch_rules("p1", 1, "s1"), Err(Error::Store(_))));
        assert!(store.create_rule(&new_row(1, 1)).is_err());
        // The corrupt file was not overwritten
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), "{ not json");
    }

    #[test]
    fn test_no_stray_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store(temp_dir.path());
        store.create_rule(&new_row(1, 1)).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "rules.json" && e.file_name() != "rules.lock")
            .collect();
        assert!(extras.is_empty(), "Unexpected files: {:?}", extras);
    }
}
