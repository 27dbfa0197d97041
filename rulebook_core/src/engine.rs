//! Week engine: loads a program week, tracks edits and saves them.
//!
//! Loading follows a fixed fallback order:
//! 1. the week's own rows
//! 2. the week's template, copied into the week when copy-on-load is enabled
//! 3. the placeholder source week's rows, borrowed as unsaved stand-ins
//! 4. nothing
//!
//! A borrowed week is copy-on-write: the source week is never modified, and
//! the first save writes the whole week under its own week number.

use crate::config::EngineConfig;
use crate::diff::{build_save_plan, RowOperation};
use crate::exercises::ExerciseLookup;
use crate::folder::{fold_blocks, BlockFormState};
use crate::form::FormValue;
use crate::store::RuleStore;
use crate::tracker;
use crate::{Error, ProgressionRule, Result, WeekKey};
use serde::Serialize;

/// Rows for one week and whether they were borrowed from another week
#[derive(Clone, Debug, Default)]
pub struct LoadedWeek {
    pub rows: Vec<ProgressionRule>,
    pub is_placeholder: bool,
}

/// Fetch the rows to edit for `week`.
///
/// Only the store can fail; its errors come back as [`Error::Load`].
pub fn fetch_week(
    store: &dyn RuleStore,
    week: &WeekKey,
    config: &EngineConfig,
) -> Result<LoadedWeek> {
    let own = fetch(store, week)?;
    if !own.is_empty() {
        tracing::info!("Loaded {} rules for {}", own.len(), week);
        return Ok(LoadedWeek {
            rows: own,
            is_placeholder: false,
        });
    }

    if config.copy_template_on_load {
        let template = store
            .template_for_week(&week.program_schedule_id, week.week_number)
            .map_err(|e| Error::load(format!("template assignment for {}", week), e))?;
        if let Some(template_id) = template {
            copy_template(store, week, &template_id)?;
            let copied = fetch(store, week)?;
            if !copied.is_empty() {
                return Ok(LoadedWeek {
                    rows: copied,
                    is_placeholder: false,
                });
            }
        }
    }

    if week.week_number != config.placeholder_source_week {
        let source = week.with_week(config.placeholder_source_week);
        let borrowed = fetch(store, &source)?;
        if !borrowed.is_empty() {
            tracing::info!(
                "No rules for {}; borrowing {} rules from week {}",
                week,
                borrowed.len(),
                source.week_number
            );
            let rows = borrowed
                .into_iter()
                .map(|row| ProgressionRule {
                    id: None,
                    week_number: week.week_number,
                    created_at: None,
                    updated_at: None,
                    ..row
                })
                .collect();
            return Ok(LoadedWeek {
                rows,
                is_placeholder: true,
            });
        }
    }

    tracing::info!("No rules found for {}", week);
    Ok(LoadedWeek::default())
}

fn fetch(store: &dyn RuleStore, week: &WeekKey) -> Result<Vec<ProgressionRule>> {
    store
        .fetch_rules(&week.program_id, week.week_number, &week.program_schedule_id)
        .map_err(|e| Error::load(format!("rules for {}", week), e))
}

fn copy_template(store: &dyn RuleStore, week: &WeekKey, template_id: &str) -> Result<usize> {
    store
        .copy_template_into_week(
            &week.program_id,
            &week.program_schedule_id,
            template_id,
            week.week_number,
        )
        .map_err(|e| Error::load(format!("template '{}' into {}", template_id, week), e))
}

/// Outcome of a successful save
#[derive(Clone, Debug, Default, Serialize)]
pub struct SaveReport {
    pub created: usize,
    pub updated: usize,
    pub operations: Vec<RowOperation>,
}

impl SaveReport {
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Apply `plan` one operation at a time, stopping at the first failure.
///
/// Operations before the failing one stay applied; the error reports how
/// many there were.
pub fn execute_plan(store: &dyn RuleStore, plan: Vec<RowOperation>) -> Result<SaveReport> {
    let mut report = SaveReport::default();

    for (committed, operation) in plan.into_iter().enumerate() {
        let outcome = match &operation {
            RowOperation::Update { rule_id, patch, .. } => store.update_rule(rule_id, patch),
            RowOperation::Create { row, .. } => store.create_rule(row).map(|_| ()),
        };

        if let Err(source) = outcome {
            let rule_id = match &operation {
                RowOperation::Update { rule_id, .. } => Some(rule_id.clone()),
                RowOperation::Create { .. } => None,
            };
            tracing::warn!(
                "Save stopped at {} in block {} after {} operation(s)",
                operation.name(),
                operation.block_order(),
                committed
            );
            return Err(Error::Save {
                operation: operation.name(),
                block_order: operation.block_order(),
                rule_id,
                committed,
                source: Box::new(source),
            });
        }

        tracing::debug!("Applied {} in block {}", operation.name(), operation.block_order());
        match operation {
            RowOperation::Update { .. } => report.updated += 1,
            RowOperation::Create { .. } => report.created += 1,
        }
        report.operations.push(operation);
    }

    Ok(report)
}

/// An open program week with its editable blocks
pub struct WeekSession<'a> {
    store: &'a dyn RuleStore,
    exercises: &'a dyn ExerciseLookup,
    config: EngineConfig,
    week: WeekKey,
    blocks: Vec<BlockFormState>,
    is_placeholder: bool,
}

impl<'a> WeekSession<'a> {
    /// Load and fold `week`
    pub fn open(
        store: &'a dyn RuleStore,
        exercises: &'a dyn ExerciseLookup,
        config: &EngineConfig,
        week: WeekKey,
    ) -> Result<Self> {
        let mut session = WeekSession {
            store,
            exercises,
            config: config.clone(),
            week,
            blocks: Vec::new(),
            is_placeholder: false,
        };
        session.reload()?;
        Ok(session)
    }

    /// Refetch the week, discarding unsaved edits.
    ///
    /// If the fetch fails the session is left with no blocks.
    pub fn reload(&mut self) -> Result<()> {
        self.blocks.clear();
        self.is_placeholder = false;
        let loaded = fetch_week(self.store, &self.week, &self.config)?;
        self.blocks = fold_blocks(&loaded.rows, loaded.is_placeholder, Some(self.exercises));
        self.is_placeholder = loaded.is_placeholder;
        Ok(())
    }

    pub fn week(&self) -> &WeekKey {
        &self.week
    }

    pub fn blocks(&self) -> &[BlockFormState] {
        &self.blocks
    }

    pub fn block(&self, block_order: u32) -> Option<&BlockFormState> {
        self.blocks.iter().find(|b| b.block_order == block_order)
    }

    /// True while the week shows another week's rows
    pub fn is_placeholder(&self) -> bool {
        self.is_placeholder
    }

    /// Edit one block's form; exercise metadata is re-resolved afterwards
    pub fn edit<F>(&mut self, block_order: u32, f: F) -> Result<()>
    where
        F: FnOnce(&mut FormValue),
    {
        let exercises = self.exercises;
        let block = self
            .blocks
            .iter_mut()
            .find(|b| b.block_order == block_order)
            .ok_or_else(|| Error::NotFound(format!("block {} in {}", block_order, self.week)))?;
        block.edit(|form| {
            f(form);
            form.resolve_exercises(exercises);
        });
        Ok(())
    }

    pub fn revert_all(&mut self) {
        for block in &mut self.blocks {
            block.revert();
        }
    }

    pub fn pending_change_count(&self) -> usize {
        tracker::pending_change_count(&self.blocks)
    }

    pub fn has_pending_changes(&self) -> bool {
        tracker::has_pending_changes(&self.blocks)
    }

    /// Write pending edits to the store and reload the week.
    ///
    /// On failure nothing is reloaded; the blocks keep their edits and the
    /// caller should reload before saving again.
    pub fn save(&mut self) -> Result<SaveReport> {
        let plan = build_save_plan(&self.blocks);
        if plan.is_empty() {
            tracing::info!("Nothing to save for {}", self.week);
            return Ok(SaveReport::default());
        }

        let report = execute_plan(self.store, plan)?;
        tracing::info!(
            "Saved {}: {} created, {} updated",
            self.week,
            report.created,
            report.updated
        );
        self.reload()?;
        Ok(report)
    }

    /// Replace the week's rows with a fresh copy of its template
    pub fn refresh_from_template(&mut self) -> Result<usize> {
        let template_id = self
            .store
            .template_for_week(&self.week.program_schedule_id, self.week.week_number)?
            .ok_or_else(|| Error::NotFound(format!("template for {}", self.week)))?;

        self.store
            .delete_rules_for_week(&self.week.program_schedule_id, self.week.week_number)?;
        let count = copy_template(self.store, &self.week, &template_id)?;
        tracing::info!(
            "Refreshed {} from template {} ({} rules)",
            self.week,
            template_id,
            count
        );
        self.reload()?;
        Ok(count)
    }

    /// Make `template_id` this week's source and copy it over the week's rows.
    ///
    /// The assignment is recorded before anything is deleted, so an unknown
    /// template leaves the week as it was.
    pub fn replace_workout(&mut self, template_id: &str) -> Result<usize> {
        self.store.set_week_template(
            &self.week.program_schedule_id,
            self.week.week_number,
            template_id,
        )?;
        self.store
            .delete_rules_for_week(&self.week.program_schedule_id, self.week.week_number)?;
        let count = copy_template(self.store, &self.week, template_id)?;
        tracing::info!(
            "Replaced workout for {} with template {} ({} rules)",
            self.week,
            template_id,
            count
        );
        self.reload()?;
        Ok(count)
    }
}
