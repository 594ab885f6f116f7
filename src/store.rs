use crate::errors::{StoreError, ValidationError};
use crate::models::{
    Habit, HabitDraft, HabitPatch, MonthDataset, NEW_HABIT_TITLE, PartialDataset, Period, Unit,
};
use crate::storage::LocalStorage;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

pub const CLEAR_MONTH_PROMPT: &str = "Clear every entry recorded this month?";
pub const REMOVE_HABIT_PROMPT: &str = "Remove this habit and all of its entries?";

/// Asks the user to approve a destructive action.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// A confirmation answered ahead of time, e.g. by a form field.
#[derive(Debug, Clone, Copy)]
pub struct Confirmed(pub bool);

impl Confirm for Confirmed {
    fn confirm(&self, prompt: &str) -> bool {
        debug!(prompt, answer = self.0, "confirmation");
        self.0
    }
}

/// The resident month. Every successful mutation is written through to
/// [`LocalStorage`] before the call returns.
pub struct HabitStore {
    dataset: MonthDataset,
    local: LocalStorage,
}

impl HabitStore {
    pub fn new(dataset: MonthDataset, local: LocalStorage) -> Self {
        Self { dataset, local }
    }

    pub fn dataset(&self) -> &MonthDataset {
        &self.dataset
    }

    pub fn period(&self) -> Period {
        self.dataset.period()
    }

    async fn persist(&self) {
        self.local.save(&self.dataset).await;
    }

    fn ensure_cell(&self, habit_id: &str, day: u32) -> Result<&Habit, StoreError> {
        let habit = self
            .dataset
            .habit(habit_id)
            .ok_or_else(|| StoreError::UnknownHabit(habit_id.to_string()))?;
        let days = self.period().days();
        if day == 0 || day > days {
            return Err(StoreError::DayOutOfRange { day, days });
        }
        Ok(habit)
    }

    pub async fn set_title(&mut self, title: &str) {
        self.dataset.title = title.to_string();
        self.persist().await;
    }

    /// Records `value` for a cell; `None` clears it. Returns the stored value.
    pub async fn set_cell(
        &mut self,
        habit_id: &str,
        day: u32,
        value: Option<f64>,
    ) -> Result<Option<f64>, StoreError> {
        let unit = self.ensure_cell(habit_id, day)?.unit;
        let value = match value {
            None => None,
            Some(v) if !v.is_finite() => {
                return Err(StoreError::Invalid(format!("{v} is not a finite number")));
            }
            Some(v) if unit == Unit::Check => Some(if v != 0.0 { 1.0 } else { 0.0 }),
            Some(v) => Some(v.max(0.0)),
        };

        self.dataset
            .data
            .entry(habit_id.to_string())
            .or_default()
            .insert(day, value);
        self.persist().await;
        Ok(value)
    }

    pub async fn clear_cell(&mut self, habit_id: &str, day: u32) -> Result<(), StoreError> {
        self.set_cell(habit_id, day, None).await.map(|_| ())
    }

    /// Advances a cell by its unit's step; check cells toggle.
    pub async fn cycle_cell(&mut self, habit_id: &str, day: u32) -> Result<Option<f64>, StoreError> {
        let unit = self.ensure_cell(habit_id, day)?.unit;
        let current = self.dataset.value(habit_id, day).unwrap_or(0.0);
        let next = match unit {
            Unit::Check => {
                if current != 0.0 {
                    0.0
                } else {
                    1.0
                }
            }
            _ => current + unit.step(),
        };
        self.set_cell(habit_id, day, Some(next)).await
    }

    /// Clears every day of the month for every habit. Returns the number of cells removed.
    pub async fn clear_all_cells_in_month(
        &mut self,
        confirm: &dyn Confirm,
    ) -> Result<usize, StoreError> {
        if !confirm.confirm(CLEAR_MONTH_PROMPT) {
            return Err(StoreError::Declined);
        }
        let days = self.period().days();
        let mut cleared = 0;
        for habit in &self.dataset.habits {
            if let Some(values) = self.dataset.data.get_mut(&habit.id) {
                let before = values.len();
                values.retain(|day, _| *day == 0 || *day > days);
                cleared += before - values.len();
            }
        }
        info!(cleared, period = %self.period(), "cleared month");
        self.persist().await;
        Ok(cleared)
    }

    pub async fn add_habit(&mut self, draft: HabitDraft) -> Result<Habit, StoreError> {
        let title = draft
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| NEW_HABIT_TITLE.to_string());
        let target = validate_target(draft.target.unwrap_or(1.0))?;

        let habit = Habit {
            id: self.fresh_habit_id(),
            title,
            unit: draft.unit.unwrap_or_default(),
            target,
        };
        self.dataset.habits.push(habit.clone());
        self.persist().await;
        Ok(habit)
    }

    fn fresh_habit_id(&self) -> String {
        loop {
            let id = format!("habit_{}", Uuid::new_v4().simple());
            if self.dataset.habit(&id).is_none() && !self.dataset.data.contains_key(&id) {
                return id;
            }
        }
    }

    pub async fn update_habit(&mut self, id: &str, patch: HabitPatch) -> Result<Habit, StoreError> {
        let target = patch.target.map(validate_target).transpose()?;
        let habit = self
            .dataset
            .habits
            .iter_mut()
            .find(|habit| habit.id == id)
            .ok_or_else(|| StoreError::UnknownHabit(id.to_string()))?;

        if let Some(title) = patch.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(StoreError::Invalid("habit title cannot be empty".to_string()));
            }
            habit.title = title.to_string();
        }
        if let Some(unit) = patch.unit {
            habit.unit = unit;
        }
        if let Some(target) = target {
            habit.target = target;
        }

        let updated = habit.clone();
        self.persist().await;
        Ok(updated)
    }

    /// Removes a habit together with everything recorded for it.
    pub async fn remove_habit(&mut self, id: &str, confirm: &dyn Confirm) -> Result<Habit, StoreError> {
        let index = self
            .dataset
            .habits
            .iter()
            .position(|habit| habit.id == id)
            .ok_or_else(|| StoreError::UnknownHabit(id.to_string()))?;
        if !confirm.confirm(REMOVE_HABIT_PROMPT) {
            return Err(StoreError::Declined);
        }

        let removed = self.dataset.habits.remove(index);
        self.dataset.data.remove(id);
        self.persist().await;
        Ok(removed)
    }

    pub async fn replace_dataset(&mut self, dataset: MonthDataset) {
        self.dataset = dataset;
        self.persist().await;
    }

    /// Moves to `period`, keeping the habit list but none of the recorded values.
    pub async fn start_period(&mut self, period: Period) {
        self.dataset.year = period.year;
        self.dataset.month = period.month;
        self.dataset.data.clear();
        self.persist().await;
    }

    /// Drops recorded values for the current month, keeping title and habits.
    pub async fn clear_data(&mut self) {
        self.dataset.data.clear();
        self.persist().await;
    }

    /// Replaces title, habits and data from a snapshot payload, keeping the current period.
    pub async fn hydrate(&mut self, payload: PartialDataset) {
        let period = self.period();
        let hydrated = PartialDataset {
            period: Some(period),
            ..payload
        }
        .into_dataset(period);
        self.replace_dataset(hydrated).await;
    }

    pub fn export_dataset(&self) -> MonthDataset {
        self.dataset.clone()
    }

    pub fn export_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.dataset)
    }

    /// File name offered for downloads of the current month.
    pub fn export_file_name(&self) -> String {
        let title = self.dataset.title.split_whitespace().collect::<Vec<_>>().join("_");
        format!("{title}_{}.json", self.period())
    }

    /// Hydrates from an import file. Absent fields keep their current values;
    /// only input that is not a JSON object is rejected.
    pub async fn import_dataset(&mut self, raw: &str) -> Result<(), ValidationError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|err| ValidationError::Unparsable(err.to_string()))?;
        let partial = PartialDataset::from_value(&value).ok_or(ValidationError::NotAnObject)?;
        let merged = partial.merge_onto(&self.dataset);
        info!(period = %merged.period(), habits = merged.habits.len(), "imported dataset");
        self.replace_dataset(merged).await;
        Ok(())
    }
}

fn validate_target(target: f64) -> Result<f64, StoreError> {
    if !target.is_finite() || target < 0.0 {
        return Err(StoreError::Invalid(format!(
            "target must be a non-negative number, got {target}"
        )));
    }
    Ok(target)
}
