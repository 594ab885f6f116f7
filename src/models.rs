use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::stats::days_in_month;

pub const DEFAULT_TITLE: &str = "Lifestyle Challenge";
pub const NEW_HABIT_TITLE: &str = "New habit";

/// Recorded values for one habit, keyed by day of month. `None` is an unset cell.
pub type DayValues = BTreeMap<u32, Option<f64>>;

/// Recorded values for every habit, keyed by habit id.
pub type DataMap = BTreeMap<String, DayValues>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    #[default]
    Check,
    Count,
    Minutes,
    Ml,
    Grams,
}

impl Unit {
    pub const ALL: [Unit; 5] = [Unit::Check, Unit::Count, Unit::Minutes, Unit::Ml, Unit::Grams];

    /// Wire name, as serialized.
    pub fn key(self) -> &'static str {
        match self {
            Unit::Check => "check",
            Unit::Count => "count",
            Unit::Minutes => "minutes",
            Unit::Ml => "ml",
            Unit::Grams => "grams",
        }
    }

    /// Increment applied when a cell is cycled.
    pub fn step(self) -> f64 {
        match self {
            Unit::Check | Unit::Count => 1.0,
            Unit::Minutes => 5.0,
            Unit::Ml => 250.0,
            Unit::Grams => 10.0,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Unit::Check => "check",
            Unit::Count => "count",
            Unit::Minutes => "min",
            Unit::Ml => "mL",
            Unit::Grams => "g",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub title: String,
    pub unit: Unit,
    pub target: f64,
}

impl Habit {
    fn preset(id: &str, title: &str, unit: Unit, target: f64) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            unit,
            target,
        }
    }
}

/// The template every fresh dataset starts from.
pub fn default_habits() -> Vec<Habit> {
    vec![
        Habit::preset("wakeBefore9", "Wake up before 9", Unit::Check, 1.0),
        Habit::preset("sleepBefore11", "In bed before 11", Unit::Check, 1.0),
        Habit::preset("morningStretch", "Morning stretch", Unit::Minutes, 15.0),
        Habit::preset("gym", "Gym", Unit::Minutes, 60.0),
        Habit::preset("aiBuild", "AI build time", Unit::Minutes, 60.0),
        Habit::preset("read", "Reading", Unit::Minutes, 15.0),
        Habit::preset("plan", "Plan the day", Unit::Minutes, 5.0),
        Habit::preset("postural", "Posture exercise", Unit::Minutes, 10.0),
        Habit::preset("protein", "Protein", Unit::Grams, 80.0),
        Habit::preset("water", "Water", Unit::Ml, 3000.0),
        Habit::preset("social", "Social time", Unit::Count, 1.0),
        Habit::preset("alcohol", "Alcohol (glasses)", Unit::Count, 0.0),
    ]
}

pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// A calendar month. `month` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        let valid = (MIN_YEAR..=MAX_YEAR).contains(&year) && (1..=12).contains(&month);
        valid.then_some(Self { year, month })
    }

    pub fn current() -> Self {
        let today = Local::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    pub fn days(self) -> u32 {
        days_in_month(self.year, self.month)
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{:02}", self.year, self.month)
    }
}

/// The single month resident in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthDataset {
    pub title: String,
    pub year: i32,
    pub month: u32,
    pub habits: Vec<Habit>,
    pub data: DataMap,
}

impl MonthDataset {
    pub fn fresh(period: Period) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            year: period.year,
            month: period.month,
            habits: default_habits(),
            data: DataMap::new(),
        }
    }

    pub fn period(&self) -> Period {
        Period {
            year: self.year,
            month: self.month,
        }
    }

    pub fn habit(&self, id: &str) -> Option<&Habit> {
        self.habits.iter().find(|habit| habit.id == id)
    }

    pub fn value(&self, habit_id: &str, day: u32) -> Option<f64> {
        self.data
            .get(habit_id)
            .and_then(|days| days.get(&day))
            .copied()
            .flatten()
    }
}

/// A dataset as read from an untrusted source: every field may be missing or malformed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialDataset {
    pub title: Option<String>,
    pub period: Option<Period>,
    pub habits: Option<Vec<Habit>>,
    pub data: Option<DataMap>,
}

impl PartialDataset {
    /// Returns `None` only when `value` is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;

        let title = object
            .get("title")
            .and_then(Value::as_str)
            .filter(|title| !title.is_empty())
            .map(str::to_string);

        let year = object
            .get("year")
            .and_then(Value::as_i64)
            .and_then(|year| i32::try_from(year).ok());
        let month = object
            .get("month")
            .and_then(Value::as_u64)
            .and_then(|month| u32::try_from(month).ok());
        let period = match (year, month) {
            (Some(year), Some(month)) => Period::new(year, month),
            _ => None,
        };

        let habits = object.get("habits").and_then(Value::as_array).map(|items| {
            items
                .iter()
                .filter_map(|item| match serde_json::from_value::<Habit>(item.clone()) {
                    Ok(habit) => Some(habit),
                    Err(err) => {
                        warn!("skipping malformed habit entry: {err}");
                        None
                    }
                })
                .collect()
        });

        let data = object.get("data").and_then(parse_data_map);

        Some(Self {
            title,
            period,
            habits,
            data,
        })
    }

    /// Fills missing fields from `base`, the dataset currently shown.
    pub fn merge_onto(self, base: &MonthDataset) -> MonthDataset {
        let period = self.period.unwrap_or_else(|| base.period());
        MonthDataset {
            title: self.title.unwrap_or_else(|| base.title.clone()),
            year: period.year,
            month: period.month,
            habits: self.habits.unwrap_or_else(|| base.habits.clone()),
            data: self.data.unwrap_or_else(|| base.data.clone()),
        }
    }

    /// Fills missing fields from the defaults of a fresh month.
    pub fn into_dataset(self, fallback: Period) -> MonthDataset {
        let period = self.period.unwrap_or(fallback);
        MonthDataset {
            title: self.title.unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            year: period.year,
            month: period.month,
            habits: self.habits.unwrap_or_else(default_habits),
            data: self.data.unwrap_or_default(),
        }
    }
}

fn parse_data_map(value: &Value) -> Option<DataMap> {
    let object = value.as_object()?;
    let mut data = DataMap::new();
    for (habit_id, days) in object {
        let Some(days) = days.as_object() else {
            continue;
        };
        let entry = data.entry(habit_id.clone()).or_default();
        for (day, raw) in days {
            let Ok(day) = day.parse::<u32>() else {
                continue;
            };
            if let Some(value) = coerce_cell(raw) {
                entry.insert(day, value);
            }
        }
    }
    Some(data)
}

/// `Some(None)` is an explicit null; `None` means the entry is unusable and dropped.
fn coerce_cell(raw: &Value) -> Option<Option<f64>> {
    match raw {
        Value::Null => Some(None),
        Value::Bool(flag) => Some(Some(if *flag { 1.0 } else { 0.0 })),
        Value::Number(number) => number.as_f64().map(|v| Some(v.max(0.0))),
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(|v| Some(v.max(0.0))),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Device,
    User,
}

/// The locally generated identity of this installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub device_id: String,
}

impl Identity {
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HabitDraft {
    pub title: Option<String>,
    pub unit: Option<Unit>,
    pub target: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HabitPatch {
    pub title: Option<String>,
    pub unit: Option<Unit>,
    pub target: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct SetCellRequest {
    pub habit_id: String,
    pub day: u32,
    pub value: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct CellRef {
    pub habit_id: String,
    pub day: u32,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfirmRequest {
    #[serde(default)]
    pub confirmed: bool,
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub year: i32,
    pub month: u32,
}

#[derive(Debug, Deserialize)]
pub struct TitleRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInLinkRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionRequest {
    pub access_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HabitCompletion {
    pub habit_id: String,
    pub title: String,
    pub completion_pct: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthStats {
    pub days_in_month: u32,
    pub today: Option<u32>,
    pub daily_scores: Vec<f64>,
    pub month_progress_pct: u32,
    pub average_daily_score_pct: u32,
    pub longest_streak: u32,
    pub habits: Vec<HabitCompletion>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthView {
    pub scope: Scope,
    pub user_id: Option<String>,
    pub email: Option<String>,
    pub sign_in_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthView {
    pub dataset: MonthDataset,
    pub stats: MonthStats,
    pub sync_status: Option<String>,
    pub auth: AuthView,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn partial_dataset_tolerates_missing_and_malformed_fields() {
        let raw = json!({
            "title": "",
            "month": 14,
            "habits": [
                { "id": "gym", "title": "Gym", "unit": "minutes", "target": 60 },
                { "title": "no id" }
            ],
            "data": { "gym": { "3": 30, "4": true, "x": 1, "5": null, "6": "15" } }
        });

        let partial = PartialDataset::from_value(&raw).expect("object");
        assert_eq!(partial.title, None);
        assert_eq!(partial.period, None);
        assert_eq!(partial.habits.as_ref().map(Vec::len), Some(1));

        let gym = &partial.data.as_ref().unwrap()["gym"];
        assert_eq!(gym.get(&3), Some(&Some(30.0)));
        assert_eq!(gym.get(&4), Some(&Some(1.0)));
        assert_eq!(gym.get(&5), Some(&None));
        assert_eq!(gym.get(&6), Some(&Some(15.0)));
        assert_eq!(gym.len(), 4);
    }

    #[test]
    fn partial_dataset_rejects_non_objects() {
        assert!(PartialDataset::from_value(&json!([1, 2])).is_none());
        assert!(PartialDataset::from_value(&json!("text")).is_none());
    }

    #[test]
    fn merge_keeps_current_fields_that_are_absent() {
        let base = MonthDataset::fresh(Period::new(2025, 3).unwrap());
        let partial = PartialDataset::from_value(&json!({ "title": "Spring" })).unwrap();

        let merged = partial.merge_onto(&base);
        assert_eq!(merged.title, "Spring");
        assert_eq!(merged.period(), base.period());
        assert_eq!(merged.habits, base.habits);
    }

    #[test]
    fn into_dataset_falls_back_to_defaults() {
        let partial = PartialDataset::from_value(&json!({ "habits": "nope" })).unwrap();
        let dataset = partial.into_dataset(Period::new(2024, 2).unwrap());
        assert_eq!(dataset.title, DEFAULT_TITLE);
        assert_eq!(dataset.habits, default_habits());
        assert!(dataset.data.is_empty());
        assert_eq!(dataset.period(), Period::new(2024, 2).unwrap());
    }

    #[test]
    fn period_rejects_out_of_range_months() {
        assert!(Period::new(2025, 0).is_none());
        assert!(Period::new(2025, 13).is_none());
        assert_eq!(Period::new(2025, 12).unwrap().to_string(), "2025-12");
    }

    #[test]
    fn period_rejects_years_outside_the_calendar() {
        assert!(Period::new(0, 1).is_none());
        assert!(Period::new(10_000, 1).is_none());
        assert!(Period::new(i32::MAX, 12).is_none());
        assert_eq!(Period::new(9999, 12).unwrap().days(), 31);

        let partial = PartialDataset::from_value(&json!({ "year": 300000, "month": 1 })).unwrap();
        assert_eq!(partial.period, None);
        let partial = PartialDataset::from_value(&json!({ "year": 2147483647, "month": 12 })).unwrap();
        assert_eq!(partial.period, None);
    }

    #[test]
    fn zero_based_month_is_not_a_period() {
        let partial = PartialDataset::from_value(&json!({ "year": 2025, "month": 0 })).unwrap();
        assert_eq!(partial.period, None);

        let base = MonthDataset::fresh(Period::new(2024, 7).unwrap());
        assert_eq!(partial.merge_onto(&base).period(), base.period());
    }
}
