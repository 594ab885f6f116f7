use crate::models::{DataMap, Habit, HabitCompletion, MonthDataset, MonthStats, Unit};
use chrono::{Datelike, Local, NaiveDate};

/// Minimum daily score for a day to count towards a streak.
pub const STREAK_THRESHOLD: f64 = 0.8;

/// Length of `month` in `year`. Dates chrono cannot represent count as 31 days.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let next = if month >= 12 {
        year.checked_add(1).map(|next_year| (next_year, 1))
    } else {
        Some((year, month + 1))
    };
    next.and_then(|(next_year, next_month)| NaiveDate::from_ymd_opt(next_year, next_month, 1))
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(31)
}

/// Normalized completion of a single cell, in `[0, 1]`.
pub fn score_for(habit: &Habit, value: Option<f64>) -> f64 {
    let Some(value) = value.filter(|v| !v.is_nan()) else {
        return 0.0;
    };
    match habit.unit {
        Unit::Check => {
            if value != 0.0 {
                1.0
            } else {
                0.0
            }
        }
        Unit::Count | Unit::Minutes | Unit::Ml | Unit::Grams => {
            let target = if habit.target.is_finite() {
                habit.target.max(1.0)
            } else {
                1.0
            };
            (value / target).clamp(0.0, 1.0)
        }
    }
}

fn cell(data: &DataMap, habit_id: &str, day: u32) -> Option<f64> {
    data.get(habit_id)
        .and_then(|days| days.get(&day))
        .copied()
        .flatten()
}

/// Mean score over all habits for one day; 0 when there are no habits.
pub fn daily_score(habits: &[Habit], data: &DataMap, day: u32) -> f64 {
    if habits.is_empty() {
        return 0.0;
    }
    let total: f64 = habits
        .iter()
        .map(|habit| score_for(habit, cell(data, &habit.id, day)))
        .sum();
    total / habits.len() as f64
}

pub fn daily_scores(dataset: &MonthDataset) -> Vec<f64> {
    (1..=dataset.period().days())
        .map(|day| daily_score(&dataset.habits, &dataset.data, day))
        .collect()
}

/// Share of days with any progress at all.
pub fn month_progress_pct(daily_scores: &[f64]) -> u32 {
    let active = daily_scores.iter().filter(|score| **score > 0.0).count();
    percent(active as f64 / daily_scores.len().max(1) as f64)
}

pub fn average_daily_score_pct(daily_scores: &[f64]) -> u32 {
    let total: f64 = daily_scores.iter().sum();
    percent(total / daily_scores.len().max(1) as f64)
}

/// Longest run of consecutive days scoring at least `threshold`.
///
/// Runs are confined to the scores passed in; a month's streak never
/// continues into the next month.
pub fn longest_streak(daily_scores: &[f64], threshold: f64) -> u32 {
    let mut best = 0u32;
    let mut current = 0u32;
    for score in daily_scores {
        if *score >= threshold {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

pub fn per_habit_completion_pct(habit: &Habit, data: &DataMap, days_in_month: u32) -> u32 {
    let days = days_in_month.max(1);
    let total: f64 = (1..=days)
        .map(|day| score_for(habit, cell(data, &habit.id, day)))
        .sum();
    percent(total / f64::from(days))
}

fn percent(ratio: f64) -> u32 {
    (ratio * 100.0).round().clamp(0.0, 100.0) as u32
}

pub fn build_stats(dataset: &MonthDataset) -> MonthStats {
    build_stats_at(Local::now().date_naive(), dataset)
}

pub fn build_stats_at(today: NaiveDate, dataset: &MonthDataset) -> MonthStats {
    let period = dataset.period();
    let days = period.days();
    let scores = daily_scores(dataset);

    let today = (today.year() == period.year && today.month() == period.month)
        .then(|| today.day());

    let habits = dataset
        .habits
        .iter()
        .map(|habit| HabitCompletion {
            habit_id: habit.id.clone(),
            title: habit.title.clone(),
            completion_pct: per_habit_completion_pct(habit, &dataset.data, days),
        })
        .collect();

    MonthStats {
        days_in_month: days,
        today,
        month_progress_pct: month_progress_pct(&scores),
        average_daily_score_pct: average_daily_score_pct(&scores),
        longest_streak: longest_streak(&scores, STREAK_THRESHOLD),
        daily_scores: scores,
        habits,
    }
}
