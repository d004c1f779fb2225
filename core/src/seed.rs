//! Demo reference data: recipes, running challenges, and a few lifts.
//!
//! Everything is keyed on a natural key, so seeding twice leaves the same rows.

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeDelta};
use serde::Serialize;

use crate::db::Database;
use crate::models::{NewChallenge, NewExercise, NewRecipe};

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SeedSummary {
    pub recipes: usize,
    pub challenges: usize,
    pub exercises: usize,
}

const DEMO_USER_NAME: &str = "Athlete";

// (name, description, calories, protein, fats, carbs)
const RECIPES: &[(&str, &str, i64, f64, f64, f64)] = &[
    ("Overnight Oats", "Rolled oats, greek yogurt, berries", 380, 22.0, 9.0, 52.0),
    ("Chicken Rice Bowl", "Grilled chicken, brown rice, broccoli", 560, 45.0, 12.0, 64.0),
    ("Salmon Salad", "Baked salmon over mixed greens", 450, 34.0, 26.0, 14.0),
    ("Lentil Soup", "Red lentils, carrots, cumin", 320, 18.0, 6.0, 48.0),
    ("Protein Pancakes", "Egg whites, banana, oat flour", 410, 30.0, 8.0, 55.0),
];

// (name, description, target, started days ago, ends in days, progress)
const CHALLENGES: &[(&str, &str, i64, i64, i64, i64)] = &[
    ("10k Steps a Day", "Hit 10,000 steps every day", 300_000, 10, 20, 142_000),
    ("Hydration Month", "Eight glasses of water daily", 240, 5, 25, 38),
    ("Plank Streak", "Accumulate plank minutes", 120, 3, 11, 9),
];

// (exercise, kg, days ago, personal record)
const EXERCISES: &[(&str, f64, i64, bool)] = &[
    ("Squat", 100.0, 21, false),
    ("Squat", 110.0, 7, true),
    ("Bench Press", 80.0, 14, true),
    ("Deadlift", 140.0, 10, true),
    ("Overhead Press", 50.0, 3, true),
];

/// Loads the demo set relative to `today` and enrolls `user_id` in every
/// challenge, creating the user if needed.
pub fn seed_demo_data(db: &Database, user_id: i64, today: NaiveDate) -> Result<SeedSummary> {
    db.ensure_user(user_id, DEMO_USER_NAME)?;
    let mut summary = SeedSummary::default();

    for &(name, description, calories, protein, fats, carbs) in RECIPES {
        db.upsert_recipe(&NewRecipe {
            name: name.to_string(),
            description: Some(description.to_string()),
            calories,
            protein,
            fats,
            carbs,
        })?;
        summary.recipes += 1;
    }

    for &(name, description, target_value, started, remaining, progress) in CHALLENGES {
        let challenge = NewChallenge {
            name: name.to_string(),
            description: Some(description.to_string()),
            target_value,
            start_date: shift(today, -started)?,
            end_date: shift(today, remaining)?,
        };
        let id = db.upsert_challenge(&challenge)?;
        db.set_challenge_progress(id, user_id, progress)?;
        summary.challenges += 1;
    }

    for &(exercise_name, weight_kg, days_ago, is_personal_record) in EXERCISES {
        db.record_exercise(
            user_id,
            &NewExercise {
                exercise_name: exercise_name.to_string(),
                weight_kg,
                logged_at: shift(today, -days_ago)?,
                is_personal_record,
            },
        )?;
        summary.exercises += 1;
    }

    tracing::info!(
        recipes = summary.recipes,
        challenges = summary.challenges,
        exercises = summary.exercises,
        "seeded demo data"
    );
    Ok(summary)
}

fn shift(date: NaiveDate, days: i64) -> Result<NaiveDate> {
    TimeDelta::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .with_context(|| format!("date out of range: {date} + {days} days"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DEFAULT_USER_ID;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    #[test]
    fn test_seed_populates_reference_reads() {
        let db = Database::open_in_memory().unwrap();
        let summary = seed_demo_data(&db, DEFAULT_USER_ID, today()).unwrap();
        assert_eq!(summary.recipes, RECIPES.len());

        assert_eq!(db.list_recipes().unwrap().len(), RECIPES.len());

        let challenges = db.get_active_challenges(DEFAULT_USER_ID, today()).unwrap();
        assert_eq!(challenges.len(), CHALLENGES.len());
        assert!(challenges.iter().all(|c| c.participants == 1));
        assert!(challenges.iter().all(|c| c.current_progress.is_some()));

        let records = db.get_personal_records(DEFAULT_USER_ID).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].exercise_name, "Overhead Press");
        assert!(records.iter().all(|r| r.exercise_name != "Squat" || r.weight_kg > 100.0));
    }

    #[test]
    fn test_seed_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        seed_demo_data(&db, DEFAULT_USER_ID, today()).unwrap();
        seed_demo_data(&db, DEFAULT_USER_ID, today()).unwrap();

        assert_eq!(db.list_recipes().unwrap().len(), RECIPES.len());
        let challenges = db.get_active_challenges(DEFAULT_USER_ID, today()).unwrap();
        assert_eq!(challenges.len(), CHALLENGES.len());
        assert!(challenges.iter().all(|c| c.participants == 1));
        assert_eq!(db.get_personal_records(DEFAULT_USER_ID).unwrap().len(), 4);
    }

    #[test]
    fn test_seed_creates_missing_user() {
        let db = Database::open_in_memory().unwrap();
        seed_demo_data(&db, 9, today()).unwrap();
        assert!(db.get_user_profile(9).unwrap().is_some());
        assert_eq!(db.get_personal_records(9).unwrap().len(), 4);
    }

    #[test]
    fn test_seeded_challenges_expire() {
        let db = Database::open_in_memory().unwrap();
        seed_demo_data(&db, DEFAULT_USER_ID, today()).unwrap();

        let later = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let names: Vec<String> = db
            .get_active_challenges(DEFAULT_USER_ID, later)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert!(!names.contains(&"Plank Streak".to_string()));
        assert_eq!(names.len(), 2);
    }
}
