use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{NaiveDate, TimeDelta};
use rusqlite::{Connection, OptionalExtension, ToSql, params};

use crate::models::{
    ActivityTotals, ActivityUpdate, Challenge, Dashboard, Goals, LikePost, Meal, NewChallenge,
    NewExercise, NewMeal, NewPost, NewRecipe, NewWeightLog, NewWorkout, PersonalRecord, Recipe,
    SocialPost, UserProfile, WeightLog, Workout, format_date,
};

pub const DEFAULT_USER_ID: i64 = 1;

/// A column name paired with the value bound for it.
pub type Column<'a> = (&'static str, &'a dyn ToSql);

#[must_use]
pub fn col<'a>(name: &'static str, value: &'a dyn ToSql) -> Column<'a> {
    (name, value)
}

const WEIGHT_HISTORY_LIMIT: i64 = 30;
const FEED_LIMIT: i64 = 20;
const RECIPE_LIMIT: i64 = 20;
const PERSONAL_RECORD_LIMIT: i64 = 10;

/// Where the store lives. Built once at startup; every request calls
/// [`DbConfig::connect`] for its own connection, which closes on drop.
#[derive(Debug, Clone)]
pub struct DbConfig {
    path: PathBuf,
}

impl DbConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn connect(&self) -> Result<Database> {
        Database::open(&self.path)
    }
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn.pragma_update(None, "foreign_keys", "ON")?;

        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            tracing::debug!("bootstrapping schema");
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    email TEXT,
                    current_weight REAL,
                    target_weight REAL,
                    daily_calorie_target INTEGER,
                    daily_steps_target INTEGER,
                    daily_water_target INTEGER
                );

                CREATE TABLE IF NOT EXISTS meals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    meal_type TEXT NOT NULL,
                    name TEXT NOT NULL,
                    calories INTEGER NOT NULL,
                    protein REAL NOT NULL DEFAULT 0,
                    fats REAL NOT NULL DEFAULT 0,
                    carbs REAL NOT NULL DEFAULT 0,
                    meal_date TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
                );

                CREATE TABLE IF NOT EXISTS workouts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    name TEXT NOT NULL,
                    duration_minutes INTEGER NOT NULL,
                    workout_type TEXT NOT NULL DEFAULT '',
                    workout_date TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
                );

                CREATE TABLE IF NOT EXISTS weight_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    weight REAL NOT NULL,
                    logged_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS activity_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    steps INTEGER NOT NULL DEFAULT 0,
                    water_glasses INTEGER NOT NULL DEFAULT 0,
                    logged_date TEXT NOT NULL,
                    UNIQUE (user_id, logged_date)
                );

                CREATE TABLE IF NOT EXISTS social_posts (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    content TEXT NOT NULL,
                    likes_count INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
                );

                CREATE TABLE IF NOT EXISTS post_likes (
                    post_id INTEGER NOT NULL REFERENCES social_posts(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                    PRIMARY KEY (post_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS challenges (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    description TEXT,
                    target_value INTEGER,
                    start_date TEXT NOT NULL,
                    end_date TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS challenge_participants (
                    challenge_id INTEGER NOT NULL REFERENCES challenges(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    current_progress INTEGER NOT NULL DEFAULT 0,
                    PRIMARY KEY (challenge_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    description TEXT,
                    calories INTEGER NOT NULL,
                    protein REAL NOT NULL DEFAULT 0,
                    fats REAL NOT NULL DEFAULT 0,
                    carbs REAL NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS exercises (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id),
                    exercise_name TEXT NOT NULL,
                    weight_kg REAL NOT NULL,
                    logged_at TEXT NOT NULL,
                    is_personal_record INTEGER NOT NULL DEFAULT 0,
                    UNIQUE (user_id, exercise_name, logged_at)
                );

                CREATE INDEX IF NOT EXISTS idx_meals_user_date ON meals(user_id, meal_date);
                CREATE INDEX IF NOT EXISTS idx_workouts_user_date ON workouts(user_id, workout_date);
                CREATE INDEX IF NOT EXISTS idx_weight_logs_user ON weight_logs(user_id, logged_at);
                CREATE INDEX IF NOT EXISTS idx_social_posts_created ON social_posts(created_at);

                INSERT OR IGNORE INTO users (id, name) VALUES (1, 'Athlete');

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    /// Insert-or-replace-on-key. `key` names the columns of a uniqueness
    /// constraint, `replace` the columns overwritten when a row with that key
    /// already exists. An empty `replace` turns a conflict into a no-op.
    ///
    /// Table and column names are interpolated and must be compile-time
    /// constants; values are always bound.
    pub fn upsert_on_key(
        &self,
        table: &str,
        key: &[Column<'_>],
        replace: &[Column<'_>],
    ) -> Result<usize> {
        upsert_on_key(&self.conn, table, key, replace)
    }

    // --- Row mapping helpers ---

    fn meal_from_row(row: &rusqlite::Row) -> rusqlite::Result<Meal> {
        Ok(Meal {
            id: row.get(0)?,
            meal_type: row.get(1)?,
            name: row.get(2)?,
            calories: row.get(3)?,
            protein: row.get(4)?,
            fats: row.get(5)?,
            carbs: row.get(6)?,
            meal_date: row.get(7)?,
        })
    }

    fn workout_from_row(row: &rusqlite::Row) -> rusqlite::Result<Workout> {
        Ok(Workout {
            id: row.get(0)?,
            name: row.get(1)?,
            duration_minutes: row.get(2)?,
            workout_date: row.get(3)?,
            workout_type: row.get(4)?,
        })
    }

    // --- Users ---

    pub fn ensure_user(&self, user_id: i64, name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO users (id, name) VALUES (?1, ?2)",
            params![user_id, name],
        )?;
        Ok(())
    }

    pub fn get_user_profile(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let profile = self
            .conn
            .query_row(
                "SELECT current_weight, target_weight, daily_calorie_target,
                        daily_steps_target, daily_water_target, name, email
                 FROM users WHERE id = ?1",
                params![user_id],
                |row| {
                    Ok(UserProfile {
                        current_weight: row.get(0)?,
                        target_weight: row.get(1)?,
                        daily_calorie_target: row.get(2)?,
                        daily_steps_target: row.get(3)?,
                        daily_water_target: row.get(4)?,
                        name: row.get(5)?,
                        email: row.get(6)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    /// Overwrites all four targets, clearing any that are `None`.
    pub fn set_goals(&self, user_id: i64, goals: &Goals) -> Result<()> {
        self.conn.execute(
            "UPDATE users
             SET target_weight = ?1, daily_calorie_target = ?2,
                 daily_steps_target = ?3, daily_water_target = ?4
             WHERE id = ?5",
            params![
                goals.target_weight,
                goals.daily_calorie_target,
                goals.daily_steps_target,
                goals.daily_water_target,
                user_id,
            ],
        )?;
        Ok(())
    }

    // --- Dashboard ---

    pub fn calories_on(&self, user_id: i64, date: NaiveDate) -> Result<i64> {
        let total = self.conn.query_row(
            "SELECT CAST(COALESCE(SUM(calories), 0) AS INTEGER)
             FROM meals WHERE user_id = ?1 AND meal_date = ?2",
            params![user_id, format_date(date)],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn activity_on(&self, user_id: i64, date: NaiveDate) -> Result<Option<ActivityTotals>> {
        let totals = self
            .conn
            .query_row(
                "SELECT steps, water_glasses
                 FROM activity_logs WHERE user_id = ?1 AND logged_date = ?2",
                params![user_id, format_date(date)],
                |row| {
                    Ok(ActivityTotals {
                        steps: row.get(0)?,
                        water_glasses: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(totals)
    }

    pub fn workout_minutes_on(&self, user_id: i64, date: NaiveDate) -> Result<i64> {
        let total = self.conn.query_row(
            "SELECT CAST(COALESCE(SUM(duration_minutes), 0) AS INTEGER)
             FROM workouts WHERE user_id = ?1 AND workout_date = ?2",
            params![user_id, format_date(date)],
            |row| row.get(0),
        )?;
        Ok(total)
    }

    pub fn build_dashboard(&self, user_id: i64, today: NaiveDate) -> Result<Dashboard> {
        let user = self.get_user_profile(user_id)?;
        let calories_consumed = self.calories_on(user_id, today)?;
        let activity = self.activity_on(user_id, today)?.unwrap_or_default();
        let workout_minutes = self.workout_minutes_on(user_id, today)?;

        Ok(Dashboard {
            user,
            calories_consumed,
            steps: activity.steps,
            water_glasses: activity.water_glasses,
            workout_minutes,
        })
    }

    // --- Weight ---

    /// Records a weigh-in and moves the user's current weight to it. Both
    /// writes share one transaction; an error before commit discards both.
    pub fn log_weight(&self, user_id: i64, entry: &NewWeightLog, today: NaiveDate) -> Result<i64> {
        let logged_at = format_date(entry.date.unwrap_or(today));
        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO weight_logs (user_id, weight, logged_at) VALUES (?1, ?2, ?3)",
            params![user_id, entry.weight, logged_at],
        )?;
        let id = tx.last_insert_rowid();
        tx.execute(
            "UPDATE users SET current_weight = ?1 WHERE id = ?2",
            params![entry.weight, user_id],
        )?;
        tx.commit()?;
        Ok(id)
    }

    pub fn get_weight_history(&self, user_id: i64) -> Result<Vec<WeightLog>> {
        let mut stmt = self.conn.prepare(
            "SELECT weight, logged_at
             FROM weight_logs
             WHERE user_id = ?1
             ORDER BY logged_at DESC, id DESC
             LIMIT ?2",
        )?;
        let entries = stmt
            .query_map(params![user_id, WEIGHT_HISTORY_LIMIT], |row| {
                Ok(WeightLog {
                    weight: row.get(0)?,
                    logged_at: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    // --- Meals ---

    pub fn insert_meal(&self, user_id: i64, meal: &NewMeal, today: NaiveDate) -> Result<i64> {
        let meal_date = format_date(meal.meal_date.unwrap_or(today));
        self.conn.execute(
            "INSERT INTO meals (user_id, meal_type, name, calories, protein, fats, carbs, meal_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                user_id,
                meal.meal_type,
                meal.name,
                meal.calories,
                meal.protein,
                meal.fats,
                meal.carbs,
                meal_date,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn get_meals_for_date(&self, user_id: i64, date: NaiveDate) -> Result<Vec<Meal>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, meal_type, name, calories, protein, fats, carbs, meal_date
             FROM meals
             WHERE user_id = ?1 AND meal_date = ?2
             ORDER BY created_at, id",
        )?;
        let meals = stmt
            .query_map(params![user_id, format_date(date)], Self::meal_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(meals)
    }

    // --- Workouts ---

    pub fn insert_workout(&self, user_id: i64, workout: &NewWorkout, today: NaiveDate) -> Result<i64> {
        let workout_date = format_date(workout.workout_date.unwrap_or(today));
        self.conn.execute(
            "INSERT INTO workouts (user_id, name, duration_minutes, workout_type, workout_date)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user_id,
                workout.name,
                workout.duration_minutes,
                workout.workout_type,
                workout_date,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Workouts dated within the last `days` days (inclusive of the boundary).
    pub fn get_recent_workouts(
        &self,
        user_id: i64,
        days: i64,
        today: NaiveDate,
    ) -> Result<Vec<Workout>> {
        let start = TimeDelta::try_days(days)
            .and_then(|delta| today.checked_sub_signed(delta))
            .with_context(|| format!("days out of range: {days}"))?;
        let mut stmt = self.conn.prepare(
            "SELECT id, name, duration_minutes, workout_date, workout_type
             FROM workouts
             WHERE user_id = ?1 AND workout_date >= ?2
             ORDER BY workout_date DESC, id DESC",
        )?;
        let workouts = stmt
            .query_map(params![user_id, format_date(start)], Self::workout_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(workouts)
    }

    // --- Activity ---

    /// Replaces the day's steps and water with the given values.
    pub fn log_activity(&self, user_id: i64, update: &ActivityUpdate, today: NaiveDate) -> Result<()> {
        let logged_date = format_date(update.date.unwrap_or(today));
        self.upsert_on_key(
            "activity_logs",
            &[col("user_id", &user_id), col("logged_date", &logged_date)],
            &[
                col("steps", &update.steps),
                col("water_glasses", &update.water_glasses),
            ],
        )?;
        Ok(())
    }

    // --- Social feed ---

    pub fn insert_post(&self, user_id: i64, post: &NewPost) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO social_posts (user_id, content) VALUES (?1, ?2)",
            params![user_id, post.content],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Likes a post once per user and recounts `likes_count` from the like
    /// rows, so repeated likes never inflate the counter.
    pub fn like_post(&self, user_id: i64, like: &LikePost) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        upsert_on_key(
            &tx,
            "post_likes",
            &[col("post_id", &like.post_id), col("user_id", &user_id)],
            &[],
        )?;
        tx.execute(
            "UPDATE social_posts
             SET likes_count = (SELECT COUNT(*) FROM post_likes WHERE post_id = ?1)
             WHERE id = ?1",
            params![like.post_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn get_feed(&self) -> Result<Vec<SocialPost>> {
        let mut stmt = self.conn.prepare(
            "SELECT p.id, p.content, p.likes_count, p.created_at,
                    u.name AS user_name, u.email
             FROM social_posts p
             JOIN users u ON p.user_id = u.id
             ORDER BY p.created_at DESC, p.id DESC
             LIMIT ?1",
        )?;
        let posts = stmt
            .query_map(params![FEED_LIMIT], |row| {
                Ok(SocialPost {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    likes_count: row.get(2)?,
                    created_at: row.get(3)?,
                    user_name: row.get(4)?,
                    email: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    // --- Challenges ---

    pub fn upsert_challenge(&self, challenge: &NewChallenge) -> Result<i64> {
        let start_date = format_date(challenge.start_date);
        let end_date = format_date(challenge.end_date);
        self.upsert_on_key(
            "challenges",
            &[col("name", &challenge.name)],
            &[
                col("description", &challenge.description),
                col("target_value", &challenge.target_value),
                col("start_date", &start_date),
                col("end_date", &end_date),
            ],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM challenges WHERE name = ?1",
            params![challenge.name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn set_challenge_progress(&self, challenge_id: i64, user_id: i64, progress: i64) -> Result<()> {
        self.upsert_on_key(
            "challenge_participants",
            &[col("challenge_id", &challenge_id), col("user_id", &user_id)],
            &[col("current_progress", &progress)],
        )?;
        Ok(())
    }

    /// Challenges still running on `today`, with the user's progress and the
    /// live participant count.
    pub fn get_active_challenges(&self, user_id: i64, today: NaiveDate) -> Result<Vec<Challenge>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.name, c.description, c.target_value,
                    cp.current_progress,
                    (SELECT COUNT(*) FROM challenge_participants WHERE challenge_id = c.id) AS participants
             FROM challenges c
             LEFT JOIN challenge_participants cp ON c.id = cp.challenge_id AND cp.user_id = ?1
             WHERE c.end_date >= ?2
             ORDER BY c.start_date DESC, c.id DESC",
        )?;
        let challenges = stmt
            .query_map(params![user_id, format_date(today)], |row| {
                Ok(Challenge {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    target_value: row.get(3)?,
                    current_progress: row.get(4)?,
                    participants: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(challenges)
    }

    // --- Recipes ---

    pub fn upsert_recipe(&self, recipe: &NewRecipe) -> Result<()> {
        self.upsert_on_key(
            "recipes",
            &[col("name", &recipe.name)],
            &[
                col("description", &recipe.description),
                col("calories", &recipe.calories),
                col("protein", &recipe.protein),
                col("fats", &recipe.fats),
                col("carbs", &recipe.carbs),
            ],
        )?;
        Ok(())
    }

    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, description, calories, protein, fats, carbs
             FROM recipes
             ORDER BY id
             LIMIT ?1",
        )?;
        let recipes = stmt
            .query_map(params![RECIPE_LIMIT], |row| {
                Ok(Recipe {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    calories: row.get(3)?,
                    protein: row.get(4)?,
                    fats: row.get(5)?,
                    carbs: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    // --- Exercises ---

    pub fn record_exercise(&self, user_id: i64, exercise: &NewExercise) -> Result<()> {
        let logged_at = format_date(exercise.logged_at);
        self.upsert_on_key(
            "exercises",
            &[
                col("user_id", &user_id),
                col("exercise_name", &exercise.exercise_name),
                col("logged_at", &logged_at),
            ],
            &[
                col("weight_kg", &exercise.weight_kg),
                col("is_personal_record", &exercise.is_personal_record),
            ],
        )?;
        Ok(())
    }

    pub fn get_personal_records(&self, user_id: i64) -> Result<Vec<PersonalRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT exercise_name, weight_kg, logged_at
             FROM exercises
             WHERE user_id = ?1 AND is_personal_record = 1
             ORDER BY logged_at DESC, id DESC
             LIMIT ?2",
        )?;
        let records = stmt
            .query_map(params![user_id, PERSONAL_RECORD_LIMIT], |row| {
                Ok(PersonalRecord {
                    exercise_name: row.get(0)?,
                    weight_kg: row.get(1)?,
                    logged_at: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

fn upsert_on_key(
    conn: &Connection,
    table: &str,
    key: &[Column<'_>],
    replace: &[Column<'_>],
) -> Result<usize> {
    anyhow::ensure!(!key.is_empty(), "upsert on {table} needs at least one key column");

    let columns: Vec<&str> = key.iter().chain(replace).map(|(col, _)| *col).collect();
    let values: Vec<&dyn ToSql> = key.iter().chain(replace).map(|(_, v)| *v).collect();
    let placeholders: Vec<String> = (1..=values.len()).map(|i| format!("?{i}")).collect();
    let key_columns: Vec<&str> = key.iter().map(|(col, _)| *col).collect();

    let on_conflict = if replace.is_empty() {
        "DO NOTHING".to_string()
    } else {
        let assignments: Vec<String> = replace
            .iter()
            .map(|(col, _)| format!("{col} = excluded.{col}"))
            .collect();
        format!("DO UPDATE SET {}", assignments.join(", "))
    };

    let sql = format!(
        "INSERT INTO {table} ({}) VALUES ({}) ON CONFLICT ({}) {on_conflict}",
        columns.join(", "),
        placeholders.join(", "),
        key_columns.join(", "),
    );
    let rows = conn.execute(&sql, values.as_slice())?;
    Ok(rows)
}
