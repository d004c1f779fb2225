use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

// --- Rows returned to clients ---

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UserProfile {
    pub current_weight: Option<f64>,
    pub target_weight: Option<f64>,
    pub daily_calorie_target: Option<i64>,
    pub daily_steps_target: Option<i64>,
    pub daily_water_target: Option<i64>,
    pub name: String,
    pub email: Option<String>,
}

/// Today's totals for the current user.
#[derive(Debug, Clone, Serialize)]
pub struct Dashboard {
    #[serde(serialize_with = "profile_or_empty")]
    pub user: Option<UserProfile>,
    pub calories_consumed: i64,
    pub steps: i64,
    pub water_glasses: i64,
    pub workout_minutes: i64,
}

// A missing user row renders as `{}` rather than `null`.
fn profile_or_empty<S: Serializer>(
    user: &Option<UserProfile>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match user {
        Some(profile) => profile.serialize(serializer),
        None => serde_json::Map::new().serialize(serializer),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityTotals {
    pub steps: i64,
    pub water_glasses: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeightLog {
    pub weight: f64,
    pub logged_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Meal {
    pub id: i64,
    pub meal_type: String,
    pub name: String,
    pub calories: i64,
    pub protein: f64,
    pub fats: f64,
    pub carbs: f64,
    pub meal_date: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Workout {
    pub id: i64,
    pub name: String,
    pub duration_minutes: i64,
    pub workout_date: String,
    pub workout_type: String,
}

/// A feed entry joined with its author.
#[derive(Debug, Clone, Serialize)]
pub struct SocialPost {
    pub id: i64,
    pub content: String,
    pub likes_count: i64,
    pub created_at: String,
    pub user_name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Challenge {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub target_value: Option<i64>,
    /// `None` when the user has not joined the challenge.
    pub current_progress: Option<i64>,
    pub participants: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub calories: i64,
    pub protein: f64,
    pub fats: f64,
    pub carbs: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PersonalRecord {
    pub exercise_name: String,
    pub weight_kg: f64,
    pub logged_at: String,
}

// --- Request bodies ---
//
// Required fields have no serde default, so an absent key fails deserialization.

#[derive(Debug, Clone, Deserialize)]
pub struct NewMeal {
    pub meal_type: String,
    pub name: String,
    pub calories: i64,
    #[serde(default)]
    pub protein: f64,
    #[serde(default)]
    pub fats: f64,
    #[serde(default)]
    pub carbs: f64,
    pub meal_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWorkout {
    pub name: String,
    pub duration_minutes: i64,
    #[serde(default)]
    pub workout_type: String,
    pub workout_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewWeightLog {
    pub weight: f64,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPost {
    pub content: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LikePost {
    pub post_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityUpdate {
    #[serde(default)]
    pub steps: i64,
    #[serde(default)]
    pub water_glasses: i64,
    pub date: Option<NaiveDate>,
}

/// Every target is written as given; a missing key clears the stored value.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Goals {
    pub target_weight: Option<f64>,
    pub daily_calorie_target: Option<i64>,
    pub daily_steps_target: Option<i64>,
    pub daily_water_target: Option<i64>,
}

// --- Reference data ---

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub name: String,
    pub description: Option<String>,
    pub calories: i64,
    pub protein: f64,
    pub fats: f64,
    pub carbs: f64,
}

#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub name: String,
    pub description: Option<String>,
    pub target_value: i64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone)]
pub struct NewExercise {
    pub exercise_name: String,
    pub weight_kg: f64,
    pub logged_at: NaiveDate,
    pub is_personal_record: bool,
}

#[must_use]
pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dashboard_without_user_serializes_empty_object() {
        let dashboard = Dashboard {
            user: None,
            calories_consumed: 0,
            steps: 0,
            water_glasses: 0,
            workout_minutes: 0,
        };
        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["user"], serde_json::json!({}));
        assert_eq!(json["calories_consumed"], 0);
    }

    #[test]
    fn test_dashboard_with_user_serializes_profile() {
        let dashboard = Dashboard {
            user: Some(UserProfile {
                current_weight: Some(82.5),
                target_weight: None,
                daily_calorie_target: Some(2200),
                daily_steps_target: None,
                daily_water_target: None,
                name: "Alex".to_string(),
                email: None,
            }),
            calories_consumed: 450,
            steps: 0,
            water_glasses: 0,
            workout_minutes: 30,
        };
        let json = serde_json::to_value(&dashboard).unwrap();
        assert_eq!(json["user"]["current_weight"], 82.5);
        assert!(json["user"]["target_weight"].is_null());
        assert_eq!(json["user"]["name"], "Alex");
    }

    #[test]
    fn test_new_meal_defaults_macros() {
        let meal: NewMeal =
            serde_json::from_str(r#"{"meal_type":"lunch","name":"Salad","calories":300}"#)
                .unwrap();
        assert_eq!(meal.protein, 0.0);
        assert_eq!(meal.fats, 0.0);
        assert_eq!(meal.carbs, 0.0);
        assert!(meal.meal_date.is_none());
    }

    #[test]
    fn test_new_meal_missing_required_field() {
        let err = serde_json::from_str::<NewMeal>(r#"{"meal_type":"lunch","name":"Salad"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("calories"));
    }

    #[test]
    fn test_new_workout_defaults_type_to_empty() {
        let workout: NewWorkout =
            serde_json::from_str(r#"{"name":"Run","duration_minutes":30}"#).unwrap();
        assert_eq!(workout.workout_type, "");
    }

    #[test]
    fn test_goals_missing_keys_are_null() {
        let goals: Goals = serde_json::from_str(r#"{"target_weight":70}"#).unwrap();
        assert_eq!(goals.target_weight, Some(70.0));
        assert_eq!(goals.daily_calorie_target, None);
        assert_eq!(goals.daily_steps_target, None);
        assert_eq!(goals.daily_water_target, None);
    }

    #[test]
    fn test_activity_update_parses_date() {
        let update: ActivityUpdate =
            serde_json::from_str(r#"{"steps":5000,"date":"2024-06-15"}"#).unwrap();
        assert_eq!(update.steps, 5000);
        assert_eq!(update.water_glasses, 0);
        assert_eq!(update.date, NaiveDate::from_ymd_opt(2024, 6, 15));
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        assert!(serde_json::from_str::<NewWeightLog>(r#"{"weight":80,"date":"June 1"}"#).is_err());
    }
}
