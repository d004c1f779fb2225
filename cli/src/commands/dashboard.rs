use anyhow::Result;
use chrono::Local;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use fittrack_core::models::Dashboard;

use crate::config::Config;

#[derive(Tabled)]
struct DashboardRow {
    #[tabled(rename = "Metric")]
    metric: &'static str,
    #[tabled(rename = "Today")]
    today: String,
    #[tabled(rename = "Target")]
    target: String,
}

pub(crate) fn cmd_dashboard(config: &Config, json: bool) -> Result<()> {
    let today = Local::now().date_naive();
    let db = config.db_config().connect()?;
    let dashboard = db.build_dashboard(config.user_id, today)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&dashboard)?);
        return Ok(());
    }

    match &dashboard.user {
        Some(user) => println!("=== {} | {today} ===\n", user.name),
        None => println!("=== user {} | {today} ===\n", config.user_id),
    }

    let table = Table::new(dashboard_rows(&dashboard))
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

fn dashboard_rows(dashboard: &Dashboard) -> Vec<DashboardRow> {
    let user = dashboard.user.as_ref();
    let target = |value: Option<i64>| value.map_or_else(|| "-".to_string(), |v| v.to_string());
    let kg = |value: Option<f64>| value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"));

    vec![
        DashboardRow {
            metric: "Calories",
            today: dashboard.calories_consumed.to_string(),
            target: target(user.and_then(|u| u.daily_calorie_target)),
        },
        DashboardRow {
            metric: "Steps",
            today: dashboard.steps.to_string(),
            target: target(user.and_then(|u| u.daily_steps_target)),
        },
        DashboardRow {
            metric: "Water (glasses)",
            today: dashboard.water_glasses.to_string(),
            target: target(user.and_then(|u| u.daily_water_target)),
        },
        DashboardRow {
            metric: "Workout (min)",
            today: dashboard.workout_minutes.to_string(),
            target: "-".to_string(),
        },
        DashboardRow {
            metric: "Weight (kg)",
            today: kg(user.and_then(|u| u.current_weight)),
            target: kg(user.and_then(|u| u.target_weight)),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use fittrack_core::models::UserProfile;

    #[test]
    fn test_rows_fill_missing_targets_with_dash() {
        let dashboard = Dashboard {
            user: Some(UserProfile {
                current_weight: Some(81.3),
                target_weight: None,
                daily_calorie_target: Some(2200),
                daily_steps_target: None,
                daily_water_target: Some(8),
                name: "Athlete".to_string(),
                email: None,
            }),
            calories_consumed: 640,
            steps: 4200,
            water_glasses: 3,
            workout_minutes: 45,
        };
        let rows = dashboard_rows(&dashboard);
        assert_eq!(rows[0].today, "640");
        assert_eq!(rows[0].target, "2200");
        assert_eq!(rows[1].target, "-");
        assert_eq!(rows[2].target, "8");
        assert_eq!(rows[4].today, "81.3");
        assert_eq!(rows[4].target, "-");
    }

    #[test]
    fn test_rows_without_user() {
        let dashboard = Dashboard {
            user: None,
            calories_consumed: 0,
            steps: 0,
            water_glasses: 0,
            workout_minutes: 0,
        };
        let rows = dashboard_rows(&dashboard);
        assert!(rows.iter().all(|row| row.target == "-"));
    }
}
