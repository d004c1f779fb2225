use anyhow::Result;
use chrono::Local;

use fittrack_core::seed::seed_demo_data;

use crate::config::Config;

pub(crate) fn cmd_seed(config: &Config, json: bool) -> Result<()> {
    let db = config.db_config().connect()?;
    let summary = seed_demo_data(&db, config.user_id, Local::now().date_naive())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let recipes = summary.recipes;
    let challenges = summary.challenges;
    let exercises = summary.exercises;
    println!("Seeded {recipes} recipes, {challenges} challenges, {exercises} exercise logs");
    println!("Database: {}", config.db_path.display());
    Ok(())
}
