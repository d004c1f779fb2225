//! Maps `(method, action)` pairs onto store operations.
//!
//! Every request gets its own connection from [`DbConfig::connect`]. Failures
//! of any kind surface as `500 {"error": ...}`; unknown routes as
//! `404 {"error": "Not found"}`; `OPTIONS` never touches the store.

use std::collections::HashMap;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::db::{Database, DbConfig};
use crate::models::{
    ActivityUpdate, DATE_FORMAT, Goals, LikePost, NewMeal, NewPost, NewWeightLog, NewWorkout,
};

pub type Headers = &'static [(&'static str, &'static str)];

pub const JSON_HEADERS: Headers = &[
    ("Content-Type", "application/json"),
    ("Access-Control-Allow-Origin", "*"),
];

pub const PREFLIGHT_HEADERS: Headers = &[
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, POST, PUT, DELETE, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type, X-User-Id"),
    ("Access-Control-Max-Age", "86400"),
];

const DEFAULT_WORKOUT_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Options,
    Other(String),
}

impl Method {
    #[must_use]
    pub fn parse(method: &str) -> Self {
        match method.to_ascii_uppercase().as_str() {
            "GET" => Self::Get,
            "POST" => Self::Post,
            "PUT" => Self::Put,
            "OPTIONS" => Self::Options,
            other => Self::Other(other.to_string()),
        }
    }

    fn carries_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetAction {
    Dashboard,
    WeightHistory,
    Meals,
    Workouts,
    Posts,
    Challenges,
    Recipes,
    Exercises,
}

impl GetAction {
    #[must_use]
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "dashboard" => Some(Self::Dashboard),
            "weight_history" => Some(Self::WeightHistory),
            "meals" => Some(Self::Meals),
            "workouts" => Some(Self::Workouts),
            "posts" => Some(Self::Posts),
            "challenges" => Some(Self::Challenges),
            "recipes" => Some(Self::Recipes),
            "exercises" => Some(Self::Exercises),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostAction {
    Meal,
    Workout,
    Weight,
    Post,
    Like,
    Activity,
}

impl PostAction {
    #[must_use]
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "meal" => Some(Self::Meal),
            "workout" => Some(Self::Workout),
            "weight" => Some(Self::Weight),
            "post" => Some(Self::Post),
            "like" => Some(Self::Like),
            "activity" => Some(Self::Activity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutAction {
    Goals,
}

impl PutAction {
    #[must_use]
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "goals" => Some(Self::Goals),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Preflight,
    Get(GetAction),
    Post(PostAction),
    Put(PutAction),
    NotFound,
}

impl Route {
    #[must_use]
    pub fn resolve(method: &Method, action: &str) -> Self {
        let route = match method {
            Method::Options => Some(Self::Preflight),
            Method::Get => GetAction::parse(action).map(Self::Get),
            Method::Post => PostAction::parse(action).map(Self::Post),
            Method::Put => PutAction::parse(action).map(Self::Put),
            Method::Other(_) => None,
        };
        route.unwrap_or(Self::NotFound)
    }
}

/// A normalized inbound call.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub action: String,
    pub query: HashMap<String, String>,
    pub body: Option<String>,
}

impl Request {
    pub fn new(method: Method, action: impl Into<String>) -> Self {
        Self {
            method,
            action: action.into(),
            query: HashMap::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn with_query(mut self, key: &str, value: &str) -> Self {
        self.query.insert(key.to_string(), value.to_string());
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub headers: Headers,
    /// `None` means an empty body (preflight only).
    pub body: Option<Value>,
}

impl Reply {
    fn json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: JSON_HEADERS,
            body: Some(body),
        }
    }

    fn preflight() -> Self {
        Self {
            status: 200,
            headers: PREFLIGHT_HEADERS,
            body: None,
        }
    }

    fn not_found() -> Self {
        Self::json(404, json!({ "error": "Not found" }))
    }

    fn failure(message: String) -> Self {
        Self::json(500, json!({ "error": message }))
    }

    fn created(id: i64, message: &str) -> Self {
        Self::json(201, json!({ "id": id, "message": message }))
    }

    fn ok(message: &str) -> Self {
        Self::json(200, json!({ "message": message }))
    }
}

/// Handles one request for `user_id`, with "today" taken from the local clock.
pub fn handle(db: &DbConfig, user_id: i64, request: &Request) -> Reply {
    handle_on(db, user_id, request, Local::now().date_naive())
}

/// Same as [`handle`] with an explicit "today".
pub fn handle_on(db: &DbConfig, user_id: i64, request: &Request, today: NaiveDate) -> Reply {
    let route = Route::resolve(&request.method, &request.action);
    if route == Route::Preflight {
        return Reply::preflight();
    }

    tracing::debug!(?route, action = %request.action, user_id, "dispatching");
    match execute(db, user_id, route, request, today) {
        Ok(reply) => reply,
        Err(err) => {
            tracing::warn!(action = %request.action, "request failed: {err:#}");
            Reply::failure(format!("{err:#}"))
        }
    }
}

fn execute(
    db: &DbConfig,
    user_id: i64,
    route: Route,
    request: &Request,
    today: NaiveDate,
) -> Result<Reply> {
    let conn = db.connect()?;

    // Writes parse their body before the action is looked at, so a malformed
    // body fails even on an unknown action.
    let body = if request.method.carries_body() {
        parse_body(request.body.as_deref())?
    } else {
        Value::Null
    };

    match route {
        Route::Preflight => unreachable!("preflight is answered before connecting"),
        Route::Get(action) => read(&conn, user_id, action, &request.query, today),
        Route::Post(action) => write(&conn, user_id, action, body, today),
        Route::Put(action) => update(&conn, user_id, action, body),
        Route::NotFound => Ok(Reply::not_found()),
    }
}

fn read(
    conn: &Database,
    user_id: i64,
    action: GetAction,
    query: &HashMap<String, String>,
    today: NaiveDate,
) -> Result<Reply> {
    let body = match action {
        GetAction::Dashboard => serde_json::to_value(conn.build_dashboard(user_id, today)?)?,
        GetAction::WeightHistory => serde_json::to_value(conn.get_weight_history(user_id)?)?,
        GetAction::Meals => {
            let date = match query.get("date") {
                Some(raw) => NaiveDate::parse_from_str(raw, DATE_FORMAT)
                    .with_context(|| format!("invalid date '{raw}'"))?,
                None => today,
            };
            serde_json::to_value(conn.get_meals_for_date(user_id, date)?)?
        }
        GetAction::Workouts => {
            let days = match query.get("days") {
                Some(raw) => raw
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("invalid days '{raw}'"))?,
                None => DEFAULT_WORKOUT_DAYS,
            };
            serde_json::to_value(conn.get_recent_workouts(user_id, days, today)?)?
        }
        GetAction::Posts => serde_json::to_value(conn.get_feed()?)?,
        GetAction::Challenges => {
            serde_json::to_value(conn.get_active_challenges(user_id, today)?)?
        }
        GetAction::Recipes => serde_json::to_value(conn.list_recipes()?)?,
        GetAction::Exercises => serde_json::to_value(conn.get_personal_records(user_id)?)?,
    };
    Ok(Reply::json(200, body))
}

fn write(
    conn: &Database,
    user_id: i64,
    action: PostAction,
    body: Value,
    today: NaiveDate,
) -> Result<Reply> {
    match action {
        PostAction::Meal => {
            let meal: NewMeal = from_body(body, "meal")?;
            let id = conn.insert_meal(user_id, &meal, today)?;
            Ok(Reply::created(id, "Meal added"))
        }
        PostAction::Workout => {
            let workout: NewWorkout = from_body(body, "workout")?;
            let id = conn.insert_workout(user_id, &workout, today)?;
            Ok(Reply::created(id, "Workout added"))
        }
        PostAction::Weight => {
            let entry: NewWeightLog = from_body(body, "weight")?;
            let id = conn.log_weight(user_id, &entry, today)?;
            Ok(Reply::created(id, "Weight logged"))
        }
        PostAction::Post => {
            let post: NewPost = from_body(body, "post")?;
            let id = conn.insert_post(user_id, &post)?;
            Ok(Reply::created(id, "Post created"))
        }
        PostAction::Like => {
            let like: LikePost = from_body(body, "like")?;
            conn.like_post(user_id, &like)?;
            Ok(Reply::ok("Post liked"))
        }
        PostAction::Activity => {
            let update: ActivityUpdate = from_body(body, "activity")?;
            conn.log_activity(user_id, &update, today)?;
            Ok(Reply::ok("Activity logged"))
        }
    }
}

fn update(conn: &Database, user_id: i64, action: PutAction, body: Value) -> Result<Reply> {
    match action {
        PutAction::Goals => {
            let goals: Goals = from_body(body, "goals")?;
            conn.set_goals(user_id, &goals)?;
            Ok(Reply::ok("Goals updated"))
        }
    }
}

fn parse_body(body: Option<&str>) -> Result<Value> {
    match body {
        None => Ok(Value::Object(serde_json::Map::new())),
        Some(raw) => serde_json::from_str(raw).context("request body is not valid JSON"),
    }
}

fn from_body<T: DeserializeOwned>(body: Value, what: &str) -> Result<T> {
    anyhow::ensure!(body.is_object(), "{what} body must be a JSON object");
    serde_json::from_value(body).with_context(|| format!("invalid {what} body"))
}
