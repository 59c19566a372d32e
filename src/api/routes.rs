use crate::config::Config;
use crate::dates;
use crate::db::{Database, DailyRecord, new_record_id};
use crate::model::{
    DailyStatistic, Exercise, ExertionRates, FoodEntry, FoodIntake, Meal, NutrientTotals, Plan,
    PlanTargets, Routine, RoutineExercise, SleepTracking, Subscription, User, WaterIntake,
    WaterLog, WorkoutProgress, round2,
};
use crate::nutrition;
use crate::provision::{self, ProvisionSummary};
use crate::stats;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<Config>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/status", get(status))
        .route("/api/v1/users", get(user_list).post(user_create))
        .route("/api/v1/exercises", get(exercise_list).post(exercise_create))
        .route("/api/v1/plans", post(plan_create))
        .route("/api/v1/plans/:id", get(plan_get))
        .route("/api/v1/routines", post(routine_create))
        .route("/api/v1/routines/:id", get(routine_get))
        .route("/api/v1/subscriptions", post(subscription_create))
        .route(
            "/api/v1/subscriptions/:id/activate",
            post(subscription_activate),
        )
        .route(
            "/api/v1/subscriptions/:id/deactivate",
            post(subscription_deactivate),
        )
        .route("/api/v1/provision/run", post(provision_run))
        .route(
            "/api/v1/users/:uid/statistics/:date",
            get(statistic_get),
        )
        .route(
            "/api/v1/users/:uid/statistics/:date/recalculate",
            post(statistic_recalculate),
        )
        .route(
            "/api/v1/users/:uid/water/:date",
            get(water_get).post(water_create).delete(water_delete),
        )
        .route("/api/v1/users/:uid/water/:date/logs", post(water_log_add))
        .route(
            "/api/v1/users/:uid/water/:date/logs/:index",
            put(water_log_update).delete(water_log_remove),
        )
        .route(
            "/api/v1/users/:uid/food/:date",
            get(food_get).post(food_create).delete(food_delete),
        )
        .route("/api/v1/users/:uid/food/:date/meals", post(meal_add))
        .route(
            "/api/v1/users/:uid/food/:date/meals/:index",
            delete(meal_remove),
        )
        .route(
            "/api/v1/users/:uid/workouts/:date",
            get(workout_get).post(workout_create).delete(workout_delete),
        )
        .route(
            "/api/v1/users/:uid/workouts/:date/exercises/:index",
            put(workout_exercise_update).delete(workout_exercise_remove),
        )
        .route(
            "/api/v1/users/:uid/sleep/:date",
            get(sleep_get).post(sleep_create).delete(sleep_delete),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct StatusPayload {
    users: i64,
    active_subscriptions: i64,
    provision_time: String,
    api_port: u16,
}

#[derive(Debug, Deserialize)]
struct CreateUserPayload {
    email: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateExercisePayload {
    name: String,
    default_reps: u32,
    per_set: ExertionRates,
}

#[derive(Debug, Deserialize)]
struct CreatePlanPayload {
    name: String,
    targets: PlanTargets,
    #[serde(default)]
    routine_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreateRoutinePayload {
    name: String,
    #[serde(default)]
    days: BTreeMap<String, Vec<RoutineExercise>>,
}

#[derive(Debug, Deserialize)]
struct CreateSubscriptionPayload {
    user_id: String,
    plan_id: String,
    starts_on: String,
    #[serde(default)]
    ends_on: Option<String>,
    #[serde(default = "default_true")]
    active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct WaterLogPayload {
    liters: f64,
    #[serde(default)]
    at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WaterLogUpdatePayload {
    liters: f64,
}

#[derive(Debug, Deserialize)]
struct MealPayload {
    name: String,
    #[serde(default)]
    at: Option<String>,
    entries: Vec<FoodEntry>,
}

#[derive(Debug, Deserialize)]
struct ExercisePatchPayload {
    #[serde(default)]
    sets_completed: Option<u32>,
    #[serde(default)]
    reps_per_set: Option<Vec<u32>>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    calories_burned: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct SleepPayload {
    #[serde(default)]
    bed_time: Option<String>,
    #[serde(default)]
    wake_time: Option<String>,
    #[serde(default)]
    quality: Option<String>,
    #[serde(default)]
    total_hours: Option<f64>,
}

async fn status(State(state): State<ApiState>) -> ApiResult<Json<StatusPayload>> {
    let db = open_db(&state)?;

    let payload = StatusPayload {
        users: db.table_count("users")?,
        active_subscriptions: db.count_active_subscriptions()?,
        provision_time: state.config.provision_time.clone(),
        api_port: state.config.api_port,
    };

    Ok(Json(payload))
}

async fn user_list(State(state): State<ApiState>) -> ApiResult<Json<Vec<User>>> {
    let db = open_db(&state)?;
    Ok(Json(db.list_users()?))
}

async fn user_create(
    State(state): State<ApiState>,
    Json(payload): Json<CreateUserPayload>,
) -> ApiResult<Json<User>> {
    if payload.email.trim().is_empty() {
        return Err(ApiError::BadRequest("email must not be empty".to_string()));
    }

    let db = open_db(&state)?;
    if db.user_by_identifier(payload.email.trim())?.is_some() {
        return Err(ApiError::Conflict(format!(
            "User already exists: {}",
            payload.email.trim()
        )));
    }

    let user = User {
        uid: new_record_id(),
        email: payload.email.trim().to_string(),
        display_name: payload.display_name,
        created_at: Utc::now().to_rfc3339(),
    };
    db.insert_user(&user)?;

    Ok(Json(user))
}

async fn exercise_list(State(state): State<ApiState>) -> ApiResult<Json<Vec<Exercise>>> {
    let db = open_db(&state)?;
    Ok(Json(db.list_exercises()?))
}

async fn exercise_create(
    State(state): State<ApiState>,
    Json(payload): Json<CreateExercisePayload>,
) -> ApiResult<Json<Exercise>> {
    if payload.default_reps == 0 {
        return Err(ApiError::BadRequest(
            "default_reps must be positive".to_string(),
        ));
    }

    let db = open_db(&state)?;
    let exercise = Exercise {
        id: new_record_id(),
        name: payload.name,
        default_reps: payload.default_reps,
        per_set: payload.per_set,
    };
    db.insert_exercise(&exercise)?;

    Ok(Json(exercise))
}

async fn plan_create(
    State(state): State<ApiState>,
    Json(payload): Json<CreatePlanPayload>,
) -> ApiResult<Json<Plan>> {
    let db = open_db(&state)?;

    if let Some(routine_id) = payload.routine_id.as_deref() {
        if db.routine_by_id(routine_id)?.is_none() {
            return Err(ApiError::NotFound(format!(
                "Routine not found: {routine_id}"
            )));
        }
    }

    let plan = Plan {
        id: new_record_id(),
        name: payload.name,
        targets: payload.targets,
        routine_id: payload.routine_id,
    };
    db.insert_plan(&plan)?;

    Ok(Json(plan))
}

async fn plan_get(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Plan>> {
    let db = open_db(&state)?;
    db.plan_by_id(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Plan not found: {id}")))
}

async fn routine_create(
    State(state): State<ApiState>,
    Json(payload): Json<CreateRoutinePayload>,
) -> ApiResult<Json<Routine>> {
    const WEEKDAYS: [&str; 7] = [
        "Monday",
        "Tuesday",
        "Wednesday",
        "Thursday",
        "Friday",
        "Saturday",
        "Sunday",
    ];

    for day in payload.days.keys() {
        if !WEEKDAYS.contains(&day.as_str()) {
            return Err(ApiError::BadRequest(format!(
                "Unknown weekday name: {day}. Expected Monday..Sunday"
            )));
        }
    }

    let db = open_db(&state)?;
    let routine = Routine {
        id: new_record_id(),
        name: payload.name,
        days: payload.days,
    };
    db.insert_routine(&routine)?;

    Ok(Json(routine))
}

async fn routine_get(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Routine>> {
    let db = open_db(&state)?;
    db.routine_by_id(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Routine not found: {id}")))
}

async fn subscription_create(
    State(state): State<ApiState>,
    Json(payload): Json<CreateSubscriptionPayload>,
) -> ApiResult<Json<Subscription>> {
    if dates::normalize_text(&payload.starts_on).is_none() {
        return Err(ApiError::BadRequest(format!(
            "Invalid starts_on date: {}",
            payload.starts_on
        )));
    }
    if let Some(ends_on) = payload.ends_on.as_deref() {
        if dates::normalize_text(ends_on).is_none() {
            return Err(ApiError::BadRequest(format!(
                "Invalid ends_on date: {ends_on}"
            )));
        }
    }

    let db = open_db(&state)?;
    let user = resolve_user(&db, &payload.user_id)?;

    if db.plan_by_id(&payload.plan_id)?.is_none() {
        return Err(ApiError::NotFound(format!(
            "Plan not found: {}",
            payload.plan_id
        )));
    }

    if payload.active {
        if let Some(current) = db.active_subscription_for(&user.identifier_set())? {
            return Err(ApiError::Conflict(format!(
                "User {} already has an active subscription: {}",
                user.uid, current.id
            )));
        }
    }

    let subscription = Subscription {
        id: new_record_id(),
        user_id: user.uid,
        plan_id: payload.plan_id,
        starts_on: payload.starts_on,
        ends_on: payload.ends_on,
        active: payload.active,
    };
    db.insert_subscription(&subscription)?;

    Ok(Json(subscription))
}

async fn subscription_activate(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Subscription>> {
    let db = open_db(&state)?;
    let Some(subscription) = db.subscription_by_id(&id)? else {
        return Err(ApiError::NotFound(format!("Subscription not found: {id}")));
    };

    let identifiers = db
        .user_by_identifier(&subscription.user_id)?
        .map(|user| user.identifier_set())
        .unwrap_or_else(|| vec![subscription.user_id.clone()]);

    if let Some(current) = db.active_subscription_for(&identifiers)? {
        if current.id != subscription.id {
            return Err(ApiError::Conflict(format!(
                "User {} already has an active subscription: {}",
                subscription.user_id, current.id
            )));
        }
    }

    Ok(Json(db.activate_subscription(&id)?))
}

async fn subscription_deactivate(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Subscription>> {
    let db = open_db(&state)?;
    if db.subscription_by_id(&id)?.is_none() {
        return Err(ApiError::NotFound(format!("Subscription not found: {id}")));
    }

    Ok(Json(db.deactivate_subscription(&id)?))
}

async fn provision_run(State(state): State<ApiState>) -> ApiResult<Json<ProvisionSummary>> {
    let db = open_db(&state)?;
    let summary = provision::run_provisioning(&db, Utc::now().date_naive())?;

    Ok(Json(summary))
}

async fn statistic_get(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<DailyStatistic>> {
    let ctx = day_context(&state, &uid, &date)?;
    load_for_day::<DailyStatistic>(&ctx, "daily statistic").map(Json)
}

async fn statistic_recalculate(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<DailyStatistic>> {
    let ctx = day_context(&state, &uid, &date)?;

    stats::recalculate(&ctx.db, &ctx.identifiers, ctx.day)?
        .map(Json)
        .ok_or_else(|| {
            ApiError::NotFound(format!("No daily statistic provisioned for {}", ctx.day))
        })
}

async fn water_get(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<WaterIntake>> {
    let ctx = day_context(&state, &uid, &date)?;
    load_for_day::<WaterIntake>(&ctx, "water intake").map(Json)
}

async fn water_create(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<WaterIntake>> {
    let ctx = day_context(&state, &uid, &date)?;
    ensure_absent::<WaterIntake>(&ctx, "water intake")?;

    let plan = active_plan(&ctx)?;
    let record = provision::water_skeleton(&ctx.user.uid, &plan, ctx.day);
    ctx.db.insert_record(&record)?;

    Ok(Json(record))
}

async fn water_log_add(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
    Json(payload): Json<WaterLogPayload>,
) -> ApiResult<Json<WaterIntake>> {
    if payload.liters <= 0.0 {
        return Err(ApiError::BadRequest("liters must be positive".to_string()));
    }
    let at = match payload.at {
        Some(raw) => {
            if dates::normalize_text(&raw).is_none() {
                return Err(ApiError::BadRequest(format!("Invalid log time: {raw}")));
            }
            raw
        }
        None => Utc::now().to_rfc3339(),
    };

    let ctx = day_context(&state, &uid, &date)?;
    let mut record = load_for_day::<WaterIntake>(&ctx, "water intake")?;

    record.logs.push(WaterLog {
        at,
        liters: payload.liters,
    });
    record.recompute_total();
    record.updated_at = Utc::now().to_rfc3339();
    ctx.db.save_record(&record)?;

    stats::trigger_recalculation(&ctx.db, &record.user_id, &record.date);

    Ok(Json(record))
}

async fn water_log_update(
    State(state): State<ApiState>,
    Path((uid, date, index)): Path<(String, String, usize)>,
    Json(payload): Json<WaterLogUpdatePayload>,
) -> ApiResult<Json<WaterIntake>> {
    if payload.liters <= 0.0 {
        return Err(ApiError::BadRequest("liters must be positive".to_string()));
    }

    let ctx = day_context(&state, &uid, &date)?;
    let mut record = load_for_day::<WaterIntake>(&ctx, "water intake")?;

    let Some(log) = record.logs.get_mut(index) else {
        return Err(ApiError::NotFound(format!("No water log at index {index}")));
    };
    log.liters = payload.liters;

    record.recompute_total();
    record.updated_at = Utc::now().to_rfc3339();
    ctx.db.save_record(&record)?;

    stats::trigger_recalculation(&ctx.db, &record.user_id, &record.date);

    Ok(Json(record))
}

async fn water_log_remove(
    State(state): State<ApiState>,
    Path((uid, date, index)): Path<(String, String, usize)>,
) -> ApiResult<Json<WaterIntake>> {
    let ctx = day_context(&state, &uid, &date)?;
    let mut record = load_for_day::<WaterIntake>(&ctx, "water intake")?;

    if index >= record.logs.len() {
        return Err(ApiError::NotFound(format!("No water log at index {index}")));
    }
    record.logs.remove(index);

    record.recompute_total();
    record.updated_at = Utc::now().to_rfc3339();
    ctx.db.save_record(&record)?;

    stats::trigger_recalculation(&ctx.db, &record.user_id, &record.date);

    Ok(Json(record))
}

async fn food_get(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<FoodIntake>> {
    let ctx = day_context(&state, &uid, &date)?;
    load_for_day::<FoodIntake>(&ctx, "food intake").map(Json)
}

async fn food_create(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<FoodIntake>> {
    let ctx = day_context(&state, &uid, &date)?;
    ensure_absent::<FoodIntake>(&ctx, "food intake")?;

    let plan = active_plan(&ctx)?;
    let record = provision::food_skeleton(&ctx.user.uid, &plan, ctx.day);
    ctx.db.insert_record(&record)?;

    Ok(Json(record))
}

async fn meal_add(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
    Json(payload): Json<MealPayload>,
) -> ApiResult<Json<FoodIntake>> {
    if payload.entries.is_empty() {
        return Err(ApiError::BadRequest(
            "a meal needs at least one entry".to_string(),
        ));
    }
    let at = match payload.at {
        Some(raw) => {
            if dates::normalize_text(&raw).is_none() {
                return Err(ApiError::BadRequest(format!("Invalid meal time: {raw}")));
            }
            raw
        }
        None => Utc::now().to_rfc3339(),
    };

    let ctx = day_context(&state, &uid, &date)?;
    let mut record = load_for_day::<FoodIntake>(&ctx, "food intake")?;

    let mut meal = Meal {
        name: payload.name,
        at,
        entries: payload.entries,
        totals: NutrientTotals::default(),
    };
    meal.recompute_totals();
    record.meals.push(meal);

    record.recompute_totals();
    record.updated_at = Utc::now().to_rfc3339();
    ctx.db.save_record(&record)?;

    stats::trigger_recalculation(&ctx.db, &record.user_id, &record.date);

    Ok(Json(record))
}

async fn meal_remove(
    State(state): State<ApiState>,
    Path((uid, date, index)): Path<(String, String, usize)>,
) -> ApiResult<Json<FoodIntake>> {
    let ctx = day_context(&state, &uid, &date)?;
    let mut record = load_for_day::<FoodIntake>(&ctx, "food intake")?;

    if index >= record.meals.len() {
        return Err(ApiError::NotFound(format!("No meal at index {index}")));
    }
    record.meals.remove(index);

    record.recompute_totals();
    record.updated_at = Utc::now().to_rfc3339();
    ctx.db.save_record(&record)?;

    stats::trigger_recalculation(&ctx.db, &record.user_id, &record.date);

    Ok(Json(record))
}

async fn workout_get(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<WorkoutProgress>> {
    let ctx = day_context(&state, &uid, &date)?;
    load_for_day::<WorkoutProgress>(&ctx, "workout progress").map(Json)
}

async fn workout_create(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<WorkoutProgress>> {
    let ctx = day_context(&state, &uid, &date)?;
    ensure_absent::<WorkoutProgress>(&ctx, "workout progress")?;

    let plan = active_plan(&ctx)?;
    let routine = match plan.routine_id.as_deref() {
        Some(routine_id) => ctx.db.routine_by_id(routine_id)?,
        None => None,
    };

    let day_name = dates::weekday_name(ctx.day);
    let record = provision::workout_skeleton(&ctx.user.uid, routine.as_ref(), ctx.day, day_name);
    ctx.db.insert_record(&record)?;

    stats::trigger_recalculation(&ctx.db, &record.user_id, &record.date);

    Ok(Json(record))
}

async fn workout_exercise_update(
    State(state): State<ApiState>,
    Path((uid, date, index)): Path<(String, String, usize)>,
    Json(payload): Json<ExercisePatchPayload>,
) -> ApiResult<Json<WorkoutProgress>> {
    let ctx = day_context(&state, &uid, &date)?;
    let mut record = load_for_day::<WorkoutProgress>(&ctx, "workout progress")?;

    let Some(entry) = record.exercises.get_mut(index) else {
        return Err(ApiError::NotFound(format!(
            "No exercise at index {index}"
        )));
    };

    let volume_changed = payload.sets_completed.is_some() || payload.reps_per_set.is_some();

    if let Some(sets_completed) = payload.sets_completed {
        entry.sets_completed = sets_completed;
    }
    if let Some(reps_per_set) = payload.reps_per_set {
        entry.reps_per_set = reps_per_set;
    }
    if let Some(completed) = payload.completed {
        entry.completed = completed;
    }
    if let Some(calories_burned) = payload.calories_burned {
        if calories_burned < 0.0 {
            return Err(ApiError::BadRequest(
                "calories_burned must not be negative".to_string(),
            ));
        }
        entry.burned.calories = round2(calories_burned);
    } else if volume_changed {
        // A stale computed burn would otherwise block recomputation.
        entry.burned = ExertionRates::default();
    }

    let updated = nutrition::apply_exertion(&ctx.db, entry.clone())?;
    record.exercises[index] = updated;

    record.recompute_totals();
    record.updated_at = Utc::now().to_rfc3339();
    ctx.db.save_record(&record)?;

    stats::trigger_recalculation(&ctx.db, &record.user_id, &record.date);

    Ok(Json(record))
}

async fn workout_exercise_remove(
    State(state): State<ApiState>,
    Path((uid, date, index)): Path<(String, String, usize)>,
) -> ApiResult<Json<WorkoutProgress>> {
    let ctx = day_context(&state, &uid, &date)?;
    let mut record = load_for_day::<WorkoutProgress>(&ctx, "workout progress")?;

    if index >= record.exercises.len() {
        return Err(ApiError::NotFound(format!(
            "No exercise at index {index}"
        )));
    }
    record.exercises.remove(index);

    record.recompute_totals();
    record.updated_at = Utc::now().to_rfc3339();
    ctx.db.save_record(&record)?;

    stats::trigger_recalculation(&ctx.db, &record.user_id, &record.date);

    Ok(Json(record))
}

async fn sleep_get(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<SleepTracking>> {
    let ctx = day_context(&state, &uid, &date)?;
    load_for_day::<SleepTracking>(&ctx, "sleep tracking").map(Json)
}

async fn sleep_create(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
    Json(payload): Json<SleepPayload>,
) -> ApiResult<Json<SleepTracking>> {
    let ctx = day_context(&state, &uid, &date)?;
    ensure_absent::<SleepTracking>(&ctx, "sleep tracking")?;

    let total_hours = match (payload.bed_time.as_deref(), payload.wake_time.as_deref()) {
        (Some(bed), Some(wake)) => sleep_hours(bed, wake).ok_or_else(|| {
            ApiError::BadRequest("bed_time and wake_time must be valid timestamps".to_string())
        })?,
        _ => payload.total_hours.unwrap_or(0.0),
    };
    if total_hours < 0.0 {
        return Err(ApiError::BadRequest(
            "total_hours must not be negative".to_string(),
        ));
    }

    let plan = active_plan(&ctx)?;
    let mut record = provision::sleep_skeleton(&ctx.user.uid, &plan, ctx.day);
    record.bed_time = payload.bed_time;
    record.wake_time = payload.wake_time;
    record.quality = payload.quality;
    record.total_hours = round2(total_hours);
    ctx.db.insert_record(&record)?;

    stats::trigger_recalculation(&ctx.db, &record.user_id, &record.date);

    Ok(Json(record))
}

/// Deleting a source record does not cascade to the daily statistic; the
/// recalculation trigger zeroes that family's contribution instead.
fn delete_source<T: DailyRecord>(ctx: &DayContext, what: &str) -> Result<(), ApiError> {
    let record = load_for_day::<T>(ctx, what)?;
    ctx.db.delete_record::<T>(record.id())?;
    stats::trigger_recalculation(&ctx.db, record.owner(), record.record_date());

    Ok(())
}

async fn water_delete(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let ctx = day_context(&state, &uid, &date)?;
    delete_source::<WaterIntake>(&ctx, "water intake")?;
    Ok(Json(json!({ "deleted": true })))
}

async fn food_delete(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let ctx = day_context(&state, &uid, &date)?;
    delete_source::<FoodIntake>(&ctx, "food intake")?;
    Ok(Json(json!({ "deleted": true })))
}

async fn workout_delete(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let ctx = day_context(&state, &uid, &date)?;
    delete_source::<WorkoutProgress>(&ctx, "workout progress")?;
    Ok(Json(json!({ "deleted": true })))
}

async fn sleep_delete(
    State(state): State<ApiState>,
    Path((uid, date)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let ctx = day_context(&state, &uid, &date)?;
    delete_source::<SleepTracking>(&ctx, "sleep tracking")?;
    Ok(Json(json!({ "deleted": true })))
}

/// Duration between bed and wake timestamps, in hours. A wake time that
/// sorts before bed time is assumed to be on the next day.
fn sleep_hours(bed: &str, wake: &str) -> Option<f64> {
    let bed = DateTime::parse_from_rfc3339(bed).ok()?.with_timezone(&Utc);
    let wake = DateTime::parse_from_rfc3339(wake).ok()?.with_timezone(&Utc);

    let mut slept = wake - bed;
    if slept < Duration::zero() {
        slept = slept + Duration::days(1);
    }
    if slept < Duration::zero() {
        return None;
    }

    Some(round2(slept.num_seconds() as f64 / 3600.0))
}

struct DayContext {
    db: Database,
    user: User,
    identifiers: Vec<String>,
    day: NaiveDate,
}

fn open_db(state: &ApiState) -> Result<Database, ApiError> {
    Ok(Database::open(&state.config.db_path)?)
}

fn day_context(state: &ApiState, uid: &str, date: &str) -> Result<DayContext, ApiError> {
    let db = open_db(state)?;
    let user = resolve_user(&db, uid)?;
    let day = parse_day(date)?;
    let identifiers = user.identifier_set();

    Ok(DayContext {
        db,
        user,
        identifiers,
        day,
    })
}

fn resolve_user(db: &Database, identifier: &str) -> Result<User, ApiError> {
    db.user_by_identifier(identifier)?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {identifier}")))
}

fn parse_day(input: &str) -> Result<NaiveDate, ApiError> {
    dates::normalize_text(input).ok_or_else(|| {
        ApiError::BadRequest(format!("Invalid date: {input}. Example: 2026-02-18"))
    })
}

fn load_for_day<T: DailyRecord>(ctx: &DayContext, what: &str) -> Result<T, ApiError> {
    ctx.db
        .daily_record_for_day::<T>(&ctx.identifiers, ctx.day)?
        .ok_or_else(|| ApiError::NotFound(format!("No {what} record for {}", ctx.day)))
}

fn ensure_absent<T: DailyRecord>(ctx: &DayContext, what: &str) -> Result<(), ApiError> {
    if ctx
        .db
        .daily_record_for_day::<T>(&ctx.identifiers, ctx.day)?
        .is_some()
    {
        return Err(ApiError::Conflict(format!(
            "A {what} record already exists for {}",
            ctx.day
        )));
    }

    Ok(())
}

/// The active subscription's plan, for shaping direct-created records.
fn active_plan(ctx: &DayContext) -> Result<Plan, ApiError> {
    let Some(subscription) = ctx.db.active_subscription_for(&ctx.identifiers)? else {
        return Err(ApiError::NotFound(format!(
            "No active subscription for user {}",
            ctx.user.uid
        )));
    };

    ctx.db
        .plan_by_id(&subscription.plan_id)?
        .ok_or_else(|| ApiError::NotFound(format!("Plan not found: {}", subscription.plan_id)))
}

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug)]
enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::Internal(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Internal(error) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": error.to_string() })),
            )
                .into_response(),
        }
    }
}
