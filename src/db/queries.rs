pub const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  uid   TEXT PRIMARY KEY,
  email TEXT NOT NULL,
  doc   TEXT NOT NULL
);
"#;

pub const CREATE_EXERCISES: &str = r#"
CREATE TABLE IF NOT EXISTS exercises (
  id  TEXT PRIMARY KEY,
  doc TEXT NOT NULL
);
"#;

pub const CREATE_PLANS: &str = r#"
CREATE TABLE IF NOT EXISTS plans (
  id  TEXT PRIMARY KEY,
  doc TEXT NOT NULL
);
"#;

pub const CREATE_ROUTINES: &str = r#"
CREATE TABLE IF NOT EXISTS routines (
  id  TEXT PRIMARY KEY,
  doc TEXT NOT NULL
);
"#;

pub const CREATE_SUBSCRIPTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS subscriptions (
  id      TEXT PRIMARY KEY,
  user_id TEXT NOT NULL,
  active  INTEGER NOT NULL DEFAULT 0,
  doc     TEXT NOT NULL
);
"#;

pub const CREATE_WORKOUT_PROGRESS: &str = r#"
CREATE TABLE IF NOT EXISTS workout_progress (
  id      TEXT PRIMARY KEY,
  user_id TEXT NOT NULL,
  doc     TEXT NOT NULL
);
"#;

pub const CREATE_WATER_INTAKE: &str = r#"
CREATE TABLE IF NOT EXISTS water_intake (
  id      TEXT PRIMARY KEY,
  user_id TEXT NOT NULL,
  doc     TEXT NOT NULL
);
"#;

pub const CREATE_FOOD_INTAKE: &str = r#"
CREATE TABLE IF NOT EXISTS food_intake (
  id      TEXT PRIMARY KEY,
  user_id TEXT NOT NULL,
  doc     TEXT NOT NULL
);
"#;

pub const CREATE_SLEEP_TRACKING: &str = r#"
CREATE TABLE IF NOT EXISTS sleep_tracking (
  id      TEXT PRIMARY KEY,
  user_id TEXT NOT NULL,
  doc     TEXT NOT NULL
);
"#;

pub const CREATE_DAILY_STATISTICS: &str = r#"
CREATE TABLE IF NOT EXISTS daily_statistics (
  id      TEXT PRIMARY KEY,
  user_id TEXT NOT NULL,
  doc     TEXT NOT NULL
);
"#;

pub const INDEX_USERS_EMAIL: &str = "CREATE INDEX IF NOT EXISTS idx_users_email ON users(email);";

pub const INDEX_SUBSCRIPTIONS_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_subscriptions_user ON subscriptions(user_id);";

pub const INDEX_WORKOUT_PROGRESS_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_workout_progress_user ON workout_progress(user_id);";

pub const INDEX_WATER_INTAKE_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_water_intake_user ON water_intake(user_id);";

pub const INDEX_FOOD_INTAKE_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_food_intake_user ON food_intake(user_id);";

pub const INDEX_SLEEP_TRACKING_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_sleep_tracking_user ON sleep_tracking(user_id);";

pub const INDEX_DAILY_STATISTICS_USER: &str =
    "CREATE INDEX IF NOT EXISTS idx_daily_statistics_user ON daily_statistics(user_id);";

pub fn schema_statements() -> Vec<&'static str> {
    vec![
        CREATE_USERS,
        CREATE_EXERCISES,
        CREATE_PLANS,
        CREATE_ROUTINES,
        CREATE_SUBSCRIPTIONS,
        CREATE_WORKOUT_PROGRESS,
        CREATE_WATER_INTAKE,
        CREATE_FOOD_INTAKE,
        CREATE_SLEEP_TRACKING,
        CREATE_DAILY_STATISTICS,
        INDEX_USERS_EMAIL,
        INDEX_SUBSCRIPTIONS_USER,
        INDEX_WORKOUT_PROGRESS_USER,
        INDEX_WATER_INTAKE_USER,
        INDEX_FOOD_INTAKE_USER,
        INDEX_SLEEP_TRACKING_USER,
        INDEX_DAILY_STATISTICS_USER,
    ]
}
