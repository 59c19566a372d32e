pub mod queries;

use crate::dates::RecordDate;
use crate::model::{
    DailyStatistic, Exercise, FoodIntake, Plan, Routine, SleepTracking, Subscription, User,
    WaterIntake, WorkoutProgress,
};
use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::warn;
use uuid::Uuid;

/// The five per-day record families, each keyed logically by
/// (user, calendar day) and physically by an opaque generated id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyCollection {
    Workout,
    Water,
    Food,
    Sleep,
    Statistics,
}

impl DailyCollection {
    pub const ALL: [Self; 5] = [
        Self::Workout,
        Self::Water,
        Self::Food,
        Self::Sleep,
        Self::Statistics,
    ];

    pub fn table(self) -> &'static str {
        match self {
            Self::Workout => "workout_progress",
            Self::Water => "water_intake",
            Self::Food => "food_intake",
            Self::Sleep => "sleep_tracking",
            Self::Statistics => "daily_statistics",
        }
    }
}

/// A record that lives in one of the per-day families.
pub trait DailyRecord: Serialize + DeserializeOwned {
    const COLLECTION: DailyCollection;

    fn id(&self) -> &str;
    fn owner(&self) -> &str;
    fn record_date(&self) -> &RecordDate;
}

impl DailyRecord for WorkoutProgress {
    const COLLECTION: DailyCollection = DailyCollection::Workout;

    fn id(&self) -> &str {
        &self.id
    }
    fn owner(&self) -> &str {
        &self.user_id
    }
    fn record_date(&self) -> &RecordDate {
        &self.date
    }
}

impl DailyRecord for WaterIntake {
    const COLLECTION: DailyCollection = DailyCollection::Water;

    fn id(&self) -> &str {
        &self.id
    }
    fn owner(&self) -> &str {
        &self.user_id
    }
    fn record_date(&self) -> &RecordDate {
        &self.date
    }
}

impl DailyRecord for FoodIntake {
    const COLLECTION: DailyCollection = DailyCollection::Food;

    fn id(&self) -> &str {
        &self.id
    }
    fn owner(&self) -> &str {
        &self.user_id
    }
    fn record_date(&self) -> &RecordDate {
        &self.date
    }
}

impl DailyRecord for SleepTracking {
    const COLLECTION: DailyCollection = DailyCollection::Sleep;

    fn id(&self) -> &str {
        &self.id
    }
    fn owner(&self) -> &str {
        &self.user_id
    }
    fn record_date(&self) -> &RecordDate {
        &self.date
    }
}

impl DailyRecord for DailyStatistic {
    const COLLECTION: DailyCollection = DailyCollection::Statistics;

    fn id(&self) -> &str {
        &self.id
    }
    fn owner(&self) -> &str {
        &self.user_id
    }
    fn record_date(&self) -> &RecordDate {
        &self.date
    }
}

pub fn new_record_id() -> String {
    Uuid::new_v4().to_string()
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create DB directory: {}", parent.display()))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open SQLite DB: {}", path.display()))?;

        let database = Self { conn };
        database.init_schema()?;

        Ok(database)
    }

    pub fn init_schema(&self) -> Result<()> {
        queries::schema_statements()
            .iter()
            .try_for_each(|statement| {
                self.conn
                    .execute(statement, [])
                    .context("Failed to initialize schema")
                    .map(|_| ())
            })
    }

    pub fn insert_user(&self, user: &User) -> Result<()> {
        let doc = serde_json::to_string(user).context("Failed to serialize user")?;
        self.conn
            .execute(
                "INSERT INTO users (uid, email, doc) VALUES (?1, ?2, ?3)",
                params![user.uid, user.email, doc],
            )
            .context("Failed to insert user")?;

        Ok(())
    }

    pub fn user_by_identifier(&self, identifier: &str) -> Result<Option<User>> {
        let doc = self
            .conn
            .query_row(
                "SELECT doc FROM users WHERE uid = ?1 OR email = ?1 LIMIT 1",
                params![identifier],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to look up user")?;

        doc.map(|doc| serde_json::from_str(&doc).context("Failed to parse user document"))
            .transpose()
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut statement = self
            .conn
            .prepare("SELECT doc FROM users ORDER BY uid ASC")?;

        let users = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list users")?
            .iter()
            .map(|doc| serde_json::from_str(doc).context("Failed to parse user document"))
            .collect::<Result<Vec<User>>>()?;

        Ok(users)
    }

    pub fn insert_exercise(&self, exercise: &Exercise) -> Result<()> {
        self.insert_catalog("exercises", &exercise.id, exercise)
    }

    pub fn exercise_by_id(&self, id: &str) -> Result<Option<Exercise>> {
        self.catalog_by_id("exercises", id)
    }

    pub fn list_exercises(&self) -> Result<Vec<Exercise>> {
        let mut statement = self
            .conn
            .prepare("SELECT doc FROM exercises ORDER BY id ASC")?;

        let exercises = statement
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list exercises")?
            .iter()
            .map(|doc| serde_json::from_str(doc).context("Failed to parse exercise document"))
            .collect::<Result<Vec<Exercise>>>()?;

        Ok(exercises)
    }

    pub fn insert_plan(&self, plan: &Plan) -> Result<()> {
        self.insert_catalog("plans", &plan.id, plan)
    }

    pub fn plan_by_id(&self, id: &str) -> Result<Option<Plan>> {
        self.catalog_by_id("plans", id)
    }

    pub fn insert_routine(&self, routine: &Routine) -> Result<()> {
        self.insert_catalog("routines", &routine.id, routine)
    }

    pub fn routine_by_id(&self, id: &str) -> Result<Option<Routine>> {
        self.catalog_by_id("routines", id)
    }

    fn insert_catalog<T: Serialize>(&self, table: &'static str, id: &str, record: &T) -> Result<()> {
        let doc = serde_json::to_string(record)
            .with_context(|| format!("Failed to serialize {table} document"))?;
        let sql = format!("INSERT INTO {table} (id, doc) VALUES (?1, ?2)");
        self.conn
            .execute(&sql, params![id, doc])
            .with_context(|| format!("Failed to insert into {table}"))?;

        Ok(())
    }

    fn catalog_by_id<T: DeserializeOwned>(
        &self,
        table: &'static str,
        id: &str,
    ) -> Result<Option<T>> {
        let sql = format!("SELECT doc FROM {table} WHERE id = ?1");
        let doc = self
            .conn
            .query_row(&sql, params![id], |row| row.get::<_, String>(0))
            .optional()
            .with_context(|| format!("Failed to look up {table} record"))?;

        doc.map(|doc| {
            serde_json::from_str(&doc).with_context(|| format!("Failed to parse {table} document"))
        })
        .transpose()
    }

    /// Inserts a subscription. An active subscription is rejected when the
    /// user already has one.
    pub fn insert_subscription(&self, subscription: &Subscription) -> Result<()> {
        if subscription.active
            && self
                .active_subscription_for(&[subscription.user_id.clone()])?
                .is_some()
        {
            bail!(
                "User {} already has an active subscription",
                subscription.user_id
            );
        }

        let doc =
            serde_json::to_string(subscription).context("Failed to serialize subscription")?;
        self.conn
            .execute(
                "INSERT INTO subscriptions (id, user_id, active, doc) VALUES (?1, ?2, ?3, ?4)",
                params![
                    subscription.id,
                    subscription.user_id,
                    subscription.active as i64,
                    doc
                ],
            )
            .context("Failed to insert subscription")?;

        Ok(())
    }

    pub fn subscription_by_id(&self, id: &str) -> Result<Option<Subscription>> {
        let doc = self
            .conn
            .query_row(
                "SELECT doc FROM subscriptions WHERE id = ?1",
                params![id],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("Failed to look up subscription")?;

        doc.map(|doc| serde_json::from_str(&doc).context("Failed to parse subscription document"))
            .transpose()
    }

    /// Activation is rejected while a different subscription is active for
    /// the same user; the active one is left untouched.
    pub fn activate_subscription(&self, id: &str) -> Result<Subscription> {
        let Some(mut subscription) = self.subscription_by_id(id)? else {
            bail!("Subscription not found: {id}");
        };

        if let Some(current) = self.active_subscription_for(&[subscription.user_id.clone()])? {
            if current.id == subscription.id {
                return Ok(subscription);
            }
            bail!(
                "User {} already has an active subscription: {}",
                subscription.user_id,
                current.id
            );
        }

        subscription.active = true;
        self.save_subscription(&subscription)?;

        Ok(subscription)
    }

    pub fn deactivate_subscription(&self, id: &str) -> Result<Subscription> {
        let Some(mut subscription) = self.subscription_by_id(id)? else {
            bail!("Subscription not found: {id}");
        };

        subscription.active = false;
        self.save_subscription(&subscription)?;

        Ok(subscription)
    }

    fn save_subscription(&self, subscription: &Subscription) -> Result<()> {
        let doc =
            serde_json::to_string(subscription).context("Failed to serialize subscription")?;
        self.conn
            .execute(
                "UPDATE subscriptions SET active = ?2, doc = ?3 WHERE id = ?1",
                params![subscription.id, subscription.active as i64, doc],
            )
            .context("Failed to update subscription")?;

        Ok(())
    }

    /// The single in-force subscription for a user, matched under any of the
    /// user's historical identifiers.
    pub fn active_subscription_for(&self, user_ids: &[String]) -> Result<Option<Subscription>> {
        if user_ids.is_empty() {
            return Ok(None);
        }

        let placeholders = placeholder_list(user_ids.len());
        let sql = format!(
            "SELECT doc FROM subscriptions WHERE active = 1 AND user_id IN ({placeholders}) LIMIT 1"
        );
        let doc = self
            .conn
            .query_row(&sql, params_from_iter(user_ids.iter()), |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .context("Failed to query active subscription")?;

        doc.map(|doc| serde_json::from_str(&doc).context("Failed to parse subscription document"))
            .transpose()
    }

    pub fn insert_record<T: DailyRecord>(&self, record: &T) -> Result<()> {
        let doc = serde_json::to_string(record).with_context(|| {
            format!("Failed to serialize {} document", T::COLLECTION.table())
        })?;
        let sql = format!(
            "INSERT INTO {} (id, user_id, doc) VALUES (?1, ?2, ?3)",
            T::COLLECTION.table()
        );
        self.conn
            .execute(&sql, params![record.id(), record.owner(), doc])
            .with_context(|| format!("Failed to insert into {}", T::COLLECTION.table()))?;

        Ok(())
    }

    pub fn save_record<T: DailyRecord>(&self, record: &T) -> Result<()> {
        let doc = serde_json::to_string(record).with_context(|| {
            format!("Failed to serialize {} document", T::COLLECTION.table())
        })?;
        let sql = format!("UPDATE {} SET doc = ?2 WHERE id = ?1", T::COLLECTION.table());
        let updated = self
            .conn
            .execute(&sql, params![record.id(), doc])
            .with_context(|| format!("Failed to update {}", T::COLLECTION.table()))?;

        if updated == 0 {
            bail!(
                "No {} record with id {}",
                T::COLLECTION.table(),
                record.id()
            );
        }

        Ok(())
    }

    pub fn delete_record<T: DailyRecord>(&self, id: &str) -> Result<bool> {
        let sql = format!("DELETE FROM {} WHERE id = ?1", T::COLLECTION.table());
        let deleted = self
            .conn
            .execute(&sql, params![id])
            .with_context(|| format!("Failed to delete from {}", T::COLLECTION.table()))?;

        Ok(deleted > 0)
    }

    /// Every record owned by any of the given identifiers. A document that
    /// no longer parses is skipped and logged rather than failing the scan.
    pub fn records_for_user<T: DailyRecord>(&self, user_ids: &[String]) -> Result<Vec<T>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = placeholder_list(user_ids.len());
        let sql = format!(
            "SELECT id, doc FROM {} WHERE user_id IN ({placeholders}) ORDER BY id ASC",
            T::COLLECTION.table()
        );
        let mut statement = self.conn.prepare(&sql)?;

        let rows = statement
            .query_map(params_from_iter(user_ids.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()
            .with_context(|| format!("Failed to query {}", T::COLLECTION.table()))?;

        let mut records = Vec::with_capacity(rows.len());
        for (id, doc) in rows {
            match serde_json::from_str::<T>(&doc) {
                Ok(record) => records.push(record),
                Err(error) => warn!(
                    collection = T::COLLECTION.table(),
                    id,
                    error = %error,
                    "skipping unreadable record document"
                ),
            }
        }

        Ok(records)
    }

    /// The existence check behind per-day uniqueness: scan the user's records
    /// and compare normalized days. A record whose stored date is unparseable
    /// never matches and is logged.
    pub fn daily_record_for_day<T: DailyRecord>(
        &self,
        user_ids: &[String],
        day: NaiveDate,
    ) -> Result<Option<T>> {
        for record in self.records_for_user::<T>(user_ids)? {
            match crate::dates::normalize(record.record_date()) {
                Some(candidate) if candidate == day => return Ok(Some(record)),
                Some(_) => {}
                None => warn!(
                    collection = T::COLLECTION.table(),
                    id = record.id(),
                    "record date unparseable, never matches any day"
                ),
            }
        }

        Ok(None)
    }

    pub fn count_active_subscriptions(&self) -> Result<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM subscriptions WHERE active = 1",
                [],
                |row| row.get(0),
            )
            .context("Failed to count active subscriptions")
    }

    pub fn table_count(&self, table: &'static str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {table}");
        self.conn
            .query_row(&sql, [], |row| row.get(0))
            .with_context(|| format!("Failed to count {table}"))
    }
}

fn placeholder_list(count: usize) -> String {
    (1..=count)
        .map(|position| format!("?{position}"))
        .collect::<Vec<_>>()
        .join(", ")
}
