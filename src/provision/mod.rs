use crate::dates::{self, RecordDate};
use crate::db::{Database, DailyRecord, new_record_id};
use crate::model::{
    Burned, Consumed, DailyStatistic, ExerciseEntry, ExertionRates, FoodIntake, NetBalance,
    NutrientTotals, Plan, Routine, SleepTracking, User, WaterIntake, WorkoutProgress,
};
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

#[derive(Debug, Default, Serialize)]
pub struct ProvisionSummary {
    pub day: String,
    pub users_seen: usize,
    pub users_skipped: usize,
    pub users_failed: usize,
    pub records_created: usize,
    pub families_failed: usize,
}

/// One provisioning run: ensure each user with an active subscription has one
/// record per family for `today`. A failure for one user never aborts the
/// run for the others.
pub fn run_provisioning(db: &Database, today: NaiveDate) -> Result<ProvisionSummary> {
    let day_name = dates::weekday_name(today);
    let users = db.list_users().context("Failed to enumerate users")?;

    let mut summary = ProvisionSummary {
        day: today.format("%Y-%m-%d").to_string(),
        ..ProvisionSummary::default()
    };

    for user in &users {
        summary.users_seen += 1;

        match provision_user(db, user, today, day_name) {
            Ok(None) => summary.users_skipped += 1,
            Ok(Some(outcome)) => {
                summary.records_created += outcome.created;
                summary.families_failed += outcome.failed;
                if outcome.failed > 0 {
                    summary.users_failed += 1;
                }
            }
            Err(error) => {
                summary.users_failed += 1;
                warn!(user = %user.uid, error = %error, "provisioning failed for user");
            }
        }
    }

    info!(
        day = %summary.day,
        users = summary.users_seen,
        skipped = summary.users_skipped,
        created = summary.records_created,
        failed = summary.users_failed,
        "provisioning run complete"
    );

    Ok(summary)
}

pub struct UserOutcome {
    pub created: usize,
    pub failed: usize,
}

/// Per-user provisioning, free of scheduling concerns so the manual trigger
/// and the scheduler share it. `None` means the user was skipped entirely
/// (no active subscription, or its plan is gone).
pub fn provision_user(
    db: &Database,
    user: &User,
    today: NaiveDate,
    day_name: &str,
) -> Result<Option<UserOutcome>> {
    let identifiers = user.identifier_set();

    let Some(subscription) = db.active_subscription_for(&identifiers)? else {
        debug!(user = %user.uid, "no active subscription, user skipped");
        return Ok(None);
    };

    let Some(plan) = db.plan_by_id(&subscription.plan_id)? else {
        warn!(
            user = %user.uid,
            plan = %subscription.plan_id,
            "subscribed plan missing, user skipped"
        );
        return Ok(None);
    };

    // Routine absence is tolerated; the workout skeleton just has no exercises.
    let routine = match plan.routine_id.as_deref() {
        Some(routine_id) => {
            let found = db.routine_by_id(routine_id)?;
            if found.is_none() {
                warn!(user = %user.uid, routine = %routine_id, "plan routine missing");
            }
            found
        }
        None => None,
    };

    let outcomes = [
        (
            "workout_progress",
            ensure_record(db, &identifiers, today, || {
                workout_skeleton(&user.uid, routine.as_ref(), today, day_name)
            }),
        ),
        (
            "water_intake",
            ensure_record(db, &identifiers, today, || {
                water_skeleton(&user.uid, &plan, today)
            }),
        ),
        (
            "food_intake",
            ensure_record(db, &identifiers, today, || {
                food_skeleton(&user.uid, &plan, today)
            }),
        ),
        (
            "sleep_tracking",
            ensure_record(db, &identifiers, today, || {
                sleep_skeleton(&user.uid, &plan, today)
            }),
        ),
        (
            "daily_statistics",
            ensure_record(db, &identifiers, today, || {
                statistic_skeleton(&user.uid, &plan, today)
            }),
        ),
    ];

    let mut outcome = UserOutcome {
        created: 0,
        failed: 0,
    };
    for (family, result) in outcomes {
        match result {
            Ok(true) => {
                outcome.created += 1;
                info!(user = %user.uid, family, "daily record provisioned");
            }
            Ok(false) => debug!(user = %user.uid, family, "daily record already present"),
            Err(error) => {
                outcome.failed += 1;
                warn!(user = %user.uid, family, error = %error, "family provisioning failed");
            }
        }
    }

    Ok(Some(outcome))
}

/// Idempotency check + insert for one family. `true` means a record was
/// created, `false` that one already existed for the day.
fn ensure_record<T, F>(
    db: &Database,
    identifiers: &[String],
    today: NaiveDate,
    build: F,
) -> Result<bool>
where
    T: DailyRecord,
    F: FnOnce() -> T,
{
    if db.daily_record_for_day::<T>(identifiers, today)?.is_some() {
        return Ok(false);
    }

    db.insert_record(&build())?;
    Ok(true)
}

pub fn workout_skeleton(
    uid: &str,
    routine: Option<&Routine>,
    today: NaiveDate,
    day_name: &str,
) -> WorkoutProgress {
    let exercises = routine
        .and_then(|routine| routine.days.get(day_name))
        .map(|planned| {
            planned
                .iter()
                .map(|exercise| ExerciseEntry {
                    exercise_id: exercise.exercise_id.clone(),
                    name: exercise.name.clone(),
                    target_sets: exercise.sets,
                    target_reps: exercise.reps,
                    sets_completed: 0,
                    reps_per_set: Vec::new(),
                    burned: ExertionRates::default(),
                    completed: false,
                })
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    let total_count = exercises.len() as u32;

    WorkoutProgress {
        id: new_record_id(),
        user_id: uid.to_string(),
        date: RecordDate::from_day(today),
        day_of_week: day_name.to_string(),
        exercises,
        burned: ExertionRates::default(),
        completed_count: 0,
        total_count,
        completion_percent: 0.0,
        completed: false,
        updated_at: Utc::now().to_rfc3339(),
    }
}

pub fn water_skeleton(uid: &str, plan: &Plan, today: NaiveDate) -> WaterIntake {
    WaterIntake {
        id: new_record_id(),
        user_id: uid.to_string(),
        date: RecordDate::from_day(today),
        logs: Vec::new(),
        total_liters: 0.0,
        target_liters: plan.targets.hydration_liters,
        updated_at: Utc::now().to_rfc3339(),
    }
}

pub fn food_skeleton(uid: &str, plan: &Plan, today: NaiveDate) -> FoodIntake {
    FoodIntake {
        id: new_record_id(),
        user_id: uid.to_string(),
        date: RecordDate::from_day(today),
        meals: Vec::new(),
        totals: NutrientTotals::default(),
        targets: NutrientTotals {
            calories: plan.targets.calories,
            proteins: plan.targets.proteins,
            carbohydrates: plan.targets.carbohydrates,
            fats: plan.targets.fats,
        },
        updated_at: Utc::now().to_rfc3339(),
    }
}

pub fn sleep_skeleton(uid: &str, plan: &Plan, today: NaiveDate) -> SleepTracking {
    SleepTracking {
        id: new_record_id(),
        user_id: uid.to_string(),
        date: RecordDate::from_day(today),
        bed_time: None,
        wake_time: None,
        total_hours: 0.0,
        quality: None,
        target_hours: plan.targets.sleep_hours,
        updated_at: Utc::now().to_rfc3339(),
    }
}

pub fn statistic_skeleton(uid: &str, plan: &Plan, today: NaiveDate) -> DailyStatistic {
    let now = Utc::now().to_rfc3339();

    DailyStatistic {
        id: new_record_id(),
        user_id: uid.to_string(),
        date: RecordDate::from_day(today),
        consumed: Consumed::default(),
        burned: Burned::default(),
        net: NetBalance::default(),
        hours_slept: 0.0,
        workout_completed: false,
        plan_targets: plan.targets,
        created_at: now.clone(),
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::{run_provisioning, workout_skeleton};
    use crate::db::{Database, DailyCollection};
    use crate::model::{
        DailyStatistic, ExertionRates, Plan, PlanTargets, Routine, RoutineExercise, Subscription,
        User, WorkoutProgress,
    };
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn open_test_db() -> (TempDir, Database) {
        let dir = TempDir::new().expect("temp dir");
        let database = Database::open(&dir.path().join("vitatrack.db")).expect("open db");
        (dir, database)
    }

    fn targets() -> PlanTargets {
        PlanTargets {
            calories: 2200.0,
            proteins: 120.0,
            carbohydrates: 250.0,
            fats: 70.0,
            hydration_liters: 2.5,
            sleep_hours: 8.0,
        }
    }

    fn seed_user_with_plan(db: &Database, uid: &str, email: &str, routine_id: Option<&str>) {
        db.insert_user(&User {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: None,
            created_at: "2024-03-01T00:00:00Z".to_string(),
        })
        .expect("insert user");

        let plan_id = format!("plan-{uid}");
        db.insert_plan(&Plan {
            id: plan_id.clone(),
            name: "Base plan".to_string(),
            targets: targets(),
            routine_id: routine_id.map(str::to_string),
        })
        .expect("insert plan");

        db.insert_subscription(&Subscription {
            id: format!("sub-{uid}"),
            user_id: uid.to_string(),
            plan_id,
            starts_on: "2024-03-01".to_string(),
            ends_on: None,
            active: true,
        })
        .expect("insert subscription");
    }

    fn seed_routine(db: &Database, id: &str) {
        let mut days = BTreeMap::new();
        days.insert(
            "Tuesday".to_string(),
            vec![
                RoutineExercise {
                    exercise_id: "ex-squat".to_string(),
                    name: "Squat".to_string(),
                    sets: 3,
                    reps: 8,
                    rest_seconds: 90,
                    per_set: ExertionRates::default(),
                },
                RoutineExercise {
                    exercise_id: "ex-bench".to_string(),
                    name: "Bench press".to_string(),
                    sets: 3,
                    reps: 10,
                    rest_seconds: 120,
                    per_set: ExertionRates::default(),
                },
            ],
        );

        db.insert_routine(&Routine {
            id: id.to_string(),
            name: "Strength".to_string(),
            days,
        })
        .expect("insert routine");
    }

    fn day() -> NaiveDate {
        // A Tuesday.
        NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date")
    }

    #[test]
    fn provisioning_is_idempotent_across_runs() {
        let (_dir, db) = open_test_db();
        seed_routine(&db, "routine-1");
        seed_user_with_plan(&db, "uid-casey", "casey@example.com", Some("routine-1"));

        let first = run_provisioning(&db, day()).expect("first run");
        assert_eq!(first.records_created, 5);
        assert_eq!(first.users_failed, 0);

        let second = run_provisioning(&db, day()).expect("second run");
        assert_eq!(second.records_created, 0);
        assert_eq!(second.users_skipped, 0);

        for collection in DailyCollection::ALL {
            assert_eq!(
                db.table_count(collection.table()).expect("count"),
                1,
                "exactly one record in {}",
                collection.table()
            );
        }
    }

    #[test]
    fn users_without_active_subscription_get_nothing() {
        let (_dir, db) = open_test_db();
        db.insert_user(&User {
            uid: "uid-noplan".to_string(),
            email: "noplan@example.com".to_string(),
            display_name: None,
            created_at: "2024-03-01T00:00:00Z".to_string(),
        })
        .expect("insert user");

        let summary = run_provisioning(&db, day()).expect("run");

        assert_eq!(summary.users_seen, 1);
        assert_eq!(summary.users_skipped, 1);
        assert_eq!(summary.records_created, 0);
        for collection in DailyCollection::ALL {
            assert_eq!(db.table_count(collection.table()).expect("count"), 0);
        }
    }

    #[test]
    fn dangling_plan_skips_the_user_without_aborting_the_run() {
        let (_dir, db) = open_test_db();
        seed_user_with_plan(&db, "uid-ok", "ok@example.com", None);

        // Subscribed to a plan that no longer exists.
        db.insert_user(&User {
            uid: "uid-dangling".to_string(),
            email: "dangling@example.com".to_string(),
            display_name: None,
            created_at: "2024-03-01T00:00:00Z".to_string(),
        })
        .expect("insert user");
        db.insert_subscription(&Subscription {
            id: "sub-dangling".to_string(),
            user_id: "uid-dangling".to_string(),
            plan_id: "plan-gone".to_string(),
            starts_on: "2024-03-01".to_string(),
            ends_on: None,
            active: true,
        })
        .expect("insert subscription");

        let summary = run_provisioning(&db, day()).expect("run");

        assert_eq!(summary.users_seen, 2);
        assert_eq!(summary.records_created, 5);
        assert_eq!(summary.users_skipped, 1);
    }

    #[test]
    fn workout_skeleton_enumerates_the_weekday_routine() {
        let (_dir, db) = open_test_db();
        seed_routine(&db, "routine-1");
        let routine = db.routine_by_id("routine-1").expect("query").expect("routine");

        let skeleton = workout_skeleton("uid-casey", Some(&routine), day(), "Tuesday");

        assert_eq!(skeleton.day_of_week, "Tuesday");
        assert_eq!(skeleton.total_count, 2);
        assert_eq!(skeleton.exercises[0].name, "Squat");
        assert_eq!(skeleton.exercises[0].sets_completed, 0);
        assert!(!skeleton.completed);

        let off_day = workout_skeleton("uid-casey", Some(&routine), day(), "Wednesday");
        assert!(off_day.exercises.is_empty());
    }

    #[test]
    fn statistic_skeleton_snapshots_plan_targets() {
        let (_dir, db) = open_test_db();
        seed_user_with_plan(&db, "uid-casey", "casey@example.com", None);

        run_provisioning(&db, day()).expect("run");

        let statistic = db
            .daily_record_for_day::<DailyStatistic>(&["uid-casey".to_string()], day())
            .expect("scan")
            .expect("statistic provisioned");

        assert_eq!(statistic.plan_targets.calories, 2200.0);
        assert_eq!(statistic.plan_targets.sleep_hours, 8.0);
        assert_eq!(statistic.consumed.calories, 0.0);
        assert!(!statistic.workout_completed);
    }

    #[test]
    fn legacy_email_keyed_record_blocks_duplicate_creation() {
        let (_dir, db) = open_test_db();
        seed_user_with_plan(&db, "uid-casey", "casey@example.com", None);

        // A workout written under the email identifier before uid keying.
        let legacy = WorkoutProgress {
            user_id: "casey@example.com".to_string(),
            ..workout_skeleton("casey@example.com", None, day(), "Tuesday")
        };
        db.insert_record(&legacy).expect("insert legacy record");

        let summary = run_provisioning(&db, day()).expect("run");

        // Only the other four families get records.
        assert_eq!(summary.records_created, 4);
        assert_eq!(db.table_count("workout_progress").expect("count"), 1);
    }
}
