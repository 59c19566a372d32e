use crate::dates::{self, RecordDate};
use crate::db::{Database, DailyRecord};
use crate::model::{
    Burned, Consumed, DailyStatistic, FoodIntake, NetBalance, SleepTracking, WaterIntake,
    WorkoutProgress, round2, round3,
};
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};

/// Recomputes the derived daily statistic for (user, day) from the four
/// source families.
///
/// Never creates a statistic: if none was provisioned for the day the call
/// is a no-op and returns `None`. Each source defaults to zero contribution
/// when missing or unreadable, so a partial statistic still lands.
pub fn recalculate(
    db: &Database,
    user_ids: &[String],
    day: NaiveDate,
) -> Result<Option<DailyStatistic>> {
    let Some(mut statistic) = db.daily_record_for_day::<DailyStatistic>(user_ids, day)? else {
        debug!(day = %day, "no daily statistic provisioned, recalculation skipped");
        return Ok(None);
    };

    let water = read_source::<WaterIntake>(db, user_ids, day);
    let food = read_source::<FoodIntake>(db, user_ids, day);
    let workout = read_source::<WorkoutProgress>(db, user_ids, day);
    let sleep = read_source::<SleepTracking>(db, user_ids, day);

    let food_totals = food.map(|intake| intake.totals).unwrap_or_default();
    let consumed = Consumed {
        hydration: round3(water.map(|intake| intake.total_liters).unwrap_or_default()),
        calories: round2(food_totals.calories),
        proteins: round2(food_totals.proteins),
        carbohydrates: round2(food_totals.carbohydrates),
        fats: round2(food_totals.fats),
    };

    let workout_burned = workout
        .as_ref()
        .map(|progress| progress.burned)
        .unwrap_or_default();
    let burned = Burned {
        calories: round2(workout_burned.calories),
        proteins: round2(workout_burned.proteins),
        carbohydrates: round2(workout_burned.carbohydrates),
        fats: round2(workout_burned.fats),
        water_loss: round3(workout_burned.water_loss),
    };

    // Net only covers dimensions with a burn counterpart; hydration nets the
    // workout water loss against water consumed.
    let net = NetBalance {
        hydration: round3(consumed.hydration - burned.water_loss),
        calories: round2(consumed.calories - burned.calories),
        proteins: round2(consumed.proteins - burned.proteins),
        carbohydrates: round2(consumed.carbohydrates - burned.carbohydrates),
        fats: round2(consumed.fats - burned.fats),
    };

    statistic.consumed = consumed;
    statistic.burned = burned;
    statistic.net = net;
    statistic.hours_slept = round2(
        sleep
            .map(|tracking| tracking.total_hours)
            .unwrap_or_default(),
    );
    statistic.workout_completed = workout
        .map(|progress| progress.completed)
        .unwrap_or_default();
    statistic.updated_at = Utc::now().to_rfc3339();
    // plan_targets stays as provisioned; it is a creation-time snapshot.

    db.save_record(&statistic)?;

    Ok(Some(statistic))
}

/// Resolves the record's owner to the full identifier set and recalculates,
/// absorbing every failure. Mutation endpoints call this after their own
/// write has committed; a failed recalculation never rolls that write back.
pub fn trigger_recalculation(db: &Database, user_id: &str, date: &RecordDate) {
    let Some(day) = dates::normalize(date) else {
        warn!(user = %user_id, "record date unparseable, recalculation skipped");
        return;
    };

    let identifiers = match db.user_by_identifier(user_id) {
        Ok(Some(user)) => user.identifier_set(),
        Ok(None) => vec![user_id.to_string()],
        Err(error) => {
            warn!(user = %user_id, error = %error, "user lookup failed, using record owner only");
            vec![user_id.to_string()]
        }
    };

    if let Err(error) = recalculate(db, &identifiers, day) {
        warn!(user = %user_id, day = %day, error = %error, "statistics recalculation failed");
    }
}

/// One source family read; failure degrades to zero contribution.
fn read_source<T: DailyRecord>(db: &Database, user_ids: &[String], day: NaiveDate) -> Option<T> {
    match db.daily_record_for_day::<T>(user_ids, day) {
        Ok(found) => found,
        Err(error) => {
            warn!(
                collection = T::COLLECTION.table(),
                error = %error,
                "source read failed, defaulting to zero contribution"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::recalculate;
    use crate::db::Database;
    use crate::model::{
        ExertionRates, FoodEntry, Meal, NutrientTotals, Plan, PlanTargets, WaterLog,
    };
    use crate::provision;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn open_test_db() -> (TempDir, Database) {
        let dir = TempDir::new().expect("temp dir");
        let database = Database::open(&dir.path().join("vitatrack.db")).expect("open db");
        (dir, database)
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date")
    }

    fn plan() -> Plan {
        Plan {
            id: "plan-1".to_string(),
            name: "Base plan".to_string(),
            targets: PlanTargets {
                calories: 2200.0,
                proteins: 120.0,
                carbohydrates: 250.0,
                fats: 70.0,
                hydration_liters: 2.5,
                sleep_hours: 8.0,
            },
            routine_id: None,
        }
    }

    fn ids() -> Vec<String> {
        vec!["uid-casey".to_string()]
    }

    /// Statistic skeleton plus the four sources, shaped like a provisioned day.
    fn seed_full_day(db: &Database) {
        let plan = plan();
        db.insert_record(&provision::statistic_skeleton("uid-casey", &plan, day()))
            .expect("statistic skeleton");

        let mut water = provision::water_skeleton("uid-casey", &plan, day());
        water.logs.push(WaterLog {
            at: "2024-03-05T09:00:00Z".to_string(),
            liters: 2.0,
        });
        water.recompute_total();
        db.insert_record(&water).expect("water record");

        let mut food = provision::food_skeleton("uid-casey", &plan, day());
        food.meals.push(Meal {
            name: "Day's meals".to_string(),
            at: "2024-03-05T12:00:00Z".to_string(),
            entries: vec![FoodEntry {
                name: "Everything".to_string(),
                calories: 1800.0,
                proteins: 90.0,
                carbohydrates: 200.0,
                fats: 60.0,
            }],
            totals: NutrientTotals::default(),
        });
        for meal in &mut food.meals {
            meal.recompute_totals();
        }
        food.recompute_totals();
        db.insert_record(&food).expect("food record");

        let mut workout = provision::workout_skeleton("uid-casey", None, day(), "Tuesday");
        workout.burned = ExertionRates {
            calories: 300.0,
            proteins: 10.0,
            carbohydrates: 30.0,
            fats: 5.0,
            water_loss: 0.3,
        };
        workout.completed = true;
        db.insert_record(&workout).expect("workout record");

        let mut sleep = provision::sleep_skeleton("uid-casey", &plan, day());
        sleep.total_hours = 7.5;
        db.insert_record(&sleep).expect("sleep record");
    }

    #[test]
    fn aggregates_all_four_sources() {
        let (_dir, db) = open_test_db();
        seed_full_day(&db);

        let statistic = recalculate(&db, &ids(), day())
            .expect("recalculate")
            .expect("statistic updated");

        assert_eq!(statistic.consumed.hydration, 2.0);
        assert_eq!(statistic.consumed.calories, 1800.0);
        assert_eq!(statistic.burned.calories, 300.0);
        assert_eq!(statistic.burned.water_loss, 0.3);
        assert_eq!(statistic.net.calories, 1500.0);
        assert_eq!(statistic.net.hydration, 1.7);
        assert_eq!(statistic.net.proteins, 80.0);
        assert_eq!(statistic.hours_slept, 7.5);
        assert!(statistic.workout_completed);
    }

    #[test]
    fn missing_food_defaults_to_zero_without_touching_other_dimensions() {
        let (_dir, db) = open_test_db();
        let plan = plan();
        db.insert_record(&provision::statistic_skeleton("uid-casey", &plan, day()))
            .expect("statistic skeleton");

        let mut water = provision::water_skeleton("uid-casey", &plan, day());
        water.logs.push(WaterLog {
            at: "2024-03-05T09:00:00Z".to_string(),
            liters: 1.2,
        });
        water.recompute_total();
        db.insert_record(&water).expect("water record");

        let statistic = recalculate(&db, &ids(), day())
            .expect("recalculate")
            .expect("statistic updated");

        assert_eq!(statistic.consumed.calories, 0.0);
        assert_eq!(statistic.consumed.proteins, 0.0);
        assert_eq!(statistic.consumed.hydration, 1.2);
        assert_eq!(statistic.net.hydration, 1.2);
        assert_eq!(statistic.hours_slept, 0.0);
        assert!(!statistic.workout_completed);
    }

    #[test]
    fn never_creates_a_missing_statistic() {
        let (_dir, db) = open_test_db();

        let result = recalculate(&db, &ids(), day()).expect("recalculate");

        assert!(result.is_none());
        assert_eq!(db.table_count("daily_statistics").expect("count"), 0);
    }

    #[test]
    fn plan_target_snapshot_survives_recalculation() {
        let (_dir, db) = open_test_db();
        seed_full_day(&db);

        let statistic = recalculate(&db, &ids(), day())
            .expect("recalculate")
            .expect("statistic updated");

        assert_eq!(statistic.plan_targets.calories, 2200.0);
        assert_eq!(statistic.plan_targets.hydration_liters, 2.5);
    }

    #[test]
    fn statistic_matches_even_when_sources_use_other_identifiers() {
        let (_dir, db) = open_test_db();
        let plan = plan();
        db.insert_record(&provision::statistic_skeleton("uid-casey", &plan, day()))
            .expect("statistic skeleton");

        // Water logged under the legacy email identifier.
        let mut water = provision::water_skeleton("casey@example.com", &plan, day());
        water.logs.push(WaterLog {
            at: "2024-03-05T09:00:00Z".to_string(),
            liters: 0.5,
        });
        water.recompute_total();
        db.insert_record(&water).expect("water record");

        let identifiers = vec!["uid-casey".to_string(), "casey@example.com".to_string()];
        let statistic = recalculate(&db, &identifiers, day())
            .expect("recalculate")
            .expect("statistic updated");

        assert_eq!(statistic.consumed.hydration, 0.5);
    }
}
