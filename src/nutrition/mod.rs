use crate::db::Database;
use crate::model::{ExerciseEntry, ExertionRates, round2, round3};
use anyhow::Result;
use tracing::debug;

/// Fills in the burn dimensions of an exercise entry from the catalog's
/// per-set baseline, scaled by the volume actually performed.
///
/// Caller-supplied values win: an entry that already carries a positive
/// calorie burn is returned unchanged. So is an entry whose exercise has no
/// catalog record.
pub fn apply_exertion(db: &Database, mut entry: ExerciseEntry) -> Result<ExerciseEntry> {
    if entry.burned.calories > 0.0 {
        return Ok(entry);
    }

    let Some(exercise) = db.exercise_by_id(&entry.exercise_id)? else {
        debug!(
            exercise_id = %entry.exercise_id,
            "no catalog record, exertion left unpopulated"
        );
        return Ok(entry);
    };

    let factor = reps_factor(&entry, exercise.default_reps);
    let sets = f64::from(entry.sets_completed);

    entry.burned = ExertionRates {
        calories: round2(exercise.per_set.calories * sets * factor),
        proteins: round2(exercise.per_set.proteins * sets * factor),
        carbohydrates: round2(exercise.per_set.carbohydrates * sets * factor),
        fats: round2(exercise.per_set.fats * sets * factor),
        water_loss: round3(exercise.per_set.water_loss * sets * factor),
    };

    Ok(entry)
}

/// Average reps performed per completed set over the catalog default. Zero
/// completed sets contribute zero burn.
fn reps_factor(entry: &ExerciseEntry, default_reps: u32) -> f64 {
    if entry.sets_completed == 0 || default_reps == 0 {
        return 0.0;
    }

    let performed: u32 = entry
        .reps_per_set
        .iter()
        .take(entry.sets_completed as usize)
        .sum();
    let average = f64::from(performed) / f64::from(entry.sets_completed);

    average / f64::from(default_reps)
}
