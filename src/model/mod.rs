use crate::dates::RecordDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    pub created_at: String,
}

impl User {
    /// Identifiers this user's records may have been written under. Older
    /// write paths keyed records by email instead of uid.
    pub fn identifier_set(&self) -> Vec<String> {
        let mut identifiers = vec![self.uid.clone()];
        if !self.email.is_empty() && self.email != self.uid {
            identifiers.push(self.email.clone());
        }
        identifiers
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanTargets {
    pub calories: f64,
    pub proteins: f64,
    pub carbohydrates: f64,
    pub fats: f64,
    pub hydration_liters: f64,
    pub sleep_hours: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub targets: PlanTargets,
    #[serde(default)]
    pub routine_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    pub id: String,
    pub user_id: String,
    pub plan_id: String,
    pub starts_on: String,
    #[serde(default)]
    pub ends_on: Option<String>,
    pub active: bool,
}

/// Per-set exertion baseline: what one set costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExertionRates {
    pub calories: f64,
    pub proteins: f64,
    pub carbohydrates: f64,
    pub fats: f64,
    pub water_loss: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub default_reps: u32,
    pub per_set: ExertionRates,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineExercise {
    pub exercise_id: String,
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    #[serde(default)]
    pub rest_seconds: u32,
    #[serde(default)]
    pub per_set: ExertionRates,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Routine {
    pub id: String,
    pub name: String,
    /// Weekday name ("Monday".."Sunday") to that day's ordered exercises.
    #[serde(default)]
    pub days: BTreeMap<String, Vec<RoutineExercise>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExerciseEntry {
    pub exercise_id: String,
    pub name: String,
    pub target_sets: u32,
    pub target_reps: u32,
    #[serde(default)]
    pub sets_completed: u32,
    #[serde(default)]
    pub reps_per_set: Vec<u32>,
    #[serde(default)]
    pub burned: ExertionRates,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkoutProgress {
    pub id: String,
    pub user_id: String,
    pub date: RecordDate,
    pub day_of_week: String,
    pub exercises: Vec<ExerciseEntry>,
    pub burned: ExertionRates,
    pub completed_count: u32,
    pub total_count: u32,
    pub completion_percent: f64,
    pub completed: bool,
    pub updated_at: String,
}

impl WorkoutProgress {
    /// Re-derives running totals from the exercise entries.
    pub fn recompute_totals(&mut self) {
        let mut burned = ExertionRates::default();
        let mut completed_count = 0;

        for entry in &self.exercises {
            burned.calories += entry.burned.calories;
            burned.proteins += entry.burned.proteins;
            burned.carbohydrates += entry.burned.carbohydrates;
            burned.fats += entry.burned.fats;
            burned.water_loss += entry.burned.water_loss;
            if entry.completed {
                completed_count += 1;
            }
        }

        self.burned = ExertionRates {
            calories: round2(burned.calories),
            proteins: round2(burned.proteins),
            carbohydrates: round2(burned.carbohydrates),
            fats: round2(burned.fats),
            water_loss: round3(burned.water_loss),
        };
        self.completed_count = completed_count;
        self.total_count = self.exercises.len() as u32;
        self.completion_percent = if self.total_count == 0 {
            0.0
        } else {
            round2(f64::from(completed_count) / f64::from(self.total_count) * 100.0)
        };
        self.completed = self.total_count > 0 && completed_count == self.total_count;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterLog {
    pub at: String,
    pub liters: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterIntake {
    pub id: String,
    pub user_id: String,
    pub date: RecordDate,
    pub logs: Vec<WaterLog>,
    pub total_liters: f64,
    pub target_liters: f64,
    pub updated_at: String,
}

impl WaterIntake {
    pub fn recompute_total(&mut self) {
        self.total_liters = round3(self.logs.iter().map(|log| log.liters).sum());
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientTotals {
    pub calories: f64,
    pub proteins: f64,
    pub carbohydrates: f64,
    pub fats: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodEntry {
    pub name: String,
    pub calories: f64,
    pub proteins: f64,
    pub carbohydrates: f64,
    pub fats: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meal {
    pub name: String,
    pub at: String,
    pub entries: Vec<FoodEntry>,
    #[serde(default)]
    pub totals: NutrientTotals,
}

impl Meal {
    pub fn recompute_totals(&mut self) {
        self.totals = NutrientTotals {
            calories: round2(self.entries.iter().map(|entry| entry.calories).sum()),
            proteins: round2(self.entries.iter().map(|entry| entry.proteins).sum()),
            carbohydrates: round2(self.entries.iter().map(|entry| entry.carbohydrates).sum()),
            fats: round2(self.entries.iter().map(|entry| entry.fats).sum()),
        };
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoodIntake {
    pub id: String,
    pub user_id: String,
    pub date: RecordDate,
    pub meals: Vec<Meal>,
    pub totals: NutrientTotals,
    pub targets: NutrientTotals,
    pub updated_at: String,
}

impl FoodIntake {
    pub fn recompute_totals(&mut self) {
        self.totals = NutrientTotals {
            calories: round2(self.meals.iter().map(|meal| meal.totals.calories).sum()),
            proteins: round2(self.meals.iter().map(|meal| meal.totals.proteins).sum()),
            carbohydrates: round2(
                self.meals.iter().map(|meal| meal.totals.carbohydrates).sum(),
            ),
            fats: round2(self.meals.iter().map(|meal| meal.totals.fats).sum()),
        };
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleepTracking {
    pub id: String,
    pub user_id: String,
    pub date: RecordDate,
    #[serde(default)]
    pub bed_time: Option<String>,
    #[serde(default)]
    pub wake_time: Option<String>,
    pub total_hours: f64,
    #[serde(default)]
    pub quality: Option<String>,
    pub target_hours: f64,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Consumed {
    pub hydration: f64,
    pub calories: f64,
    pub proteins: f64,
    pub carbohydrates: f64,
    pub fats: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Burned {
    pub calories: f64,
    pub proteins: f64,
    pub carbohydrates: f64,
    pub fats: f64,
    pub water_loss: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetBalance {
    pub hydration: f64,
    pub calories: f64,
    pub proteins: f64,
    pub carbohydrates: f64,
    pub fats: f64,
}

/// Derived record. Only the recalculation engine writes it after the
/// provisioning skeleton is in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyStatistic {
    pub id: String,
    pub user_id: String,
    pub date: RecordDate,
    pub consumed: Consumed,
    pub burned: Burned,
    pub net: NetBalance,
    pub hours_slept: f64,
    pub workout_completed: bool,
    pub plan_targets: PlanTargets,
    pub created_at: String,
    pub updated_at: String,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::RecordDate;

    fn entry(completed: bool, calories: f64) -> ExerciseEntry {
        ExerciseEntry {
            exercise_id: "ex-1".to_string(),
            name: "Push-up".to_string(),
            target_sets: 3,
            target_reps: 10,
            sets_completed: if completed { 3 } else { 0 },
            reps_per_set: Vec::new(),
            burned: ExertionRates {
                calories,
                water_loss: 0.1,
                ..ExertionRates::default()
            },
            completed,
        }
    }

    fn workout(entries: Vec<ExerciseEntry>) -> WorkoutProgress {
        WorkoutProgress {
            id: "wp-1".to_string(),
            user_id: "user-1".to_string(),
            date: RecordDate::Text("2024-03-05".to_string()),
            day_of_week: "Tuesday".to_string(),
            exercises: entries,
            burned: ExertionRates::default(),
            completed_count: 0,
            total_count: 0,
            completion_percent: 0.0,
            completed: false,
            updated_at: String::new(),
        }
    }

    #[test]
    fn workout_totals_follow_entries() {
        let mut progress = workout(vec![entry(true, 37.5), entry(false, 0.0)]);
        progress.recompute_totals();

        assert_eq!(progress.burned.calories, 37.5);
        assert_eq!(progress.burned.water_loss, 0.2);
        assert_eq!(progress.completed_count, 1);
        assert_eq!(progress.total_count, 2);
        assert_eq!(progress.completion_percent, 50.0);
        assert!(!progress.completed);
    }

    #[test]
    fn workout_with_all_entries_done_is_completed() {
        let mut progress = workout(vec![entry(true, 10.0), entry(true, 12.0)]);
        progress.recompute_totals();

        assert!(progress.completed);
        assert_eq!(progress.completion_percent, 100.0);
    }

    #[test]
    fn empty_workout_is_never_completed() {
        let mut progress = workout(Vec::new());
        progress.recompute_totals();

        assert!(!progress.completed);
        assert_eq!(progress.completion_percent, 0.0);
    }

    #[test]
    fn meal_and_day_totals_roll_up() {
        let mut intake = FoodIntake {
            id: "fi-1".to_string(),
            user_id: "user-1".to_string(),
            date: RecordDate::Text("2024-03-05".to_string()),
            meals: vec![Meal {
                name: "Lunch".to_string(),
                at: "2024-03-05T12:00:00Z".to_string(),
                entries: vec![
                    FoodEntry {
                        name: "Rice".to_string(),
                        calories: 400.0,
                        proteins: 8.0,
                        carbohydrates: 88.0,
                        fats: 1.0,
                    },
                    FoodEntry {
                        name: "Chicken".to_string(),
                        calories: 300.0,
                        proteins: 40.0,
                        carbohydrates: 0.0,
                        fats: 12.0,
                    },
                ],
                totals: NutrientTotals::default(),
            }],
            totals: NutrientTotals::default(),
            targets: NutrientTotals::default(),
            updated_at: String::new(),
        };

        for meal in &mut intake.meals {
            meal.recompute_totals();
        }
        intake.recompute_totals();

        assert_eq!(intake.meals[0].totals.calories, 700.0);
        assert_eq!(intake.totals.proteins, 48.0);
        assert_eq!(intake.totals.carbohydrates, 88.0);
    }

    #[test]
    fn identifier_set_includes_email_once() {
        let user = User {
            uid: "uid-1".to_string(),
            email: "a@b.io".to_string(),
            display_name: None,
            created_at: String::new(),
        };

        assert_eq!(user.identifier_set(), vec!["uid-1", "a@b.io"]);
    }

    #[test]
    fn rounding_helpers() {
        assert_eq!(round2(37.499_9), 37.5);
        assert_eq!(round3(0.123_45), 0.123);
    }
}
