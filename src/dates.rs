use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// A date as it appears on stored records. Newer write paths persist ISO-8601
/// strings; older ones persisted structured epoch-seconds timestamps, under
/// either field spelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordDate {
    Text(String),
    Epoch(EpochTimestamp),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochTimestamp {
    #[serde(alias = "_seconds")]
    pub seconds: i64,
}

impl RecordDate {
    pub fn from_day(day: NaiveDate) -> Self {
        Self::Text(day.format("%Y-%m-%d").to_string())
    }
}

/// Canonical calendar day (UTC) for any accepted date representation.
///
/// `None` means the value is unparseable and must never compare equal to a
/// real day. This is the single day-equality rule for records written by
/// different paths.
pub fn normalize(value: &RecordDate) -> Option<NaiveDate> {
    match value {
        RecordDate::Text(raw) => normalize_text(raw),
        RecordDate::Epoch(timestamp) => {
            DateTime::from_timestamp(timestamp.seconds, 0).map(|moment| moment.date_naive())
        }
    }
}

pub fn normalize_text(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();

    if let Ok(moment) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(moment.with_timezone(&Utc).date_naive());
    }

    // Offset-less datetimes are treated as UTC.
    if let Ok(moment) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(moment.date());
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}

pub fn weekday_name(day: NaiveDate) -> &'static str {
    match day.weekday() {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::{EpochTimestamp, RecordDate, normalize, weekday_name};
    use chrono::NaiveDate;

    fn day(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn iso_datetimes_normalize_to_the_utc_day() {
        let morning = RecordDate::Text("2024-03-05T10:00:00Z".to_string());
        let midnight_edge = RecordDate::Text("2024-03-05T23:59:59Z".to_string());

        assert_eq!(normalize(&morning), Some(day(2024, 3, 5)));
        assert_eq!(normalize(&midnight_edge), Some(day(2024, 3, 5)));
    }

    #[test]
    fn epoch_seconds_match_the_equivalent_iso_day() {
        // Noon UTC on 2024-03-05.
        let timestamp = RecordDate::Epoch(EpochTimestamp {
            seconds: 1_709_640_000,
        });

        assert_eq!(normalize(&timestamp), Some(day(2024, 3, 5)));
        assert_eq!(
            normalize(&timestamp),
            normalize(&RecordDate::Text("2024-03-05T10:00:00Z".to_string()))
        );
    }

    #[test]
    fn epoch_field_accepts_underscore_spelling() {
        let record: RecordDate =
            serde_json::from_str(r#"{"_seconds": 1709640000}"#).expect("legacy spelling parses");

        assert_eq!(normalize(&record), Some(day(2024, 3, 5)));
    }

    #[test]
    fn offset_datetimes_convert_to_utc() {
        // 01:30+05:00 is still the previous UTC day.
        let offset = RecordDate::Text("2024-03-05T01:30:00+05:00".to_string());

        assert_eq!(normalize(&offset), Some(day(2024, 3, 4)));
    }

    #[test]
    fn plain_dates_and_naive_datetimes_parse() {
        assert_eq!(
            normalize(&RecordDate::Text("2024-03-05".to_string())),
            Some(day(2024, 3, 5))
        );
        assert_eq!(
            normalize(&RecordDate::Text("2024-03-05T08:15:00".to_string())),
            Some(day(2024, 3, 5))
        );
    }

    #[test]
    fn garbage_never_matches_any_day() {
        let broken = RecordDate::Text("not-a-date".to_string());

        assert_eq!(normalize(&broken), None);
        assert_ne!(normalize(&broken), Some(day(2024, 3, 5)));
    }

    #[test]
    fn weekday_names_are_english() {
        assert_eq!(weekday_name(day(2024, 3, 4)), "Monday");
        assert_eq!(weekday_name(day(2024, 3, 10)), "Sunday");
    }
}
