use crate::config::parse_hhmm;
use anyhow::{Context, Result, bail};
use chrono::{Days, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use std::future::Future;
use tokio::time::{Duration, sleep};
use tracing::{error, info};

const RESCHEDULE_POLL_SECONDS: u64 = 30;

pub fn cron_from_provision_time(provision_time: &str) -> Result<String> {
    let time = parse_hhmm(provision_time)?;
    Ok(format!("{} {} * * *", time.minute(), time.hour()))
}

/// Runs `task` once per UTC day at the configured time, forever. The
/// schedule is re-read every poll so config edits apply without a restart;
/// task failures are logged and never abort the loop.
pub async fn run_daily_scheduler<S, F, Fut>(mut schedule_provider: S, mut task: F) -> Result<()>
where
    S: FnMut() -> Result<String>,
    F: FnMut(NaiveDate) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut last_logged_cron = String::new();

    loop {
        let cron_expr = match schedule_provider() {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, "failed to load provisioning schedule");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        let delay = match seconds_until_next_run(&cron_expr) {
            Ok(value) => value,
            Err(error) => {
                error!(error = %error, cron = %cron_expr, "invalid provisioning cron expression");
                sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
                continue;
            }
        };

        if cron_expr != last_logged_cron {
            info!(seconds = delay.as_secs(), cron = %cron_expr, "next provisioning run set");
            last_logged_cron = cron_expr.clone();
        }

        if delay > Duration::from_secs(RESCHEDULE_POLL_SECONDS) {
            sleep(Duration::from_secs(RESCHEDULE_POLL_SECONDS)).await;
            continue;
        }

        sleep(delay).await;

        let today = Utc::now().date_naive();
        if let Err(error) = task(today).await {
            error!(error = %error, day = %today, "scheduled provisioning run failed");
        }

        sleep(Duration::from_secs(1)).await;
    }
}

/// Delay until the next daily firing of the cron expression, in UTC. The
/// calendar-day partition key is UTC, so the schedule is too.
fn seconds_until_next_run(cron_expr: &str) -> Result<Duration> {
    let target_time = parse_daily_cron_time(cron_expr)?;
    let now = Utc::now();
    let today = now.date_naive();

    let candidate = Utc.from_utc_datetime(&today.and_time(target_time));
    let next_run = if candidate > now {
        candidate
    } else {
        let tomorrow = today
            .checked_add_days(Days::new(1))
            .context("Failed to compute next schedule day")?;
        Utc.from_utc_datetime(&tomorrow.and_time(target_time))
    };

    (next_run - now)
        .to_std()
        .context("Failed to compute next execution delay")
}

fn parse_daily_cron_time(cron_expr: &str) -> Result<NaiveTime> {
    let fields = cron_expr.split_whitespace().collect::<Vec<_>>();

    if fields.len() != 5 {
        bail!("Invalid cron expression: {cron_expr}. Expected format: '<minute> <hour> * * *'");
    }

    if fields[2] != "*" || fields[3] != "*" || fields[4] != "*" {
        bail!(
            "Unsupported cron expression: {cron_expr}. Only daily format '<minute> <hour> * * *' is supported"
        );
    }

    let minute = fields[0]
        .parse::<u32>()
        .with_context(|| format!("Invalid cron minute: {}", fields[0]))?;
    let hour = fields[1]
        .parse::<u32>()
        .with_context(|| format!("Invalid cron hour: {}", fields[1]))?;

    NaiveTime::from_hms_opt(hour, minute, 0)
        .with_context(|| format!("Invalid cron time values: hour={hour}, minute={minute}"))
}

#[cfg(test)]
mod tests {
    use super::{cron_from_provision_time, seconds_until_next_run};

    #[test]
    fn cron_conversion_from_provision_time() {
        let expr = cron_from_provision_time("00:05").expect("cron expression");
        assert_eq!(expr, "5 0 * * *");
    }

    #[test]
    fn schedule_delay_is_positive_and_within_a_day() {
        let delay = seconds_until_next_run("5 0 * * *").expect("delay computed");
        assert!(delay.as_secs() > 0);
        assert!(delay.as_secs() <= 24 * 60 * 60);
    }

    #[test]
    fn rejects_non_daily_cron_expression() {
        assert!(seconds_until_next_run("*/5 * * * *").is_err());
    }

    #[test]
    fn rejects_out_of_range_time() {
        assert!(seconds_until_next_run("0 24 * * *").is_err());
    }
}
