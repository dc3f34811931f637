//! Window arithmetic for subscription quotas
//!
//! A window is the half-open interval `[period_start, period_end)` in unix
//! seconds. Hourly windows start at the top of the hour and daily windows at
//! midnight, both in the timezone of the `now` they are computed from
//! (`chrono::Local` in production). The persisted counters live in
//! [`crate::db`]; this module only decides which period a moment belongs to.

use chrono::{DateTime, Duration, NaiveDateTime, Offset, TimeZone, Timelike};

use crate::types::{LimitStatus, WindowKind};

/// Bounds `(period_start, period_end)` of the `kind` window containing `now`.
pub fn window_bounds<Tz: TimeZone>(kind: WindowKind, now: &DateTime<Tz>) -> (i64, i64) {
    let local = now.naive_local();
    let tz = now.timezone();
    match kind {
        WindowKind::Hourly => {
            let naive_start = local
                .date()
                .and_hms_opt(local.hour(), 0, 0)
                .unwrap_or(local);
            let start = resolve(&tz, naive_start, now);
            (start, start + Duration::hours(1).num_seconds())
        }
        WindowKind::Daily => {
            let today = local.date();
            let tomorrow = today.succ_opt().unwrap_or(today);
            let start = resolve(&tz, today.and_time(chrono::NaiveTime::MIN), now);
            let end = resolve(&tz, tomorrow.and_time(chrono::NaiveTime::MIN), now);
            // 23h and 25h days come out right because both ends are resolved separately
            if end > start {
                (start, end)
            } else {
                (start, start + Duration::days(1).num_seconds())
            }
        }
    }
}

/// Map a wall-clock time to a unix timestamp, falling back to `now`'s offset
/// when the time falls into a DST gap.
fn resolve<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime, now: &DateTime<Tz>) -> i64 {
    match tz.from_local_datetime(&naive).earliest() {
        Some(dt) => dt.timestamp(),
        None => (naive - now.offset().fix()).and_utc().timestamp(),
    }
}

/// Build the quota status for the given usage.
///
/// Downloads are allowed only while both windows are strictly below their limit.
pub fn limit_status(
    hourly_used: i64,
    hourly_limit: i64,
    daily_used: i64,
    daily_limit: i64,
) -> LimitStatus {
    LimitStatus {
        hourly_used,
        hourly_limit,
        daily_used,
        daily_limit,
        can_download: hourly_used < hourly_limit && daily_used < daily_limit,
    }
}

/// Number of tasks a run may still start, never negative.
pub fn remaining_budget(status: &LimitStatus) -> i64 {
    let hourly = status.hourly_limit - status.hourly_used;
    let daily = status.daily_limit - status.daily_used;
    hourly.min(daily).max(0)
}
