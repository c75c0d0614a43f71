//! Wall-clock scheduling for daily jobs.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};

/// Next instant strictly after `now` at `hour:minute` local time.
pub fn next_run_after(now: DateTime<Utc>, hour: u32, minute: u32, offset: FixedOffset) -> DateTime<Utc> {
    let time = NaiveTime::from_hms_opt(hour.min(23), minute.min(59), 0).unwrap_or_default();
    let local_date = now.with_timezone(&offset).date_naive();

    let at = |date: chrono::NaiveDate| {
        offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now)
    };

    let today = at(local_date);
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// How long to wait from `now` until `at`. Zero if already past.
pub fn delay_until(now: DateTime<Utc>, at: DateTime<Utc>) -> std::time::Duration {
    (at - now).to_std().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cst() -> FixedOffset {
        FixedOffset::east_opt(8 * 3600).unwrap()
    }

    #[test]
    fn test_later_today() {
        // 00:00 UTC is 08:00 at +08:00; 08:30 local is 00:30 UTC.
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        assert_eq!(
            next_run_after(now, 8, 30, cst()),
            Utc.with_ymd_and_hms(2026, 3, 2, 0, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_already_passed_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 0, 30, 0).unwrap();
        assert_eq!(
            next_run_after(now, 8, 30, cst()),
            Utc.with_ymd_and_hms(2026, 3, 3, 0, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_local_date_differs_from_utc_date() {
        // 20:00 UTC on 03-02 is 04:00 on 03-03 locally.
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 20, 0, 0).unwrap();
        assert_eq!(
            next_run_after(now, 6, 0, cst()),
            Utc.with_ymd_and_hms(2026, 3, 2, 22, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_delay_never_negative() {
        let now = Utc.with_ymd_and_hms(2026, 3, 2, 1, 0, 0).unwrap();
        let past = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap();
        assert_eq!(delay_until(now, past), std::time::Duration::ZERO);
        assert_eq!(delay_until(past, now).as_secs(), 3600);
    }
}
