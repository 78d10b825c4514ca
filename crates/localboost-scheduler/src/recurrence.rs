//! Next-occurrence computation for schedule templates.
//!
//! Pure functions — no I/O, no state. Given the same template, reference
//! instant, and timezone they always return the same answer, so a restart
//! recomputes identical fire times.
//!
//! All comparisons happen on UTC instants; the civil "HH:MM" only exists in
//! the business's named timezone. The result is strictly after `after` —
//! firing exactly at the reference instant schedules the following
//! occurrence, never a duplicate.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use localboost_core::types::{Frequency, ScheduleTemplate, parse_time_of_day};

/// The next instant `template` should fire strictly after `after`.
///
/// Returns `None` only for an unparseable `time_of_day`, which a
/// registry-validated template cannot have.
pub fn next_fire_time(
    template: &ScheduleTemplate,
    after: DateTime<Utc>,
    tz: Tz,
) -> Option<DateTime<Utc>> {
    let (hour, minute) = parse_time_of_day(&template.time_of_day)?;
    let start = after.with_timezone(&tz).date_naive();

    // 8 days covers a weekly rule plus a DST transition on the boundary day.
    for offset in 0..=8i64 {
        let date = start + Duration::days(offset);
        if let Frequency::Weekly { day_of_week } = template.frequency
            && date.weekday().num_days_from_sunday() != day_of_week as u32
        {
            continue;
        }
        if let Some(instant) = resolve_local(date, hour, minute, tz)
            && instant > after
        {
            return Some(instant);
        }
    }
    None
}

/// Resolve a civil date+time in `tz` to a UTC instant.
///
/// A fall-back ambiguity takes the earlier offset, so the schedule fires
/// once, not twice. A time inside the spring-forward gap shifts one hour
/// later, which lands on a valid wall-clock time in every zone with a
/// one-hour transition.
fn resolve_local(date: NaiveDate, hour: u32, minute: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => {
            let shifted = naive + Duration::hours(1);
            tz.from_local_datetime(&shifted)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use localboost_core::types::{Platform, PostCategory};

    const CHICAGO: &str = "America/Chicago";

    fn tz() -> Tz {
        CHICAGO.parse().unwrap()
    }

    fn template(frequency: Frequency, time_of_day: &str) -> ScheduleTemplate {
        ScheduleTemplate::new(
            "morning post",
            "seasonal maintenance tips",
            frequency,
            time_of_day,
            vec![Platform::Facebook],
            PostCategory::Educational,
        )
    }

    #[test]
    fn daily_after_the_slot_fires_next_morning() {
        // Monday 14:00 CST == 20:00 UTC; next 09:00 is Tuesday.
        let after = Utc.with_ymd_and_hms(2026, 1, 5, 20, 0, 0).unwrap();
        let next = next_fire_time(&template(Frequency::Daily, "09:00"), after, tz()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 6, 15, 0, 0).unwrap());
    }

    #[test]
    fn daily_before_the_slot_fires_same_day() {
        // Monday 08:00 CST == 14:00 UTC; 09:00 the same morning still counts.
        let after = Utc.with_ymd_and_hms(2026, 1, 5, 14, 0, 0).unwrap();
        let next = next_fire_time(&template(Frequency::Daily, "09:00"), after, tz()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 5, 15, 0, 0).unwrap());
    }

    #[test]
    fn exact_occurrence_instant_schedules_the_following_one() {
        // Strictly-after: being asked at 09:00:00 sharp yields tomorrow.
        let at_nine = Utc.with_ymd_and_hms(2026, 1, 6, 15, 0, 0).unwrap();
        let next = next_fire_time(&template(Frequency::Daily, "09:00"), at_nine, tz()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 7, 15, 0, 0).unwrap());
    }

    #[test]
    fn weekly_same_day_before_the_slot_fires_today() {
        // Wednesday 08:00 CST, weekly on Wednesday (3) at 09:00.
        let after = Utc.with_ymd_and_hms(2026, 1, 7, 14, 0, 0).unwrap();
        let weekly = template(Frequency::Weekly { day_of_week: 3 }, "09:00");
        let next = next_fire_time(&weekly, after, tz()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 7, 15, 0, 0).unwrap());
    }

    #[test]
    fn weekly_same_day_after_the_slot_waits_a_full_week() {
        // Wednesday 10:00 CST — 09:00 already passed, so next Wednesday.
        let after = Utc.with_ymd_and_hms(2026, 1, 7, 16, 0, 0).unwrap();
        let weekly = template(Frequency::Weekly { day_of_week: 3 }, "09:00");
        let next = next_fire_time(&weekly, after, tz()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 14, 15, 0, 0).unwrap());
    }

    #[test]
    fn day_of_week_zero_means_sunday() {
        let after = Utc.with_ymd_and_hms(2026, 1, 5, 20, 0, 0).unwrap(); // Monday
        let weekly = template(Frequency::Weekly { day_of_week: 0 }, "09:00");
        let next = next_fire_time(&weekly, after, tz()).unwrap();
        assert_eq!(next.with_timezone(&tz()).weekday(), chrono::Weekday::Sun);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 11, 15, 0, 0).unwrap());
    }

    #[test]
    fn spring_forward_gap_shifts_one_hour_later() {
        // 2026-03-08 02:30 does not exist in Chicago (02:00 -> 03:00 CDT);
        // the firing lands on 03:30 CDT == 08:30 UTC instead of being skipped.
        let after = Utc.with_ymd_and_hms(2026, 3, 7, 16, 0, 0).unwrap();
        let next = next_fire_time(&template(Frequency::Daily, "02:30"), after, tz()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 8, 8, 30, 0).unwrap());
    }

    #[test]
    fn fall_back_ambiguity_takes_the_earlier_offset() {
        // 2026-11-01 01:30 happens twice in Chicago; the CDT (earlier) one
        // wins, so the schedule fires once, not twice.
        let after = Utc.with_ymd_and_hms(2026, 10, 31, 17, 0, 0).unwrap();
        let next = next_fire_time(&template(Frequency::Daily, "01:30"), after, tz()).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 11, 1, 6, 30, 0).unwrap());
    }

    #[test]
    fn unparseable_time_of_day_yields_none() {
        let mut bad = template(Frequency::Daily, "09:00");
        bad.time_of_day = "24:00".into();
        assert!(next_fire_time(&bad, Utc::now(), tz()).is_none());
    }

    #[test]
    fn consecutive_occurrences_are_a_day_apart_in_civil_time() {
        let daily = template(Frequency::Daily, "09:00");
        let mut at = Utc.with_ymd_and_hms(2026, 3, 6, 0, 0, 0).unwrap();
        let mut previous = None;
        // Walk across the DST boundary; civil time stays 09:00 throughout.
        for _ in 0..5 {
            let next = next_fire_time(&daily, at, tz()).unwrap();
            let local = next.with_timezone(&tz());
            assert_eq!((local.hour(), local.minute()), (9, 0));
            if let Some(prev) = previous {
                assert!(next > prev);
            }
            previous = Some(next);
            at = next;
        }
    }
}
