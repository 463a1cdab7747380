use chrono::{Duration, FixedOffset, NaiveDate, TimeZone, Utc, Weekday};
use proptest::prelude::*;

use appointment_cell::models::DateRejection;
use appointment_cell::services::scheduling::SchedulingPolicy;

fn any_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..20_000).prop_map(|days| NaiveDate::from_ymd_opt(2000, 1, 1).unwrap() + Duration::days(days))
}

proptest! {
    #[test]
    fn past_dates_are_always_rejected(today in any_date(), back in 1i64..3_000) {
        let policy = SchedulingPolicy::default();
        let candidate = today - Duration::days(back);
        let is_past = matches!(policy.validate_date(candidate, today), Err(DateRejection::PastDate { .. }));
        prop_assert!(is_past);
    }

    #[test]
    fn closed_day_survives_a_trip_through_caller_time(
        weeks in 0i64..2_000,
        slot_index in 0usize..13,
        caller_offset_hours in -12i32..=14,
    ) {
        let policy = SchedulingPolicy::default();
        let sunday = NaiveDate::from_ymd_opt(2000, 1, 2).unwrap() + Duration::weeks(weeks);
        let slot = policy.offerable_slots()[slot_index];

        // A caller far enough east sees the booked instant on Monday already.
        let caller = FixedOffset::east_opt(caller_offset_hours * 3600).unwrap();
        let booked = policy.compose_date_time(Some(sunday), Some(slot)).unwrap();
        let seen_by_caller = booked.with_timezone(&caller);
        let back_at_clinic = seen_by_caller.with_timezone(&policy.clinic_offset());

        prop_assert_eq!(back_at_clinic.date_naive(), sunday);
        prop_assert_eq!(
            policy.validate_date(back_at_clinic.date_naive(), sunday),
            Err(DateRejection::ClosedDay { date: sunday, weekday: Weekday::Sun })
        );
    }

    #[test]
    fn clinic_today_lags_utc_until_six_in_the_morning(
        day in any_date(),
        minute_of_utc_day in 0i64..1_440,
    ) {
        let policy = SchedulingPolicy::default();
        let now = Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0).unwrap()) + Duration::minutes(minute_of_utc_day);

        let expected = if minute_of_utc_day < 6 * 60 { day - Duration::days(1) } else { day };
        prop_assert_eq!(policy.today_at(now), expected);
    }

    #[test]
    fn composed_instant_keeps_the_chosen_civil_time(
        day in any_date(),
        slot_index in 0usize..13,
    ) {
        let policy = SchedulingPolicy::default();
        let slot = policy.offerable_slots()[slot_index];

        let instant = policy.compose_date_time(Some(day), Some(slot)).unwrap();
        prop_assert_eq!(instant.date_naive(), day);
        prop_assert_eq!(instant.time(), slot);
        prop_assert_eq!(instant.with_timezone(&Utc) - Utc.from_utc_datetime(&day.and_time(slot)), Duration::hours(6));
    }
}
