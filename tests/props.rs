use civilzone::{Zone, ZonedDateTime};
use quickcheck::{QuickCheck, TestResult};

const TICKS_PER_SECOND: i64 = 10_000_000;
// Roughly years 1843 through 2096, which keeps day arithmetic in range.
const MAX_SECOND: i64 = 4_000_000_000;

fn arbitrary_instant(seconds: i64) -> Option<ZonedDateTime> {
    if !(-MAX_SECOND..=MAX_SECOND).contains(&seconds) {
        return None;
    }
    ZonedDateTime::from_ticks(seconds * TICKS_PER_SECOND, &Zone::utc()).ok()
}

#[test]
fn prop_add_days_has_an_inverse() {
    fn prop(seconds: i64, days: i16) -> TestResult {
        let Some(zdt) = arbitrary_instant(seconds) else {
            return TestResult::discard();
        };
        let days = i32::from(days);
        let round_trip =
            zdt.add_days(days).unwrap().add_days(-days).unwrap();
        TestResult::from_bool(round_trip == zdt)
    }
    QuickCheck::new().quickcheck(prop as fn(i64, i16) -> TestResult);
}

#[test]
fn prop_start_of_day_is_idempotent_and_not_later() {
    fn prop(seconds: i64) -> TestResult {
        let Some(zdt) = arbitrary_instant(seconds) else {
            return TestResult::discard();
        };
        let start = zdt.start_of_day().unwrap();
        TestResult::from_bool(
            start <= zdt
                && start.start_of_day().unwrap() == start
                && (start.hour(), start.minute(), start.second())
                    == (0, 0, 0),
        )
    }
    QuickCheck::new().quickcheck(prop as fn(i64) -> TestResult);
}

#[test]
fn prop_day_bounds_bracket_the_value() {
    fn prop(seconds: i64) -> TestResult {
        let Some(zdt) = arbitrary_instant(seconds) else {
            return TestResult::discard();
        };
        let start = zdt.start_of_day().unwrap();
        let end = zdt.end_of_day().unwrap();
        TestResult::from_bool(
            start <= zdt
                && zdt.start_of_minute().unwrap() <= zdt
                && zdt <= end
                && end.ticks_since(&start)
                    == (86_400 - 1) * TICKS_PER_SECOND,
        )
    }
    QuickCheck::new().quickcheck(prop as fn(i64) -> TestResult);
}

#[test]
fn prop_civil_fields_round_trip_through_ticks() {
    fn prop(seconds: i64) -> TestResult {
        let Some(zdt) = arbitrary_instant(seconds) else {
            return TestResult::discard();
        };
        let rebuilt = ZonedDateTime::new(
            zdt.year(),
            zdt.month(),
            zdt.day(),
            zdt.hour(),
            zdt.minute(),
            zdt.second(),
            &Zone::utc(),
        )
        .unwrap();
        TestResult::from_bool(
            rebuilt.ticks() == zdt.ticks() && zdt.validate().is_ok(),
        )
    }
    QuickCheck::new().quickcheck(prop as fn(i64) -> TestResult);
}

#[test]
fn prop_ticks_since_is_antisymmetric() {
    fn prop(a: i64, b: i64) -> TestResult {
        let (Some(a), Some(b)) =
            (arbitrary_instant(a), arbitrary_instant(b))
        else {
            return TestResult::discard();
        };
        TestResult::from_bool(a.ticks_since(&b) == -b.ticks_since(&a))
    }
    QuickCheck::new().quickcheck(prop as fn(i64, i64) -> TestResult);
}
