use std::sync::Arc;
use std::time::Duration;

use crate::{
    engine::{self, CivilFields},
    error::Error,
    fmt::{self, FormatSpec},
    weekday::Weekday,
    zone::{db, Zone},
};

const SECONDS_PER_DAY: i64 = 86_400;

/// An instant in time, expressed simultaneously as an absolute tick count
/// and as civil fields in a particular zone under that zone's calendar.
///
/// The two representations are constructed together and never drift: every
/// operation that changes one re-derives the other through the calendar
/// engine. Calendar-sensitive arithmetic (`add_months`, `add_years`) works
/// in civil space; time-sensitive arithmetic (`add_days` through
/// `add_seconds`) works on the instant and re-derives the fields, which
/// keeps both correct across DST transitions and month-length variation.
///
/// Equality and ordering are defined solely by the tick count: two values
/// are equal iff they denote the same absolute instant, regardless of
/// which zone produced them.
///
/// A value holds its zone as an identifier, not a handle, and re-resolves
/// it through [`db`] on demand.
#[derive(Clone)]
pub struct ZonedDateTime {
    /// 100-nanosecond units since the Unix epoch, UTC.
    ticks: i64,
    fields: CivilFields,
    zone_id: Arc<str>,
}

impl ZonedDateTime {
    /// The current instant in `zone`.
    pub fn now(zone: &Zone) -> Result<ZonedDateTime, Error> {
        ZonedDateTime::from_ticks(
            engine::timestamp_to_ticks(engine::now()),
            zone,
        )
    }

    /// Creates a value from an absolute instant, given as 100-nanosecond
    /// ticks since the Unix epoch, UTC.
    pub fn from_ticks(
        ticks: i64,
        zone: &Zone,
    ) -> Result<ZonedDateTime, Error> {
        let ts = engine::ticks_to_timestamp(ticks)?;
        let fields = engine::to_civil(zone.tz(), zone.calendar(), ts)?;
        Ok(ZonedDateTime { ticks, fields, zone_id: Arc::from(zone.iana_id()) })
    }

    /// Creates a value from a [`std::time::SystemTime`].
    pub fn from_system_time(
        time: std::time::SystemTime,
        zone: &Zone,
    ) -> Result<ZonedDateTime, Error> {
        let ticks = match time.duration_since(std::time::UNIX_EPOCH) {
            Ok(since) => duration_ticks(since)?,
            Err(err) => -duration_ticks(err.duration())?,
        };
        ZonedDateTime::from_ticks(ticks, zone)
    }

    /// Creates a value from explicit civil fields under `zone`'s calendar.
    ///
    /// Local times that are ambiguous or skipped across a DST transition
    /// are resolved by the engine's lenient rule.
    pub fn new(
        year: i16,
        month: i8,
        day: i8,
        hour: i8,
        minute: i8,
        second: i8,
        zone: &Zone,
    ) -> Result<ZonedDateTime, Error> {
        let (ts, weekday) = engine::from_civil_lenient(
            zone.tz(),
            zone.calendar(),
            year,
            month,
            day,
            hour,
            minute,
            second,
        )?;
        Ok(ZonedDateTime {
            ticks: engine::timestamp_to_ticks(ts),
            fields: CivilFields {
                year,
                month,
                day,
                hour,
                minute,
                second,
                weekday,
            },
            zone_id: Arc::from(zone.iana_id()),
        })
    }

    /// Like [`ZonedDateTime::new`], at midnight.
    pub fn from_date(
        year: i16,
        month: i8,
        day: i8,
        zone: &Zone,
    ) -> Result<ZonedDateTime, Error> {
        ZonedDateTime::new(year, month, day, 0, 0, 0, zone)
    }

    /// Reinterprets the same absolute instant under another zone and its
    /// calendar.
    pub fn with_zone(&self, zone: &Zone) -> Result<ZonedDateTime, Error> {
        ZonedDateTime::from_ticks(self.ticks, zone)
    }

    /// 100-nanosecond ticks since the Unix epoch, UTC.
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    pub fn year(&self) -> i16 {
        self.fields.year
    }

    pub fn month(&self) -> i8 {
        self.fields.month
    }

    pub fn day(&self) -> i8 {
        self.fields.day
    }

    pub fn hour(&self) -> i8 {
        self.fields.hour
    }

    pub fn minute(&self) -> i8 {
        self.fields.minute
    }

    pub fn second(&self) -> i8 {
        self.fields.second
    }

    pub fn weekday(&self) -> Weekday {
        self.fields.weekday
    }

    /// The IANA identifier of the zone this value's fields belong to.
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Re-resolves this value's zone through the process-wide [`db`].
    pub fn zone(&self) -> Result<Zone, Error> {
        db().get(&self.zone_id)
    }

    /// The number of days in this value's month, under its calendar.
    pub fn days_in_month(&self) -> Result<i8, Error> {
        let zone = self.zone()?;
        engine::days_in_month(
            zone.calendar(),
            self.fields.year,
            self.fields.month,
        )
    }

    /// Verifies that the civil fields still round-trip to the tick count.
    ///
    /// A failure means the zone's configuration changed out from under
    /// this value (a defect, not a recoverable condition) and reports
    /// `InconsistentState`.
    pub fn validate(&self) -> Result<(), Error> {
        let zone = self.zone()?;
        let (ts, _) = engine::from_civil_lenient(
            zone.tz(),
            zone.calendar(),
            self.fields.year,
            self.fields.month,
            self.fields.day,
            self.fields.hour,
            self.fields.minute,
            self.fields.second,
        )?;
        let expected = engine::timestamp_to_ticks(ts);
        if expected != self.ticks {
            return Err(Error::inconsistent(format!(
                "{self} resolves to tick {expected}, value holds {}",
                self.ticks,
            )));
        }
        Ok(())
    }

    /// Adds whole years in calendar space. The day-of-month is clamped to
    /// the last valid day of the target month.
    pub fn add_years(&self, years: i32) -> Result<ZonedDateTime, Error> {
        let zone = self.zone()?;
        let (year, month, day) =
            engine::add_years_civil(zone.calendar(), &self.fields, years)?;
        self.with_date(year, month, day, &zone)
    }

    /// Adds whole months in calendar space. The day-of-month is clamped to
    /// the last valid day of the target month.
    pub fn add_months(&self, months: i32) -> Result<ZonedDateTime, Error> {
        let zone = self.zone()?;
        let (year, month, day) =
            engine::add_months_civil(zone.calendar(), &self.fields, months)?;
        self.with_date(year, month, day, &zone)
    }

    /// Adds a fixed number of 24-hour days to the instant.
    pub fn add_days(&self, days: i32) -> Result<ZonedDateTime, Error> {
        self.shifted_seconds(i64::from(days) * SECONDS_PER_DAY)
    }

    pub fn add_hours(&self, hours: i32) -> Result<ZonedDateTime, Error> {
        self.shifted_seconds(i64::from(hours) * 3600)
    }

    pub fn add_minutes(&self, minutes: i32) -> Result<ZonedDateTime, Error> {
        self.shifted_seconds(i64::from(minutes) * 60)
    }

    pub fn add_seconds(&self, seconds: i64) -> Result<ZonedDateTime, Error> {
        self.shifted_seconds(seconds)
    }

    /// Adds a duration to the instant.
    pub fn checked_add(
        &self,
        duration: Duration,
    ) -> Result<ZonedDateTime, Error> {
        self.shifted_ticks(duration_ticks(duration)?)
    }

    /// Subtracts a duration from the instant.
    pub fn checked_sub(
        &self,
        duration: Duration,
    ) -> Result<ZonedDateTime, Error> {
        self.shifted_ticks(-duration_ticks(duration)?)
    }

    /// The signed tick difference `self - other`.
    pub fn ticks_since(&self, other: &ZonedDateTime) -> i64 {
        self.ticks - other.ticks
    }

    pub fn start_of_minute(&self) -> Result<ZonedDateTime, Error> {
        self.with_time(self.fields.hour, self.fields.minute, 0)
    }

    pub fn end_of_minute(&self) -> Result<ZonedDateTime, Error> {
        self.with_time(self.fields.hour, self.fields.minute, 59)
    }

    pub fn start_of_hour(&self) -> Result<ZonedDateTime, Error> {
        self.with_time(self.fields.hour, 0, 0)
    }

    pub fn end_of_hour(&self) -> Result<ZonedDateTime, Error> {
        self.with_time(self.fields.hour, 59, 59)
    }

    pub fn start_of_day(&self) -> Result<ZonedDateTime, Error> {
        self.with_time(0, 0, 0)
    }

    pub fn end_of_day(&self) -> Result<ZonedDateTime, Error> {
        self.with_time(23, 59, 59)
    }

    pub fn start_of_month(&self) -> Result<ZonedDateTime, Error> {
        let zone = self.zone()?;
        ZonedDateTime::new(
            self.fields.year,
            self.fields.month,
            1,
            0,
            0,
            0,
            &zone,
        )
    }

    pub fn end_of_month(&self) -> Result<ZonedDateTime, Error> {
        let zone = self.zone()?;
        let last = engine::days_in_month(
            zone.calendar(),
            self.fields.year,
            self.fields.month,
        )?;
        ZonedDateTime::new(
            self.fields.year,
            self.fields.month,
            last,
            23,
            59,
            59,
            &zone,
        )
    }

    /// The first moment of this value's week, per its zone's first day of
    /// the week.
    pub fn start_of_week(&self) -> Result<ZonedDateTime, Error> {
        let zone = self.zone()?;
        let days_back = self.fields.weekday.since(zone.first_day_of_week());
        self.shifted_seconds(-i64::from(days_back) * SECONDS_PER_DAY)?
            .start_of_day()
    }

    /// The last second of this value's week: six days after the start of
    /// the week, at 23:59:59.
    pub fn end_of_week(&self) -> Result<ZonedDateTime, Error> {
        self.start_of_week()?
            .shifted_seconds(6 * SECONDS_PER_DAY + 23 * 3600 + 59 * 60 + 59)
    }

    /// Renders this value through its zone's locale.
    ///
    /// Recognized specifiers are listed at [`FormatSpec`]; the empty
    /// string means the default (`G`). An unrecognized specifier reports
    /// `FormatError`.
    pub fn format(&self, specifier: &str) -> Result<String, Error> {
        let spec = FormatSpec::parse(specifier)?;
        let zone = self.zone()?;
        fmt::render(&zone, &self.fields, spec)
    }

    /// Shifts the instant by whole seconds and re-derives civil fields.
    fn shifted_seconds(
        &self,
        seconds: i64,
    ) -> Result<ZonedDateTime, Error> {
        let ticks = seconds
            .checked_mul(engine::TICKS_PER_SECOND)
            .ok_or_else(shift_overflow)?;
        self.shifted_ticks(ticks)
    }

    fn shifted_ticks(&self, ticks: i64) -> Result<ZonedDateTime, Error> {
        let zone = self.zone()?;
        let shifted =
            self.ticks.checked_add(ticks).ok_or_else(shift_overflow)?;
        ZonedDateTime::from_ticks(shifted, &zone)
    }

    fn with_date(
        &self,
        year: i16,
        month: i8,
        day: i8,
        zone: &Zone,
    ) -> Result<ZonedDateTime, Error> {
        ZonedDateTime::new(
            year,
            month,
            day,
            self.fields.hour,
            self.fields.minute,
            self.fields.second,
            zone,
        )
    }

    fn with_time(
        &self,
        hour: i8,
        minute: i8,
        second: i8,
    ) -> Result<ZonedDateTime, Error> {
        let zone = self.zone()?;
        ZonedDateTime::new(
            self.fields.year,
            self.fields.month,
            self.fields.day,
            hour,
            minute,
            second,
            &zone,
        )
    }
}

fn duration_ticks(duration: Duration) -> Result<i64, Error> {
    i64::try_from(duration.as_nanos() / 100).map_err(|_| shift_overflow())
}

fn shift_overflow() -> Error {
    Error::invalid_argument("shift overflows the representable tick range")
}

impl Eq for ZonedDateTime {}

impl PartialEq for ZonedDateTime {
    fn eq(&self, other: &ZonedDateTime) -> bool {
        self.ticks == other.ticks
    }
}

impl Ord for ZonedDateTime {
    fn cmp(&self, other: &ZonedDateTime) -> core::cmp::Ordering {
        self.ticks.cmp(&other.ticks)
    }
}

impl PartialOrd for ZonedDateTime {
    fn partial_cmp(
        &self,
        other: &ZonedDateTime,
    ) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl core::hash::Hash for ZonedDateTime {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.ticks.hash(state);
    }
}

impl core::fmt::Display for ZonedDateTime {
    /// A locale-independent rendering; use [`ZonedDateTime::format`] for
    /// locale-aware output.
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}[{}]",
            self.fields.year,
            self.fields.month,
            self.fields.day,
            self.fields.hour,
            self.fields.minute,
            self.fields.second,
            self.zone_id,
        )
    }
}

impl core::fmt::Debug for ZonedDateTime {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "ZonedDateTime({self}, ticks {}, {})", self.ticks, self.fields.weekday)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICKS_2021_01_01: i64 = 1_609_459_200 * engine::TICKS_PER_SECOND;

    #[test]
    fn utc_fields_from_ticks() {
        let utc = Zone::utc();
        let zdt = ZonedDateTime::from_ticks(TICKS_2021_01_01, &utc).unwrap();
        assert_eq!(zdt.year(), 2021);
        assert_eq!(zdt.month(), 1);
        assert_eq!(zdt.day(), 1);
        assert_eq!(zdt.hour(), 0);
        assert_eq!(zdt.weekday(), Weekday::Friday);
        assert_eq!(zdt.ticks(), TICKS_2021_01_01);
    }

    #[test]
    fn explicit_fields_round_trip() {
        let utc = Zone::utc();
        let zdt = ZonedDateTime::new(2021, 1, 1, 0, 0, 0, &utc).unwrap();
        assert_eq!(zdt.ticks(), TICKS_2021_01_01);
        zdt.validate().unwrap();
    }

    #[test]
    fn equality_is_by_instant() {
        let utc = Zone::utc();
        let a = ZonedDateTime::from_ticks(TICKS_2021_01_01, &utc).unwrap();
        let b = ZonedDateTime::new(2021, 1, 1, 0, 0, 0, &utc).unwrap();
        assert_eq!(a, b);
        assert!(a <= b && a >= b);
        let later = a.add_seconds(1).unwrap();
        assert!(later > a);
        assert_eq!(later.ticks_since(&a), engine::TICKS_PER_SECOND);
    }

    #[test]
    fn day_arithmetic_is_inverse() {
        let utc = Zone::utc();
        let zdt = ZonedDateTime::from_ticks(TICKS_2021_01_01, &utc).unwrap();
        for days in [1, 40, 365, -1, -400] {
            let there_and_back =
                zdt.add_days(days).unwrap().add_days(-days).unwrap();
            assert_eq!(there_and_back, zdt, "days = {days}");
        }
    }

    #[test]
    fn month_addition_clamps() {
        let utc = Zone::utc();
        let zdt = ZonedDateTime::new(2021, 1, 31, 12, 0, 0, &utc).unwrap();
        let next = zdt.add_months(1).unwrap();
        assert_eq!((next.year(), next.month(), next.day()), (2021, 2, 28));
        assert_eq!(next.hour(), 12);
    }

    #[test]
    fn boundaries_are_idempotent() {
        let utc = Zone::utc();
        let zdt = ZonedDateTime::new(2021, 6, 15, 13, 37, 42, &utc).unwrap();
        let start = zdt.start_of_day().unwrap();
        assert_eq!(start.start_of_day().unwrap(), start);
        assert_eq!((start.hour(), start.minute(), start.second()), (0, 0, 0));

        let end = zdt.end_of_month().unwrap();
        assert_eq!((end.day(), end.hour(), end.second()), (30, 23, 59));
    }

    #[test]
    fn duration_add_sub() {
        let utc = Zone::utc();
        let zdt = ZonedDateTime::from_ticks(TICKS_2021_01_01, &utc).unwrap();
        let later = zdt.checked_add(Duration::from_secs(90)).unwrap();
        assert_eq!((later.minute(), later.second()), (1, 30));
        assert_eq!(later.checked_sub(Duration::from_secs(90)).unwrap(), zdt);
    }

    #[test]
    fn system_time_round_trips() {
        let utc = Zone::utc();
        let time =
            std::time::UNIX_EPOCH + Duration::from_secs(1_609_459_200);
        let zdt = ZonedDateTime::from_system_time(time, &utc).unwrap();
        assert_eq!(zdt.ticks(), TICKS_2021_01_01);
    }

    #[test]
    fn display_is_plain() {
        let utc = Zone::utc();
        let zdt = ZonedDateTime::new(2021, 1, 1, 3, 30, 0, &utc).unwrap();
        assert_eq!(zdt.to_string(), "2021-01-01T03:30:00[UTC]");
    }
}
