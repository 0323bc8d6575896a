/*!
The boundary to the external timezone and calendar engines.

Everything that talks to `jiff` (IANA zone resolution, UTC offsets, lenient
resolution of ambiguous or skipped local times) or to `icu_calendar`
(calendar projection, days-in-month, locale week data) lives here, so the
rest of the crate deals only in this crate's own types. The one policy this
module adds on top of the engines is the month/year addition overflow rule:
the day-of-month is clamped to the last valid day of the target month, so
e.g. Jan 31 plus one month lands on the last day of February.
*/

use icu_calendar::{persian::Persian, Date};
use jiff::{civil, tz::TimeZone, Timestamp};

use crate::{
    calendar::CalendarKind,
    error::{Error, ErrorContext},
    weekday::Weekday,
};

/// 100-nanosecond ticks per second.
pub(crate) const TICKS_PER_SECOND: i64 = 10_000_000;

/// Civil fields as perceived in some zone under some calendar.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct CivilFields {
    pub(crate) year: i16,
    pub(crate) month: i8,
    pub(crate) day: i8,
    pub(crate) hour: i8,
    pub(crate) minute: i8,
    pub(crate) second: i8,
    pub(crate) weekday: Weekday,
}

pub(crate) fn now() -> Timestamp {
    Timestamp::now()
}

pub(crate) fn timestamp_to_ticks(ts: Timestamp) -> i64 {
    // Ticks are second-resolution times a constant, so the narrowing is
    // exact for every timestamp this crate produces.
    (ts.as_nanosecond() / 100) as i64
}

pub(crate) fn ticks_to_timestamp(ticks: i64) -> Result<Timestamp, Error> {
    Timestamp::from_nanosecond(i128::from(ticks) * 100)
        .map_err(engine_err)
        .with_context(|| {
            Error::invalid_argument(format!(
                "tick count {ticks} is outside the representable range",
            ))
        })
}

/// Resolves an IANA identifier to an engine zone handle.
pub(crate) fn lookup(iana_id: &str) -> Result<TimeZone, Error> {
    TimeZone::get(iana_id)
        .map_err(engine_err)
        .context(Error::unknown_zone(iana_id))
}

/// The IANA identifier of the host system's zone, or `"UTC"` when it
/// cannot be determined.
pub(crate) fn system_zone_id() -> String {
    let tz = TimeZone::system();
    match tz.iana_name() {
        Some(name) => name.to_string(),
        None => {
            debug!("system time zone has no IANA name, using UTC");
            String::from("UTC")
        }
    }
}

pub(crate) fn offset_seconds(tz: &TimeZone, ts: Timestamp) -> i32 {
    tz.to_offset(ts).seconds()
}

/// Converts an absolute instant to civil fields in `tz`, projected onto
/// `calendar`.
pub(crate) fn to_civil(
    tz: &TimeZone,
    calendar: CalendarKind,
    ts: Timestamp,
) -> Result<CivilFields, Error> {
    let dt = tz.to_datetime(ts);
    let weekday = Weekday::from_jiff(dt.weekday());
    let (year, month, day) = match calendar {
        CalendarKind::Gregorian => (dt.year(), dt.month(), dt.day()),
        CalendarKind::Persian => {
            let iso = Date::try_new_iso_date(
                i32::from(dt.year()),
                dt.month() as u8,
                dt.day() as u8,
            )
            .map_err(engine_err)?;
            let persian = iso.to_calendar(Persian);
            (
                persian.year().number as i16,
                persian.month().ordinal as i8,
                persian.day_of_month().0 as i8,
            )
        }
    };
    Ok(CivilFields {
        year,
        month,
        day,
        hour: dt.hour(),
        minute: dt.minute(),
        second: dt.second(),
        weekday,
    })
}

/// Resolves civil fields under `calendar` to an absolute instant in `tz`,
/// using the engine's lenient rule for local times that are ambiguous or
/// skipped across a DST transition. Also returns the weekday of the
/// resolved instant.
pub(crate) fn from_civil_lenient(
    tz: &TimeZone,
    calendar: CalendarKind,
    year: i16,
    month: i8,
    day: i8,
    hour: i8,
    minute: i8,
    second: i8,
) -> Result<(Timestamp, Weekday), Error> {
    let (gregorian_year, gregorian_month, gregorian_day) = match calendar {
        CalendarKind::Gregorian => (year, month, day),
        CalendarKind::Persian => {
            let persian = Date::try_new_persian_date(
                i32::from(year),
                month as u8,
                day as u8,
            )
            .map_err(engine_err)
            .with_context(|| invalid_date(calendar, year, month, day))?;
            let iso = persian.to_iso();
            (
                iso.year().number as i16,
                iso.month().ordinal as i8,
                iso.day_of_month().0 as i8,
            )
        }
    };
    let dt = civil::DateTime::new(
        gregorian_year,
        gregorian_month,
        gregorian_day,
        hour,
        minute,
        second,
        0,
    )
    .map_err(engine_err)
    .with_context(|| invalid_date(calendar, year, month, day))?;
    let ts = tz.to_ambiguous_timestamp(dt).compatible().map_err(engine_err)?;
    let weekday = Weekday::from_jiff(tz.to_datetime(ts).weekday());
    Ok((ts, weekday))
}

/// The number of days in `(year, month)` under `calendar`.
pub(crate) fn days_in_month(
    calendar: CalendarKind,
    year: i16,
    month: i8,
) -> Result<i8, Error> {
    Ok(first_of_month(calendar, year, month)?.days_in_month() as i8)
}

fn months_in_year(calendar: CalendarKind, year: i16) -> Result<i8, Error> {
    Ok(first_of_month(calendar, year, 1)?.months_in_year() as i8)
}

fn first_of_month(
    calendar: CalendarKind,
    year: i16,
    month: i8,
) -> Result<Date<icu_calendar::AnyCalendar>, Error> {
    let date = match calendar {
        CalendarKind::Gregorian => {
            Date::try_new_gregorian_date(i32::from(year), month as u8, 1)
                .map_err(engine_err)?
                .to_any()
        }
        CalendarKind::Persian => {
            Date::try_new_persian_date(i32::from(year), month as u8, 1)
                .map_err(engine_err)?
                .to_any()
        }
    };
    Ok(date)
}

/// Adds `delta` months to a civil date in calendar space, clamping the day
/// to the target month's length. The time of day is untouched.
pub(crate) fn add_months_civil(
    calendar: CalendarKind,
    fields: &CivilFields,
    delta: i32,
) -> Result<(i16, i8, i8), Error> {
    let months_per_year = i64::from(months_in_year(calendar, fields.year)?);
    let total = i64::from(fields.year) * months_per_year
        + i64::from(fields.month - 1)
        + i64::from(delta);
    let year = i16::try_from(total.div_euclid(months_per_year))
        .map_err(|_| month_overflow(delta))?;
    let month = (total.rem_euclid(months_per_year) + 1) as i8;
    let day = fields.day.min(days_in_month(calendar, year, month)?);
    Ok((year, month, day))
}

/// Adds `delta` years to a civil date in calendar space, clamping the day
/// to the target month's length.
pub(crate) fn add_years_civil(
    calendar: CalendarKind,
    fields: &CivilFields,
    delta: i32,
) -> Result<(i16, i8, i8), Error> {
    let year = i32::from(fields.year)
        .checked_add(delta)
        .and_then(|year| i16::try_from(year).ok())
        .ok_or_else(|| year_overflow(delta))?;
    let day = fields.day.min(days_in_month(calendar, year, fields.month)?);
    Ok((year, fields.month, day))
}

/// The first day of the week implied by a locale's week data.
///
/// Falls back to Sunday (the invariant default) when the engine has no
/// week data for the locale.
pub(crate) fn first_weekday_for_locale(
    locale: &icu_locid::Locale,
) -> Weekday {
    use icu_calendar::week::WeekCalculator;

    match WeekCalculator::try_new(&locale.into()) {
        Ok(week) => Weekday::from_icu(week.first_weekday),
        Err(_) => {
            debug!("no week data for locale {locale}, assuming Sunday");
            Weekday::Sunday
        }
    }
}

fn invalid_date(
    calendar: CalendarKind,
    year: i16,
    month: i8,
    day: i8,
) -> Error {
    Error::invalid_argument(format!(
        "{year:04}-{month:02}-{day:02} is not a valid {calendar} civil date",
    ))
}

fn month_overflow(delta: i32) -> Error {
    Error::invalid_argument(format!(
        "adding {delta} months overflows the supported year range",
    ))
}

fn year_overflow(delta: i32) -> Error {
    Error::invalid_argument(format!(
        "adding {delta} years overflows the supported year range",
    ))
}

fn engine_err(err: impl core::fmt::Display) -> Error {
    Error::adhoc(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2021-01-01 in the proleptic Gregorian calendar is 1399-10-12 in the
    // Persian calendar. Pure calendar projection, no zone involved.
    #[test]
    fn persian_projection() {
        let iso = Date::try_new_iso_date(2021, 1, 1).unwrap();
        let persian = iso.to_calendar(Persian);
        assert_eq!(persian.year().number, 1399);
        assert_eq!(persian.month().ordinal, 10);
        assert_eq!(persian.day_of_month().0, 12);
    }

    #[test]
    fn persian_month_lengths() {
        // Dey 1399 has 30 days; Esfand 1399 (leap) has 30, 1400 has 29.
        assert_eq!(days_in_month(CalendarKind::Persian, 1399, 10).unwrap(), 30);
        assert_eq!(days_in_month(CalendarKind::Persian, 1399, 12).unwrap(), 30);
        assert_eq!(days_in_month(CalendarKind::Persian, 1400, 12).unwrap(), 29);
        assert_eq!(
            days_in_month(CalendarKind::Gregorian, 2021, 2).unwrap(),
            28,
        );
    }

    #[test]
    fn month_addition_clamps_day() {
        let fields = CivilFields {
            year: 2021,
            month: 1,
            day: 31,
            hour: 0,
            minute: 0,
            second: 0,
            weekday: Weekday::Sunday,
        };
        let (year, month, day) =
            add_months_civil(CalendarKind::Gregorian, &fields, 1).unwrap();
        assert_eq!((year, month, day), (2021, 2, 28));

        let (year, month, day) =
            add_months_civil(CalendarKind::Gregorian, &fields, -1).unwrap();
        assert_eq!((year, month, day), (2020, 12, 31));

        let (year, month, day) =
            add_months_civil(CalendarKind::Gregorian, &fields, 12).unwrap();
        assert_eq!((year, month, day), (2022, 1, 31));
    }

    #[test]
    fn ticks_round_trip() {
        for ticks in [0i64, 1, -1, 16_094_340_000_000_000] {
            let ts = ticks_to_timestamp(ticks).unwrap();
            assert_eq!(timestamp_to_ticks(ts), ticks);
        }
    }
}
