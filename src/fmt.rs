/*!
Locale-aware rendering of civil fields.

The formatting engine is `icu_datetime`. Each zone's locale, extended with
a `ca` keyword for the zone's calendar, drives both the pattern shape and
the month/weekday names, so a Tehran zone mapped to `fa-IR` with the
Persian calendar renders Persian month names without any per-call
configuration.
*/

use icu_calendar::types::Time;
use icu_calendar::{Date, DateTime};
use icu_datetime::{
    options::components,
    options::length,
    DateFormatter, DateTimeFormatter,
};
use icu_locid::{
    extensions_unicode_key as key, extensions_unicode_value as value,
    Locale,
};

use crate::{
    calendar::CalendarKind,
    engine::CivilFields,
    error::Error,
    zone::Zone,
};

/// A recognized format specifier.
///
/// The specifiers follow the conventional single-letter vocabulary:
///
/// | Specifier | Meaning |
/// | --- | --- |
/// | `d` | short date |
/// | `D` | long date |
/// | `f` | long date, short time |
/// | `F` | long date, long time |
/// | `g` | short date, short time |
/// | `G` (or empty) | short date, long time |
/// | `m`, `M` | month and day |
/// | `MMMM` | month name only |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FormatSpec {
    ShortDate,
    LongDate,
    LongDateShortTime,
    LongDateLongTime,
    ShortDateShortTime,
    ShortDateLongTime,
    MonthDay,
    MonthName,
}

impl FormatSpec {
    /// Parses a specifier string. Anything not in the table above reports
    /// a format error.
    pub fn parse(specifier: &str) -> Result<FormatSpec, Error> {
        match specifier {
            "d" => Ok(FormatSpec::ShortDate),
            "D" => Ok(FormatSpec::LongDate),
            "f" => Ok(FormatSpec::LongDateShortTime),
            "F" => Ok(FormatSpec::LongDateLongTime),
            "g" => Ok(FormatSpec::ShortDateShortTime),
            "" | "G" => Ok(FormatSpec::ShortDateLongTime),
            "m" | "M" => Ok(FormatSpec::MonthDay),
            "MMMM" => Ok(FormatSpec::MonthName),
            _ => Err(Error::format(specifier)),
        }
    }
}

/// Renders `fields` under `zone`'s locale and calendar.
pub(crate) fn render(
    zone: &Zone,
    fields: &CivilFields,
    spec: FormatSpec,
) -> Result<String, Error> {
    let locale = calendar_locale(zone.locale(), zone.calendar());
    let date = any_date(zone.calendar(), fields)?;
    match spec {
        FormatSpec::ShortDate => {
            format_date(&locale, length::Date::Short, &date)
        }
        FormatSpec::LongDate => {
            format_date(&locale, length::Date::Full, &date)
        }
        FormatSpec::LongDateShortTime => format_date_time(
            &locale,
            length::Date::Full,
            length::Time::Short,
            date,
            fields,
        ),
        FormatSpec::LongDateLongTime => format_date_time(
            &locale,
            length::Date::Full,
            length::Time::Medium,
            date,
            fields,
        ),
        FormatSpec::ShortDateShortTime => format_date_time(
            &locale,
            length::Date::Short,
            length::Time::Short,
            date,
            fields,
        ),
        FormatSpec::ShortDateLongTime => format_date_time(
            &locale,
            length::Date::Short,
            length::Time::Medium,
            date,
            fields,
        ),
        FormatSpec::MonthDay => {
            let mut bag = components::Bag::default();
            bag.month = Some(components::Month::Long);
            bag.day = Some(components::Day::NumericDayOfMonth);
            format_components(&locale, bag, date, fields)
        }
        FormatSpec::MonthName => {
            let mut bag = components::Bag::default();
            bag.month = Some(components::Month::Long);
            format_components(&locale, bag, date, fields)
        }
    }
}

/// The zone's locale with its calendar pinned via the `ca` keyword, so the
/// formatter's calendar choice never depends on the locale's CLDR default.
fn calendar_locale(locale: &Locale, calendar: CalendarKind) -> Locale {
    let mut locale = locale.clone();
    let ca = match calendar {
        CalendarKind::Gregorian => value!("gregory"),
        CalendarKind::Persian => value!("persian"),
    };
    locale.extensions.unicode.keywords.set(key!("ca"), ca);
    locale
}

fn any_date(
    calendar: CalendarKind,
    fields: &CivilFields,
) -> Result<Date<icu_calendar::AnyCalendar>, Error> {
    let date = match calendar {
        CalendarKind::Gregorian => Date::try_new_gregorian_date(
            i32::from(fields.year),
            fields.month as u8,
            fields.day as u8,
        )
        .map_err(formatter_err)?
        .to_any(),
        CalendarKind::Persian => Date::try_new_persian_date(
            i32::from(fields.year),
            fields.month as u8,
            fields.day as u8,
        )
        .map_err(formatter_err)?
        .to_any(),
    };
    Ok(date)
}

fn time_of(fields: &CivilFields) -> Result<Time, Error> {
    Time::try_new(
        fields.hour as u8,
        fields.minute as u8,
        fields.second as u8,
        0,
    )
    .map_err(formatter_err)
}

fn format_date(
    locale: &Locale,
    length: length::Date,
    date: &Date<icu_calendar::AnyCalendar>,
) -> Result<String, Error> {
    let formatter = DateFormatter::try_new_with_length(&locale.into(), length)
        .map_err(formatter_err)?;
    formatter.format_to_string(date).map_err(formatter_err)
}

fn format_date_time(
    locale: &Locale,
    date_length: length::Date,
    time_length: length::Time,
    date: Date<icu_calendar::AnyCalendar>,
    fields: &CivilFields,
) -> Result<String, Error> {
    let options =
        length::Bag::from_date_time_style(date_length, time_length).into();
    let formatter = DateTimeFormatter::try_new(&locale.into(), options)
        .map_err(formatter_err)?;
    let value = DateTime::new(date, time_of(fields)?);
    formatter.format_to_string(&value).map_err(formatter_err)
}

fn format_components(
    locale: &Locale,
    bag: components::Bag,
    date: Date<icu_calendar::AnyCalendar>,
    fields: &CivilFields,
) -> Result<String, Error> {
    let formatter =
        DateTimeFormatter::try_new_experimental(&locale.into(), bag.into())
            .map_err(formatter_err)?;
    let value = DateTime::new(date, time_of(fields)?);
    formatter.format_to_string(&value).map_err(formatter_err)
}

fn formatter_err(err: impl core::fmt::Display) -> Error {
    Error::adhoc(err.to_string())
}
