use std::collections::HashMap;
use std::sync::Mutex;

use icu_locid::Locale;

use crate::{calendar::CalendarKind, error::Error, weekday::Weekday};

/// Per-zone static configuration: which calendar a zone's civil fields are
/// projected onto, which locale renders them, and which weekday starts its
/// week.
///
/// A `ZoneMap` is pure data, immutable after construction, keyed by its
/// IANA identifier. Register maps with [`MapRegistry::add`] before the zone
/// is first resolved; zones without a registered map fall back to the
/// engine's native calendar (Gregorian) and the locale-implied first day
/// of the week.
#[derive(Clone, Debug)]
pub struct ZoneMap {
    iana_id: String,
    platform_id: String,
    first_day_of_week: Weekday,
    calendar: CalendarKind,
    locale: Locale,
}

impl ZoneMap {
    /// Creates a map for `iana_id`. The locale is a BCP-47 tag such as
    /// `"fa-IR"` or `"en-GB"`.
    ///
    /// Returns an error if the identifier is empty or the locale tag does
    /// not parse.
    pub fn new(
        iana_id: &str,
        first_day_of_week: Weekday,
        calendar: CalendarKind,
        locale: &str,
    ) -> Result<ZoneMap, Error> {
        if iana_id.is_empty() {
            return Err(Error::invalid_argument(
                "time zone identifier must be non-empty",
            ));
        }
        let locale: Locale = locale.parse().map_err(|err| {
            Error::invalid_argument(format!(
                "locale tag {locale:?} is not valid: {err}",
            ))
        })?;
        Ok(ZoneMap {
            iana_id: iana_id.to_string(),
            platform_id: String::new(),
            first_day_of_week,
            calendar,
            locale,
        })
    }

    /// Attaches a host-platform zone alias (for example a Windows zone
    /// id). Purely informational; nothing in this crate interprets it.
    pub fn with_platform_id(mut self, platform_id: &str) -> ZoneMap {
        self.platform_id = platform_id.to_string();
        self
    }

    /// The built-in UTC map: Gregorian, the root locale, Sunday-first.
    pub(crate) fn utc() -> ZoneMap {
        ZoneMap {
            iana_id: String::from("UTC"),
            platform_id: String::from("UTC"),
            first_day_of_week: Weekday::Sunday,
            calendar: CalendarKind::Gregorian,
            locale: Locale::UND,
        }
    }

    pub fn iana_id(&self) -> &str {
        &self.iana_id
    }

    /// May be empty.
    pub fn platform_id(&self) -> &str {
        &self.platform_id
    }

    pub fn first_day_of_week(&self) -> Weekday {
        self.first_day_of_week
    }

    pub fn calendar(&self) -> CalendarKind {
        self.calendar
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }
}

/// The mutable registry of [`ZoneMap`]s, keyed by IANA identifier.
///
/// The registry is consulted once per zone, when the zone is first
/// resolved; changing a map after its zone has been cached has no effect
/// on the cached handle. All operations are safe under concurrent access.
#[derive(Debug)]
pub struct MapRegistry {
    maps: Mutex<HashMap<String, ZoneMap>>,
}

impl MapRegistry {
    /// Creates a registry holding the built-in UTC map.
    pub fn new() -> MapRegistry {
        let mut maps = HashMap::new();
        maps.insert(String::from("UTC"), ZoneMap::utc());
        MapRegistry { maps: Mutex::new(maps) }
    }

    /// Inserts `map`, replacing any map previously registered for the same
    /// identifier.
    pub fn add(&self, map: ZoneMap) {
        let mut maps = self.maps.lock().unwrap();
        maps.insert(map.iana_id.clone(), map);
    }

    /// Removes and returns the map for `iana_id`, if any.
    ///
    /// Removing `"UTC"` is permitted but not permanent: resolving UTC
    /// without a registered map re-derives the built-in default.
    pub fn remove(&self, iana_id: &str) -> Option<ZoneMap> {
        self.maps.lock().unwrap().remove(iana_id)
    }

    /// Removes every registered map, the built-in UTC map included. See
    /// [`MapRegistry::remove`] for what that means for UTC.
    pub fn clear(&self) {
        self.maps.lock().unwrap().clear();
    }

    /// Returns a copy of the map registered for `iana_id`.
    pub fn get(&self, iana_id: &str) -> Option<ZoneMap> {
        self.maps.lock().unwrap().get(iana_id).cloned()
    }
}

impl Default for MapRegistry {
    fn default() -> MapRegistry {
        MapRegistry::new()
    }
}
