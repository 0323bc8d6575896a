use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use icu_locid::Locale;

use crate::{
    calendar::CalendarKind,
    engine,
    error::Error,
    map::{MapRegistry, ZoneMap},
    weekday::Weekday,
};

/// The process-wide zone database.
///
/// This is what [`Zone::get`] and every [`crate::ZonedDateTime`] consult.
/// Tests that need isolation can construct their own [`ZoneDatabase`]
/// instead.
pub fn db() -> &'static ZoneDatabase {
    static DB: OnceLock<ZoneDatabase> = OnceLock::new();
    DB.get_or_init(ZoneDatabase::new)
}

/// A resolved time zone.
///
/// A `Zone` bundles the engine's zone handle with the zone's calendar
/// system, locale, first day of the week and precomputed weekday ordering.
/// Zones are immutable, cheap to clone and shared: resolving the same
/// identifier twice through one [`ZoneDatabase`] yields the same handle.
///
/// Equality is by IANA identifier; ordering is by the cached UTC offset
/// (with the identifier as a tiebreak so the order stays total).
#[derive(Clone)]
pub struct Zone {
    inner: Arc<ZoneInner>,
}

struct ZoneInner {
    iana_id: String,
    platform_id: String,
    /// Computed once when the zone is resolved and never refreshed, so for
    /// zones with DST it can go stale until the process restarts. Only
    /// ordering and display read it; civil conversions always derive the
    /// offset from the instant at hand.
    offset_seconds: i32,
    calendar: CalendarKind,
    locale: Locale,
    first_day_of_week: Weekday,
    weekday_ordering: [Weekday; 7],
    tz: jiff::tz::TimeZone,
}

impl Zone {
    /// Resolves `iana_id` through the process-wide [`db`].
    pub fn get(iana_id: &str) -> Result<Zone, Error> {
        db().get(iana_id)
    }

    /// The UTC zone, resolved through the process-wide [`db`].
    pub fn utc() -> Zone {
        db().utc()
    }

    pub fn iana_id(&self) -> &str {
        &self.inner.iana_id
    }

    /// The host-platform zone alias from this zone's [`ZoneMap`], if one
    /// was registered. May be empty.
    pub fn platform_id(&self) -> &str {
        &self.inner.platform_id
    }

    /// The zone's UTC offset in seconds, as cached at resolution time.
    pub fn offset_seconds(&self) -> i32 {
        self.inner.offset_seconds
    }

    pub fn calendar(&self) -> CalendarKind {
        self.inner.calendar
    }

    pub fn locale(&self) -> &Locale {
        &self.inner.locale
    }

    pub fn first_day_of_week(&self) -> Weekday {
        self.inner.first_day_of_week
    }

    /// The seven weekdays, rotated so that index 0 is this zone's first
    /// day of the week. Computed once at resolution.
    pub fn weekday_ordering(&self) -> &[Weekday; 7] {
        &self.inner.weekday_ordering
    }

    pub(crate) fn tz(&self) -> &jiff::tz::TimeZone {
        &self.inner.tz
    }

    fn from_parts(map: &ZoneMap, tz: jiff::tz::TimeZone) -> Zone {
        let offset_seconds = engine::offset_seconds(&tz, engine::now());
        let first_day_of_week = map.first_day_of_week();
        Zone {
            inner: Arc::new(ZoneInner {
                iana_id: map.iana_id().to_string(),
                platform_id: map.platform_id().to_string(),
                offset_seconds,
                calendar: map.calendar(),
                locale: map.locale().clone(),
                first_day_of_week,
                weekday_ordering: Weekday::ordering_from(first_day_of_week),
                tz,
            }),
        }
    }
}

impl Eq for Zone {}

impl PartialEq for Zone {
    fn eq(&self, other: &Zone) -> bool {
        self.inner.iana_id == other.inner.iana_id
    }
}

impl core::hash::Hash for Zone {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.inner.iana_id.hash(state);
    }
}

impl Ord for Zone {
    fn cmp(&self, other: &Zone) -> core::cmp::Ordering {
        (self.inner.offset_seconds, &self.inner.iana_id)
            .cmp(&(other.inner.offset_seconds, &other.inner.iana_id))
    }
}

impl PartialOrd for Zone {
    fn partial_cmp(&self, other: &Zone) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl core::fmt::Display for Zone {
    /// Renders the cached offset in `GMT+03:30` style.
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let seconds = self.inner.offset_seconds;
        let sign = if seconds < 0 { '-' } else { '+' };
        let seconds = seconds.unsigned_abs();
        write!(f, "GMT{sign}{:02}:{:02}", seconds / 3600, seconds % 3600 / 60)
    }
}

impl core::fmt::Debug for Zone {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Zone")
            .field("iana_id", &self.inner.iana_id)
            .field("calendar", &self.inner.calendar)
            .field("first_day_of_week", &self.inner.first_day_of_week)
            .field("offset_seconds", &self.inner.offset_seconds)
            .finish()
    }
}

/// A registry of [`ZoneMap`]s plus a cache of resolved [`Zone`]s.
///
/// Resolution is lazy: the first request for an identifier asks the engine
/// for the zone, consults the registry for its map and publishes exactly
/// one handle. The cache never evicts; the key space (IANA identifiers) is
/// small and finite, so unbounded growth is acceptable.
#[derive(Debug)]
pub struct ZoneDatabase {
    maps: MapRegistry,
    zones: RwLock<HashMap<String, Zone>>,
}

impl ZoneDatabase {
    pub fn new() -> ZoneDatabase {
        ZoneDatabase {
            maps: MapRegistry::new(),
            zones: RwLock::new(HashMap::new()),
        }
    }

    /// The registry consulted when a zone is first resolved.
    pub fn maps(&self) -> &MapRegistry {
        &self.maps
    }

    /// Resolves `iana_id` to a zone handle.
    ///
    /// Cache hits return the shared handle. On a miss, concurrent callers
    /// may race to compute the handle, but only one is ever published;
    /// losers adopt the published handle. Lookup failures propagate and
    /// are never cached.
    pub fn get(&self, iana_id: &str) -> Result<Zone, Error> {
        if iana_id.is_empty() {
            return Err(Error::invalid_argument(
                "time zone identifier must be non-empty",
            ));
        }
        if let Some(zone) = self.zones.read().unwrap().get(iana_id) {
            return Ok(zone.clone());
        }
        let zone = self.resolve_uncached(iana_id)?;
        let mut zones = self.zones.write().unwrap();
        match zones.get(iana_id) {
            // Lost a resolution race; the published handle wins.
            Some(existing) => Ok(existing.clone()),
            None => {
                zones.insert(iana_id.to_string(), zone.clone());
                Ok(zone)
            }
        }
    }

    /// The UTC zone. Infallible: when the registry has no UTC map (after
    /// [`MapRegistry::clear`]), the built-in default is re-derived.
    pub fn utc(&self) -> Zone {
        if let Some(zone) = self.zones.read().unwrap().get("UTC") {
            return zone.clone();
        }
        let map = self.maps.get("UTC").unwrap_or_else(ZoneMap::utc);
        let zone = Zone::from_parts(&map, jiff::tz::TimeZone::UTC);
        let mut zones = self.zones.write().unwrap();
        match zones.get("UTC") {
            Some(existing) => existing.clone(),
            None => {
                zones.insert(String::from("UTC"), zone.clone());
                zone
            }
        }
    }

    /// Drops every cached zone. Registered maps are untouched; the next
    /// resolution of each zone re-reads them.
    pub fn reset(&self) {
        self.zones.write().unwrap().clear();
    }

    fn resolve_uncached(&self, iana_id: &str) -> Result<Zone, Error> {
        let tz = engine::lookup(iana_id)?;
        let map = match self.maps.get(iana_id) {
            Some(map) => map,
            None => self.derived_map(iana_id)?,
        };
        trace!(
            "resolved time zone {iana_id} (calendar {}, week starts {})",
            map.calendar(),
            map.first_day_of_week(),
        );
        Ok(Zone::from_parts(&map, tz))
    }

    /// The fallback configuration for zones without a registered map: the
    /// engine's native calendar and the locale-implied first weekday.
    fn derived_map(&self, iana_id: &str) -> Result<ZoneMap, Error> {
        if iana_id == "UTC" {
            return Ok(ZoneMap::utc());
        }
        let map = ZoneMap::new(
            iana_id,
            engine::first_weekday_for_locale(&Locale::UND),
            CalendarKind::Gregorian,
            "und",
        )?;
        Ok(map)
    }
}

impl Default for ZoneDatabase {
    fn default() -> ZoneDatabase {
        ZoneDatabase::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tehran_map() -> ZoneMap {
        ZoneMap::new(
            "Asia/Tehran",
            Weekday::Saturday,
            CalendarKind::Persian,
            "fa-IR",
        )
        .unwrap()
    }

    #[test]
    fn resolves_with_registered_map() {
        let db = ZoneDatabase::new();
        db.maps().add(tehran_map());

        let zone = db.get("Asia/Tehran").unwrap();
        assert_eq!(zone.iana_id(), "Asia/Tehran");
        assert_eq!(zone.calendar(), CalendarKind::Persian);
        assert_eq!(zone.first_day_of_week(), Weekday::Saturday);
        assert_eq!(zone.weekday_ordering()[0], Weekday::Saturday);
        assert_eq!(zone.weekday_ordering()[6], Weekday::Friday);
    }

    #[test]
    fn cache_returns_the_same_handle() {
        let db = ZoneDatabase::new();
        db.maps().add(tehran_map());

        let first = db.get("Asia/Tehran").unwrap();
        let second = db.get("Asia/Tehran").unwrap();
        assert!(Arc::ptr_eq(&first.inner, &second.inner));
        assert_eq!(first.weekday_ordering(), second.weekday_ordering());
    }

    #[test]
    fn map_changes_do_not_affect_cached_zones() {
        let db = ZoneDatabase::new();
        db.maps().add(tehran_map());
        let before = db.get("Asia/Tehran").unwrap();

        db.maps().add(
            ZoneMap::new(
                "Asia/Tehran",
                Weekday::Monday,
                CalendarKind::Gregorian,
                "en-US",
            )
            .unwrap(),
        );
        let after = db.get("Asia/Tehran").unwrap();
        assert_eq!(after.first_day_of_week(), before.first_day_of_week());

        db.reset();
        let fresh = db.get("Asia/Tehran").unwrap();
        assert_eq!(fresh.first_day_of_week(), Weekday::Monday);
    }

    #[test]
    fn unknown_zone_propagates_and_is_not_cached() {
        let db = ZoneDatabase::new();
        let err = db.get("Mars/Olympus_Mons").unwrap_err();
        assert!(err.is_unknown_zone());
        assert!(db.zones.read().unwrap().get("Mars/Olympus_Mons").is_none());
    }

    #[test]
    fn empty_id_is_invalid() {
        let db = ZoneDatabase::new();
        assert!(db.get("").unwrap_err().is_invalid_argument());
    }

    #[test]
    fn utc_survives_registry_clear() {
        let db = ZoneDatabase::new();
        db.maps().clear();
        let utc = db.utc();
        assert_eq!(utc.iana_id(), "UTC");
        assert_eq!(utc.offset_seconds(), 0);
        assert_eq!(utc.first_day_of_week(), Weekday::Sunday);
    }

    #[test]
    fn zone_ordering_is_by_offset() {
        let db = ZoneDatabase::new();
        db.maps().add(tehran_map());
        let tehran = db.get("Asia/Tehran").unwrap();
        let utc = db.utc();
        // Tehran is at +03:30 or +04:30, always east of UTC.
        assert!(utc < tehran);
        assert_ne!(utc, tehran);
        assert_eq!(utc.to_string(), "GMT+00:00");
    }
}
