/*!
Calendar- and locale-aware civil date-times anchored to IANA time zones.

This crate provides three things:

1. A [`Zone`] handle: the resolved, cached, immutable representation of an
IANA time zone along with its calendar system, locale and first day of the
week. Zones are resolved lazily through a process-wide [`ZoneDatabase`]
(reachable via [`db`]) and configured declaratively by registering
[`ZoneMap`] records with the database's [`MapRegistry`].

2. A [`ZonedDateTime`] value: an immutable point in time carrying both an
absolute tick count (100-nanosecond units since the Unix epoch, UTC) and its
civil fields (year through second, plus weekday) as perceived in one zone
under that zone's calendar. Arithmetic and period boundaries round-trip
through the underlying calendar engine, so they stay correct across DST
transitions and month-length variation. For example, under the Persian
calendar used by `Asia/Tehran`:

```no_run
use civilzone::{CalendarKind, Weekday, Zone, ZoneMap, ZonedDateTime};

civilzone::db().maps().add(ZoneMap::new(
    "Asia/Tehran",
    Weekday::Saturday,
    CalendarKind::Persian,
    "fa-IR",
)?);
let tehran = Zone::get("Asia/Tehran")?;
let zdt = ZonedDateTime::new(1399, 10, 12, 23, 30, 0, &tehran)?;
let next = zdt.add_hours(1)?;
assert_eq!((next.day(), next.hour(), next.minute()), (13, 0, 30));
# Ok::<(), civilzone::Error>(())
```

3. An ambient clock: [`SystemClock`] (reachable via [`clock`]) answers "what
time is it, and in whose time zone?" without threading a zone parameter
through every call. A process-wide default zone is seeded from the host
system and can be overridden per logical call chain with an RAII scope:

```no_run
use civilzone::{clock, Zone};

let tehran = Zone::get("Asia/Tehran")?;
let _scope = clock().scope(tehran);
let now = clock().now()?; // civil fields in Asia/Tehran
# Ok::<(), civilzone::Error>(())
```

The timezone database and calendar conversion engine are external: `jiff`
resolves IANA identifiers, offset history and ambiguous local times, and the
ICU4X crates project civil dates onto calendars and render them per locale.
This crate implements no calendar math of its own beyond weekday rotation
and week boundary computation.

A small, independent [`ControllableTimer`] rounds out the crate for
consumers that want to steer the passage of time in services and tests.
*/

#![warn(missing_debug_implementations)]

pub use icu_locid::Locale;

pub use crate::{
    calendar::CalendarKind,
    clock::{clock, FakeClock, ScopeGuard, SystemClock, TimeSource},
    error::Error,
    fmt::FormatSpec,
    map::{MapRegistry, ZoneMap},
    timer::{
        ControllableTimer, FakeTimer, FakeTimerFactory, SystemTimerFactory,
        Timer, TimerFactory,
    },
    weekday::Weekday,
    zone::{db, Zone, ZoneDatabase},
    zoned::ZonedDateTime,
};

#[macro_use]
mod logging;

mod calendar;
mod clock;
mod engine;
mod error;
mod fmt;
mod map;
mod timer;
mod weekday;
mod zone;
mod zoned;
