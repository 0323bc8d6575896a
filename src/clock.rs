use std::cell::RefCell;
use std::sync::{Arc, OnceLock, RwLock};

use crate::{
    engine,
    error::Error,
    zone::{db, Zone, ZoneDatabase},
    zoned::ZonedDateTime,
};

/// The process-wide ambient clock.
pub fn clock() -> &'static SystemClock {
    static CLOCK: OnceLock<SystemClock> = OnceLock::new();
    CLOCK.get_or_init(SystemClock::new)
}

/// A source of the current time, injectable so services can be steered in
/// tests. [`SystemClock`] reads the system clock; [`FakeClock`] is set by
/// hand.
pub trait TimeSource: Send + Sync {
    /// The current instant as 100-nanosecond ticks since the Unix epoch,
    /// UTC.
    fn utc_now_ticks(&self) -> i64;

    /// The current instant as civil fields in `zone`.
    fn now_in(&self, zone: &Zone) -> Result<ZonedDateTime, Error> {
        ZonedDateTime::from_ticks(self.utc_now_ticks(), zone)
    }
}

thread_local! {
    /// The per-call-chain zone override. Entering a scope replaces the
    /// value; it is not a stack.
    static SCOPE: RefCell<Option<Zone>> = const { RefCell::new(None) };
}

enum ClockDb {
    /// The process-wide [`db`].
    Global,
    Owned(Arc<ZoneDatabase>),
}

/// The ambient current-zone context plus the real time source.
///
/// A `SystemClock` carries a process default zone (lazily seeded from the
/// host system, falling back to UTC) and honors a per-call-chain override
/// established with [`SystemClock::scope`]. The override does not cross an
/// explicit `std::thread::spawn`; spawned work re-establishes it from a
/// cloned [`Zone`].
pub struct SystemClock {
    db: ClockDb,
    default_zone: RwLock<Option<Zone>>,
}

impl SystemClock {
    /// Creates a clock backed by the process-wide [`db`].
    pub fn new() -> SystemClock {
        SystemClock { db: ClockDb::Global, default_zone: RwLock::new(None) }
    }

    /// Creates a clock backed by its own zone database, for tests that
    /// need isolation from process-wide state.
    pub fn with_database(db: Arc<ZoneDatabase>) -> SystemClock {
        SystemClock {
            db: ClockDb::Owned(db),
            default_zone: RwLock::new(None),
        }
    }

    /// The zone database this clock resolves identifiers through.
    pub fn database(&self) -> &ZoneDatabase {
        match self.db {
            ClockDb::Global => db(),
            ClockDb::Owned(ref db) => db,
        }
    }

    /// The zone in effect for the calling call chain: the scope override
    /// if one is set, else the process default.
    ///
    /// The default is resolved from the host system's zone on first use;
    /// when the host zone cannot be resolved, UTC is used.
    pub fn current(&self) -> Zone {
        if let Some(zone) = SCOPE.with(|scope| scope.borrow().clone()) {
            return zone;
        }
        if let Some(zone) = self.default_zone.read().unwrap().clone() {
            return zone;
        }
        let mut default = self.default_zone.write().unwrap();
        // Raced with another seeder; keep whichever zone won.
        if let Some(zone) = default.clone() {
            return zone;
        }
        let id = engine::system_zone_id();
        let zone = match self.database().get(&id) {
            Ok(zone) => zone,
            Err(err) => {
                warn!("cannot resolve system zone {id:?}: {err}, using UTC");
                self.database().utc()
            }
        };
        *default = Some(zone.clone());
        zone
    }

    /// Replaces the process default zone.
    pub fn set_default(&self, zone: Zone) {
        *self.default_zone.write().unwrap() = Some(zone);
    }

    /// Sets the zone override for the calling call chain, replacing any
    /// override already in effect.
    ///
    /// Callers are responsible for the matching [`SystemClock::end_scope`]
    /// on every exit path; prefer [`SystemClock::scope`], which guarantees
    /// it.
    pub fn start_scope(&self, zone: Zone) {
        SCOPE.with(|scope| *scope.borrow_mut() = Some(zone));
    }

    /// Clears the zone override for the calling call chain.
    pub fn end_scope(&self) {
        SCOPE.with(|scope| *scope.borrow_mut() = None);
    }

    /// Sets the zone override and returns a guard that clears it when
    /// dropped, error paths included.
    #[must_use = "dropping the guard ends the scope immediately"]
    pub fn scope(&self, zone: Zone) -> ScopeGuard<'_> {
        self.start_scope(zone);
        ScopeGuard { clock: self }
    }

    /// The host request pipeline entry point: resolves the inbound
    /// request's zone identifier via `resolve` and opens a scope for it.
    ///
    /// `resolve` returning `None` (no header, no profile) opens no scope,
    /// leaving the process default in effect. An identifier that fails to
    /// resolve is an error for the host to surface.
    pub fn begin_request<F>(
        &self,
        resolve: F,
    ) -> Result<Option<ScopeGuard<'_>>, Error>
    where
        F: FnOnce() -> Option<String>,
    {
        let Some(id) = resolve() else { return Ok(None) };
        let zone = self.database().get(&id)?;
        Ok(Some(self.scope(zone)))
    }

    /// The current instant in the calling call chain's current zone.
    pub fn now(&self) -> Result<ZonedDateTime, Error> {
        self.now_in(&self.current())
    }
}

impl TimeSource for SystemClock {
    fn utc_now_ticks(&self) -> i64 {
        engine::timestamp_to_ticks(engine::now())
    }
}

impl Default for SystemClock {
    fn default() -> SystemClock {
        SystemClock::new()
    }
}

impl core::fmt::Debug for SystemClock {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("SystemClock")
            .field("default_zone", &*self.default_zone.read().unwrap())
            .finish()
    }
}

/// Ends the scope opened by [`SystemClock::scope`] when dropped.
#[derive(Debug)]
pub struct ScopeGuard<'c> {
    clock: &'c SystemClock,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.clock.end_scope();
    }
}

/// A [`TimeSource`] whose current instant is set by hand.
///
/// ```
/// use civilzone::{FakeClock, TimeSource, Zone};
///
/// let clock = FakeClock::at_ticks(16_094_592_000_000_000);
/// let utc = Zone::utc();
/// let now = clock.now_in(&utc)?;
/// assert_eq!((now.year(), now.month(), now.day()), (2021, 1, 1));
/// # Ok::<(), civilzone::Error>(())
/// ```
#[derive(Debug)]
pub struct FakeClock {
    ticks: std::sync::atomic::AtomicI64,
}

impl FakeClock {
    /// Creates a fake clock pinned at the given tick count.
    pub fn at_ticks(ticks: i64) -> FakeClock {
        FakeClock { ticks: std::sync::atomic::AtomicI64::new(ticks) }
    }

    /// Pins the clock at the instant of the given value.
    pub fn set(&self, zdt: &ZonedDateTime) {
        self.set_ticks(zdt.ticks());
    }

    pub fn set_ticks(&self, ticks: i64) {
        self.ticks.store(ticks, std::sync::atomic::Ordering::SeqCst);
    }

    /// Moves the clock forward (or, with a negative count, backward).
    pub fn advance_seconds(&self, seconds: i64) {
        self.ticks.fetch_add(
            seconds * engine::TICKS_PER_SECOND,
            std::sync::atomic::Ordering::SeqCst,
        );
    }
}

impl TimeSource for FakeClock {
    fn utc_now_ticks(&self) -> i64 {
        self.ticks.load(std::sync::atomic::Ordering::SeqCst)
    }
}
