/*!
A timer whose schedule can be changed, paused and resumed after creation.

The timer owns one worker thread for its whole lifetime. The worker sleeps
on a condition variable until it is armed (a callback is attached),
scheduled (a due time is set) and started, then fires the callback after
the due time and every period thereafter. Every mutation bumps a
generation counter so a worker mid-wait notices and recomputes its
deadline instead of firing a stale schedule.

Services take timers through the [`TimerFactory`] seam; [`FakeTimer`] and
[`FakeTimerFactory`] let tests fire them by hand instead of waiting out
real time.
*/

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::Error;

/// The object-safe timer surface, shared by [`ControllableTimer`] and
/// [`FakeTimer`] so the factory seam can hand out either.
pub trait Timer: Send + Sync {
    /// Attaches the callback, replacing any previous one. With
    /// `auto_start` the timer starts immediately, provided a schedule is
    /// already set.
    fn on_callback(
        &self,
        callback: Box<dyn FnMut() + Send>,
        auto_start: bool,
    ) -> Result<(), Error>;

    /// Sets the due time (delay before the first fire) and the period
    /// between subsequent fires. A `None` period makes the timer
    /// one-shot.
    ///
    /// Returns whether the timer is running afterwards: `Ok(false)` when
    /// no callback is attached yet, in which case the schedule is kept
    /// for when one is.
    fn change(
        &self,
        due: Duration,
        period: Option<Duration>,
    ) -> Result<bool, Error>;

    /// Like [`Timer::change`] with the period equal to the due time.
    fn change_due(&self, due: Duration) -> Result<bool, Error> {
        self.change(due, Some(due))
    }

    /// Resumes a stopped timer with the full due time ahead of the first
    /// fire.
    fn start(&self) -> Result<(), Error>;

    /// Pauses the timer, keeping its callback and schedule. Returns
    /// whether it was running.
    fn stop(&self) -> Result<bool, Error>;

    fn is_started(&self) -> bool;

    /// Stops the timer for good and releases its callback. Idempotent.
    fn dispose(&self);
}

/// Creates [`Timer`]s. Services take a factory instead of constructing
/// timers directly so tests can substitute [`FakeTimerFactory`].
pub trait TimerFactory: Send + Sync {
    fn create(&self) -> Arc<dyn Timer>;
}

/// The [`TimerFactory`] for production use.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemTimerFactory;

impl TimerFactory for SystemTimerFactory {
    fn create(&self) -> Arc<dyn Timer> {
        Arc::new(ControllableTimer::new())
    }
}

type Callback = Arc<Mutex<Box<dyn FnMut() + Send>>>;

struct State {
    callback: Option<Callback>,
    /// The configured due time, re-applied in full by `start`.
    due: Option<Duration>,
    period: Option<Duration>,
    /// The delay the worker sleeps before the next fire. Diverges from
    /// `due` once a periodic timer has fired.
    next_delay: Option<Duration>,
    started: bool,
    disposed: bool,
    /// Bumped on every mutation so a waiting worker re-reads the schedule.
    generation: u64,
}

struct Shared {
    state: Mutex<State>,
    cv: Condvar,
}

/// A timer that can be rescheduled, paused and resumed.
///
/// A fresh timer is inert: it fires only once a callback has been attached
/// with [`ControllableTimer::on_callback`], a schedule has been set with
/// [`ControllableTimer::change`] and it has been started. [`stop`] pauses
/// without discarding the callback or schedule; [`start`] resumes with the
/// full due time ahead.
///
/// The callback runs on the timer's worker thread. A callback must not
/// dispose its own timer; [`dispose`] joins the worker and would deadlock.
///
/// [`stop`]: ControllableTimer::stop
/// [`start`]: ControllableTimer::start
/// [`dispose`]: ControllableTimer::dispose
pub struct ControllableTimer {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ControllableTimer {
    /// The sentinel rejected by [`ControllableTimer::change`]: a timer
    /// that should never fire is stopped, not scheduled infinitely far
    /// out.
    pub const INFINITE: Duration = Duration::MAX;

    pub fn new() -> ControllableTimer {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                callback: None,
                due: None,
                period: None,
                next_delay: None,
                started: false,
                disposed: false,
                generation: 0,
            }),
            cv: Condvar::new(),
        });
        let worker = {
            let shared = Arc::clone(&shared);
            std::thread::spawn(move || worker_loop(&shared))
        };
        ControllableTimer { shared, worker: Mutex::new(Some(worker)) }
    }

    /// Attaches the callback, replacing any previous one. With
    /// `auto_start` the timer starts immediately, provided a schedule is
    /// already set.
    pub fn on_callback(
        &self,
        callback: impl FnMut() + Send + 'static,
        auto_start: bool,
    ) -> Result<(), Error> {
        let mut state = self.shared.state.lock().unwrap();
        if state.disposed {
            return Err(Error::disposed("timer"));
        }
        state.callback = Some(Arc::new(Mutex::new(Box::new(callback))));
        if auto_start && state.due.is_some() {
            state.started = true;
        }
        state.generation += 1;
        self.shared.cv.notify_all();
        Ok(())
    }

    /// Sets the due time (delay before the first fire) and the period
    /// between subsequent fires. A `None` period makes the timer one-shot.
    ///
    /// Returns whether the timer is running afterwards: `Ok(false)` when
    /// no callback is attached yet, in which case the schedule is kept for
    /// when one is.
    pub fn change(
        &self,
        due: Duration,
        period: Option<Duration>,
    ) -> Result<bool, Error> {
        if due == ControllableTimer::INFINITE
            || period == Some(ControllableTimer::INFINITE)
        {
            return Err(Error::invalid_operation(
                "an infinite schedule never fires; stop the timer instead",
            ));
        }
        let mut state = self.shared.state.lock().unwrap();
        if state.disposed {
            return Err(Error::disposed("timer"));
        }
        state.due = Some(due);
        state.period = period;
        state.next_delay = Some(due);
        state.started = state.callback.is_some();
        state.generation += 1;
        self.shared.cv.notify_all();
        Ok(state.started)
    }

    /// Like [`ControllableTimer::change`] with the period equal to the due
    /// time.
    pub fn change_due(&self, due: Duration) -> Result<bool, Error> {
        self.change(due, Some(due))
    }

    /// Resumes a stopped timer with the full due time ahead of the first
    /// fire, however far into a period the timer was when it stopped.
    pub fn start(&self) -> Result<(), Error> {
        let mut state = self.shared.state.lock().unwrap();
        if state.disposed {
            return Err(Error::disposed("timer"));
        }
        if state.callback.is_none() {
            return Err(Error::invalid_operation(
                "cannot start a timer with no callback attached",
            ));
        }
        let Some(due) = state.due else {
            return Err(Error::invalid_operation(
                "cannot start a timer with no schedule set",
            ));
        };
        state.next_delay = Some(due);
        state.started = true;
        state.generation += 1;
        self.shared.cv.notify_all();
        Ok(())
    }

    /// Pauses the timer, keeping its callback and schedule. Returns
    /// whether it was running.
    pub fn stop(&self) -> Result<bool, Error> {
        let mut state = self.shared.state.lock().unwrap();
        if state.disposed {
            return Err(Error::disposed("timer"));
        }
        let was_started = state.started;
        state.started = false;
        state.generation += 1;
        self.shared.cv.notify_all();
        Ok(was_started)
    }

    pub fn is_started(&self) -> bool {
        self.shared.state.lock().unwrap().started
    }

    /// Stops the timer for good, releases its callback and joins the
    /// worker thread. Idempotent; also run on drop. Must not be called
    /// from inside the callback.
    pub fn dispose(&self) {
        {
            let mut state = self.shared.state.lock().unwrap();
            state.disposed = true;
            state.started = false;
            // Dropping the callback here breaks the cycle formed when a
            // callback captures a handle to its own timer.
            state.callback = None;
            state.generation += 1;
        }
        self.shared.cv.notify_all();
        if let Some(worker) = self.worker.lock().unwrap().take() {
            // The worker only sleeps on the condvar or runs the callback,
            // so the join ends as soon as the callback returns.
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: &Shared) {
    let mut state = shared.state.lock().unwrap();
    loop {
        if state.disposed {
            return;
        }
        let (delay, armed) = (state.next_delay, state.callback.is_some());
        if !state.started || !armed {
            state = shared.cv.wait(state).unwrap();
            continue;
        }
        let Some(delay) = delay else {
            state = shared.cv.wait(state).unwrap();
            continue;
        };

        // Sleep out the delay, restarting whenever the schedule is
        // mutated underneath us.
        let generation = state.generation;
        let deadline = Instant::now() + delay;
        loop {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let (next, _) =
                shared.cv.wait_timeout(state, deadline - now).unwrap();
            state = next;
            if state.generation != generation || state.disposed {
                break;
            }
        }
        if state.generation != generation || state.disposed {
            continue;
        }

        let Some(callback) = state.callback.clone() else { continue };
        match state.period {
            Some(period) => state.next_delay = Some(period),
            // One-shot: fire once, then wait to be rescheduled.
            None => state.started = false,
        }
        state.generation += 1;
        drop(state);
        // The state lock is released while the callback runs, so the
        // callback itself may reschedule or stop the timer.
        (callback.lock().unwrap())();
        state = shared.state.lock().unwrap();
    }
}

impl Timer for ControllableTimer {
    fn on_callback(
        &self,
        callback: Box<dyn FnMut() + Send>,
        auto_start: bool,
    ) -> Result<(), Error> {
        ControllableTimer::on_callback(self, callback, auto_start)
    }

    fn change(
        &self,
        due: Duration,
        period: Option<Duration>,
    ) -> Result<bool, Error> {
        ControllableTimer::change(self, due, period)
    }

    fn start(&self) -> Result<(), Error> {
        ControllableTimer::start(self)
    }

    fn stop(&self) -> Result<bool, Error> {
        ControllableTimer::stop(self)
    }

    fn is_started(&self) -> bool {
        ControllableTimer::is_started(self)
    }

    fn dispose(&self) {
        ControllableTimer::dispose(self)
    }
}

impl Drop for ControllableTimer {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Default for ControllableTimer {
    fn default() -> ControllableTimer {
        ControllableTimer::new()
    }
}

impl core::fmt::Debug for ControllableTimer {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let state = self.shared.state.lock().unwrap();
        f.debug_struct("ControllableTimer")
            .field("armed", &state.callback.is_some())
            .field("due", &state.due)
            .field("period", &state.period)
            .field("started", &state.started)
            .field("disposed", &state.disposed)
            .finish()
    }
}

struct FakeState {
    callback: Option<Callback>,
    due: Option<Duration>,
    period: Option<Duration>,
    started: bool,
    disposed: bool,
}

/// A [`Timer`] with no worker thread: it fires only when a test calls
/// [`FakeTimer::fire`]. Scheduling and error semantics otherwise match
/// [`ControllableTimer`].
pub struct FakeTimer {
    state: Mutex<FakeState>,
}

impl FakeTimer {
    pub fn new() -> FakeTimer {
        FakeTimer {
            state: Mutex::new(FakeState {
                callback: None,
                due: None,
                period: None,
                started: false,
                disposed: false,
            }),
        }
    }

    /// Attaches the callback, replacing any previous one.
    pub fn on_callback(
        &self,
        callback: impl FnMut() + Send + 'static,
        auto_start: bool,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return Err(Error::disposed("timer"));
        }
        state.callback = Some(Arc::new(Mutex::new(Box::new(callback))));
        if auto_start && state.due.is_some() {
            state.started = true;
        }
        Ok(())
    }

    /// Runs the callback once, as the worker thread of a real timer
    /// would. Returns whether it fired; a timer that is unarmed, stopped
    /// or disposed does not fire. A one-shot timer stops itself.
    pub fn fire(&self) -> bool {
        let callback = {
            let mut state = self.state.lock().unwrap();
            if state.disposed || !state.started {
                return false;
            }
            let Some(callback) = state.callback.clone() else {
                return false;
            };
            if state.period.is_none() {
                state.started = false;
            }
            callback
        };
        (callback.lock().unwrap())();
        true
    }
}

impl Timer for FakeTimer {
    fn on_callback(
        &self,
        callback: Box<dyn FnMut() + Send>,
        auto_start: bool,
    ) -> Result<(), Error> {
        FakeTimer::on_callback(self, callback, auto_start)
    }

    fn change(
        &self,
        due: Duration,
        period: Option<Duration>,
    ) -> Result<bool, Error> {
        if due == ControllableTimer::INFINITE
            || period == Some(ControllableTimer::INFINITE)
        {
            return Err(Error::invalid_operation(
                "an infinite schedule never fires; stop the timer instead",
            ));
        }
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return Err(Error::disposed("timer"));
        }
        state.due = Some(due);
        state.period = period;
        state.started = state.callback.is_some();
        Ok(state.started)
    }

    fn start(&self) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return Err(Error::disposed("timer"));
        }
        if state.callback.is_none() {
            return Err(Error::invalid_operation(
                "cannot start a timer with no callback attached",
            ));
        }
        if state.due.is_none() {
            return Err(Error::invalid_operation(
                "cannot start a timer with no schedule set",
            ));
        }
        state.started = true;
        Ok(())
    }

    fn stop(&self) -> Result<bool, Error> {
        let mut state = self.state.lock().unwrap();
        if state.disposed {
            return Err(Error::disposed("timer"));
        }
        let was_started = state.started;
        state.started = false;
        Ok(was_started)
    }

    fn is_started(&self) -> bool {
        self.state.lock().unwrap().started
    }

    fn dispose(&self) {
        let mut state = self.state.lock().unwrap();
        state.disposed = true;
        state.started = false;
        state.callback = None;
    }
}

impl Default for FakeTimer {
    fn default() -> FakeTimer {
        FakeTimer::new()
    }
}

impl core::fmt::Debug for FakeTimer {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let state = self.state.lock().unwrap();
        f.debug_struct("FakeTimer")
            .field("armed", &state.callback.is_some())
            .field("due", &state.due)
            .field("period", &state.period)
            .field("started", &state.started)
            .field("disposed", &state.disposed)
            .finish()
    }
}

/// A [`TimerFactory`] that hands out [`FakeTimer`]s and remembers them,
/// so a test can reach the timers a service created and fire them.
#[derive(Debug, Default)]
pub struct FakeTimerFactory {
    created: Mutex<Vec<Arc<FakeTimer>>>,
}

impl FakeTimerFactory {
    pub fn new() -> FakeTimerFactory {
        FakeTimerFactory::default()
    }

    /// Every timer this factory has created, in creation order.
    pub fn created(&self) -> Vec<Arc<FakeTimer>> {
        self.created.lock().unwrap().clone()
    }
}

impl TimerFactory for FakeTimerFactory {
    fn create(&self) -> Arc<dyn Timer> {
        let timer = Arc::new(FakeTimer::new());
        self.created.lock().unwrap().push(Arc::clone(&timer));
        timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Weak;

    fn counter() -> (Arc<AtomicU32>, impl FnMut() + Send + 'static) {
        let fired = Arc::new(AtomicU32::new(0));
        let inc = Arc::clone(&fired);
        (fired, move || {
            inc.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn fresh_timer_is_inert() {
        let timer = ControllableTimer::new();
        assert!(!timer.is_started());
        assert!(timer.start().unwrap_err().is_invalid_operation());
    }

    #[test]
    fn change_without_callback_keeps_schedule() {
        let timer = ControllableTimer::new();
        assert!(!timer.change(Duration::from_millis(5), None).unwrap());
        assert!(!timer.is_started());

        let (fired, callback) = counter();
        timer.on_callback(callback, true).unwrap();
        assert!(timer.is_started());
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // One-shot: fired once, then stopped itself.
        assert!(!timer.is_started());
    }

    #[test]
    fn periodic_timer_fires_repeatedly() {
        let timer = ControllableTimer::new();
        let (fired, callback) = counter();
        timer.on_callback(callback, false).unwrap();
        assert!(timer.change_due(Duration::from_millis(10)).unwrap());
        std::thread::sleep(Duration::from_millis(200));
        assert!(fired.load(Ordering::SeqCst) >= 2);
    }

    #[test]
    fn stop_pauses_and_start_resumes() {
        let timer = ControllableTimer::new();
        let (fired, callback) = counter();
        timer.on_callback(callback, false).unwrap();
        timer.change_due(Duration::from_millis(10)).unwrap();
        assert!(timer.stop().unwrap());
        let quiesced = fired.load(Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), quiesced);

        timer.start().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        assert!(fired.load(Ordering::SeqCst) > quiesced);
        assert!(timer.stop().unwrap());
        assert!(!timer.stop().unwrap());
    }

    #[test]
    fn start_resumes_with_the_full_due_time() {
        let timer = ControllableTimer::new();
        let (fired, callback) = counter();
        timer.on_callback(callback, false).unwrap();
        timer
            .change(Duration::from_millis(10), Some(Duration::from_millis(25)))
            .unwrap();
        // Let the first fire happen so the worker has moved on to the
        // period.
        while fired.load(Ordering::SeqCst) == 0 {
            std::thread::sleep(Duration::from_millis(5));
        }
        timer.stop().unwrap();
        assert_eq!(
            timer.shared.state.lock().unwrap().next_delay,
            Some(Duration::from_millis(25)),
        );

        timer.start().unwrap();
        let state = timer.shared.state.lock().unwrap();
        assert_eq!(state.next_delay, Some(Duration::from_millis(10)));
        assert_eq!(state.due, Some(Duration::from_millis(10)));
    }

    #[test]
    fn infinite_schedule_is_rejected() {
        let timer = ControllableTimer::new();
        let err = timer
            .change(ControllableTimer::INFINITE, None)
            .unwrap_err();
        assert!(err.is_invalid_operation());
        let err = timer
            .change(
                Duration::from_millis(1),
                Some(ControllableTimer::INFINITE),
            )
            .unwrap_err();
        assert!(err.is_invalid_operation());
    }

    #[test]
    fn disposed_timer_rejects_everything() {
        let timer = ControllableTimer::new();
        timer.dispose();
        timer.dispose();
        assert!(timer.start().unwrap_err().is_disposed());
        assert!(timer.stop().unwrap_err().is_disposed());
        assert!(timer
            .change_due(Duration::from_millis(1))
            .unwrap_err()
            .is_disposed());
        assert!(timer.on_callback(|| {}, false).unwrap_err().is_disposed());
    }

    #[test]
    fn dispose_releases_a_self_referencing_callback() {
        let timer = Arc::new(ControllableTimer::new());
        let weak: Weak<ControllableTimer> = Arc::downgrade(&timer);
        let handle = Arc::clone(&timer);
        timer
            .on_callback(
                move || {
                    let _ = handle.is_started();
                },
                false,
            )
            .unwrap();
        timer.dispose();
        drop(timer);
        // Dispose dropped the callback, so the cycle through `handle` is
        // gone and nothing keeps the timer alive.
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn callback_can_reschedule() {
        let timer = Arc::new(ControllableTimer::new());
        let (fired, mut callback) = counter();
        let handle = Arc::clone(&timer);
        timer
            .on_callback(
                move || {
                    callback();
                    let _ = handle.stop();
                },
                false,
            )
            .unwrap();
        timer.change_due(Duration::from_millis(10)).unwrap();
        std::thread::sleep(Duration::from_millis(150));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_started());
        timer.dispose();
    }

    #[test]
    fn fake_timer_fires_by_hand() {
        let timer = FakeTimer::new();
        assert!(!timer.fire());

        let (fired, callback) = counter();
        timer.on_callback(callback, false).unwrap();
        assert!(!timer.fire());
        assert!(Timer::change_due(&timer, Duration::from_millis(10)).unwrap());
        assert!(timer.fire());
        assert!(timer.fire());
        assert_eq!(fired.load(Ordering::SeqCst), 2);

        assert!(Timer::stop(&timer).unwrap());
        assert!(!timer.fire());
        Timer::dispose(&timer);
        assert!(!timer.fire());
        assert!(Timer::start(&timer).unwrap_err().is_disposed());
    }

    #[test]
    fn fake_one_shot_stops_after_firing() {
        let timer = FakeTimer::new();
        let (fired, callback) = counter();
        timer.on_callback(callback, false).unwrap();
        Timer::change(&timer, Duration::from_millis(10), None).unwrap();
        assert!(timer.fire());
        assert!(!timer.is_started());
        assert!(!timer.fire());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fake_factory_records_created_timers() {
        let factory = FakeTimerFactory::new();
        let timer = factory.create();
        let (fired, callback) = counter();
        timer.on_callback(Box::new(callback), false).unwrap();
        timer.change_due(Duration::from_millis(10)).unwrap();

        let created = factory.created();
        assert_eq!(created.len(), 1);
        assert!(created[0].fire());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
