use crate::clock::{Clock, SystemClock};
use crate::events::Timestamp;
use chrono::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Cooldown bookkeeping guarded by one mutex
#[derive(Debug, Default)]
struct CooldownState {
    /// Last firing time per category
    last_fired: HashMap<String, Timestamp>,
    /// Categories with a delivery under way that records only on success
    in_flight: HashSet<String>,
}

/// Suppresses repeated alerts of the same category within a cooldown window
///
/// Each category is either quiet (never fired, or fired longer ago than the
/// cooldown) or cooling (fired within the window). Categories never affect
/// one another. Entries are only ever overwritten, never removed, and the
/// state lives exactly as long as this value does.
///
/// All access goes through one mutex so concurrent dispatchers cannot both
/// observe a quiet category and fire twice; use [`try_acquire`](Self::try_acquire)
/// for an atomic check-and-record, or [`try_reserve`](Self::try_reserve) when
/// the firing should only be recorded once delivery succeeded.
#[derive(Clone)]
pub struct AlertCoordinator {
    /// How long a category stays cooling after it fires
    cooldown: Duration,
    state: Arc<Mutex<CooldownState>>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for AlertCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertCoordinator")
            .field("cooldown", &self.cooldown)
            .field("categories", &self.lock().last_fired.len())
            .finish()
    }
}

impl Default for AlertCoordinator {
    fn default() -> Self {
        Self::new(Duration::minutes(30)) // Default: 30 minute cooldown
    }
}

impl AlertCoordinator {
    /// Create a coordinator backed by the system clock
    ///
    /// # Arguments
    ///
    /// * `cooldown` - Minimum time between two alerts of the same category
    pub fn new(cooldown: Duration) -> Self {
        Self::with_clock(cooldown, Arc::new(SystemClock))
    }

    /// Create a coordinator that reads time from `clock`
    ///
    /// # Arguments
    ///
    /// * `cooldown` - Minimum time between two alerts of the same category
    /// * `clock` - Time source, typically a `ManualClock` in tests
    pub fn with_clock(cooldown: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            cooldown,
            state: Arc::new(Mutex::new(CooldownState::default())),
            clock,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Check whether `category` fired less than one cooldown ago
    ///
    /// # Returns
    ///
    /// `true` if the category is cooling, `false` if it never fired or its
    /// window has elapsed
    pub fn is_in_cooldown(&self, category: &str) -> bool {
        let state = self.lock();
        self.is_cooling(&state, category)
    }

    /// Record that `category` fired now, starting or restarting its window
    pub fn record_alert(&self, category: &str) {
        let now = self.clock.now();
        self.lock().last_fired.insert(category.to_string(), now);
    }

    /// Atomically check and record a firing
    ///
    /// # Returns
    ///
    /// `true` if the category was quiet and is now cooling (the caller should
    /// deliver), `false` if it was already cooling and nothing changed
    pub fn try_acquire(&self, category: &str) -> bool {
        let mut state = self.lock();
        if self.is_cooling(&state, category) || state.in_flight.contains(category) {
            return false;
        }
        state.last_fired.insert(category.to_string(), self.clock.now());
        true
    }

    /// Reserve a quiet category without recording a firing yet
    ///
    /// While the reservation is held every other `try_reserve` or
    /// `try_acquire` for the category fails. Call
    /// [`Reservation::commit`] once delivery succeeded; dropping the
    /// reservation releases the category without recording.
    ///
    /// # Returns
    ///
    /// `None` if the category is cooling or already reserved
    pub fn try_reserve(&self, category: &str) -> Option<Reservation<'_>> {
        let mut state = self.lock();
        if self.is_cooling(&state, category) || !state.in_flight.insert(category.to_string()) {
            return None;
        }
        Some(Reservation {
            coordinator: self,
            category: category.to_string(),
        })
    }

    /// Time left before `category` may fire again, if it is cooling
    pub fn remaining(&self, category: &str) -> Option<Duration> {
        let state = self.lock();
        let fired_at = state.last_fired.get(category)?;
        let remaining = *fired_at + self.cooldown - self.clock.now();
        (remaining > Duration::zero()).then_some(remaining)
    }

    /// When `category` last fired
    pub fn last_fired(&self, category: &str) -> Option<Timestamp> {
        self.lock().last_fired.get(category).copied()
    }

    fn is_cooling(&self, state: &CooldownState, category: &str) -> bool {
        state
            .last_fired
            .get(category)
            .is_some_and(|fired_at| self.clock.now() - *fired_at < self.cooldown)
    }

    fn lock(&self) -> MutexGuard<'_, CooldownState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Exclusive claim on a category, returned by [`AlertCoordinator::try_reserve`]
#[must_use = "dropping a reservation releases it without recording"]
pub struct Reservation<'a> {
    coordinator: &'a AlertCoordinator,
    category: String,
}

impl Reservation<'_> {
    /// Record the firing and release the category in one step
    pub fn commit(self) {
        let now = self.coordinator.clock.now();
        self.coordinator
            .lock()
            .last_fired
            .insert(self.category.clone(), now);
        // Drop releases the in-flight entry
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.coordinator.lock().in_flight.remove(&self.category);
    }
}
