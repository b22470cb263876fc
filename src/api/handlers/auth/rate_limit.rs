//! Rate limiting primitives for auth flows.
//!
//! Counters live in process memory: they reset on restart and are not shared
//! between replicas.

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(15 * 60);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitAction {
    Login,
    PasswordRecovery,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check_email(&self, email: &str, action: RateLimitAction) -> RateLimitDecision;

    /// Forget the counter, e.g. after a successful login.
    fn reset_email(&self, email: &str, action: RateLimitAction);
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check_email(&self, _email: &str, _action: RateLimitAction) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }

    fn reset_email(&self, _email: &str, _action: RateLimitAction) {}
}

#[derive(Clone, Copy, Debug)]
struct Window {
    count: u32,
    reset_at: Instant,
}

/// Fixed window counter keyed by `(action, email)`.
#[derive(Debug)]
pub struct FixedWindowRateLimiter {
    max_attempts: u32,
    window: Duration,
    entries: Mutex<HashMap<(RateLimitAction, String), Window>>,
}

impl Default for FixedWindowRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_WINDOW)
    }
}

impl FixedWindowRateLimiter {
    #[must_use]
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            max_attempts,
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    pub(crate) fn check_at(
        &self,
        email: &str,
        action: RateLimitAction,
        now: Instant,
    ) -> RateLimitDecision {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let key = (action, email.to_string());

        match entries.get_mut(&key) {
            Some(window) if now <= window.reset_at => {
                if window.count >= self.max_attempts {
                    return RateLimitDecision::Limited;
                }
                window.count += 1;
                RateLimitDecision::Allowed
            }
            _ => {
                entries.retain(|_, window| now <= window.reset_at);
                entries.insert(
                    key,
                    Window {
                        count: 1,
                        reset_at: now + self.window,
                    },
                );
                RateLimitDecision::Allowed
            }
        }
    }

    pub(crate) fn tracked(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check_email(&self, email: &str, action: RateLimitAction) -> RateLimitDecision {
        self.check_at(email, action, Instant::now())
    }

    fn reset_email(&self, email: &str, action: RateLimitAction) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(action, email.to_string()));
    }
}
