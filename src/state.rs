//! # Awaitable state register.
//!
//! [`StateMachine`] holds one value out of a fixed finite set and lets async callers
//! wait for a particular value. It backs both [`ServiceHandle`](crate::ServiceHandle)
//! and [`Application`](crate::Application) lifecycle states.
//!
//! ## Architecture
//! ```text
//! StateMachine<T>
//!   ├─ current: watch<T>               (non-blocking get)
//!   └─ handles: T ──► watch<u64>       (one wait-handle per legal value)
//!
//! set(v):  current = v ──► handles[v] += 1   (wakes every waiter of v)
//! wait(v): subscribe(handles[v]) ──► current == v ? done : await next signal of v
//! ```
//!
//! ## Rules
//! - A `wait(v)` registered before `set(v)` completes once that `set` runs, even if
//!   another `set` follows immediately.
//! - A `wait(v)` registered after `set(other)` waits for a **new** `set(v)`.
//! - Values outside the legal set are rejected with [`StateError::InvalidState`].
//!
//! ## Scoped transitions
//! [`StateMachine::transition`] returns a [`Transition`] guard that records the current
//! value as a fallback. If the guard is dropped without [`Transition::commit`] (early
//! return with `?`, or the enclosing future being cancelled by a timeout) the fallback
//! is restored, so a failed transition never leaves the machine showing a value it
//! never legitimately reached.
//!
//! ## Example
//! ```rust
//! use appvisor::{ServiceState, StateMachine};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), appvisor::StateError> {
//! let state = StateMachine::new(ServiceState::Closed);
//! {
//!     let step = state.transition();
//!     step.set(ServiceState::Starting)?;
//!     // dropped without commit: restored to Closed
//! }
//! assert_eq!(state.get(), ServiceState::Closed);
//!
//! state.set(ServiceState::Ready)?;
//! state.wait(ServiceState::Ready).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use serde::Serialize;
use tokio::sync::watch;

use crate::error::StateError;

/// A finite value set usable by a [`StateMachine`].
pub trait StateSet: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every value of the set.
    const ALL: &'static [Self];
}

/// Lifecycle states shared by services and applications.
///
/// Transitions are linear: `Closed → Starting → Ready → Closing → Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceState {
    /// Initial and terminal state.
    Closed,
    /// `init` and the health check are running.
    Starting,
    /// Started and healthy.
    Ready,
    /// `close` is running.
    Closing,
}

impl StateSet for ServiceState {
    const ALL: &'static [Self] = &[
        ServiceState::Closed,
        ServiceState::Starting,
        ServiceState::Ready,
        ServiceState::Closing,
    ];
}

impl ServiceState {
    /// Upper-case label used in logs and inspection output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceState::Closed => "CLOSED",
            ServiceState::Starting => "STARTING",
            ServiceState::Ready => "READY",
            ServiceState::Closing => "CLOSING",
        }
    }
}

impl std::fmt::Display for ServiceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Awaitable register of one value from a fixed finite set.
pub struct StateMachine<T: StateSet> {
    current: watch::Sender<T>,
    handles: HashMap<T, watch::Sender<u64>>,
}

impl<T: StateSet> StateMachine<T> {
    /// Creates a machine accepting every value of `T`.
    pub fn new(initial: T) -> Self {
        Self::build(T::ALL, initial)
    }

    /// Creates a machine restricted to `values`.
    ///
    /// Fails if `initial` is not part of `values`.
    pub fn with_values(values: &[T], initial: T) -> Result<Self, StateError> {
        if !values.contains(&initial) {
            return Err(invalid(initial));
        }
        Ok(Self::build(values, initial))
    }

    fn build(values: &[T], initial: T) -> Self {
        let handles = values
            .iter()
            .map(|v| (*v, watch::channel(0u64).0))
            .collect();
        let machine = Self {
            current: watch::channel(initial).0,
            handles,
        };
        machine.signal(initial);
        machine
    }

    /// Returns the current value without blocking.
    pub fn get(&self) -> T {
        *self.current.borrow()
    }

    /// Returns `true` if the current value is `value`.
    pub fn is(&self, value: T) -> bool {
        self.get() == value
    }

    /// Records `value` as current and wakes everyone waiting for it.
    pub fn set(&self, value: T) -> Result<(), StateError> {
        if !self.handles.contains_key(&value) {
            return Err(invalid(value));
        }
        self.signal(value);
        Ok(())
    }

    /// Suspends until the current value becomes `value`.
    ///
    /// Returns immediately when the machine already holds `value`.
    pub async fn wait(&self, value: T) -> Result<(), StateError> {
        let handle = self.handles.get(&value).ok_or_else(|| invalid(value))?;
        let mut rx = handle.subscribe();
        if self.is(value) {
            return Ok(());
        }
        // Errors only when the sender is dropped, which `&self` rules out.
        let _ = rx.changed().await;
        Ok(())
    }

    /// Starts a scoped transition; see [`Transition`].
    pub fn transition(&self) -> Transition<'_, T> {
        Transition {
            machine: self,
            fallback: self.get(),
            committed: false,
        }
    }

    fn signal(&self, value: T) {
        self.current.send_replace(value);
        if let Some(handle) = self.handles.get(&value) {
            handle.send_modify(|n| *n = n.wrapping_add(1));
        }
    }
}

impl<T: StateSet> Debug for StateMachine<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("StateMachine").field(&self.get()).finish()
    }
}

/// Guard of a scoped transition.
///
/// Restores the value recorded at creation when dropped without [`commit`](Self::commit).
#[must_use = "dropping the transition immediately restores the fallback value"]
pub struct Transition<'a, T: StateSet> {
    machine: &'a StateMachine<T>,
    fallback: T,
    committed: bool,
}

impl<T: StateSet> Transition<'_, T> {
    /// Sets an intermediate or final value inside the transition.
    pub fn set(&self, value: T) -> Result<(), StateError> {
        self.machine.set(value)
    }

    /// Value restored if the transition is abandoned.
    pub fn fallback(&self) -> T {
        self.fallback
    }

    /// Keeps the current value.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl<T: StateSet> Drop for Transition<'_, T> {
    fn drop(&mut self) {
        if !self.committed && !self.machine.is(self.fallback) {
            self.machine.signal(self.fallback);
        }
    }
}

fn invalid<T: Debug>(value: T) -> StateError {
    StateError::InvalidState {
        value: format!("{value:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn starts_at_initial_value() {
        let state = StateMachine::new(ServiceState::Closed);
        assert_eq!(state.get(), ServiceState::Closed);
        assert!(state.is(ServiceState::Closed));
    }

    #[test]
    fn restricted_set_rejects_unknown_values() {
        let state =
            StateMachine::with_values(&[ServiceState::Closed, ServiceState::Ready], ServiceState::Closed)
                .unwrap();
        assert!(state.set(ServiceState::Ready).is_ok());
        assert!(matches!(
            state.set(ServiceState::Starting),
            Err(StateError::InvalidState { .. })
        ));
        assert_eq!(state.get(), ServiceState::Ready);

        let bad = StateMachine::with_values(&[ServiceState::Ready], ServiceState::Closed);
        assert!(bad.is_err());
    }

    #[tokio::test]
    async fn wait_on_unknown_value_fails() {
        let state = StateMachine::with_values(&[ServiceState::Closed], ServiceState::Closed).unwrap();
        assert!(state.wait(ServiceState::Ready).await.is_err());
    }

    #[tokio::test]
    async fn wait_returns_immediately_for_current_value() {
        let state = StateMachine::new(ServiceState::Ready);
        state.wait(ServiceState::Ready).await.unwrap();
    }

    #[tokio::test]
    async fn early_waiter_sees_value_even_if_overwritten() {
        let state = Arc::new(StateMachine::new(ServiceState::Closed));
        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.wait(ServiceState::Ready).await })
        };
        tokio::task::yield_now().await;

        state.set(ServiceState::Ready).unwrap();
        state.set(ServiceState::Closing).unwrap();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter must complete")
            .unwrap()
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn late_waiter_needs_a_new_signal() {
        let state = Arc::new(StateMachine::new(ServiceState::Closed));
        state.set(ServiceState::Ready).unwrap();
        state.set(ServiceState::Closing).unwrap();

        let late = tokio::time::timeout(Duration::from_millis(50), state.wait(ServiceState::Ready)).await;
        assert!(late.is_err(), "an old signal must not satisfy a new waiter");

        let waiter = {
            let state = state.clone();
            tokio::spawn(async move { state.wait(ServiceState::Ready).await })
        };
        tokio::task::yield_now().await;
        state.set(ServiceState::Ready).unwrap();
        waiter.await.unwrap().unwrap();
    }

    #[test]
    fn abandoned_transition_restores_fallback() {
        let state = StateMachine::new(ServiceState::Closed);
        let run = || -> Result<(), StateError> {
            let step = state.transition();
            step.set(ServiceState::Starting)?;
            step.set(ServiceState::Ready)?;
            Err(StateError::InvalidState {
                value: "boom".into(),
            })
        };
        assert!(run().is_err());
        assert_eq!(state.get(), ServiceState::Closed);
    }

    #[test]
    fn committed_transition_keeps_value() {
        let state = StateMachine::new(ServiceState::Closed);
        let step = state.transition();
        assert_eq!(step.fallback(), ServiceState::Closed);
        step.set(ServiceState::Starting).unwrap();
        step.set(ServiceState::Ready).unwrap();
        step.commit();
        assert_eq!(state.get(), ServiceState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_transition_restores_fallback() {
        let state = StateMachine::new(ServiceState::Closed);
        let slow = async {
            let step = state.transition();
            step.set(ServiceState::Starting).unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            step.set(ServiceState::Ready).unwrap();
            step.commit();
        };
        let res = tokio::time::timeout(Duration::from_millis(10), slow).await;
        assert!(res.is_err());
        assert_eq!(state.get(), ServiceState::Closed);
    }
}
