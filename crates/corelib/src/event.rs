//! Binary auto-reset event.
//!
//! A successful wait consumes the signal, so each `signal` releases at most
//! one waiter. Signaling an already signaled event is a no-op. Either side may
//! `close` the event; afterwards signals fail and waits fail once any pending
//! signal has been consumed.

use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::SyncError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventState {
    Unsignaled,
    Signaled,
}

#[derive(Debug)]
struct State {
    signaled: bool,
    closed: bool,
}

#[derive(Debug)]
pub struct Event {
    state: Mutex<State>,
    cond: Condvar,
}

impl Event {
    pub fn new(initial: EventState) -> Self {
        Self {
            state: Mutex::new(State {
                signaled: initial == EventState::Signaled,
                closed: false,
            }),
            cond: Condvar::new(),
        }
    }

    pub fn signal(&self) -> Result<(), SyncError> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(SyncError::Closed);
        }
        state.signaled = true;
        drop(state);
        self.cond.notify_one();
        Ok(())
    }

    /// Block until the event is signaled, then reset it.
    ///
    /// `None` waits without a deadline. A zero timeout only succeeds if the
    /// event is already signaled.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<(), SyncError> {
        let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
        let mut state = self.state.lock();
        loop {
            if state.signaled {
                state.signaled = false;
                return Ok(());
            }
            if state.closed {
                return Err(SyncError::Closed);
            }
            match deadline {
                None => self.cond.wait(&mut state),
                Some(deadline) => {
                    if Instant::now() >= deadline {
                        return Err(SyncError::TimedOut);
                    }
                    // Spurious and timed-out wakeups both loop back to the checks above.
                    let _ = self.cond.wait_until(&mut state, deadline);
                }
            }
        }
    }

    pub fn close(&self) {
        self.state.lock().closed = true;
        self.cond.notify_all();
    }

    pub fn is_signaled(&self) -> bool {
        self.state.lock().signaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn initially_signaled_event_releases_one_wait() {
        let event = Event::new(EventState::Signaled);
        assert_eq!(event.wait(Some(Duration::ZERO)), Ok(()));
        assert_eq!(
            event.wait(Some(Duration::ZERO)),
            Err(SyncError::TimedOut)
        );
    }

    #[test]
    fn zero_timeout_on_unsignaled_event_times_out() {
        let event = Event::new(EventState::Unsignaled);
        assert_eq!(
            event.wait(Some(Duration::from_millis(0))),
            Err(SyncError::TimedOut)
        );
    }

    #[test]
    fn double_signal_is_still_one_release() {
        let event = Event::new(EventState::Unsignaled);
        event.signal().expect("signal");
        event.signal().expect("signal");
        assert!(event.wait(Some(Duration::ZERO)).is_ok());
        assert!(event.wait(Some(Duration::ZERO)).is_err());
    }

    #[test]
    fn wait_wakes_on_signal_from_another_thread() {
        let event = Arc::new(Event::new(EventState::Unsignaled));
        let signaler = {
            let event = Arc::clone(&event);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                event.signal().expect("signal");
            })
        };
        assert_eq!(event.wait(None), Ok(()));
        signaler.join().expect("join signaler");
        assert!(!event.is_signaled());
    }

    #[test]
    fn close_drains_pending_signal_first() {
        let event = Event::new(EventState::Unsignaled);
        event.signal().expect("signal");
        event.close();
        assert_eq!(event.signal(), Err(SyncError::Closed));
        assert_eq!(event.wait(None), Ok(()));
        assert_eq!(event.wait(None), Err(SyncError::Closed));
    }

    #[test]
    fn close_wakes_blocked_waiter() {
        let event = Arc::new(Event::new(EventState::Unsignaled));
        let waiter = {
            let event = Arc::clone(&event);
            thread::spawn(move || event.wait(None))
        };
        thread::sleep(Duration::from_millis(20));
        event.close();
        assert_eq!(waiter.join().expect("join waiter"), Err(SyncError::Closed));
    }
}
