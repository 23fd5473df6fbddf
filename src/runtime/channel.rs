/// Bounded blocking channels. One mutex guards the queue; two condvars wake
/// blocked senders and receivers. A value sent on a channel is owned by the
/// queue until a receiver takes it, so the net reference-count change of a
/// send/recv pair is zero.
///
/// Capacity 0 makes a rendezvous channel: the sender parks until a receiver
/// has taken its value.
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::heap::CensusToken;
use crate::value::{RuntimeError, Value};

/// Outcome of a non-blocking receive.
pub enum TryRecvOutcome {
    Item(Value),
    /// Channel closed and drained: a blocking recv would return null.
    Closed,
    /// Nothing available right now.
    Pending,
}

struct ChannelState {
    queue: VecDeque<Value>,
    closed: bool,
    /// Receivers currently parked in `recv` — lets a rendezvous `try_send`
    /// know whether a hand-off can complete.
    recv_waiting: usize,
}

pub struct ChannelObj {
    state: Mutex<ChannelState>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    _census: CensusToken,
}

impl ChannelObj {
    pub(crate) fn new(capacity: usize, census: CensusToken) -> Self {
        ChannelObj {
            state: Mutex::new(ChannelState {
                queue: VecDeque::with_capacity(capacity.max(1)),
                closed: false,
                recv_waiting: 0,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            _census: census,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.state.lock().expect("channel lock poisoned").queue.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().expect("channel lock poisoned").closed
    }

    /// Blocking send. Fails on a closed channel; otherwise waits for space
    /// (capacity 0: waits until a receiver takes the value).
    pub fn send(&self, value: Value) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().expect("channel lock poisoned");
        if self.capacity == 0 {
            if state.closed {
                return Err(closed_send_error());
            }
            state.queue.push_back(value);
            self.not_empty.notify_one();
            while !state.queue.is_empty() && !state.closed {
                state = self.not_full.wait(state).expect("channel lock poisoned");
            }
            return Ok(());
        }
        loop {
            if state.closed {
                return Err(closed_send_error());
            }
            if state.queue.len() < self.capacity {
                state.queue.push_back(value);
                self.not_empty.notify_one();
                return Ok(());
            }
            state = self.not_full.wait(state).expect("channel lock poisoned");
        }
    }

    /// Blocking receive. Returns `None` when the channel is closed and
    /// drained, or when the optional timeout expires first.
    pub fn recv(&self, timeout: Option<Duration>) -> Result<Option<Value>, RuntimeError> {
        let deadline = timeout.map(|d| Instant::now() + d);
        let mut state = self.state.lock().expect("channel lock poisoned");
        loop {
            if let Some(value) = state.queue.pop_front() {
                self.not_full.notify_one();
                return Ok(Some(value));
            }
            if state.closed {
                return Ok(None);
            }
            state.recv_waiting += 1;
            let waited = self.wait_not_empty(state, deadline);
            state = waited.0;
            state.recv_waiting -= 1;
            if waited.1 {
                // Timed out with nothing available.
                return Ok(None);
            }
        }
    }

    fn wait_not_empty<'a>(
        &'a self,
        state: MutexGuard<'a, ChannelState>,
        deadline: Option<Instant>,
    ) -> (MutexGuard<'a, ChannelState>, bool) {
        match deadline {
            None => (
                self.not_empty.wait(state).expect("channel lock poisoned"),
                false,
            ),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return (state, true);
                }
                let (guard, result) = self
                    .not_empty
                    .wait_timeout(state, deadline - now)
                    .expect("channel lock poisoned");
                (guard, result.timed_out())
            }
        }
    }

    /// Non-blocking send: `Ok(false)` when the channel is full (or, for a
    /// rendezvous channel, when no receiver is parked).
    pub fn try_send(&self, value: Value) -> Result<bool, RuntimeError> {
        let mut state = self.state.lock().expect("channel lock poisoned");
        if state.closed {
            return Err(closed_send_error());
        }
        let room = if self.capacity == 0 {
            state.queue.is_empty() && state.recv_waiting > 0
        } else {
            state.queue.len() < self.capacity
        };
        if !room {
            return Ok(false);
        }
        state.queue.push_back(value);
        self.not_empty.notify_one();
        Ok(true)
    }

    /// Non-blocking receive.
    pub fn try_recv(&self) -> TryRecvOutcome {
        let mut state = self.state.lock().expect("channel lock poisoned");
        if let Some(value) = state.queue.pop_front() {
            self.not_full.notify_one();
            return TryRecvOutcome::Item(value);
        }
        if state.closed {
            TryRecvOutcome::Closed
        } else {
            TryRecvOutcome::Pending
        }
    }

    /// Idempotent. Wakes every blocked sender and receiver.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("channel lock poisoned");
        if state.closed {
            return;
        }
        state.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}

fn closed_send_error() -> RuntimeError {
    RuntimeError::Concurrency("cannot send to closed channel".to_string())
}
