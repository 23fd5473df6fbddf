/// OS-thread-backed tasks. A task wraps the result slot of one spawned
/// function call: the worker thread stores the outcome under a mutex and
/// broadcasts a condvar; `join` blocks on that condvar and consumes the
/// outcome exactly once.
use std::sync::{Condvar, Mutex};
use std::thread;

use crate::heap::{CensusToken, Handle};
use crate::runtime::debug_tasks;
use crate::value::{RuntimeError, Value};

/// Terminal states are sticky: once `Completed` or `Failed`, a task never
/// changes again except to record that its result was consumed.
enum TaskStatus {
    Running,
    Completed(Value),
    Failed(RuntimeError),
    /// A join already took the result.
    Consumed,
    /// Ownerless; the result (if any) was discarded.
    Detached,
}

pub struct TaskObj {
    state: Mutex<TaskStatus>,
    done: Condvar,
    _census: CensusToken,
}

impl TaskObj {
    pub(crate) fn new(census: CensusToken) -> Self {
        TaskObj {
            state: Mutex::new(TaskStatus::Running),
            done: Condvar::new(),
            _census: census,
        }
    }

    /// Called by the worker thread with the body's outcome. A detached task
    /// drops the result on the floor.
    pub fn complete(&self, result: Result<Value, RuntimeError>) {
        let mut state = self.state.lock().expect("task lock poisoned");
        if matches!(*state, TaskStatus::Detached) {
            if debug_tasks() {
                eprintln!("[hemlock-task] detached task finished, result dropped");
            }
            return;
        }
        *state = match result {
            Ok(value) => TaskStatus::Completed(value),
            Err(err) => TaskStatus::Failed(err),
        };
        self.done.notify_all();
    }

    /// Block until the task reaches a terminal state, then take the result.
    /// The task is marked consumed: a second join fails, as does joining a
    /// detached task.
    pub fn join(&self) -> Result<Value, RuntimeError> {
        let mut state = self.state.lock().expect("task lock poisoned");
        loop {
            match &*state {
                TaskStatus::Running => {
                    state = self.done.wait(state).expect("task lock poisoned");
                }
                TaskStatus::Consumed => {
                    return Err(RuntimeError::Concurrency(
                        "task handle already joined".to_string(),
                    ));
                }
                TaskStatus::Detached => {
                    return Err(RuntimeError::Concurrency(
                        "cannot join a detached task".to_string(),
                    ));
                }
                TaskStatus::Completed(_) | TaskStatus::Failed(_) => {
                    let taken = std::mem::replace(&mut *state, TaskStatus::Consumed);
                    return match taken {
                        TaskStatus::Completed(value) => Ok(value),
                        TaskStatus::Failed(err) => Err(err),
                        _ => unreachable!("terminal state checked above"),
                    };
                }
            }
        }
    }

    /// Mark the task ownerless. Any pending or future result is discarded;
    /// a later join fails.
    pub fn detach(&self) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().expect("task lock poisoned");
        match &*state {
            TaskStatus::Consumed => Err(RuntimeError::Concurrency(
                "task handle already joined".to_string(),
            )),
            _ => {
                *state = TaskStatus::Detached;
                Ok(())
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        !matches!(
            *self.state.lock().expect("task lock poisoned"),
            TaskStatus::Running
        )
    }
}

/// Run `body` on a fresh OS thread, storing its outcome in `task`. The
/// thread handle is dropped: the result slot, not the OS join, carries the
/// completion.
pub fn run_on_thread<F>(task: Handle<TaskObj>, body: F)
where
    F: FnOnce() -> Result<Value, RuntimeError> + Send + 'static,
{
    thread::Builder::new()
        .name("hemlock-task".to_string())
        .spawn(move || {
            if debug_tasks() {
                eprintln!("[hemlock-task] task thread started");
            }
            let result = body();
            if debug_tasks() {
                eprintln!(
                    "[hemlock-task] task thread finished ({})",
                    if result.is_ok() { "ok" } else { "error" }
                );
            }
            task.complete(result);
        })
        .expect("failed to spawn task thread");
}
