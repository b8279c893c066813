//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use derive_new::new;
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::Instant;
use tokio::{task, time};
use tracing::error;

/// A handle to a spawned task. Dropping it cancels the task unless
/// [`Task::detach`] was called first.
#[derive(Debug)]
pub struct Task<T> {
    join_handle: task::JoinHandle<T>,
    detached: bool,
}

/// A handle to a cancellable one-shot timer, e.g. a neighbor's dead timer or
/// an LSA's MaxAge expiration.
#[derive(Debug)]
pub struct TimeoutTask {
    inner: TimerInner,
}

/// A handle to a cancellable recurring timer, e.g. the Hello timer or the
/// retransmission timer.
#[derive(Debug)]
pub struct IntervalTask {
    inner: TimerInner,
}

#[derive(Debug, new)]
struct TimerInner {
    _task: Task<()>,
    control: UnboundedSender<Message>,
    next: Arc<Mutex<Instant>>,
}

#[derive(Debug)]
enum Message {
    Reset(Option<Duration>),
}

// ===== impl Task =====

impl<T> Task<T> {
    pub fn spawn<Fut>(future: Fut) -> Task<T>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Task {
            join_handle: task::spawn(future),
            detached: false,
        }
    }

    pub fn detach(&mut self) {
        self.detached = true;
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, task::JoinError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        Pin::new(&mut self.join_handle).poll(cx)
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        if !self.detached {
            self.join_handle.abort();
        }
    }
}

// ===== impl TimeoutTask =====

impl TimeoutTask {
    /// Spawns a task that invokes `cb` once, when `timeout` elapses, unless
    /// reset or dropped first.
    pub fn new<F, Fut>(timeout: Duration, cb: F) -> TimeoutTask
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();

        let next = Arc::new(Mutex::new(Instant::now() + timeout));
        let next_child = next.clone();

        let task = Task::spawn(async move {
            let timeout_fut = time::sleep(timeout);
            tokio::pin!(timeout_fut);

            loop {
                tokio::select! {
                    _ = &mut timeout_fut => {
                        (cb)().await;
                        break;
                    }
                    message = control_rx.recv() => {
                        match message {
                            Some(Message::Reset(None)) => {
                                let next = Instant::now() + timeout;
                                timeout_fut.as_mut().reset(next);
                                *next_child.lock().unwrap() = next;
                            }
                            Some(Message::Reset(Some(new_timeout))) => {
                                let next = Instant::now() + new_timeout;
                                timeout_fut.as_mut().reset(next);
                                *next_child.lock().unwrap() = next;
                            }
                            None => break,
                        }
                    }
                }
            }
        });

        TimeoutTask {
            inner: TimerInner::new(task, control_tx, next),
        }
    }

    /// Resets the timeout. Reuses the last duration if `timeout` is `None`.
    pub fn reset(&mut self, timeout: Option<Duration>) {
        if self.inner.control.send(Message::Reset(timeout)).is_err() {
            error!("failed to reset timeout task");
        }
    }

    pub fn remaining(&self) -> Duration {
        let next = self.inner.next.lock().unwrap();
        next.saturating_duration_since(Instant::now())
    }
}

// ===== impl IntervalTask =====

impl IntervalTask {
    /// Spawns a task that invokes `cb` every time `interval` elapses. When
    /// `tick_on_start` is false the first tick is delayed by `interval`
    /// (used for the Hello timer, which must not fire immediately).
    pub fn new<F, Fut>(interval: Duration, tick_on_start: bool, mut cb: F) -> IntervalTask
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        let (control_tx, mut control_rx) = mpsc::unbounded_channel();

        let next = Arc::new(Mutex::new(Instant::now() + interval));
        let next_child = next.clone();

        let task = Task::spawn(async move {
            let mut interval_fut = if tick_on_start {
                time::interval(interval)
            } else {
                time::interval_at(Instant::now() + interval, interval)
            };

            loop {
                tokio::select! {
                    _ = interval_fut.tick() => {
                        let next = Instant::now() + interval;
                        (cb)().await;
                        *next_child.lock().unwrap() = next;
                    }
                    message = control_rx.recv() => {
                        match message {
                            Some(Message::Reset(None)) => {
                                interval_fut = time::interval(interval);
                                *next_child.lock().unwrap() = Instant::now() + interval;
                            }
                            Some(Message::Reset(Some(new_interval))) => {
                                interval_fut = time::interval(new_interval);
                                *next_child.lock().unwrap() = Instant::now() + new_interval;
                            }
                            None => break,
                        }
                    }
                }
            }
        });

        IntervalTask {
            inner: TimerInner::new(task, control_tx, next),
        }
    }

    pub fn reset(&mut self, interval: Option<Duration>) {
        if self.inner.control.send(Message::Reset(interval)).is_err() {
            error!("failed to reset interval task");
        }
    }

    pub fn remaining(&self) -> Duration {
        let next = self.inner.next.lock().unwrap();
        next.saturating_duration_since(Instant::now())
    }
}
