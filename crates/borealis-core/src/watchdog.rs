// Copyright 2025 the Borealis authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! External liveness monitoring.
//!
//! The render loop notifies the watchdog once per iteration; the wrapper
//! throttles the outcalls to the configured interval so a fast loop does
//! not spam the monitor.

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Threads visible to the watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadIdentifier {
    /// The render thread(s).
    Renderer,
    /// Worker threads (shader upload and friends).
    Workers,
}

/// User-provided liveness callback. Implementations must be thread-safe.
pub trait WatchdogCallback: Send + Sync {
    /// Called periodically from the monitored thread.
    fn notify(&self, thread: ThreadIdentifier);

    /// Called when a monitored thread starts.
    fn register_thread(&self, _thread: ThreadIdentifier) {}

    /// Called when a monitored thread exits.
    fn unregister_thread(&self, _thread: ThreadIdentifier) {}
}

/// Interval-throttling wrapper around a [`WatchdogCallback`].
pub struct PlatformWatchdog {
    interval: Duration,
    thread: ThreadIdentifier,
    callback: Option<Arc<dyn WatchdogCallback>>,
    last_notification: Instant,
}

impl PlatformWatchdog {
    /// Creates a watchdog for one thread; registers it with the callback.
    pub fn new(
        interval: Duration,
        thread: ThreadIdentifier,
        callback: Option<Arc<dyn WatchdogCallback>>,
    ) -> Self {
        if let Some(cb) = &callback {
            cb.register_thread(thread);
        }
        Self {
            interval,
            thread,
            callback,
            // force a notification on the first call
            last_notification: Instant::now() - interval,
        }
    }

    /// Notifies the callback if the interval has passed.
    pub fn notify(&mut self) {
        let Some(cb) = &self.callback else { return };
        if self.last_notification.elapsed() >= self.interval {
            cb.notify(self.thread);
            self.last_notification = Instant::now();
        }
    }

    /// Time the loop may sleep without missing a notification deadline;
    /// unbounded when no callback is installed.
    pub fn remaining_interval(&self) -> Duration {
        if self.callback.is_none() {
            return Duration::MAX;
        }
        self.interval.saturating_sub(self.last_notification.elapsed())
    }
}

impl Drop for PlatformWatchdog {
    fn drop(&mut self) {
        if let Some(cb) = &self.callback {
            cb.unregister_thread(self.thread);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Default)]
    struct CountingCallback {
        notified: AtomicU32,
        registered: AtomicU32,
        unregistered: AtomicU32,
    }

    impl WatchdogCallback for CountingCallback {
        fn notify(&self, _thread: ThreadIdentifier) {
            self.notified.fetch_add(1, Ordering::SeqCst);
        }
        fn register_thread(&self, _thread: ThreadIdentifier) {
            self.registered.fetch_add(1, Ordering::SeqCst);
        }
        fn unregister_thread(&self, _thread: ThreadIdentifier) {
            self.unregistered.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn throttles_to_interval() {
        let cb = Arc::new(CountingCallback::default());
        let mut dog = PlatformWatchdog::new(
            Duration::from_secs(3600),
            ThreadIdentifier::Renderer,
            Some(cb.clone()),
        );
        dog.notify();
        dog.notify();
        dog.notify();
        // first call fires, the rest are inside the interval
        assert_eq!(cb.notified.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registers_and_unregisters() {
        let cb = Arc::new(CountingCallback::default());
        {
            let _dog = PlatformWatchdog::new(
                Duration::from_millis(100),
                ThreadIdentifier::Workers,
                Some(cb.clone()),
            );
            assert_eq!(cb.registered.load(Ordering::SeqCst), 1);
        }
        assert_eq!(cb.unregistered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn no_callback_is_a_noop() {
        let mut dog =
            PlatformWatchdog::new(Duration::from_millis(1), ThreadIdentifier::Renderer, None);
        dog.notify();
    }
}
