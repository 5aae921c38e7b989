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

//! The render loop controller.
//!
//! Drives one display bundle on its own thread: watchdog notification,
//! one loop iteration, loop-time bookkeeping, then a framerate-capping
//! sleep on a condvar so control calls can interrupt it. Every
//! `loop_count_period` the maximum and average loop times of the window
//! are emitted as a `RenderThreadPeriodicLoopTimes` event.
//!
//! Destruction is handed to the loop thread itself: the thread runs one
//! final iteration (executing any pending display-destroy command under
//! its own context) before exiting.

use crate::bundle::DisplayBundle;
use borealis_core::config::LoopMode;
use borealis_core::event::RendererEvent;
use borealis_core::watchdog::{PlatformWatchdog, ThreadIdentifier, WatchdogCallback};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Externally visible controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No thread running.
    Idle,
    /// The loop thread is iterating.
    Running,
    /// Shutdown has been signalled, the join is pending.
    Stopping,
}

struct ControlBlock {
    do_rendering: bool,
    cancel: bool,
    destroy_requested: bool,
    loop_mode: LoopMode,
    minimum_frame_duration: Duration,
}

struct Shared {
    bundle: Arc<DisplayBundle>,
    control: Mutex<ControlBlock>,
    wakeup: Condvar,
    watchdog_interval: Duration,
    watchdog_callback: Option<Arc<dyn WatchdogCallback>>,
    loop_count_period: Duration,
}

/// Drives one display bundle's render thread.
pub struct LoopController {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl LoopController {
    /// Creates an idle controller for a bundle.
    pub fn new(
        bundle: Arc<DisplayBundle>,
        maximum_framerate: f32,
        loop_mode: LoopMode,
        loop_count_period: Duration,
        watchdog_interval: Duration,
        watchdog_callback: Option<Arc<dyn WatchdogCallback>>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                bundle,
                control: Mutex::new(ControlBlock {
                    do_rendering: false,
                    cancel: false,
                    destroy_requested: false,
                    loop_mode,
                    minimum_frame_duration: frame_duration(maximum_framerate),
                }),
                wakeup: Condvar::new(),
                watchdog_interval,
                watchdog_callback,
                loop_count_period,
            }),
            thread: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> LoopState {
        match &self.thread {
            None => LoopState::Idle,
            Some(_) => {
                let control = self.shared.control.lock().unwrap();
                if control.cancel || control.destroy_requested {
                    LoopState::Stopping
                } else {
                    LoopState::Running
                }
            }
        }
    }

    /// Starts the render thread; `false` if already running.
    pub fn start_rendering(&mut self) -> bool {
        if self.thread.is_some() {
            return false;
        }
        {
            let mut control = self.shared.control.lock().unwrap();
            control.do_rendering = true;
            control.cancel = false;
            control.destroy_requested = false;
        }
        let shared = self.shared.clone();
        let thread = std::thread::Builder::new()
            .name(format!("R_DisplayLoop_{}", self.shared.bundle.display().0))
            .spawn(move || render_thread_main(shared))
            .expect("failed to spawn render loop thread");
        self.thread = Some(thread);
        true
    }

    /// Whether the render thread is running.
    pub fn is_rendering(&self) -> bool {
        self.thread.is_some()
    }

    /// Stops the render thread and joins it; `false` when not running.
    pub fn stop_rendering(&mut self) -> bool {
        let Some(thread) = self.thread.take() else { return false };
        {
            let mut control = self.shared.control.lock().unwrap();
            control.do_rendering = false;
            control.cancel = true;
        }
        self.shared.wakeup.notify_all();
        if thread.join().is_err() {
            log::error!("LoopController render thread panicked");
        }
        true
    }

    /// Lets the loop thread run one final iteration (releasing the
    /// display backend under its own context), then joins it.
    pub fn destroy_renderer(&mut self) {
        let Some(thread) = self.thread.take() else { return };
        {
            let mut control = self.shared.control.lock().unwrap();
            control.destroy_requested = true;
        }
        self.shared.wakeup.notify_all();
        if thread.join().is_err() {
            log::error!("LoopController render thread panicked during destroy");
        }
    }

    /// Caps the loop frequency; framerate must be positive.
    pub fn set_maximum_framerate(&self, framerate: f32) {
        debug_assert!(framerate > 0.0);
        let mut control = self.shared.control.lock().unwrap();
        control.minimum_frame_duration = frame_duration(framerate);
        drop(control);
        self.shared.wakeup.notify_all();
    }

    /// Current framerate cap.
    pub fn maximum_framerate(&self) -> f32 {
        let control = self.shared.control.lock().unwrap();
        1.0 / control.minimum_frame_duration.as_secs_f32()
    }

    /// Switches between update-and-render and update-only loops.
    pub fn set_loop_mode(&self, loop_mode: LoopMode) {
        self.shared.control.lock().unwrap().loop_mode = loop_mode;
    }
}

impl Drop for LoopController {
    fn drop(&mut self) {
        self.stop_rendering();
    }
}

fn frame_duration(framerate: f32) -> Duration {
    Duration::from_secs_f64(1.0 / f64::from(framerate.max(f32::MIN_POSITIVE)))
}

fn render_thread_main(shared: Arc<Shared>) {
    let mut watchdog = PlatformWatchdog::new(
        shared.watchdog_interval,
        ThreadIdentifier::Renderer,
        shared.watchdog_callback.clone(),
    );

    let mut last_sleep = Duration::ZERO;
    let mut period_start = Instant::now();
    let mut loops_in_period: u32 = 0;
    let mut loop_time_sum = Duration::ZERO;
    let mut loop_time_max = Duration::ZERO;

    loop {
        let (loop_mode, minimum_frame_duration) = {
            let mut control = shared.control.lock().unwrap();
            while !control.do_rendering && !control.cancel && !control.destroy_requested {
                control = shared.wakeup.wait(control).unwrap();
            }
            if control.cancel {
                break;
            }
            if control.destroy_requested {
                drop(control);
                // final iteration executes the pending display teardown
                // on this thread, which owns the GPU context
                shared.bundle.do_one_loop(LoopMode::UpdateOnly, Duration::ZERO);
                break;
            }
            (control.loop_mode, control.minimum_frame_duration)
        };

        watchdog.notify();

        let loop_started = Instant::now();
        shared.bundle.do_one_loop(loop_mode, last_sleep);
        let loop_duration = loop_started.elapsed();

        if !shared.loop_count_period.is_zero() {
            loops_in_period += 1;
            loop_time_sum += loop_duration;
            loop_time_max = loop_time_max.max(loop_duration);
            if period_start.elapsed() >= shared.loop_count_period {
                shared.bundle.push_renderer_event(
                    RendererEvent::RenderThreadPeriodicLoopTimes {
                        display: shared.bundle.display(),
                        maximum: loop_time_max,
                        average: loop_time_sum / loops_in_period,
                    },
                );
                period_start = Instant::now();
                loops_in_period = 0;
                loop_time_sum = Duration::ZERO;
                loop_time_max = Duration::ZERO;
            }
        }

        last_sleep = minimum_frame_duration.saturating_sub(loop_duration);
        if !last_sleep.is_zero() {
            // bounded by the watchdog interval so notifications keep
            // flowing even at very low framerates
            let sleep = last_sleep.min(watchdog.remaining_interval().max(Duration::from_millis(1)));
            let control = shared.control.lock().unwrap();
            if control.do_rendering && !control.cancel && !control.destroy_requested {
                let _ = shared.wakeup.wait_timeout(control, sleep).unwrap();
            }
        }
    }

    log::info!(
        "LoopController render thread for {} exiting",
        shared.bundle.display()
    );
}
