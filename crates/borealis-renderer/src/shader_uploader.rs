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

//! Asynchronous shader compilation on a shared GPU context.
//!
//! A dedicated worker thread owns an [`UploadBackend`] whose context
//! shares resources with the render-thread context. The render thread
//! feeds effects in and drains compiled shaders out through [`sync`];
//! exactly two threads ever touch the internal mutex.
//!
//! Shutdown is signalled under the mutex and then notified, so the
//! worker can never miss the wakeup while deciding to sleep.
//!
//! [`sync`]: AsyncShaderUploader::sync

use borealis_core::device::{CompiledShader, EffectSource, Platform, RenderBackend};
use borealis_core::handle::DisplayHandle;
use borealis_core::resource::ResourceContentHash;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Instant;

/// Work item: effect hash plus its decoded source.
pub type EffectToUpload = (ResourceContentHash, EffectSource);

/// Result item: effect hash plus the compiled shader, `None` on
/// compile failure.
pub type UploadedEffect = (ResourceContentHash, Option<CompiledShader>);

#[derive(Default)]
struct State {
    effects_to_upload: Vec<EffectToUpload>,
    effects_uploaded: Vec<UploadedEffect>,
    cancel_requested: bool,
}

struct Shared {
    state: Mutex<State>,
    wakeup: Condvar,
}

/// Drives shader compilation on a secondary thread.
pub struct AsyncShaderUploader {
    platform: Arc<dyn Platform>,
    display: DisplayHandle,
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl AsyncShaderUploader {
    /// Creates an uploader for one display; the thread starts in
    /// [`AsyncShaderUploader::start`].
    pub fn new(platform: Arc<dyn Platform>, display: DisplayHandle) -> Self {
        Self {
            platform,
            display,
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                wakeup: Condvar::new(),
            }),
            thread: None,
        }
    }

    /// Spawns the worker and creates the shared-context backend on it.
    ///
    /// The render-thread context is disabled for the duration of the
    /// shared-context creation and re-enabled before returning. Returns
    /// `false` (with the worker joined) if backend creation failed.
    pub fn start(&mut self, render_backend: &mut dyn RenderBackend) -> bool {
        assert!(self.thread.is_none(), "uploader thread already running");

        // the shared context can only be created while the main context
        // is not current anywhere
        render_backend.surface().disable();

        let (creation_tx, creation_rx) = flume::bounded::<bool>(1);
        let platform = self.platform.clone();
        let display = self.display;
        let shared = self.shared.clone();

        let thread = std::thread::Builder::new()
            .name("R_ShaderUpload".into())
            .spawn(move || worker_main(platform, display, shared, creation_tx))
            .expect("failed to spawn shader upload thread");
        self.thread = Some(thread);

        let success = creation_rx.recv().unwrap_or(false);
        if !success {
            log::error!("AsyncShaderUploader failed creating upload backend for {display}");
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }

        render_backend.surface().enable();
        success
    }

    /// Whether the worker thread is running.
    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Exchanges work with the worker.
    ///
    /// Atomically appends `effects_to_upload` to the queue and drains
    /// every finished effect into `uploaded_out`. Finished effects may
    /// stem from submissions of earlier cycles; within one cycle no
    /// hash is queued twice and queue order is preserved.
    pub fn sync(
        &self,
        effects_to_upload: Vec<EffectToUpload>,
        uploaded_out: &mut Vec<UploadedEffect>,
    ) {
        assert!(uploaded_out.is_empty());

        let new_count = effects_to_upload.len();
        let total_pending;
        {
            let mut state = self.shared.state.lock().unwrap();
            debug_assert!(effects_to_upload.iter().all(|(hash, _)| {
                !state.effects_uploaded.iter().any(|(done, _)| done == hash)
                    && !state.effects_to_upload.iter().any(|(queued, _)| queued == hash)
            }));
            state.effects_to_upload.extend(effects_to_upload);
            std::mem::swap(uploaded_out, &mut state.effects_uploaded);
            total_pending = state.effects_to_upload.len();
        }

        if new_count > 0 || !uploaded_out.is_empty() {
            log::info!(
                "AsyncShaderUploader newToUpload: {new_count}, totalPending: {total_pending}, uploaded: {}",
                uploaded_out.len()
            );
        }

        if new_count > 0 {
            self.shared.wakeup.notify_one();
        }
    }

    /// Cancels the worker and joins it; the worker destroys its shared
    /// context itself before exiting.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else { return };
        {
            // cancel inside the critical section, otherwise the worker
            // could re-check the predicate and sleep through the notify
            let mut state = self.shared.state.lock().unwrap();
            state.cancel_requested = true;
        }
        self.shared.wakeup.notify_one();
        if thread.join().is_err() {
            log::error!("AsyncShaderUploader worker thread panicked");
        }
    }
}

impl Drop for AsyncShaderUploader {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker_main(
    platform: Arc<dyn Platform>,
    display: DisplayHandle,
    shared: Arc<Shared>,
    creation_tx: flume::Sender<bool>,
) {
    log::info!("AsyncShaderUploader creating upload backend for {display}");
    let Some(mut backend) = platform.create_upload_backend(display) else {
        log::error!("AsyncShaderUploader could not create upload backend");
        let _ = creation_tx.send(false);
        return;
    };
    log::info!("AsyncShaderUploader upload backend created successfully");
    let _ = creation_tx.send(true);

    // compiled shaders are staged worker-locally and handed over under
    // the mutex at the top of the next iteration
    let mut compiled_cache: Vec<UploadedEffect> = Vec::new();
    loop {
        let batch = {
            let mut state = shared.state.lock().unwrap();
            if compiled_cache.is_empty() {
                state = shared
                    .wakeup
                    .wait_while(state, |s| {
                        s.effects_to_upload.is_empty() && !s.cancel_requested
                    })
                    .unwrap();
            }
            state.effects_uploaded.append(&mut compiled_cache);
            if state.cancel_requested {
                break;
            }
            std::mem::take(&mut state.effects_to_upload)
        };

        compile_batch(backend.device(), batch, &mut compiled_cache);
    }

    log::info!("AsyncShaderUploader destroying upload backend for {display}");
    platform.destroy_upload_backend(display, backend);
    log::trace!("AsyncShaderUploader worker exiting");
}

fn compile_batch(
    device: &mut dyn borealis_core::device::Device,
    batch: Vec<EffectToUpload>,
    out: &mut Vec<UploadedEffect>,
) {
    if batch.is_empty() {
        return;
    }

    let mut max_upload_micros = 0u128;
    let mut total_upload_micros = 0u128;
    let mut slowest = ResourceContentHash::INVALID;
    let count = batch.len();

    for (hash, effect) in batch {
        log::info!("AsyncShaderUploader uploading: #{hash}");
        let started = Instant::now();
        let shader = device.compile_shader(&effect);
        let elapsed = started.elapsed().as_micros();

        if shader.is_none() {
            log::error!("AsyncShaderUploader compile failed for #{hash}");
        }
        out.push((hash, shader));

        if elapsed > max_upload_micros || !slowest.is_valid() {
            max_upload_micros = elapsed;
            slowest = hash;
        }
        total_upload_micros += elapsed;
    }

    log::info!(
        "AsyncShaderUploader {count} uploaded in {total_upload_micros} us (Max: {max_upload_micros} us #{slowest})"
    );
}
