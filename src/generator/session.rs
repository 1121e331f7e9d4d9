use crate::error::Result;
use indicatif::ProgressBar;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
struct SessionState {
    next_file_index: u32,
    /// Slots held by in-flight saves plus slots already fulfilled.
    images_saved: u32,
    saved_file_paths: Vec<PathBuf>,
}

/// Shared bookkeeping for one batch. Every read and write of the counters
/// goes through the single lock.
pub struct GenerationSession {
    timestamp: String,
    state: Mutex<SessionState>,
    progress: ProgressBar,
}

impl GenerationSession {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self::with_progress(timestamp, ProgressBar::hidden())
    }

    pub fn with_progress(timestamp: impl Into<String>, progress: ProgressBar) -> Self {
        Self {
            timestamp: timestamp.into(),
            state: Mutex::new(SessionState {
                next_file_index: 1,
                images_saved: 0,
                saved_file_paths: Vec::new(),
            }),
            progress,
        }
    }

    /// Local time formatted as `YYYYmmdd_HHMMSS`.
    pub fn timestamp_now() -> String {
        chrono::Local::now().format("%Y%m%d_%H%M%S").to_string()
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn progress(&self) -> &ProgressBar {
        &self.progress
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Reserved plus fulfilled slots; never exceeds the batch size.
    pub fn images_saved(&self) -> u32 {
        self.lock().images_saved
    }

    pub fn saved_count(&self) -> usize {
        self.lock().saved_file_paths.len()
    }

    /// Paths in the order their saves completed.
    pub fn saved_file_paths(&self) -> Vec<PathBuf> {
        self.lock().saved_file_paths.clone()
    }

    /// Claims a slot unless `batch_size` slots are already taken.
    pub fn try_reserve(&self, batch_size: u32) -> Option<SlotReservation<'_>> {
        let mut state = self.lock();
        if state.images_saved >= batch_size {
            return None;
        }
        state.images_saved += 1;
        Some(SlotReservation {
            session: self,
            settled: false,
        })
    }
}

/// A provisional claim on one image slot.
///
/// The file index is only assigned by [`SlotReservation::commit`], so a
/// reservation that is dropped or fails to commit gives its slot back and
/// never consumes an index.
#[must_use]
pub struct SlotReservation<'a> {
    session: &'a GenerationSession,
    settled: bool,
}

impl SlotReservation<'_> {
    /// Assigns the next file index and runs `place` with it under the
    /// session lock. On success the returned path is recorded; on failure
    /// the slot is released.
    pub fn commit<F>(mut self, place: F) -> Result<(u32, PathBuf)>
    where
        F: FnOnce(u32) -> Result<PathBuf>,
    {
        let session = self.session;
        let mut state = session.lock();
        self.settled = true;

        let index = state.next_file_index;
        match place(index) {
            Ok(path) => {
                state.next_file_index += 1;
                state.saved_file_paths.push(path.clone());
                session.progress.inc(1);
                Ok((index, path))
            }
            Err(e) => {
                state.images_saved -= 1;
                Err(e)
            }
        }
    }
}

impl Drop for SlotReservation<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.session.lock();
        state.images_saved = state.images_saved.saturating_sub(1);
        log::debug!("Released unfulfilled image slot");
    }
}
