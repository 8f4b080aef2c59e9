//! Filesystem change events.
//!
//! The core hands out a live handle over the platform watcher and attaches no
//! batching or debouncing; that belongs to the notification bridge sitting on
//! top of it.

use crate::error::StructureError;
use crate::structure::FileStructure;
use notify::{RecursiveMode, Watcher};
use std::sync::mpsc;
use tracing::debug;

/// Live change-event source for a structure's root. Dropping the handle stops
/// the watcher.
pub struct WatchHandle {
    /// Kept alive for the lifetime of the handle; events stop when it drops.
    _watcher: notify::RecommendedWatcher,
    events: mpsc::Receiver<notify::Result<notify::Event>>,
}

impl WatchHandle {
    /// The raw event stream, in arrival order.
    pub fn events(&self) -> &mpsc::Receiver<notify::Result<notify::Event>> {
        &self.events
    }
}

impl FileStructure {
    /// Watch the root path recursively for filesystem changes.
    pub fn watch(&self) -> Result<WatchHandle, StructureError> {
        let (sender, events) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |event| {
            let _ = sender.send(event);
        })
        .map_err(|error| StructureError::Watch {
            message: error.to_string(),
        })?;

        watcher
            .watch(self.root_path(), RecursiveMode::Recursive)
            .map_err(|error| StructureError::Watch {
                message: error.to_string(),
            })?;

        debug!(root = %self.root_path().display(), "watching file structure");
        Ok(WatchHandle {
            _watcher: watcher,
            events,
        })
    }
}
