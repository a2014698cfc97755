use super::test_helpers::*;
use super::*;
use crate::types::{FetchStatus, Outcome};
use std::path::PathBuf;
use std::time::Duration;

mod scheduler;

/// Drain every event already sent on `rx`
fn drain(rx: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Every file under `root` with its size, sorted by path
fn snapshot(root: &Path) -> Vec<(PathBuf, u64)> {
    let mut files: Vec<(PathBuf, u64)> = walkdir::WalkDir::new(root)
        .into_iter()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let size = entry.metadata().unwrap().len();
            (entry.path().to_path_buf(), size)
        })
        .collect();
    files.sort();
    files
}

/// Whether any `.part` file is left under `root`
fn has_partial_files(root: &Path) -> bool {
    snapshot(root)
        .iter()
        .any(|(path, _)| path.extension().is_some_and(|ext| ext == "part"))
}
