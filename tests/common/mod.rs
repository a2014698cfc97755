//! Common test utilities for media-dl integration tests

#![allow(dead_code)]

use media_dl::{Config, Item};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config writing under `root` with fast retries and no batch pause
pub fn fast_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.output_dir = root.to_path_buf();
    config.download.min_file_size = 1024;
    config.batch.concurrency = 4;
    config.batch.inter_batch_delay = Duration::ZERO;
    config.retry.initial_delay = Duration::from_millis(5);
    config.retry.max_delay = Duration::from_millis(20);
    config.source.request_timeout = Some(Duration::from_secs(5));
    config
}

/// Write `items` to `<dir>/metadata.csv` with an extra ignored column
pub fn write_input(dir: &Path, items: &[Item]) -> PathBuf {
    let path = dir.join("metadata.csv");
    let mut content = String::from("artist_username,title,permalink_url,playback_count\n");
    for (i, item) in items.iter().enumerate() {
        content.push_str(&format!(
            "\"{}\",\"{}\",{},{}\n",
            item.artist_username.replace('"', "\"\""),
            item.title.replace('"', "\"\""),
            item.permalink_url,
            i * 100
        ));
    }
    std::fs::write(&path, content).unwrap_or_else(|e| panic!("write input: {e}"));
    path
}

/// Size of the output file for `item`, if present
pub fn output_size(root: &Path, item: &Item) -> Option<u64> {
    std::fs::metadata(item.output_path(root, "mp3"))
        .ok()
        .map(|m| m.len())
}
