//! Shared helpers for the integration test suite

use std::fs;
use std::path::{Path, PathBuf};

use indexed_buffer::HashFn;

/// Write `data` to `dir/name` and return the resulting path.
pub fn write_temp_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, data).expect("write temp file");
    path
}

/// Recursive sum of file sizes under `root` (directories excluded).
pub fn dir_size(root: &Path) -> u64 {
    let mut total = 0u64;
    visit(root, &mut |path| {
        total += fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    });
    total
}

/// Recursive count of files (not directories) under `root`.
pub fn count_files(root: &Path) -> usize {
    let mut count = 0usize;
    visit(root, &mut |_| count += 1);
    count
}

fn visit(dir: &Path, on_file: &mut impl FnMut(&Path)) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            visit(&path, on_file);
        } else {
            on_file(&path);
        }
    }
}

/// Installs a `tracing` subscriber writing to the test harness's captured
/// output, so a failing test's `debug!`/`warn!` events show up alongside its
/// assertion output. Safe to call from multiple tests; only the first
/// installation wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A deterministic hash function: each call returns `{prefix}-{n:06}` for
/// an incrementing `n`, so eviction order in tests is never at the mercy of
/// random name collisions.
pub fn sequential_hash_fn(prefix: &str) -> HashFn {
    let prefix = prefix.to_string();
    let mut counter = 0u64;
    Box::new(move || {
        counter += 1;
        format!("{prefix}-{counter:06}")
    })
}
