//! Download host backed by a directory on disk.
//!
//! Names never overwrite: a taken name is uniquified as `name (1).ext`,
//! `name (2).ext`, ... Data is written to `<name>.part` and renamed into
//! place once complete.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::{DownloadHost, DownloadId, DownloadOptions, HostError};
use crate::config::DEFAULT_PLACEHOLDER_FILENAME;
use crate::data_url;
use crate::image_ref::sanitize_filename;

/// Path for the temp file: appends `.part` to the final path (e.g. `a.png` → `a.png.part`).
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(".part");
    PathBuf::from(o)
}

pub struct FsDownloadHost {
    dir: PathBuf,
    next_id: AtomicU64,
    /// Final paths chosen by downloads still being written.
    reserved: Mutex<HashSet<PathBuf>>,
}

impl FsDownloadHost {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            next_id: AtomicU64::new(1),
            reserved: Mutex::new(HashSet::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Picks the first free name for `filename` and reserves it.
    fn reserve(&self, filename: &str) -> PathBuf {
        let mut reserved = self.reserved.lock().unwrap_or_else(|e| e.into_inner());
        let (stem, ext) = split_extension(filename);
        let mut n = 0u32;
        loop {
            let candidate = if n == 0 {
                self.dir.join(filename)
            } else {
                self.dir.join(format!("{} ({}){}", stem, n, ext))
            };
            if !reserved.contains(&candidate) && !candidate.exists() && !temp_path(&candidate).exists() {
                reserved.insert(candidate.clone());
                return candidate;
            }
            n += 1;
        }
    }

    fn release(&self, path: &Path) {
        self.reserved
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path);
    }

    fn write(&self, final_path: &Path, data: &[u8]) -> std::io::Result<()> {
        let part = temp_path(final_path);
        let result = fs::write(&part, data).and_then(|()| fs::rename(&part, final_path));
        if result.is_err() {
            let _ = fs::remove_file(&part);
        }
        result
    }
}

impl DownloadHost for FsDownloadHost {
    fn download(&self, options: DownloadOptions) -> Result<DownloadId, HostError> {
        if options.save_as {
            return Err(HostError::SaveAsUnsupported);
        }
        let decoded = data_url::decode(&options.url)?;
        let filename = sanitize_filename(&options.filename)
            .unwrap_or_else(|| DEFAULT_PLACEHOLDER_FILENAME.to_string());

        fs::create_dir_all(&self.dir)?;
        let final_path = self.reserve(&filename);
        let id = DownloadId(self.next_id.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(id = %id, path = %final_path.display(), bytes = decoded.data.len(), "saving download");

        let written = self.write(&final_path, &decoded.data);
        self.release(&final_path);
        written?;
        Ok(id)
    }
}

/// `photo.png` → (`photo`, `.png`); names without an extension or starting
/// with their only dot keep everything in the stem.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(i) if i > 0 => name.split_at(i),
        _ => (name, ""),
    }
}
