//! A line-oriented append/truncate/load log file with atomic swap.
//!
//! Mirrors the small file-handling primitive the AOF and SNAP writers are
//! both built on: a lazily-created file whose handle is kept open across
//! appends, with an atomic rename for swapping a scratch file over a live
//! one.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// A single managed log file.
pub struct FileLog {
    path: PathBuf,
    handle: Option<File>,
}

impl FileLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            handle: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn ensure_open(&mut self) -> io::Result<&mut File> {
        if self.handle.is_none() {
            self.ensure_parent()?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.handle = Some(file);
        }
        Ok(self.handle.as_mut().unwrap())
    }

    /// Appends `line` followed by a newline. Opens and keeps the handle
    /// open across calls.
    pub fn append(&mut self, line: &str) -> io::Result<()> {
        let file = self.ensure_open()?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    /// Closes any open handle, then truncates the file to zero length
    /// (creating it if absent).
    pub fn truncate(&mut self) -> io::Result<()> {
        self.close();
        self.ensure_parent()?;
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;
        Ok(())
    }

    /// Returns every line in the file, in order. Returns an empty vector,
    /// not an error, if the file does not exist.
    pub fn load(&self) -> io::Result<Vec<String>> {
        match File::open(&self.path) {
            Ok(file) => io::BufReader::new(file).lines().collect(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    /// Releases the open handle, if any.
    pub fn close(&mut self) {
        self.handle = None;
    }

    /// Closes both handles, then renames `self`'s file over `dst`'s path.
    /// Atomic within a single filesystem.
    pub fn swap_into(&mut self, dst: &mut FileLog) -> io::Result<()> {
        self.close();
        dst.close();
        if let Some(parent) = dst.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&self.path, &dst.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_then_load_round_trips_lines() {
        let dir = tempdir().unwrap();
        let mut log = FileLog::new(dir.path().join("a.log"));
        log.append("one").unwrap();
        log.append("two").unwrap();
        log.close();

        assert_eq!(log.load().unwrap(), vec!["one".to_string(), "two".to_string()]);
    }

    #[test]
    fn load_missing_file_returns_empty() {
        let dir = tempdir().unwrap();
        let log = FileLog::new(dir.path().join("missing.log"));
        assert!(log.load().unwrap().is_empty());
    }

    #[test]
    fn truncate_empties_existing_content() {
        let dir = tempdir().unwrap();
        let mut log = FileLog::new(dir.path().join("a.log"));
        log.append("one").unwrap();
        log.truncate().unwrap();
        assert!(log.load().unwrap().is_empty());
    }

    #[test]
    fn swap_into_moves_content_and_clears_source_path() {
        let dir = tempdir().unwrap();
        let mut temp = FileLog::new(dir.path().join("temp.log"));
        let mut main = FileLog::new(dir.path().join("main.log"));
        temp.append("fresh").unwrap();
        main.append("stale").unwrap();

        temp.swap_into(&mut main).unwrap();

        assert_eq!(main.load().unwrap(), vec!["fresh".to_string()]);
        assert!(!temp.path().exists());
    }
}
