//! On-disk recording areas.
//!
//! Layout of one area:
//!
//! ```text
//! <root>/<hash16>-<session uuid>/
//!     trace.jsonl     one TraceRecord per line, appended as steps complete
//!     session.json    SessionMetadata, rewritten atomically
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use super::record::{SessionMetadata, SessionState, TraceRecord};
use crate::error::{RecordingError, RecordingResult};

/// Trace log file name.
pub const TRACE_FILE: &str = "trace.jsonl";
/// Session metadata file name.
pub const METADATA_FILE: &str = "session.json";

/// Exclusively owned recording directory for one session.
#[derive(Debug)]
pub struct RecordingArea {
    path: PathBuf,
    trace: BufWriter<File>,
}

impl RecordingArea {
    /// Create a fresh area `<root>/<name>`. Fails if it already exists.
    pub fn create(root: &Path, name: &str) -> RecordingResult<Self> {
        let path = root.join(name);
        let create = || -> io::Result<File> {
            fs::create_dir_all(root)?;
            fs::create_dir(&path)?;
            OpenOptions::new()
                .create_new(true)
                .append(true)
                .open(path.join(TRACE_FILE))
        };
        let file = create().map_err(|source| RecordingError::CreateArea {
            path: path.clone(),
            source,
        })?;
        tracing::debug!("created recording area {:?}", path);
        Ok(Self {
            path,
            trace: BufWriter::new(file),
        })
    }

    /// Directory of the area.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record to the trace log and flush it.
    pub fn append(&mut self, record: &TraceRecord) -> RecordingResult<()> {
        serde_json::to_writer(&mut self.trace, record)?;
        self.trace.write_all(b"\n")?;
        self.trace.flush()?;
        Ok(())
    }

    /// Rewrite `session.json`.
    pub fn write_metadata(&self, metadata: &SessionMetadata) -> RecordingResult<()> {
        let data = serde_json::to_vec_pretty(metadata)?;
        write_atomic(&self.path.join(METADATA_FILE), &data)?;
        Ok(())
    }

    /// Flush outstanding writes and remove the area.
    pub fn delete(mut self) -> RecordingResult<()> {
        self.trace.flush()?;
        remove_area(&self.path)
    }
}

/// Remove an area directory. A missing directory is not an error.
pub fn remove_area(path: &Path) -> RecordingResult<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            tracing::debug!("removed recording area {:?}", path);
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Read every record of an archived area, in step order.
pub fn read_trace(area: &Path) -> RecordingResult<Vec<TraceRecord>> {
    if !area.is_dir() {
        return Err(RecordingError::MissingArea(area.to_path_buf()));
    }
    let file = File::open(area.join(TRACE_FILE))?;
    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

/// Read `session.json` of an archived area.
pub fn read_metadata(area: &Path) -> RecordingResult<SessionMetadata> {
    if !area.is_dir() {
        return Err(RecordingError::MissingArea(area.to_path_buf()));
    }
    let data = fs::read(area.join(METADATA_FILE))?;
    Ok(serde_json::from_slice(&data)?)
}

/// Stamp the terminal `state` into an area left behind by a worker that did
/// not release it (killed at the deadline). The record count is taken from the
/// complete lines of the trace log. Returns `false` when the area does not
/// exist.
pub fn close_area(area: &Path, state: SessionState) -> RecordingResult<bool> {
    if !area.is_dir() {
        return Ok(false);
    }
    let mut metadata = read_metadata(area)?;
    let file = File::open(area.join(TRACE_FILE))?;
    let mut records = 0;
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        // A killed writer may leave a partial last line.
        if serde_json::from_str::<TraceRecord>(&line).is_err() {
            break;
        }
        records += 1;
    }

    metadata.state = state;
    metadata.records = records;
    metadata.finished_at = Some(Utc::now());
    let data = serde_json::to_vec_pretty(&metadata)?;
    write_atomic(&area.join(METADATA_FILE), &data)?;
    tracing::debug!("closed recording area {:?} as {:?}", area, state);
    Ok(true)
}

/// List area directories under `root`, sorted by name.
pub fn list_areas(root: &Path) -> RecordingResult<Vec<PathBuf>> {
    let mut areas = Vec::new();
    match fs::read_dir(root) {
        Ok(entries) => {
            for entry in entries {
                let entry = entry?;
                if entry.file_type()?.is_dir() {
                    areas.push(entry.path());
                }
            }
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }
    areas.sort();
    Ok(areas)
}

/// Write data atomically: temp file, sync, rename, then sync the directory.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;

    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        let dir = OpenOptions::new().read(true).open(parent)?;
        dir.sync_all()?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;
    use tempfile::TempDir;

    fn record(step: u64) -> TraceRecord {
        TraceRecord {
            step,
            line: 1,
            variables: Map::new(),
        }
    }

    #[test]
    fn appended_records_read_back_in_order() {
        let root = TempDir::new().unwrap();
        let mut area = RecordingArea::create(root.path(), "run").unwrap();
        for step in 0..3 {
            area.append(&record(step)).unwrap();
        }
        let records = read_trace(area.path()).unwrap();
        assert_eq!(records.iter().map(|r| r.step).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn areas_are_exclusive() {
        let root = TempDir::new().unwrap();
        let _first = RecordingArea::create(root.path(), "run").unwrap();
        assert!(matches!(
            RecordingArea::create(root.path(), "run"),
            Err(RecordingError::CreateArea { .. })
        ));
    }

    #[test]
    fn delete_removes_directory_and_missing_is_ok() {
        let root = TempDir::new().unwrap();
        let area = RecordingArea::create(root.path(), "run").unwrap();
        let path = area.path().to_path_buf();
        area.delete().unwrap();
        assert!(!path.exists());
        remove_area(&path).unwrap();
        assert!(matches!(read_trace(&path), Err(RecordingError::MissingArea(_))));
    }

    #[test]
    fn close_area_stamps_state_and_skips_partial_line() {
        let root = TempDir::new().unwrap();
        let mut area = RecordingArea::create(root.path(), "run").unwrap();
        let mut session = crate::recording::ExecutionSession::new("(while true)");
        session.transition(SessionState::Running).unwrap();
        area.write_metadata(&session.metadata()).unwrap();
        area.append(&record(0)).unwrap();
        let path = area.path().to_path_buf();
        drop(area);
        let mut log = OpenOptions::new().append(true).open(path.join(TRACE_FILE)).unwrap();
        log.write_all(b"{\"step\": 1, \"li").unwrap();
        drop(log);

        assert!(close_area(&path, SessionState::TimedOut).unwrap());
        let metadata = read_metadata(&path).unwrap();
        assert_eq!(metadata.state, SessionState::TimedOut);
        assert_eq!(metadata.records, 1);
        assert!(metadata.finished_at.is_some());

        assert!(!close_area(&root.path().join("gone"), SessionState::TimedOut).unwrap());
    }
}
