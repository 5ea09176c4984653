//! Snapshot persistence as zstd-compressed JSON
//!
//! Writes go to a temporary file that is synced and then renamed over the
//! final path, so a reader never sees a partially written snapshot.

use super::{CorpusError, CorpusSnapshot, SNAPSHOT_FORMAT};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SNAPSHOT_FILE: &str = "snapshot.json.zst";

const COMPRESSION_LEVEL: i32 = 3;

/// Persist `snapshot` under `index_dir`, returning the written path
pub fn save_snapshot(snapshot: &CorpusSnapshot, index_dir: &Path) -> Result<PathBuf, CorpusError> {
    fs::create_dir_all(index_dir).map_err(|e| CorpusError::Io {
        source: e,
        context: format!("Failed to create index directory: {}", index_dir.display()),
    })?;

    let json = serde_json::to_vec(snapshot)
        .map_err(|e| CorpusError::Corrupt(format!("failed to serialize snapshot: {}", e)))?;
    let compressed = zstd::encode_all(json.as_slice(), COMPRESSION_LEVEL).map_err(|e| {
        CorpusError::Io {
            source: e,
            context: "Failed to compress snapshot".to_string(),
        }
    })?;

    let final_path = index_dir.join(SNAPSHOT_FILE);
    let temp_path = index_dir.join(format!("{}.tmp", SNAPSHOT_FILE));

    let mut file = fs::File::create(&temp_path).map_err(|e| CorpusError::Io {
        source: e,
        context: format!("Failed to create temp snapshot: {}", temp_path.display()),
    })?;
    file.write_all(&compressed).map_err(|e| CorpusError::Io {
        source: e,
        context: format!("Failed to write snapshot: {}", temp_path.display()),
    })?;
    file.sync_all().map_err(|e| CorpusError::Io {
        source: e,
        context: format!("Failed to sync snapshot: {}", temp_path.display()),
    })?;
    drop(file);

    fs::rename(&temp_path, &final_path).map_err(|e| CorpusError::Io {
        source: e,
        context: format!(
            "Failed to move snapshot into place: {} -> {}",
            temp_path.display(),
            final_path.display()
        ),
    })?;

    info!(
        "Persisted snapshot {} ({} chunks, {} bytes) to {}",
        snapshot.version(),
        snapshot.len(),
        compressed.len(),
        final_path.display()
    );

    Ok(final_path)
}

/// Load the snapshot under `index_dir`; `Ok(None)` when none has been built
pub fn load_snapshot(index_dir: &Path) -> Result<Option<CorpusSnapshot>, CorpusError> {
    let path = index_dir.join(SNAPSHOT_FILE);
    if !path.exists() {
        return Ok(None);
    }

    let compressed = fs::read(&path).map_err(|e| CorpusError::Io {
        source: e,
        context: format!("Failed to read snapshot: {}", path.display()),
    })?;
    let json = zstd::decode_all(compressed.as_slice()).map_err(|e| CorpusError::Io {
        source: e,
        context: format!("Failed to decompress snapshot: {}", path.display()),
    })?;

    let mut snapshot: CorpusSnapshot = serde_json::from_slice(&json)
        .map_err(|e| CorpusError::Corrupt(format!("{}: {}", path.display(), e)))?;

    if snapshot.format != SNAPSHOT_FORMAT {
        return Err(CorpusError::UnsupportedFormat {
            found: snapshot.format,
            expected: SNAPSHOT_FORMAT,
        });
    }

    snapshot.reindex()?;
    if snapshot.compute_version() != snapshot.version {
        return Err(CorpusError::Corrupt(format!(
            "{}: version digest does not match chunk set",
            path.display()
        )));
    }

    info!(
        "Loaded snapshot {} ({} chunks) from {}",
        snapshot.version(),
        snapshot.len(),
        path.display()
    );

    Ok(Some(snapshot))
}
