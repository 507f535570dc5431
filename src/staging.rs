use crate::error::Result;
use crate::types::Source;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Snapshot the unmodified payload so a parse can be re-run without
/// re-fetching. One file per source, overwritten each run.
pub fn stage_raw_payload(raw_dir: &Path, source: Source, payload: &str) -> Result<PathBuf> {
    fs::create_dir_all(raw_dir)?;
    let path = raw_dir.join(source.raw_filename());
    fs::write(&path, payload)?;
    debug!("Staged raw {} payload at {}", source, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn staging_overwrites_the_previous_snapshot() {
        let dir = tempdir().unwrap();
        let raw_dir = dir.path().join("raw");

        let first = stage_raw_payload(&raw_dir, Source::Ntsb, "{\"results\": []}").unwrap();
        let second = stage_raw_payload(&raw_dir, Source::Ntsb, "{\"results\": [1]}").unwrap();

        assert_eq!(first, second);
        assert_eq!(
            fs::read_to_string(&second).unwrap(),
            "{\"results\": [1]}"
        );
    }

    #[test]
    fn sources_stage_to_distinct_files() {
        let dir = tempdir().unwrap();
        let json = stage_raw_payload(dir.path(), Source::Ntsb, "{}").unwrap();
        let html = stage_raw_payload(dir.path(), Source::Asn, "<html></html>").unwrap();
        assert_ne!(json, html);
    }
}
