//! Locate the newest training CSV in a data directory.

use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use crate::error::{RegshipError, Result};

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false)
}

/// Return the `*.csv` file in `dir` with the most recent modification time.
///
/// Only the top level of `dir` is scanned. Ties on modification time are
/// broken by path so the choice is stable. A missing directory is reported
/// the same way as an empty one.
pub fn find_latest_csv<P: AsRef<Path>>(dir: P) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let not_found = || RegshipError::NoTrainingData(dir.display().to_string());

    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    let mut candidates: Vec<(SystemTime, PathBuf)> = Vec::new();
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if !is_csv(&path) {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified()?;
        debug!(path = %path.display(), "found CSV candidate");
        candidates.push((modified, path));
    }

    candidates
        .into_iter()
        .max_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)))
        .map(|(_, path)| path)
        .ok_or_else(not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::time::Duration;

    fn touch(path: &Path, age_secs: u64) {
        fs::write(path, "a,b,c\n1,2,3\n").unwrap();
        let mtime = SystemTime::now() - Duration::from_secs(age_secs);
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
    }

    #[test]
    fn picks_most_recently_modified() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("old.csv"), 3600);
        touch(&dir.path().join("new.csv"), 10);
        touch(&dir.path().join("middle.CSV"), 600);

        let latest = find_latest_csv(dir.path()).unwrap();
        assert_eq!(latest.file_name().unwrap(), "new.csv");
    }

    #[test]
    fn ignores_other_extensions_and_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("data.csv"), 3600);
        touch(&dir.path().join("notes.txt"), 1);
        fs::create_dir(dir.path().join("nested.csv")).unwrap();

        let latest = find_latest_csv(dir.path()).unwrap();
        assert_eq!(latest.file_name().unwrap(), "data.csv");
    }

    #[test]
    fn empty_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("readme.md"), "nothing here").unwrap();

        let err = find_latest_csv(dir.path()).unwrap_err();
        assert!(matches!(err, RegshipError::NoTrainingData(_)));
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = find_latest_csv(dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, RegshipError::NoTrainingData(_)));
    }
}
