// On-disk layout: one directory per domain under the output root, with
// append-mode report files so repeated runs accumulate snapshots.
//
//   <out>/<domain>/<domain>_endpoints_found.txt
//   <out>/<domain>/<domain>_endpoints_detailed.json
//   <out>/<domain>/<domain>_endpoints_for_db.json
//   <out>/<domain>/<domain>_endpoint_stats.json
//   <out>/<domain>/<domain>_flowchart.mmd

use crate::error::{CoreError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const LOCK_POLL: Duration = Duration::from_millis(50);
const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Advisory marker-file lock guarding a report file against interleaved
/// appends from concurrent invocations. Released on drop; a stale marker
/// older than the timeout is forcibly removed.
pub struct FileLock {
    path: PathBuf,
}

impl FileLock {
    pub fn acquire(target: &Path) -> Result<Self> {
        let mut path = target.as_os_str().to_owned();
        path.push(".lock");
        let path = PathBuf::from(path);

        let start = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                    if start.elapsed() >= LOCK_TIMEOUT {
                        // Holder likely crashed; break the marker and take over.
                        warn!("breaking stale lock {}", path.display());
                        let _ = fs::remove_file(&path);
                        return match OpenOptions::new()
                            .write(true)
                            .create_new(true)
                            .open(&path)
                        {
                            Ok(_) => Ok(Self { path }),
                            Err(_) => Err(CoreError::LockTimeout(path.display().to_string())),
                        };
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Per-domain report directory. Created lazily on first write.
pub struct DomainStore {
    domain: String,
    dir: PathBuf,
}

impl DomainStore {
    pub fn new(output_root: &Path, domain: &str) -> Self {
        Self {
            domain: domain.to_string(),
            dir: output_root.join(domain),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}_{suffix}", self.domain))
    }

    pub fn detailed_path(&self) -> PathBuf {
        self.file("endpoints_detailed.json")
    }

    pub fn flat_path(&self) -> PathBuf {
        self.file("endpoints_for_db.json")
    }

    pub fn stats_path(&self) -> PathBuf {
        self.file("endpoint_stats.json")
    }

    pub fn found_txt_path(&self) -> PathBuf {
        self.file("endpoints_found.txt")
    }

    pub fn flowchart_path(&self) -> PathBuf {
        self.file("flowchart.mmd")
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    /// Truncates all report files for this domain. Called once per domain
    /// per run so a run replaces earlier snapshots instead of stacking on
    /// them forever.
    pub fn clear(&self) -> Result<()> {
        self.ensure_dir()?;
        for path in [
            self.found_txt_path(),
            self.detailed_path(),
            self.flat_path(),
            self.stats_path(),
        ] {
            fs::write(&path, b"")?;
        }
        debug!("cleared report files for {}", self.domain);
        Ok(())
    }

    /// Appends one compact JSON snapshot under the file lock. Snapshots are
    /// written back to back; [`crate::repair`] reads them out again.
    pub fn append_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        self.ensure_dir()?;
        let _lock = FileLock::acquire(path)?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let encoded = serde_json::to_string(value)?;
        file.write_all(encoded.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    /// Appends the flat finding list, one per line grouped by category.
    pub fn append_found_txt(&self, flattened: &BTreeMap<String, Vec<String>>) -> Result<()> {
        self.ensure_dir()?;
        let path = self.found_txt_path();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        for (category, findings) in flattened {
            writeln!(file, "## {category}")?;
            for finding in findings {
                writeln!(file, "{finding}")?;
            }
            writeln!(file)?;
        }
        Ok(())
    }

    pub fn write_flowchart(&self, mermaid: &str) -> Result<()> {
        self.ensure_dir()?;
        fs::write(self.flowchart_path(), mermaid)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_json_stacks_snapshots() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DomainStore::new(tmp.path(), "example.com");
        let path = store.detailed_path();
        store.append_json(&path, &json!({"run": 1})).unwrap();
        store.append_json(&path, &json!({"run": 2})).unwrap();

        let raw = fs::read_to_string(&path).unwrap();
        let values = crate::repair::repair_concatenated_json(&raw);
        assert_eq!(values.len(), 2);
        assert_eq!(values[1]["run"], 2);
    }

    #[test]
    fn clear_truncates_report_files() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DomainStore::new(tmp.path(), "example.com");
        let path = store.flat_path();
        store.append_json(&path, &json!({"run": 1})).unwrap();
        store.clear().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn lock_is_released_on_drop() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("report.json");
        {
            let _lock = FileLock::acquire(&target).unwrap();
            assert!(tmp.path().join("report.json.lock").exists());
        }
        assert!(!tmp.path().join("report.json.lock").exists());
        // A second acquire succeeds immediately once the first is gone.
        let _again = FileLock::acquire(&target).unwrap();
    }

    #[test]
    fn found_txt_groups_by_category() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DomainStore::new(tmp.path(), "example.com");
        let mut flat = BTreeMap::new();
        flat.insert(
            "api_endpoints".to_string(),
            vec!["/api/v1/users".to_string()],
        );
        store.append_found_txt(&flat).unwrap();
        let text = fs::read_to_string(store.found_txt_path()).unwrap();
        assert!(text.contains("## api_endpoints"));
        assert!(text.contains("/api/v1/users"));
    }
}
