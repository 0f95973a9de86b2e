use std::path::{Path, PathBuf};

use thiserror::Error;

use super::session::SessionRecord;

/// Characters that are replaced before a value is used as a path component.
const PATH_HOSTILE: [char; 6] = ['/', '\\', ':', ' ', '\t', '\n'];

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("failed to create record directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to encode record for {path}: {source}")]
    Encode {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to write record {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Makes `value` safe to use as a single path component.
///
/// Separators and whitespace become `_`; an empty value becomes `_`.
pub fn safe_path_component(value: &str) -> String {
    if value.is_empty() {
        return "_".to_string();
    }
    value.replace(&PATH_HOSTILE[..], "_")
}

/// The path a record for `target_id` is written to.
pub fn record_path(dir: &Path, run_id: &str, case_id: &str, target_id: &str) -> PathBuf {
    dir.join(run_id)
        .join(safe_path_component(case_id))
        .join(format!("{}.json", safe_path_component(target_id)))
}

/// Persists `record` as `<dir>/<run_id>/<case_id>/<target_id>.json`.
///
/// Missing directories are created and an existing file of the same name is
/// overwritten. Returns the path written.
pub async fn write_tcp_record(
    dir: &Path,
    run_id: &str,
    case_id: &str,
    target_id: &str,
    record: &SessionRecord,
) -> Result<PathBuf, RecordError> {
    let path = record_path(dir, run_id, case_id, target_id);
    let parent = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.to_path_buf());

    tokio::fs::create_dir_all(&parent)
        .await
        .map_err(|source| RecordError::CreateDir {
            path: parent.clone(),
            source,
        })?;

    let mut body = serde_json::to_vec_pretty(record).map_err(|source| RecordError::Encode {
        path: path.clone(),
        source,
    })?;
    body.push(b'\n');

    tokio::fs::write(&path, body)
        .await
        .map_err(|source| RecordError::Write {
            path: path.clone(),
            source,
        })?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{ErrorClass, ProbeTarget};

    fn record(target_id: &str) -> SessionRecord {
        let target = ProbeTarget {
            id: target_id.to_string(),
            raw: "10.0.0.1:30303".to_string(),
            endpoint: "10.0.0.1:30303".to_string(),
        };
        SessionRecord::local_failure(
            "20240101T000000Z-0a0b0c0d",
            "probe.tcp",
            &target,
            ErrorClass::DialError,
            "connection refused",
        )
    }

    #[test]
    fn test_safe_path_component() {
        assert_eq!(safe_path_component(""), "_");
        assert_eq!(safe_path_component("probe.tcp"), "probe.tcp");
        assert_eq!(safe_path_component("tcp_10.0.0.1:30303"), "tcp_10.0.0.1_30303");
        assert_eq!(safe_path_component("a/b\\c d\te\nf"), "a_b_c_d_e_f");
    }

    #[test]
    fn test_record_path_sanitizes_case_and_target() {
        let path = record_path(Path::new("runs"), "run-1", "case one", "[::1]:30303");
        assert_eq!(path, Path::new("runs/run-1/case_one/[__1]_30303.json"));
    }

    #[tokio::test]
    async fn test_write_creates_directories_and_round_trips() {
        let dir = tempfile::tempdir().expect("tempdir");
        let rec = record("tcp_10.0.0.1_30303");

        let path = write_tcp_record(dir.path(), &rec.run_id, "probe.tcp", &rec.target_id, &rec)
            .await
            .expect("write record");

        assert_eq!(
            path,
            dir.path()
                .join("20240101T000000Z-0a0b0c0d")
                .join("probe.tcp")
                .join("tcp_10.0.0.1_30303.json")
        );
        let body = std::fs::read_to_string(&path).expect("read back");
        let back: SessionRecord = serde_json::from_str(&body).expect("decode");
        assert_eq!(back, rec);
    }

    #[tokio::test]
    async fn test_write_overwrites_existing_record() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut rec = record("node_ab");

        write_tcp_record(dir.path(), "run", "case", "node_ab", &rec)
            .await
            .expect("first write");
        rec.error = "second".to_string();
        let path = write_tcp_record(dir.path(), "run", "case", "node_ab", &rec)
            .await
            .expect("second write");

        let back: SessionRecord =
            serde_json::from_slice(&std::fs::read(path).expect("read")).expect("decode");
        assert_eq!(back.error, "second");
    }

    #[tokio::test]
    async fn test_write_reports_unwritable_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("run");
        std::fs::write(&blocker, b"not a directory").expect("create blocker");

        let err = write_tcp_record(dir.path(), "run", "case", "t", &record("t"))
            .await
            .expect_err("directory creation must fail");
        assert!(matches!(err, RecordError::CreateDir { .. }));
    }
}
