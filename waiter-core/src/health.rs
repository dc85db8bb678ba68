//! Media mount health probe

use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, error};

/// Aggregate result of a health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    /// True when every expected mount point exists
    #[serde(rename = "status")]
    pub ok: bool,
}

/// Checks that every mount point exists.
///
/// Runs fresh on every call. Filesystem errors count as a missing mount and
/// never propagate.
pub async fn probe(mount_points: &[PathBuf]) -> HealthStatus {
    let mut ok = true;

    for mount_point in mount_points {
        let exists = match tokio::fs::try_exists(mount_point).await {
            Ok(exists) => exists,
            Err(e) => {
                error!("Failed to check {}: {}", mount_point.display(), e);
                false
            }
        };

        if exists {
            debug!("{} directory is good", mount_point.display());
        } else {
            debug!("{} directory failed", mount_point.display());
        }
        ok &= exists;
    }

    debug!("Health probe result is {}", ok);
    HealthStatus { ok }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn media_dirs(temp: &TempDir) -> Vec<PathBuf> {
        (0..3)
            .map(|i| {
                let dir = temp.path().join(i.to_string());
                std::fs::create_dir(&dir).unwrap();
                dir
            })
            .collect()
    }

    #[tokio::test]
    async fn test_all_mounts_present() {
        let temp = TempDir::new().unwrap();
        let dirs = media_dirs(&temp);

        assert_eq!(probe(&dirs).await, HealthStatus { ok: true });
    }

    #[tokio::test]
    async fn test_one_missing_mount_fails() {
        let temp = TempDir::new().unwrap();
        let mut dirs = media_dirs(&temp);
        dirs.push(PathBuf::from("/does/not/exist"));

        assert_eq!(probe(&dirs).await, HealthStatus { ok: false });
    }

    #[test]
    fn test_serializes_as_status() {
        let json = serde_json::to_string(&HealthStatus { ok: true }).unwrap();
        assert_eq!(json, r#"{"status":true}"#);
    }
}
