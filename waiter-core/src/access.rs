//! Path containment checks for download requests
//!
//! A token grants access to one directory (movie tokens) or to the directory of
//! one file. Every path a client asks for is resolved against that grant and
//! rejected unless it stays inside it.

use std::path::{Component, Path, PathBuf};

use tracing::error;

use crate::token::TokenRecord;

/// Message shown to clients whose request escapes their grant
pub const UNAUTHORIZED_MESSAGE: &str = "Access is unauthorized!";

/// Errors authorizing a requested path.
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// The requested path is outside what the token grants
    #[error("Unauthorized use of GUID {guid}: {requested}")]
    Unauthorized {
        /// GUID the request was made with
        guid: String,
        /// Path the client asked for
        requested: String,
    },
}

/// Directory a token grants access to.
///
/// Movie tokens grant `base/path/filename`; single-file tokens grant
/// `base/path`. An absolute token path is used as-is.
pub fn authorized_root(base_path: &Path, token: &TokenRecord) -> PathBuf {
    let root = base_path.join(&token.path);
    if token.is_movie {
        root.join(&token.filename)
    } else {
        root
    }
}

/// Resolves `requested` against the token's grant.
///
/// The request is accepted only if the lexically normalized full path still
/// contains the equally normalized token path and lies strictly below the authorized root,
/// compared component by component. Absolute requests, `..` escapes and
/// sibling directories sharing a name prefix are all rejected. Every rejection
/// is logged with the GUID.
///
/// # Errors
///
/// - `AccessError::Unauthorized` - If the resolved path is outside the grant
pub fn authorize(
    base_path: &Path,
    token: &TokenRecord,
    requested: &str,
) -> Result<PathBuf, AccessError> {
    let root = normalize_lexically(&authorized_root(base_path, token));
    let requested_path = Path::new(requested);

    let escapes_root = requested_path
        .components()
        .any(|component| matches!(component, Component::RootDir | Component::Prefix(_)));

    let full_path = normalize_lexically(&root.join(requested_path));
    let token_path = normalize_lexically(Path::new(&token.path));

    let contained = !escapes_root
        && full_path != root
        && full_path.starts_with(&root)
        && full_path
            .to_string_lossy()
            .contains(token_path.to_string_lossy().as_ref());

    if contained {
        Ok(full_path)
    } else {
        error!(
            guid = %token.guid,
            requested,
            "Unauthorized use of GUID attempted"
        );
        Err(AccessError::Unauthorized {
            guid: token.guid.clone(),
            requested: requested.to_string(),
        })
    }
}

/// Resolves `.` and `..` without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token(is_movie: bool, path: &str, filename: &str) -> TokenRecord {
        TokenRecord {
            guid: "audit-guid".to_string(),
            is_movie,
            path: path.to_string(),
            filename: filename.to_string(),
            display_name: String::new(),
            user_id: 1,
            token_id: 1,
            theme: None,
            username: None,
            tv_id: None,
            tv_name: None,
            next_id: None,
            previous_id: None,
            binge_mode: false,
        }
    }

    #[test]
    fn test_episode_inside_grant() {
        let base = Path::new("/mnt/media");
        let full = authorize(base, &token(false, "tv/show", "ep1.mp4"), "ep1.mp4").unwrap();

        assert_eq!(full, PathBuf::from("/mnt/media/tv/show/ep1.mp4"));
    }

    #[test]
    fn test_movie_file_in_subdirectory() {
        let base = Path::new("/mnt/media");
        let full = authorize(
            base,
            &token(true, "Movies", "Some.Movie"),
            "extras/./clip.mp4",
        )
        .unwrap();

        assert_eq!(
            full,
            PathBuf::from("/mnt/media/Movies/Some.Movie/extras/clip.mp4")
        );
    }

    #[test]
    fn test_unnormalized_token_path_still_matches() {
        let base = Path::new("/mnt/media");

        for path in ["tv shows/./Show", "tv shows//Show", "tv shows/Show/"] {
            let full = authorize(base, &token(false, path, "ep1.mp4"), "ep1.mp4").unwrap();
            assert_eq!(full, PathBuf::from("/mnt/media/tv shows/Show/ep1.mp4"));
        }
    }

    #[test]
    fn test_absolute_token_path_is_kept() {
        let base = Path::new("/mnt/media");
        let full = authorize(
            base,
            &token(false, "/mnt/other/tv/show", "ep1.mp4"),
            "ep1.mp4",
        )
        .unwrap();

        assert_eq!(full, PathBuf::from("/mnt/other/tv/show/ep1.mp4"));
    }

    #[test]
    fn test_traversal_to_other_show_is_rejected() {
        let base = Path::new("/mnt/media");
        let result = authorize(base, &token(false, "tv/show", "ep1.mp4"), "../other/ep1");

        assert!(matches!(
            result,
            Err(AccessError::Unauthorized { ref guid, .. }) if guid == "audit-guid"
        ));
    }

    #[test]
    fn test_sibling_with_shared_prefix_is_rejected() {
        // "tv/show" is a substring of "tv/show-other" but not a parent of it
        let base = Path::new("/mnt/media");
        let result = authorize(
            base,
            &token(false, "tv/show", "ep1.mp4"),
            "../show-other/ep1.mp4",
        );

        assert!(result.is_err());
    }

    #[test]
    fn test_absolute_request_is_rejected() {
        let base = Path::new("/mnt/media");
        let result = authorize(base, &token(false, "tv/show", "ep1.mp4"), "/etc/passwd");

        assert!(result.is_err());
    }

    #[test]
    fn test_grant_root_itself_is_rejected() {
        let base = Path::new("/mnt/media");
        assert!(authorize(base, &token(true, "Movies", "Some.Movie"), "").is_err());
        assert!(authorize(base, &token(true, "Movies", "Some.Movie"), "a/..").is_err());
    }
}
