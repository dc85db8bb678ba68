//! Servable entries derived from a token
//!
//! A single-file token yields one entry. A movie token names a directory that is
//! walked recursively on every request; small files are dropped as non-video
//! content and each remaining file becomes an entry with download and, when the
//! browser can play it, streaming routes.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::Serialize;
use tracing::{debug, warn};

use crate::config::MediaConfig;
use crate::token::TokenRecord;

/// Size suffixes for [`human_size`], in 1024 steps
const SIZE_SUFFIXES: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];

/// Route family an entry path points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    /// Attachment download
    File,
    /// Browser video page
    Stream,
}

impl RouteKind {
    fn as_str(self) -> &'static str {
        match self {
            RouteKind::File => "file",
            RouteKind::Stream => "stream",
        }
    }
}

/// One listable, servable media item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    /// Download route for this file
    pub serve_path: String,
    /// Video page route, present iff the file is streamable
    pub streaming_path: Option<String>,
    pub streamable: bool,
    pub filename: String,
    /// Human readable size, e.g. `1.4MB`
    pub size_human: String,
    /// Filename carries the companion encoder's marker
    pub is_special_encoding: bool,
    pub is_movie: bool,
    /// Token display name, only set for single-file entries
    pub display_name: Option<String>,
}

/// Errors building the entry list.
#[derive(Debug, thiserror::Error)]
pub enum EntryError {
    /// The token's file or directory could not be read
    #[error("Cannot read {path}: {source}")]
    Io {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Builds entry lists from tokens according to the media rules.
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    base_path: PathBuf,
    minimum_file_size: u64,
    streamable_file_types: Vec<String>,
    alfred_suffix: String,
    app_prefix: String,
}

impl EntryBuilder {
    /// Creates a builder; routes are generated under `app_prefix`.
    pub fn new(media: &MediaConfig, app_prefix: &str) -> Self {
        Self {
            base_path: media.base_path.clone(),
            minimum_file_size: media.minimum_file_size,
            streamable_file_types: media
                .streamable_file_types
                .iter()
                .map(|ext| ext.to_lowercase())
                .collect(),
            alfred_suffix: media.alfred_suffix.clone(),
            app_prefix: app_prefix.to_string(),
        }
    }

    /// Lists the servable entries for `token`.
    ///
    /// Entries come back in traversal order; callers that display them sort
    /// them themselves. Files that cannot be stat'ed during a directory walk
    /// are skipped.
    ///
    /// # Errors
    ///
    /// - `EntryError::Io` - If the single file or the movie directory cannot be read
    pub async fn build(&self, token: &TokenRecord) -> Result<Vec<Entry>, EntryError> {
        if token.is_movie {
            self.build_movie_entries(token).await
        } else {
            self.build_file_entry(token).await.map(|entry| vec![entry])
        }
    }

    /// Directory scanned for a movie token.
    pub fn search_root(&self, token: &TokenRecord) -> PathBuf {
        self.base_path.join(&token.path).join(&token.filename)
    }

    /// File named by a single-file token.
    pub fn single_file_path(&self, token: &TokenRecord) -> PathBuf {
        self.base_path.join(&token.path).join(&token.filename)
    }

    /// Whether the extension of `filename` is in the streamable allow-list.
    pub fn is_streamable(&self, filename: &str) -> bool {
        let Some(extension) = Path::new(filename).extension() else {
            return false;
        };
        let extension = format!(".{}", extension.to_string_lossy().to_lowercase());
        self.streamable_file_types.contains(&extension)
    }

    /// Whether `filename` carries the companion encoder's marker.
    pub fn is_special_encoding(&self, filename: &str) -> bool {
        !self.alfred_suffix.is_empty() && filename.contains(&self.alfred_suffix)
    }

    /// Route for `relative_path` under `guid`.
    pub fn route(&self, kind: RouteKind, guid: &str, relative_path: &str) -> String {
        waiter_path(&self.app_prefix, kind, guid, relative_path)
    }

    async fn build_file_entry(&self, token: &TokenRecord) -> Result<Entry, EntryError> {
        let path = self.single_file_path(token);
        let metadata = tokio::fs::metadata(&path)
            .await
            .map_err(|source| EntryError::Io {
                path: path.clone(),
                source,
            })?;

        let mut entry = self.create_entry(
            &token.guid,
            &token.filename,
            &token.filename,
            metadata.len(),
        );
        entry.is_movie = false;
        entry.display_name = Some(token.display_name.clone());
        Ok(entry)
    }

    async fn build_movie_entries(&self, token: &TokenRecord) -> Result<Vec<Entry>, EntryError> {
        let search_root = self.search_root(token);
        let mut files = Vec::new();
        self.scan_directory_recursive(&search_root, true, &mut files)
            .await
            .map_err(|source| EntryError::Io {
                path: search_root.clone(),
                source,
            })?;

        let mut entries = Vec::new();
        for (path, size) in files {
            if size < self.minimum_file_size {
                debug!(
                    "Skipping {} ({} bytes): below minimum size",
                    path.display(),
                    size
                );
                continue;
            }

            let Ok(relative) = path.strip_prefix(&search_root) else {
                continue;
            };
            let relative_path = relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            entries.push(self.create_entry(&token.guid, &filename, &relative_path, size));
        }

        debug!(
            "Built {} entries for {} from {}",
            entries.len(),
            token.guid,
            search_root.display()
        );
        Ok(entries)
    }

    fn create_entry(&self, guid: &str, filename: &str, relative_path: &str, size: u64) -> Entry {
        let streamable = self.is_streamable(filename);
        let streaming_path = streamable.then(|| self.route(RouteKind::Stream, guid, relative_path));

        Entry {
            serve_path: self.route(RouteKind::File, guid, relative_path),
            streaming_path,
            streamable,
            filename: filename.to_string(),
            size_human: human_size(size),
            is_special_encoding: self.is_special_encoding(filename),
            is_movie: true,
            display_name: None,
        }
    }

    /// Recursively collect regular files under `dir` with their sizes
    ///
    /// Files of a directory are collected before its subdirectories are
    /// visited. Symlinked files are followed, symlinked directories are not.
    /// Only a failure to read the top directory is an error.
    fn scan_directory_recursive<'a>(
        &'a self,
        dir: &'a Path,
        is_root: bool,
        files: &'a mut Vec<(PathBuf, u64)>,
    ) -> Pin<Box<dyn Future<Output = Result<(), std::io::Error>> + Send + 'a>> {
        Box::pin(async move {
            let mut read_dir = match tokio::fs::read_dir(dir).await {
                Ok(read_dir) => read_dir,
                Err(e) if is_root => return Err(e),
                Err(e) => {
                    warn!("Failed to scan {}: {}", dir.display(), e);
                    return Ok(());
                }
            };

            let mut subdirs = Vec::new();
            loop {
                let entry = match read_dir.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!("Failed to list {}: {}", dir.display(), e);
                        break;
                    }
                };
                let path = entry.path();

                let file_type = match entry.file_type().await {
                    Ok(file_type) => file_type,
                    Err(e) => {
                        warn!("Skipping {}: {}", path.display(), e);
                        continue;
                    }
                };

                if file_type.is_dir() {
                    subdirs.push(path);
                    continue;
                }

                match tokio::fs::metadata(&path).await {
                    Ok(metadata) if metadata.is_file() => files.push((path, metadata.len())),
                    Ok(_) => {}
                    Err(e) => warn!("Skipping {}: {}", path.display(), e),
                }
            }

            for subdir in subdirs {
                self.scan_directory_recursive(&subdir, false, files).await?;
            }

            Ok(())
        })
    }
}

/// Formats a byte count with binary prefixes and one decimal place.
///
/// # Examples
/// ```
/// use waiter_core::entries::human_size;
///
/// assert_eq!(human_size(1_500_000), "1.4MB");
/// assert_eq!(human_size(512), "512B");
/// ```
pub fn human_size(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{bytes}B");
    }

    let mut value = bytes as f64;
    let mut suffix = 0;
    while value >= 1024.0 && suffix < SIZE_SUFFIXES.len() - 1 {
        value /= 1024.0;
        suffix += 1;
    }

    format!("{value:.1}{}", SIZE_SUFFIXES[suffix])
}

/// Builds a routable path `{prefix}/{kind}/{guid}/{relative_path}`.
///
/// The GUID and every segment of `relative_path` are percent-encoded.
pub fn waiter_path(prefix: &str, kind: RouteKind, guid: &str, relative_path: &str) -> String {
    let encoded = relative_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");

    format!(
        "{prefix}/{}/{}/{encoded}",
        kind.as_str(),
        urlencoding::encode(guid)
    )
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};

    use tempfile::TempDir;

    use super::*;

    const MIN_SIZE: u64 = 10_000_000;

    fn create_sized_file(path: &Path, size: u64) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        File::create(path).unwrap().set_len(size).unwrap();
    }

    fn builder(base: &Path) -> EntryBuilder {
        let media = MediaConfig {
            base_path: base.to_path_buf(),
            alfred_suffix: ".mv-encoded".to_string(),
            ..MediaConfig::default()
        };
        EntryBuilder::new(&media, "/waiter")
    }

    fn token(is_movie: bool, path: &str, filename: &str) -> TokenRecord {
        TokenRecord {
            guid: "guid".to_string(),
            is_movie,
            path: path.to_string(),
            filename: filename.to_string(),
            display_name: "Display".to_string(),
            user_id: 1,
            token_id: 2,
            theme: None,
            username: None,
            tv_id: None,
            tv_name: None,
            next_id: None,
            previous_id: None,
            binge_mode: false,
        }
    }

    #[tokio::test]
    async fn test_single_file_entry() {
        let temp = TempDir::new().unwrap();
        create_sized_file(&temp.path().join("tv/show1/ep1.mp4"), 1_500_000);

        let entries = builder(temp.path())
            .build(&token(false, "tv/show1", "ep1.mp4"))
            .await
            .unwrap();

        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.filename, "ep1.mp4");
        assert!(entry.streamable);
        assert!(!entry.is_movie);
        assert_eq!(entry.size_human, "1.4MB");
        assert_eq!(entry.serve_path, "/waiter/file/guid/ep1.mp4");
        assert_eq!(
            entry.streaming_path.as_deref(),
            Some("/waiter/stream/guid/ep1.mp4")
        );
        assert_eq!(entry.display_name.as_deref(), Some("Display"));
    }

    #[tokio::test]
    async fn test_single_file_missing_is_error() {
        let temp = TempDir::new().unwrap();

        let result = builder(temp.path())
            .build(&token(false, "tv/show1", "missing.mp4"))
            .await;

        assert!(matches!(result, Err(EntryError::Io { .. })));
    }

    #[tokio::test]
    async fn test_movie_entries_filter_small_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("Movies/Some.Movie");
        create_sized_file(&root.join("Some.Movie.mp4"), MIN_SIZE);
        create_sized_file(&root.join("extras/Behind.Scenes.MKV"), MIN_SIZE + 1);
        create_sized_file(&root.join("Some.Movie.nfo"), MIN_SIZE - 1);

        let mut entries = builder(temp.path())
            .build(&token(true, "Movies", "Some.Movie"))
            .await
            .unwrap();
        entries.sort_by(|a, b| a.filename.cmp(&b.filename));

        assert_eq!(entries.len(), 2);

        let extras = &entries[0];
        assert_eq!(extras.filename, "Behind.Scenes.MKV");
        assert!(!extras.streamable);
        assert_eq!(extras.streaming_path, None);
        assert_eq!(extras.serve_path, "/waiter/file/guid/extras/Behind.Scenes.MKV");

        let feature = &entries[1];
        assert_eq!(feature.filename, "Some.Movie.mp4");
        assert!(feature.streamable);
        assert!(feature.is_movie);
        assert_eq!(
            feature.streaming_path.as_deref(),
            Some("/waiter/stream/guid/Some.Movie.mp4")
        );
    }

    #[tokio::test]
    async fn test_movie_directory_missing_is_error() {
        let temp = TempDir::new().unwrap();

        let result = builder(temp.path())
            .build(&token(true, "Movies", "Nothing.Here"))
            .await;

        assert!(matches!(result, Err(EntryError::Io { .. })));
    }

    #[test]
    fn test_streamable_is_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let builder = builder(temp.path());

        assert!(builder.is_streamable("movie.MP4"));
        assert!(builder.is_streamable("movie.mp4"));
        assert!(!builder.is_streamable("movie.mkv"));
        assert!(!builder.is_streamable("mp4"));
    }

    #[test]
    fn test_special_encoding_marker() {
        let temp = TempDir::new().unwrap();
        let builder = builder(temp.path());

        assert!(builder.is_special_encoding("Movie.mv-encoded.mp4"));
        assert!(!builder.is_special_encoding("Movie.mp4"));
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(0), "0B");
        assert_eq!(human_size(1023), "1023B");
        assert_eq!(human_size(1024), "1.0KB");
        assert_eq!(human_size(1_500_000), "1.4MB");
        assert_eq!(human_size(10_000_000), "9.5MB");
        assert_eq!(human_size(5 * 1024 * 1024 * 1024), "5.0GB");
    }

    #[test]
    fn test_waiter_path_encodes_segments() {
        assert_eq!(
            waiter_path("/waiter", RouteKind::File, "g1", "Season 1/ep #1.mp4"),
            "/waiter/file/g1/Season%201/ep%20%231.mp4"
        );
        assert_eq!(
            waiter_path("", RouteKind::Stream, "g1", "a.mp4"),
            "/stream/g1/a.mp4"
        );
    }
}
