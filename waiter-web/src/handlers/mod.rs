//! HTTP request handlers organized by functionality

pub mod download;
pub mod listing;
pub mod range;
pub mod service;

// Re-export handler functions
pub use download::{download_file, stream_page};
pub use listing::{dir_listing, file_listing};
pub use range::extract_range_header;
pub use service::{mark_viewed, status};
