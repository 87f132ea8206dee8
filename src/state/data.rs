//! Shared data structures for the application state
//!
//! These structs represent the records that flow between
//! the catalog layer, the API client and the controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type UserId = i64;
pub type ImageId = i64;
pub type CommentId = i64;

/// A registered user, as exposed to other users (no credentials)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique database ID
    pub id: UserId,
    pub username: String,
}

/// Metadata of an uploaded file, stored as JSON next to the image row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFile {
    /// Where the stored copy lives on disk
    pub path: String,
    /// e.g. "image/png"
    pub mimetype: String,
    pub width: u32,
    pub height: u32,
    /// Size of the stored copy in bytes
    pub size: u64,
    /// Filename as picked by the uploader (e.g. "IMG_0042.jpg")
    pub original_name: String,
    /// Downscaled copy for display (None if the original is small enough)
    pub preview_path: Option<String>,
}

impl ImageFile {
    /// The file the gallery should render
    pub fn display_path(&self) -> &str {
        self.preview_path.as_deref().unwrap_or(&self.path)
    }
}

/// Represents a single image in a user's gallery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub title: String,
    /// The user who uploaded the image
    pub author: User,
    pub file: ImageFile,
    pub created_at: DateTime<Utc>,
}

/// A comment left on an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub image_id: ImageId,
    pub author: User,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Image {
    /// True if `username` uploaded this image
    pub fn is_owned_by(&self, username: &str) -> bool {
        !username.is_empty() && self.author.username == username
    }
}

impl Comment {
    /// True if `username` wrote this comment
    pub fn is_written_by(&self, username: &str) -> bool {
        !username.is_empty() && self.author.username == username
    }
}
