//! The gallery API as seen by the controller
//!
//! Every operation is asynchronous and either yields a value or fails with
//! an opaque [`ApiError`]. An empty page is a valid, successful answer.

mod local;

use async_trait::async_trait;
use std::path::PathBuf;

pub use crate::error::{ApiError, ApiResult};
use crate::state::data::{Comment, CommentId, Image, ImageId, User, UserId};
pub use local::LocalApi;

/// Users per page of the user list; the gallery shows one owner at a time.
pub const USERS_PER_PAGE: u32 = 1;

/// Images per page of a user's gallery; the gallery shows one image at a time.
pub const IMAGES_PER_PAGE: u32 = 1;

#[async_trait]
pub trait GalleryApi: Send + Sync {
    /// The page of users starting at `offset`
    async fn list_users(&self, offset: u32) -> ApiResult<Vec<User>>;

    async fn count_users(&self) -> ApiResult<u32>;

    async fn get_image(&self, id: ImageId) -> ApiResult<Image>;

    /// The page of `user_id`'s images starting at `offset`, newest first
    async fn list_user_images(&self, user_id: UserId, offset: u32) -> ApiResult<Vec<Image>>;

    async fn count_user_images(&self, user_id: UserId) -> ApiResult<u32>;

    /// Delete an image owned by the signed-in user. Returns the deleted record.
    async fn delete_image(&self, id: ImageId) -> ApiResult<Image>;

    /// Upload `file` into the signed-in user's gallery
    async fn add_image(&self, title: String, file: PathBuf) -> ApiResult<Image>;

    /// Page `page` of an image's comments, newest first
    async fn list_comments(&self, image_id: ImageId, page: u32, limit: u32) -> ApiResult<Vec<Comment>>;

    async fn count_comments(&self, image_id: ImageId) -> ApiResult<u32>;

    async fn add_comment(&self, image_id: ImageId, content: String) -> ApiResult<Comment>;

    async fn delete_comment(&self, image_id: ImageId, comment_id: CommentId) -> ApiResult<()>;

    /// The signed-in user, or None without a valid session
    async fn get_current_user(&self) -> ApiResult<Option<User>>;

    async fn login(&self, username: String, password: String) -> ApiResult<User>;

    async fn signup(&self, username: String, password: String) -> ApiResult<User>;

    async fn logout(&self) -> ApiResult<()>;
}
