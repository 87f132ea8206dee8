use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;
use rand::RngCore;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use super::{ApiError, ApiResult, GalleryApi, IMAGES_PER_PAGE, USERS_PER_PAGE};
use crate::error::{LibraryError, UploadError};
use crate::media::upload;
use crate::state::data::{Comment, CommentId, Image, ImageId, User, UserId};
use crate::state::library::Library;

/// Why a catalog operation was refused. Flattened into [`ApiError`] before
/// it reaches the controller.
#[derive(Debug, Error)]
enum Failure {
    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Password(#[from] bcrypt::BcryptError),

    #[error("authentication required")]
    Unauthenticated,

    #[error("{0}")]
    Denied(&'static str),

    #[error("{0} not found")]
    Missing(&'static str),

    #[error("{0}")]
    Invalid(&'static str),
}

/// [`GalleryApi`] served from the local SQLite catalog.
///
/// The session token is kept in memory only, like a browser tab's token
/// store: restarting the application signs the user out.
pub struct LocalApi {
    db_path: PathBuf,
    uploads_dir: PathBuf,
    session_ttl: Duration,
    token: Arc<Mutex<Option<String>>>,
}

impl LocalApi {
    /// Open the catalog once to make sure the schema exists.
    pub fn open(db_path: PathBuf, uploads_dir: PathBuf, session_ttl_secs: i64) -> Result<Self, LibraryError> {
        let library = Library::open(&db_path)?;
        info!(
            path = %library.path().display(),
            users = library.user_count()?,
            "catalog ready"
        );

        Ok(Self {
            db_path,
            uploads_dir,
            session_ttl: Duration::seconds(session_ttl_secs),
            token: Arc::new(Mutex::new(None)),
        })
    }

    fn current_token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    /// Run `f` against a fresh connection on the blocking pool.
    async fn with_library<T, F>(&self, operation: &'static str, f: F) -> ApiResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Library) -> Result<T, Failure> + Send + 'static,
    {
        let db_path = self.db_path.clone();
        let result = tokio::task::spawn_blocking(move || {
            let library = Library::open(&db_path)?;
            f(&library)
        })
        .await
        .map_err(|err| ApiError::new(operation, err))?;

        result.map_err(|failure| {
            warn!(operation, %failure, "catalog operation failed");
            ApiError::new(operation, failure)
        })
    }

    /// Issue a session for `user` and remember its token.
    async fn open_session(&self, operation: &'static str, user: User) -> ApiResult<User> {
        let token = random_hex::<32>();
        let expires_at = Utc::now() + self.session_ttl;
        let session_token = token.clone();
        let user_id = user.id;
        self.with_library(operation, move |library| {
            Ok(library.create_session(&session_token, user_id, expires_at)?)
        })
        .await?;

        *self.token.lock() = Some(token);
        Ok(user)
    }
}

fn session_user(library: &Library, token: Option<&str>) -> Result<User, Failure> {
    let token = token.ok_or(Failure::Unauthenticated)?;
    library
        .session_user(token, Utc::now())?
        .ok_or(Failure::Unauthenticated)
}

fn existing_image(library: &Library, id: ImageId) -> Result<Image, Failure> {
    library.image_by_id(id)?.ok_or(Failure::Missing("image"))
}

/// bcrypt work factor for stored passwords
#[cfg(not(test))]
const PASSWORD_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const PASSWORD_COST: u32 = 4;

fn random_hex<const N: usize>() -> String {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[async_trait]
impl GalleryApi for LocalApi {
    async fn list_users(&self, offset: u32) -> ApiResult<Vec<User>> {
        self.with_library("list users", move |library| {
            Ok(library.list_users(offset, USERS_PER_PAGE)?)
        })
        .await
    }

    async fn count_users(&self) -> ApiResult<u32> {
        self.with_library("count users", |library| Ok(library.user_count()?))
            .await
    }

    async fn get_image(&self, id: ImageId) -> ApiResult<Image> {
        self.with_library("get image", move |library| existing_image(library, id))
            .await
    }

    async fn list_user_images(&self, user_id: UserId, offset: u32) -> ApiResult<Vec<Image>> {
        self.with_library("list images", move |library| {
            Ok(library.list_user_images(user_id, offset, IMAGES_PER_PAGE)?)
        })
        .await
    }

    async fn count_user_images(&self, user_id: UserId) -> ApiResult<u32> {
        self.with_library("count images", move |library| {
            Ok(library.image_count_for(user_id)?)
        })
        .await
    }

    async fn delete_image(&self, id: ImageId) -> ApiResult<Image> {
        let token = self.current_token();
        self.with_library("delete image", move |library| {
            let user = session_user(library, token.as_deref())?;
            let image = existing_image(library, id)?;
            if image.author.id != user.id {
                return Err(Failure::Denied("only the uploader can delete an image"));
            }
            library.delete_image(id)?;
            upload::remove_upload(&image.file);
            Ok(image)
        })
        .await
    }

    async fn add_image(&self, title: String, file: PathBuf) -> ApiResult<Image> {
        let token = self.current_token();
        let uploads_dir = self.uploads_dir.clone();
        self.with_library("add image", move |library| {
            let user = session_user(library, token.as_deref())?;
            let title = title.trim();
            if title.is_empty() {
                return Err(Failure::Invalid("image title is required"));
            }

            let stored = upload::store_upload(&file, &uploads_dir)?;
            match library.insert_image(user.id, title, &stored) {
                Ok(image) => Ok(image),
                Err(err) => {
                    upload::remove_upload(&stored);
                    Err(err.into())
                }
            }
        })
        .await
    }

    async fn list_comments(&self, image_id: ImageId, page: u32, limit: u32) -> ApiResult<Vec<Comment>> {
        let token = self.current_token();
        self.with_library("list comments", move |library| {
            session_user(library, token.as_deref())?;
            if limit == 0 {
                return Err(Failure::Invalid("page limit must be positive"));
            }
            existing_image(library, image_id)?;
            Ok(library.list_comments(image_id, page, limit)?)
        })
        .await
    }

    async fn count_comments(&self, image_id: ImageId) -> ApiResult<u32> {
        let token = self.current_token();
        self.with_library("count comments", move |library| {
            session_user(library, token.as_deref())?;
            existing_image(library, image_id)?;
            Ok(library.comment_count(image_id)?)
        })
        .await
    }

    async fn add_comment(&self, image_id: ImageId, content: String) -> ApiResult<Comment> {
        let token = self.current_token();
        self.with_library("add comment", move |library| {
            let user = session_user(library, token.as_deref())?;
            let content = content.trim();
            if content.is_empty() {
                return Err(Failure::Invalid("comment content is required"));
            }
            existing_image(library, image_id)?;
            Ok(library.insert_comment(image_id, user.id, content)?)
        })
        .await
    }

    async fn delete_comment(&self, image_id: ImageId, comment_id: CommentId) -> ApiResult<()> {
        let token = self.current_token();
        self.with_library("delete comment", move |library| {
            let user = session_user(library, token.as_deref())?;
            let image = existing_image(library, image_id)?;
            let comment = library
                .comment_by_id(comment_id)?
                .filter(|comment| comment.image_id == image_id)
                .ok_or(Failure::Missing("comment"))?;

            // The comment's author and the image's owner may both remove it
            if comment.author.id != user.id && image.author.id != user.id {
                return Err(Failure::Denied("not allowed to delete this comment"));
            }
            library.delete_comment(image_id, comment_id)?;
            Ok(())
        })
        .await
    }

    async fn get_current_user(&self) -> ApiResult<Option<User>> {
        let Some(token) = self.current_token() else {
            return Ok(None);
        };
        self.with_library("current user", move |library| {
            Ok(library.session_user(&token, Utc::now())?)
        })
        .await
    }

    async fn login(&self, username: String, password: String) -> ApiResult<User> {
        let user = self
            .with_library("login", move |library| {
                let credentials = library
                    .find_credentials(&username)?
                    .ok_or(Failure::Denied("unknown username"))?;
                if !bcrypt::verify(&password, &credentials.password_hash)? {
                    return Err(Failure::Denied("wrong password"));
                }
                Ok(credentials.user)
            })
            .await?;

        self.open_session("login", user).await
    }

    async fn signup(&self, username: String, password: String) -> ApiResult<User> {
        let user = self
            .with_library("signup", move |library| {
                if username.trim().is_empty() || password.is_empty() {
                    return Err(Failure::Invalid("username and password are required"));
                }
                if library.username_exists(&username)? {
                    return Err(Failure::Denied("username already exists"));
                }
                let hash = bcrypt::hash(&password, PASSWORD_COST)?;
                Ok(library.create_user(&username, &hash)?)
            })
            .await?;

        self.open_session("signup", user).await
    }

    async fn logout(&self) -> ApiResult<()> {
        // The local token goes first so a failed call still signs this client out
        let Some(token) = self.token.lock().take() else {
            return Ok(());
        };
        self.with_library("logout", move |library| Ok(library.delete_session(&token)?))
            .await
    }
}
