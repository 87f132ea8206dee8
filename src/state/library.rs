use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::data::{Comment, CommentId, Image, ImageFile, ImageId, User, UserId};
use crate::error::LibraryError;

pub type LibraryResult<T> = Result<T, LibraryError>;

/// Stored login secret for one user
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user: User,
    /// bcrypt hash, salt included
    pub password_hash: String,
}

/// The Library manages the SQLite catalog database.
/// It stores users, their images, comments and login sessions.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
}

const IMAGE_COLUMNS: &str = "images.id, images.title, images.metadata_json, images.created_at, \
     users.id, users.username";

const COMMENT_COLUMNS: &str = "comments.id, comments.image_id, comments.content, comments.created_at, \
     users.id, users.username";

impl Library {
    /// Open (or create) the catalog at `db_path` and make sure the schema exists.
    ///
    /// Each background task opens its own Library: `rusqlite::Connection`
    /// cannot be shared between threads, so connections are cheap and local.
    pub fn open(db_path: &Path) -> LibraryResult<Self> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| LibraryError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(db_path)?;
        // Comments and sessions follow their parent rows on delete
        conn.pragma_update(None, "foreign_keys", true)?;

        let mut library = Library {
            conn,
            db_path: db_path.to_path_buf(),
        };
        library.init_schema()?;

        Ok(library)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&mut self) -> LibraryResult<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                username        TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS images (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id         INTEGER NOT NULL,
                title           TEXT NOT NULL,
                metadata_json   TEXT NOT NULL,
                created_at      INTEGER NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS comments (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                image_id        INTEGER NOT NULL,
                user_id         INTEGER NOT NULL,
                content         TEXT NOT NULL,
                created_at      INTEGER NOT NULL,
                FOREIGN KEY(image_id) REFERENCES images(id) ON DELETE CASCADE,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token           TEXT PRIMARY KEY,
                user_id         INTEGER NOT NULL,
                expires_at      INTEGER NOT NULL,
                FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_images_user_created
             ON images(user_id, created_at DESC);

            CREATE INDEX IF NOT EXISTS idx_comments_image_created
             ON comments(image_id, created_at DESC);",
        )?;

        debug!(path = %self.db_path.display(), "catalog schema ready");

        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    // ========== Users ==========

    /// Insert a new user. Fails with a constraint error if the name is taken.
    pub fn create_user(&self, username: &str, password_hash: &str) -> LibraryResult<User> {
        self.conn.execute(
            "INSERT INTO users (username, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![username, password_hash, Utc::now().timestamp_millis()],
        )?;

        Ok(User {
            id: self.conn.last_insert_rowid(),
            username: username.to_string(),
        })
    }

    pub fn username_exists(&self, username: &str) -> LibraryResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row("SELECT id FROM users WHERE username = ?1", [username], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    pub fn find_credentials(&self, username: &str) -> LibraryResult<Option<Credentials>> {
        let credentials = self
            .conn
            .query_row(
                "SELECT id, username, password_hash FROM users WHERE username = ?1",
                [username],
                |row| {
                    Ok(Credentials {
                        user: User {
                            id: row.get(0)?,
                            username: row.get(1)?,
                        },
                        password_hash: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(credentials)
    }

    pub fn user_by_id(&self, id: UserId) -> LibraryResult<Option<User>> {
        let user = self
            .conn
            .query_row("SELECT id, username FROM users WHERE id = ?1", [id], user_from_row)
            .optional()?;
        Ok(user)
    }

    /// One page of users, oldest account first
    pub fn list_users(&self, offset: u32, limit: u32) -> LibraryResult<Vec<User>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, username FROM users ORDER BY created_at ASC, id ASC LIMIT ?1 OFFSET ?2",
        )?;
        let users = stmt
            .query_map(params![limit, offset], user_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(users)
    }

    pub fn user_count(&self) -> LibraryResult<u32> {
        let count = self.conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    // ========== Images ==========

    pub fn insert_image(&self, user_id: UserId, title: &str, file: &ImageFile) -> LibraryResult<Image> {
        let metadata_json = serde_json::to_string(file)?;
        self.conn.execute(
            "INSERT INTO images (user_id, title, metadata_json, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, title, metadata_json, Utc::now().timestamp_millis()],
        )?;

        let id = self.conn.last_insert_rowid();
        self.image_by_id(id)?
            .ok_or(LibraryError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn image_by_id(&self, id: ImageId) -> LibraryResult<Option<Image>> {
        let sql = format!(
            "SELECT {IMAGE_COLUMNS} FROM images JOIN users ON users.id = images.user_id WHERE images.id = ?1"
        );
        let image = self.conn.query_row(&sql, [id], image_from_row).optional()?;
        Ok(image)
    }

    /// One page of a user's images, newest first
    pub fn list_user_images(&self, user_id: UserId, offset: u32, limit: u32) -> LibraryResult<Vec<Image>> {
        let sql = format!(
            "SELECT {IMAGE_COLUMNS} FROM images JOIN users ON users.id = images.user_id
             WHERE images.user_id = ?1
             ORDER BY images.created_at DESC, images.id DESC
             LIMIT ?2 OFFSET ?3"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let images = stmt
            .query_map(params![user_id, limit, offset], image_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(images)
    }

    pub fn image_count_for(&self, user_id: UserId) -> LibraryResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM images WHERE user_id = ?1",
            [user_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Delete an image and (through the foreign key) its comments.
    /// Returns false if there was no such image.
    pub fn delete_image(&self, id: ImageId) -> LibraryResult<bool> {
        let removed = self.conn.execute("DELETE FROM images WHERE id = ?1", [id])?;
        Ok(removed > 0)
    }

    // ========== Comments ==========

    pub fn insert_comment(&self, image_id: ImageId, user_id: UserId, content: &str) -> LibraryResult<Comment> {
        self.conn.execute(
            "INSERT INTO comments (image_id, user_id, content, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![image_id, user_id, content, Utc::now().timestamp_millis()],
        )?;

        let id = self.conn.last_insert_rowid();
        self.comment_by_id(id)?
            .ok_or(LibraryError::Sqlite(rusqlite::Error::QueryReturnedNoRows))
    }

    pub fn comment_by_id(&self, id: CommentId) -> LibraryResult<Option<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments JOIN users ON users.id = comments.user_id WHERE comments.id = ?1"
        );
        let comment = self.conn.query_row(&sql, [id], comment_from_row).optional()?;
        Ok(comment)
    }

    /// One page of an image's comments, newest first
    pub fn list_comments(&self, image_id: ImageId, page: u32, limit: u32) -> LibraryResult<Vec<Comment>> {
        let sql = format!(
            "SELECT {COMMENT_COLUMNS} FROM comments JOIN users ON users.id = comments.user_id
             WHERE comments.image_id = ?1
             ORDER BY comments.created_at DESC, comments.id DESC
             LIMIT ?2 OFFSET ?3"
        );
        let offset = u64::from(page) * u64::from(limit);
        let mut stmt = self.conn.prepare(&sql)?;
        let comments = stmt
            .query_map(params![image_id, limit, offset as i64], comment_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(comments)
    }

    pub fn comment_count(&self, image_id: ImageId) -> LibraryResult<u32> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM comments WHERE image_id = ?1",
            [image_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn delete_comment(&self, image_id: ImageId, comment_id: CommentId) -> LibraryResult<bool> {
        let removed = self.conn.execute(
            "DELETE FROM comments WHERE id = ?1 AND image_id = ?2",
            params![comment_id, image_id],
        )?;
        Ok(removed > 0)
    }

    // ========== Sessions ==========

    pub fn create_session(&self, token: &str, user_id: UserId, expires_at: DateTime<Utc>) -> LibraryResult<()> {
        self.conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![token, user_id, expires_at.timestamp_millis()],
        )?;
        Ok(())
    }

    /// Resolve a session token to its user.
    /// Expired sessions are removed on lookup and resolve to None.
    pub fn session_user(&self, token: &str, now: DateTime<Utc>) -> LibraryResult<Option<User>> {
        let session: Option<(UserId, i64)> = self
            .conn
            .query_row(
                "SELECT user_id, expires_at FROM sessions WHERE token = ?1",
                [token],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match session {
            Some((user_id, expires_at)) if expires_at > now.timestamp_millis() => self.user_by_id(user_id),
            Some(_) => {
                self.delete_session(token)?;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    pub fn delete_session(&self, token: &str) -> LibraryResult<()> {
        self.conn.execute("DELETE FROM sessions WHERE token = ?1", [token])?;
        Ok(())
    }
}

fn timestamp(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
    })
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<Image> {
    let metadata_json: String = row.get(2)?;
    let file: ImageFile = serde_json::from_str(&metadata_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

    Ok(Image {
        id: row.get(0)?,
        title: row.get(1)?,
        file,
        created_at: timestamp(row.get(3)?),
        author: User {
            id: row.get(4)?,
            username: row.get(5)?,
        },
    })
}

fn comment_from_row(row: &Row<'_>) -> rusqlite::Result<Comment> {
    Ok(Comment {
        id: row.get(0)?,
        image_id: row.get(1)?,
        content: row.get(2)?,
        created_at: timestamp(row.get(3)?),
        author: User {
            id: row.get(4)?,
            username: row.get(5)?,
        },
    })
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}
