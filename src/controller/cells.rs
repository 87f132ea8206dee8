use crate::reactive::{Runtime, State};
use crate::state::data::{Comment, Image, User};

/// One of the independently failing parts of the page. Each has its own
/// error banner; a failure in one never touches another's.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Auth,
    UserGallery,
    Image,
    Comment,
}

/// Handles to every cell the gallery page owns.
///
/// The struct is `Copy`; effects and views capture it and read only the
/// cells they list as dependencies.
#[derive(Debug, Clone, Copy)]
pub struct GalleryCells {
    pub is_authed: State<bool>,
    pub username: State<String>,

    /// Cursor into the global user list
    pub user_offset: State<u32>,
    /// Owner of the gallery on screen
    pub cur_user_gallery: State<Option<User>>,
    pub user_count: State<u32>,

    /// Cursor into the owner's images
    pub image_offset: State<u32>,
    /// None until the owner's count has loaded
    pub image_count: State<Option<u32>>,
    pub image: State<Option<Image>>,

    pub comment_page: State<u32>,
    pub comments: State<Vec<Comment>>,
    pub comment_count: State<u32>,
    /// Bumped after a comment is added or removed to force a page-0 refetch
    pub comments_revision: State<u64>,

    pub image_loading: State<bool>,
    pub comments_loading: State<bool>,
    pub user_gallery_loading: State<bool>,

    /// Add-image form expanded
    pub image_form_open: State<bool>,

    pub auth_error: State<Option<String>>,
    pub user_gallery_error: State<Option<String>>,
    pub image_error: State<Option<String>>,
    pub comment_error: State<Option<String>>,
}

impl GalleryCells {
    pub fn declare<C: Send + 'static, S>(runtime: &mut Runtime<C, S>) -> Self {
        Self {
            is_authed: runtime.declare("is_authed", false),
            username: runtime.declare("username", String::new()),
            user_offset: runtime.declare("user_offset", 0),
            cur_user_gallery: runtime.declare("cur_user_gallery", None),
            user_count: runtime.declare("user_count", 0),
            image_offset: runtime.declare("image_offset", 0),
            image_count: runtime.declare("image_count", None),
            image: runtime.declare("image", None),
            comment_page: runtime.declare("comment_page", 0),
            comments: runtime.declare("comments", Vec::new()),
            comment_count: runtime.declare("comment_count", 0),
            comments_revision: runtime.declare("comments_revision", 0),
            image_loading: runtime.declare("image_loading", true),
            comments_loading: runtime.declare("comments_loading", true),
            user_gallery_loading: runtime.declare("user_gallery_loading", true),
            image_form_open: runtime.declare("image_form_open", false),
            auth_error: runtime.declare("auth_error", None),
            user_gallery_error: runtime.declare("user_gallery_error", None),
            image_error: runtime.declare("image_error", None),
            comment_error: runtime.declare("comment_error", None),
        }
    }

    /// The error banner cell of a section
    pub fn error(&self, section: Section) -> State<Option<String>> {
        match section {
            Section::Auth => self.auth_error,
            Section::UserGallery => self.user_gallery_error,
            Section::Image => self.image_error,
            Section::Comment => self.comment_error,
        }
    }
}
