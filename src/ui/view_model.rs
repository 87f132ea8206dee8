//! Render sink for the gallery page
//!
//! The view lane of the runtime projects cells into the plain data structs
//! below; the iced layer only ever reads them. A region is replaced only if
//! its projection differs from what is already there, so running a view
//! twice over the same cells leaves the model untouched.

use chrono::Local;

use crate::controller::{Completion, GalleryCells, Section};
use crate::reactive::{Runtime, Store};
use crate::state::data::{CommentId, ImageId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRegion {
    pub form_visible: bool,
    pub logout_visible: bool,
    /// "Current User: <name>", empty when signed out
    pub current_user: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GalleryNav {
    pub visible: bool,
    pub title: String,
    /// Prev/next shown only when there is an owner
    pub buttons_visible: bool,
    pub previous_enabled: bool,
    pub next_enabled: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageCard {
    pub id: ImageId,
    pub title: String,
    pub author: String,
    /// File to display, the preview when one exists
    pub path: String,
    pub delete_visible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImagePanel {
    pub spinner_visible: bool,
    /// "Gallery Image: n/m" or "No images yet."
    pub counter: Option<String>,
    pub card: Option<ImageCard>,
    pub previous_enabled: bool,
    pub next_enabled: bool,
    pub add_toggle_visible: bool,
    pub add_form_visible: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRow {
    pub id: CommentId,
    pub author: String,
    pub posted: String,
    pub content: String,
    pub delete_visible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentPanel {
    pub visible: bool,
    pub spinner_visible: bool,
    /// "Total Comments: n"
    pub total: String,
    pub rows: Vec<CommentRow>,
    /// "No comments yet." is shown
    pub empty_notice: bool,
    pub form_visible: bool,
    pub previous_enabled: bool,
    pub next_enabled: bool,
    pub error: Option<String>,
}

/// Everything the page renders, one field per region.
#[derive(Debug, Clone, Default)]
pub struct ViewModel {
    pub auth: AuthRegion,
    pub gallery: GalleryNav,
    pub image: ImagePanel,
    pub comments: CommentPanel,
    mutations: u64,
}

impl ViewModel {
    /// Number of region writes that actually changed something
    pub fn mutations(&self) -> u64 {
        self.mutations
    }
}

/// Assign only when different.
fn write<T: PartialEq>(slot: &mut T, next: T, mutations: &mut u64) {
    if *slot != next {
        *slot = next;
        *mutations += 1;
    }
}

/// Register the four region projections. Must come after the controller's
/// effects so views observe the settled cells of each pass.
pub fn register(runtime: &mut Runtime<Completion, ViewModel>, cells: GalleryCells, comments_per_page: u32) {
    let c = cells;

    runtime.register_view(
        "auth",
        &[c.is_authed.id(), c.username.id(), c.auth_error.id()],
        move |store, model| {
            let next = project_auth(store, &c);
            write(&mut model.auth, next, &mut model.mutations);
        },
    );

    runtime.register_view(
        "gallery_nav",
        &[
            c.cur_user_gallery.id(),
            c.user_gallery_loading.id(),
            c.user_offset.id(),
            c.user_count.id(),
            c.user_gallery_error.id(),
        ],
        move |store, model| {
            let next = project_gallery(store, &c);
            write(&mut model.gallery, next, &mut model.mutations);
        },
    );

    runtime.register_view(
        "image_panel",
        &[
            c.image.id(),
            c.image_loading.id(),
            c.image_offset.id(),
            c.image_count.id(),
            c.cur_user_gallery.id(),
            c.is_authed.id(),
            c.username.id(),
            c.image_form_open.id(),
            c.image_error.id(),
        ],
        move |store, model| {
            let next = project_image(store, &c);
            write(&mut model.image, next, &mut model.mutations);
        },
    );

    runtime.register_view(
        "comment_panel",
        &[
            c.comments.id(),
            c.comment_count.id(),
            c.comments_loading.id(),
            c.comment_page.id(),
            c.is_authed.id(),
            c.username.id(),
            c.image.id(),
            c.image_loading.id(),
            c.comment_error.id(),
        ],
        move |store, model| {
            let next = project_comments(store, &c, comments_per_page);
            write(&mut model.comments, next, &mut model.mutations);
        },
    );
}

fn project_auth(store: &Store, c: &GalleryCells) -> AuthRegion {
    let authed = *store.get(c.is_authed);
    let username = store.get(c.username);
    AuthRegion {
        form_visible: !authed,
        logout_visible: authed,
        current_user: if authed && !username.is_empty() {
            format!("Current User: {}", username)
        } else {
            String::new()
        },
        error: store.get(c.error(Section::Auth)).clone(),
    }
}

fn project_gallery(store: &Store, c: &GalleryCells) -> GalleryNav {
    let error = store.get(c.error(Section::UserGallery)).clone();
    if *store.get(c.user_gallery_loading) {
        return GalleryNav {
            error,
            ..GalleryNav::default()
        };
    }

    let offset = *store.get(c.user_offset);
    let count = *store.get(c.user_count);
    match store.get(c.cur_user_gallery) {
        Some(owner) => GalleryNav {
            visible: true,
            title: format!("@{}'s Gallery", owner.username),
            buttons_visible: true,
            previous_enabled: offset > 0,
            next_enabled: offset + 1 < count,
            error,
        },
        None if count == 0 => GalleryNav {
            visible: true,
            title: "No users found.".to_string(),
            buttons_visible: false,
            previous_enabled: false,
            next_enabled: false,
            error,
        },
        // Users exist but no owner was loaded, e.g. the gallery fetch failed
        None => GalleryNav {
            error,
            ..GalleryNav::default()
        },
    }
}

fn project_image(store: &Store, c: &GalleryCells) -> ImagePanel {
    let loading = *store.get(c.image_loading);
    let authed = *store.get(c.is_authed);
    let username = store.get(c.username);
    let owner = store.get(c.cur_user_gallery);
    let offset = *store.get(c.image_offset);
    let count = *store.get(c.image_count);

    let own_gallery = authed && owner.as_ref().is_some_and(|o| &o.username == username);
    let add_toggle_visible = !loading && own_gallery;

    let counter = match (loading, owner, count) {
        (false, Some(_), Some(0)) => Some("No images yet.".to_string()),
        (false, Some(_), Some(total)) => Some(format!("Gallery Image: {}/{}", offset + 1, total)),
        _ => None,
    };

    let card = if loading {
        None
    } else {
        store.get(c.image).as_ref().map(|image| ImageCard {
            id: image.id,
            title: image.title.clone(),
            author: image.author.username.clone(),
            path: image.file.display_path().to_string(),
            delete_visible: authed && image.is_owned_by(username),
        })
    };

    ImagePanel {
        spinner_visible: loading,
        counter,
        card,
        previous_enabled: !loading && offset > 0,
        next_enabled: !loading && count.is_some_and(|total| offset + 1 < total),
        add_toggle_visible,
        add_form_visible: add_toggle_visible && *store.get(c.image_form_open),
        error: store.get(c.error(Section::Image)).clone(),
    }
}

fn project_comments(store: &Store, c: &GalleryCells, per_page: u32) -> CommentPanel {
    let authed = *store.get(c.is_authed);
    let has_image = store.get(c.image).is_some();
    if !authed || !has_image {
        return CommentPanel::default();
    }

    let loading = *store.get(c.comments_loading);
    let username = store.get(c.username);
    let page = *store.get(c.comment_page);
    let count = *store.get(c.comment_count);
    let comments = store.get(c.comments);

    let rows = if loading {
        Vec::new()
    } else {
        comments
            .iter()
            .map(|comment| CommentRow {
                id: comment.id,
                author: comment.author.username.clone(),
                posted: comment
                    .created_at
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M")
                    .to_string(),
                content: comment.content.clone(),
                delete_visible: comment.is_written_by(username),
            })
            .collect()
    };

    CommentPanel {
        visible: true,
        spinner_visible: loading,
        total: format!("Total Comments: {}", count),
        empty_notice: !loading && comments.is_empty(),
        rows,
        form_visible: !*store.get(c.image_loading),
        previous_enabled: !loading && page > 0,
        next_enabled: !loading && u64::from(page + 1) * u64::from(per_page) < u64::from(count),
        error: store.get(c.error(Section::Comment)).clone(),
    }
}
