//! Results of spawned jobs and how they land in the cells

use tracing::{debug, warn};

use super::effects::Wiring;
use super::tickets::Ticket;
use crate::api::{ApiError, ApiResult};
use crate::reactive::Cx;
use crate::state::data::{Comment, Image, ImageId, User, UserId};

pub(super) const CREDENTIALS_REQUIRED: &str = "Username and password are required.";
pub(super) const IMAGE_FIELDS_REQUIRED: &str = "Image title and file are required.";
pub(super) const COMMENT_REQUIRED: &str = "Comment cannot be empty.";

const SESSION_FAILED: &str = "Could not check your session. Please try again.";
const USER_COUNT_FAILED: &str = "Failed to get user count. Please try again.";
const GALLERY_FAILED: &str = "Failed to load the user gallery. Please try again.";
const IMAGE_FAILED: &str = "Failed to get image. Please try again.";
const COMMENTS_FAILED: &str = "Failed to load comments. Please try again.";
const COMMENT_COUNT_FAILED: &str = "Failed to load comment count. Please try again.";
const MORE_COMMENTS_FAILED: &str = "Failed to load more comments. Please try again.";
const LOGIN_FAILED: &str = "Login failed. Please try again.";
const SIGNUP_FAILED: &str = "Signup failed. Please try again.";
const LOGOUT_FAILED: &str = "Logout failed. Please try again.";
const DELETE_IMAGE_FAILED: &str = "Failed to delete image. Please try again.";
const ADD_IMAGE_FAILED: &str = "Failed to add image. Please try again.";
const ADD_COMMENT_FAILED: &str = "Failed to add comment. Please try again.";
const DELETE_COMMENT_FAILED: &str = "Failed to delete comment. Please try again.";

/// Output of a job spawned by the controller. The host feeds it back through
/// [`GalleryController::resolve`](super::GalleryController::resolve).
#[derive(Debug, Clone)]
pub enum Completion {
    Session(ApiResult<Option<User>>),
    UserCount(ApiResult<u32>),
    /// Owner at the requested offset with their image count
    Gallery {
        ticket: Ticket,
        result: ApiResult<Option<(User, u32)>>,
    },
    Image {
        ticket: Ticket,
        result: ApiResult<Option<Image>>,
    },
    /// Page and total are fetched together but fail independently
    Comments {
        ticket: Ticket,
        page: ApiResult<Vec<Comment>>,
        count: ApiResult<u32>,
    },
    /// Whether comment page `page` of `image` has any entries
    CommentPageProbe {
        image: ImageId,
        page: u32,
        result: ApiResult<bool>,
    },
    Login(ApiResult<User>),
    Signup(ApiResult<User>),
    Logout(ApiResult<()>),
    /// `gallery` is the gallery ticket current when the delete was issued
    ImageDeleted {
        gallery: Ticket,
        result: ApiResult<Image>,
    },
    /// Carries the refreshed count of `owner`'s gallery, if one was on screen
    ImageAdded {
        gallery: Ticket,
        owner: Option<UserId>,
        result: ApiResult<Option<u32>>,
    },
    CommentAdded(ApiResult<Comment>),
    CommentDeleted(ApiResult<()>),
}

impl Wiring {
    pub(super) fn apply(&self, cx: &mut Cx<'_, Completion>, completion: Completion) {
        let c = self.cells;
        match completion {
            Completion::Session(result) => match result {
                Ok(user) => {
                    cx.set(c.is_authed, user.is_some());
                    cx.set(c.username, user.map(|u| u.username).unwrap_or_default());
                }
                Err(err) => {
                    report(&err);
                    cx.set(c.is_authed, false);
                    cx.set(c.username, String::new());
                    cx.set(c.auth_error, Some(SESSION_FAILED.to_string()));
                }
            },

            Completion::UserCount(result) => match result {
                Ok(count) => cx.set(c.user_count, count),
                Err(err) => {
                    report(&err);
                    cx.set(c.user_gallery_error, Some(USER_COUNT_FAILED.to_string()));
                }
            },

            Completion::Gallery { ticket, result } => {
                if !self.tickets.gallery.is_current(ticket) {
                    debug!("dropping stale gallery response");
                    return;
                }
                cx.set(c.user_gallery_loading, false);
                match result {
                    Ok(Some((owner, count))) => {
                        if cx.get(c.cur_user_gallery).as_ref() != Some(&owner) {
                            cx.set(c.image, None);
                        }
                        cx.set(c.cur_user_gallery, Some(owner));
                        cx.set(c.image_count, Some(count));
                        cx.set(c.image_offset, 0);
                    }
                    Ok(None) => {
                        cx.set(c.cur_user_gallery, None);
                        cx.set(c.image_count, None);
                        cx.set(c.image_offset, 0);
                        cx.set(c.image, None);
                    }
                    Err(err) => {
                        report(&err);
                        cx.set(c.user_gallery_error, Some(GALLERY_FAILED.to_string()));
                    }
                }
            }

            Completion::Image { ticket, result } => {
                if !self.tickets.image.is_current(ticket) {
                    debug!("dropping stale image response");
                    return;
                }
                cx.set(c.image_loading, false);
                let image = match result {
                    Ok(image) => image,
                    Err(err) => {
                        report(&err);
                        cx.set(c.image_error, Some(IMAGE_FAILED.to_string()));
                        None
                    }
                };
                cx.set(c.image, image);
                cx.set(c.comment_page, 0);
            }

            Completion::Comments {
                ticket,
                page,
                count,
            } => {
                if !self.tickets.comments.is_current(ticket) {
                    debug!("dropping stale comments response");
                    return;
                }
                cx.set(c.comments_loading, false);
                match page {
                    Ok(comments) => cx.set(c.comments, comments),
                    Err(err) => {
                        report(&err);
                        cx.set(c.comments, Vec::new());
                        cx.set(c.comment_error, Some(COMMENTS_FAILED.to_string()));
                    }
                }
                match count {
                    Ok(count) => cx.set(c.comment_count, count),
                    Err(err) => {
                        report(&err);
                        cx.set(c.comment_count, 0);
                        cx.set(c.comment_error, Some(COMMENT_COUNT_FAILED.to_string()));
                    }
                }
            }

            Completion::CommentPageProbe {
                image,
                page,
                result,
            } => match result {
                Ok(true) => {
                    let same_image = cx.get(c.image).as_ref().map(|i| i.id) == Some(image);
                    if same_image && *cx.get(c.comment_page) + 1 == page {
                        cx.set(c.comment_page, page);
                    }
                }
                Ok(false) => debug!(image, page, "no further comments"),
                Err(err) => {
                    report(&err);
                    cx.set(c.comment_error, Some(MORE_COMMENTS_FAILED.to_string()));
                }
            },

            Completion::Login(result) => self.signed_in(cx, result, false, LOGIN_FAILED),
            Completion::Signup(result) => self.signed_in(cx, result, true, SIGNUP_FAILED),

            Completion::Logout(result) => match result {
                Ok(()) => {
                    cx.set(c.auth_error, None);
                    cx.set(c.is_authed, false);
                    cx.set(c.username, String::new());
                    cx.set(c.image_form_open, false);
                }
                Err(err) => {
                    report(&err);
                    cx.set(c.auth_error, Some(LOGOUT_FAILED.to_string()));
                }
            },

            Completion::ImageDeleted { gallery, result } => {
                let current = self.tickets.gallery.is_current(gallery);
                match result {
                    Ok(image) if current => {
                        debug!(image = image.id, "image deleted");
                        let count = cx.get(c.image_count).unwrap_or(1).saturating_sub(1);
                        cx.set(c.image_count, Some(count));
                        if count == 0 {
                            cx.set(c.image, None);
                            cx.set(c.comments, Vec::new());
                            cx.set(c.comment_page, 0);
                            cx.set(c.image_loading, false);
                            cx.set(c.comments_loading, false);
                        } else {
                            let offset = (*cx.get(c.image_offset)).min(count - 1);
                            cx.set(c.image_offset, offset);
                        }
                    }
                    Ok(image) => {
                        // Gallery reloaded since; its count already excludes the image
                        debug!(image = image.id, "dropping stale delete response");
                    }
                    Err(err) => {
                        report(&err);
                        cx.set(c.image_error, Some(DELETE_IMAGE_FAILED.to_string()));
                        if current {
                            cx.set(c.image_loading, false);
                            cx.set(c.comments_loading, false);
                        }
                    }
                }
            }

            Completion::ImageAdded {
                gallery,
                owner,
                result,
            } => match result {
                Ok(Some(count)) if self.tickets.gallery.is_current(gallery) => {
                    let current = cx.get(c.cur_user_gallery).as_ref().map(|u| u.id);
                    if owner.is_some() && current == owner {
                        cx.set(c.image_count, Some(count));
                        cx.set(c.image_offset, 0);
                    }
                }
                Ok(_) => debug!("image added; count not applied"),
                Err(err) => {
                    report(&err);
                    cx.set(c.image_error, Some(ADD_IMAGE_FAILED.to_string()));
                }
            },

            Completion::CommentAdded(result) => {
                self.comments_changed(cx, result.map(|_| ()), ADD_COMMENT_FAILED)
            }
            Completion::CommentDeleted(result) => {
                self.comments_changed(cx, result, DELETE_COMMENT_FAILED)
            }
        }
    }

    fn signed_in(
        &self,
        cx: &mut Cx<'_, Completion>,
        result: ApiResult<User>,
        new_account: bool,
        failure: &str,
    ) {
        let c = self.cells;
        match result {
            Ok(user) => {
                cx.set(c.auth_error, None);
                cx.set(c.is_authed, true);
                cx.set(c.username, user.username);
                cx.set(c.user_offset, 0);
                if new_account {
                    let count = *cx.get(c.user_count) + 1;
                    cx.set(c.user_count, count);
                }
            }
            Err(err) => {
                report(&err);
                cx.set(c.auth_error, Some(failure.to_string()));
            }
        }
    }

    /// After a comment mutation the list restarts at its newest page.
    fn comments_changed(&self, cx: &mut Cx<'_, Completion>, result: ApiResult<()>, failure: &str) {
        let c = self.cells;
        match result {
            Ok(()) => {
                let revision = *cx.get(c.comments_revision) + 1;
                cx.set(c.comment_page, 0);
                cx.set(c.comments_revision, revision);
            }
            Err(err) => {
                report(&err);
                cx.set(c.comment_error, Some(failure.to_string()));
                cx.set(c.comments_loading, false);
            }
        }
    }
}

fn report(err: &ApiError) {
    warn!(operation = err.operation(), %err, "request failed");
}
