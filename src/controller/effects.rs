//! Fetch effects
//!
//! Three effects keep the page consistent with its cursors, registered in
//! this order: owner gallery, image, comments. Each one issues a fresh
//! ticket before spawning so that a completion from a superseded request is
//! dropped on arrival.

use std::sync::Arc;

use tracing::debug;

use super::cells::GalleryCells;
use super::completion::Completion;
use super::tickets::Tickets;
use crate::api::{ApiResult, GalleryApi};
use crate::error::EffectError;
use crate::reactive::{Cx, Runtime};
use crate::state::data::User;

/// Everything an effect or completion needs besides the cells' values.
#[derive(Clone)]
pub(super) struct Wiring {
    pub cells: GalleryCells,
    pub api: Arc<dyn GalleryApi>,
    pub tickets: Tickets,
    pub comments_per_page: u32,
}

pub(super) fn register<S>(runtime: &mut Runtime<Completion, S>, wiring: &Wiring) {
    let cells = wiring.cells;

    let owner = wiring.clone();
    runtime.register_effect("user_gallery", &[cells.user_offset.id()], move |cx| {
        owner.load_gallery(cx)
    });

    let image = wiring.clone();
    runtime.register_effect(
        "image",
        &[
            cells.cur_user_gallery.id(),
            cells.image_offset.id(),
            cells.image_count.id(),
        ],
        move |cx| image.load_image(cx),
    );

    let comments = wiring.clone();
    runtime.register_effect(
        "comments",
        &[
            cells.image.id(),
            cells.comment_page.id(),
            cells.is_authed.id(),
            cells.comments_revision.id(),
        ],
        move |cx| comments.load_comments(cx),
    );
}

impl Wiring {
    /// Resolve the owner at `user_offset` and the size of their gallery.
    fn load_gallery(&self, cx: &mut Cx<'_, Completion>) -> Result<(), EffectError> {
        let c = self.cells;
        let offset = *cx.get(c.user_offset);

        cx.set(c.user_gallery_loading, true);
        cx.set(c.user_gallery_error, None);

        let ticket = self.tickets.gallery.issue();
        let api = Arc::clone(&self.api);
        debug!(offset, "fetching gallery owner");
        cx.spawn(async move {
            let result = fetch_gallery(api.as_ref(), offset).await;
            Completion::Gallery { ticket, result }
        });
        Ok(())
    }

    fn load_image(&self, cx: &mut Cx<'_, Completion>) -> Result<(), EffectError> {
        let c = self.cells;
        let owner = cx.get(c.cur_user_gallery).clone();
        let count = *cx.get(c.image_count);
        let offset = *cx.get(c.image_offset);

        let (owner, count) = match (owner, count) {
            (Some(owner), Some(count)) if count > 0 => (owner, count),
            (Some(owner), None) => {
                return Err(EffectError::new(format!(
                    "image count of {} is unknown",
                    owner.username
                )));
            }
            _ => {
                // Nothing to show; drop whatever may still be in flight.
                self.tickets.image.issue();
                cx.set(c.image, None);
                cx.set(c.image_loading, false);
                cx.set(c.comments_loading, false);
                return Ok(());
            }
        };

        if offset >= count {
            // Re-runs next pass with the clamped cursor.
            cx.set(c.image_offset, count - 1);
            return Ok(());
        }

        cx.set(c.image_loading, true);
        cx.set(c.image_error, None);

        let ticket = self.tickets.image.issue();
        let api = Arc::clone(&self.api);
        debug!(owner = %owner.username, offset, "fetching image");
        cx.spawn(async move {
            let result = api
                .list_user_images(owner.id, offset)
                .await
                .map(|page| page.into_iter().next());
            Completion::Image { ticket, result }
        });
        Ok(())
    }

    fn load_comments(&self, cx: &mut Cx<'_, Completion>) -> Result<(), EffectError> {
        let c = self.cells;
        let authed = *cx.get(c.is_authed);
        let image = cx.get(c.image).as_ref().map(|image| image.id);
        let image = match image {
            Some(id) if authed => id,
            _ => {
                self.tickets.comments.issue();
                cx.set(c.comments, Vec::new());
                cx.set(c.comment_count, 0);
                cx.set(c.comments_loading, false);
                return Ok(());
            }
        };
        let page = *cx.get(c.comment_page);
        let limit = self.comments_per_page;

        cx.set(c.comments_loading, true);
        cx.set(c.comment_error, None);

        let ticket = self.tickets.comments.issue();
        let api = Arc::clone(&self.api);
        debug!(image, page, "fetching comments");
        cx.spawn(async move {
            let (page, count) = futures::join!(
                api.list_comments(image, page, limit),
                api.count_comments(image)
            );
            Completion::Comments {
                ticket,
                page,
                count,
            }
        });
        Ok(())
    }
}

/// The owner at `offset` and their image count, or None past the end of the
/// user list.
async fn fetch_gallery(api: &dyn GalleryApi, offset: u32) -> ApiResult<Option<(User, u32)>> {
    let Some(user) = api.list_users(offset).await?.into_iter().next() else {
        return Ok(None);
    };
    let count = api.count_user_images(user.id).await?;
    Ok(Some((user, count)))
}
