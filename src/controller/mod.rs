//! Navigation controller for the gallery page
//!
//! Owns the reactive runtime, the cells of the page and the render sink.
//! Handlers translate user intent into cell writes and spawned requests;
//! effects keep the owner, image and comment sections in step with the
//! cursors; completions fed back by the host land through [`GalleryController::resolve`].
//! After every batch the runtime is flushed so the view model is current
//! when control returns to the host.

mod cells;
mod completion;
mod effects;
mod tickets;

#[cfg(test)]
mod tests;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::debug;

pub use cells::{GalleryCells, Section};
pub use completion::Completion;

use crate::api::GalleryApi;
use crate::config::Config;
use crate::error::SchedulerError;
use crate::reactive::{Cx, FlushReport, Runtime, State, Task};
use crate::state::data::CommentId;
use crate::ui::view_model::{self, ViewModel};
use completion::{COMMENT_REQUIRED, CREDENTIALS_REQUIRED, IMAGE_FIELDS_REQUIRED};
use effects::Wiring;
use tickets::Tickets;

/// Tunables the controller takes from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    pub comments_per_page: u32,
    pub max_passes: usize,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ControllerSettings {
    fn from(config: &Config) -> Self {
        Self {
            comments_per_page: config.comments_per_page.max(1),
            max_passes: config.max_passes,
        }
    }
}

pub struct GalleryController {
    runtime: Runtime<Completion, ViewModel>,
    view: ViewModel,
    wiring: Wiring,
    started: bool,
}

impl GalleryController {
    pub fn new(api: Arc<dyn GalleryApi>, settings: ControllerSettings) -> Self {
        let mut runtime = Runtime::new(settings.max_passes);
        let cells = GalleryCells::declare(&mut runtime);
        let wiring = Wiring {
            cells,
            api,
            tickets: Tickets::default(),
            comments_per_page: settings.comments_per_page.max(1),
        };

        effects::register(&mut runtime, &wiring);
        view_model::register(&mut runtime, cells, wiring.comments_per_page);

        Self {
            runtime,
            view: ViewModel::default(),
            wiring,
            started: false,
        }
    }

    /// Check the session, count the users and load the first gallery.
    /// Only the first call does anything.
    pub fn start(&mut self) -> Result<FlushReport, SchedulerError> {
        if self.started {
            return self.runtime.flush(&mut self.view);
        }
        self.started = true;

        self.dispatch(|w, cx| {
            cx.set(w.cells.user_gallery_loading, true);

            let api = Arc::clone(&w.api);
            cx.spawn(async move { Completion::Session(api.get_current_user().await) });

            let api = Arc::clone(&w.api);
            cx.spawn(async move { Completion::UserCount(api.count_users().await) });
        })
    }

    /// Apply the output of a job previously handed out by [`Self::take_tasks`].
    pub fn resolve(&mut self, completion: Completion) -> Result<FlushReport, SchedulerError> {
        debug!(?completion, "resolving");
        self.dispatch(|w, cx| w.apply(cx, completion))
    }

    pub fn next_user(&mut self) -> Result<FlushReport, SchedulerError> {
        self.dispatch(|w, cx| {
            let c = w.cells;
            if *cx.get(c.user_gallery_loading) {
                return;
            }
            let offset = *cx.get(c.user_offset);
            if offset + 1 < *cx.get(c.user_count) {
                cx.set(c.user_offset, offset + 1);
            }
        })
    }

    pub fn previous_user(&mut self) -> Result<FlushReport, SchedulerError> {
        self.dispatch(|w, cx| {
            let c = w.cells;
            if *cx.get(c.user_gallery_loading) {
                return;
            }
            let offset = *cx.get(c.user_offset);
            if offset > 0 {
                cx.set(c.user_offset, offset - 1);
            }
        })
    }

    pub fn next_image(&mut self) -> Result<FlushReport, SchedulerError> {
        self.dispatch(|w, cx| {
            let c = w.cells;
            if *cx.get(c.image_loading) {
                return;
            }
            let offset = *cx.get(c.image_offset);
            let count = cx.get(c.image_count).unwrap_or(0);
            if offset + 1 < count {
                cx.set(c.image_offset, offset + 1);
            }
        })
    }

    pub fn previous_image(&mut self) -> Result<FlushReport, SchedulerError> {
        self.dispatch(|w, cx| {
            let c = w.cells;
            if *cx.get(c.image_loading) {
                return;
            }
            let offset = *cx.get(c.image_offset);
            if offset > 0 {
                cx.set(c.image_offset, offset - 1);
            }
        })
    }

    /// Advance to the next comment page if it has any entries.
    pub fn next_comment_page(&mut self) -> Result<FlushReport, SchedulerError> {
        self.dispatch(|w, cx| {
            let c = w.cells;
            if !*cx.get(c.is_authed) || *cx.get(c.comments_loading) {
                return;
            }
            let Some(image) = cx.get(c.image).as_ref().map(|image| image.id) else {
                return;
            };
            let next = *cx.get(c.comment_page) + 1;
            let limit = w.comments_per_page;
            if u64::from(next) * u64::from(limit) >= u64::from(*cx.get(c.comment_count)) {
                return;
            }

            cx.set(c.comment_error, None);
            let api = Arc::clone(&w.api);
            cx.spawn(async move {
                let result = api
                    .list_comments(image, next, limit)
                    .await
                    .map(|page| !page.is_empty());
                Completion::CommentPageProbe {
                    image,
                    page: next,
                    result,
                }
            });
        })
    }

    pub fn previous_comment_page(&mut self) -> Result<FlushReport, SchedulerError> {
        self.dispatch(|w, cx| {
            let c = w.cells;
            if *cx.get(c.comments_loading) {
                return;
            }
            let page = *cx.get(c.comment_page);
            if page > 0 {
                cx.set(c.comment_page, page - 1);
            }
        })
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<FlushReport, SchedulerError> {
        self.authenticate(username, password, false)
    }

    pub fn signup(&mut self, username: &str, password: &str) -> Result<FlushReport, SchedulerError> {
        self.authenticate(username, password, true)
    }

    fn authenticate(
        &mut self,
        username: &str,
        password: &str,
        new_account: bool,
    ) -> Result<FlushReport, SchedulerError> {
        let username = username.trim().to_string();
        let password = password.trim().to_string();
        self.dispatch(move |w, cx| {
            if username.is_empty() || password.is_empty() {
                cx.set(w.cells.auth_error, Some(CREDENTIALS_REQUIRED.to_string()));
                return;
            }
            cx.set(w.cells.auth_error, None);

            let api = Arc::clone(&w.api);
            cx.spawn(async move {
                if new_account {
                    Completion::Signup(api.signup(username, password).await)
                } else {
                    Completion::Login(api.login(username, password).await)
                }
            });
        })
    }

    pub fn logout(&mut self) -> Result<FlushReport, SchedulerError> {
        self.dispatch(|w, cx| {
            if !*cx.get(w.cells.is_authed) {
                return;
            }
            let api = Arc::clone(&w.api);
            cx.spawn(async move { Completion::Logout(api.logout().await) });
        })
    }

    /// Delete the image on screen. Ignored while a fetch is in flight.
    pub fn delete_image(&mut self) -> Result<FlushReport, SchedulerError> {
        self.dispatch(|w, cx| {
            let c = w.cells;
            if *cx.get(c.image_loading) {
                return;
            }
            let Some(image) = cx.get(c.image).as_ref().map(|image| image.id) else {
                return;
            };

            cx.set(c.image_loading, true);
            cx.set(c.comments_loading, true);
            cx.set(c.image_error, None);

            let gallery = w.tickets.gallery.current();
            let api = Arc::clone(&w.api);
            cx.spawn(async move {
                let result = api.delete_image(image).await;
                Completion::ImageDeleted { gallery, result }
            });
        })
    }

    pub fn toggle_image_form(&mut self) -> Result<FlushReport, SchedulerError> {
        self.dispatch(|w, cx| {
            let open = *cx.get(w.cells.image_form_open);
            cx.set(w.cells.image_form_open, !open);
        })
    }

    /// Upload `file` under `title` into the signed-in user's gallery.
    pub fn add_image(&mut self, title: &str, file: Option<PathBuf>) -> Result<FlushReport, SchedulerError> {
        let title = title.trim().to_string();
        self.dispatch(move |w, cx| {
            let c = w.cells;
            let file = match file {
                Some(file) if !title.is_empty() => file,
                _ => {
                    cx.set(c.image_error, Some(IMAGE_FIELDS_REQUIRED.to_string()));
                    return;
                }
            };

            cx.set(c.image_form_open, false);
            cx.set(c.image_error, None);

            let owner = cx.get(c.cur_user_gallery).as_ref().map(|user| user.id);
            let gallery = w.tickets.gallery.current();
            let api = Arc::clone(&w.api);
            cx.spawn(async move {
                let result = async {
                    api.add_image(title, file).await?;
                    match owner {
                        Some(owner) => api.count_user_images(owner).await.map(Some),
                        None => Ok(None),
                    }
                }
                .await;
                Completion::ImageAdded {
                    gallery,
                    owner,
                    result,
                }
            });
        })
    }

    /// Post a comment on the image on screen.
    pub fn add_comment(&mut self, content: &str) -> Result<FlushReport, SchedulerError> {
        let content = content.trim().to_string();
        self.dispatch(move |w, cx| {
            let c = w.cells;
            let Some(image) = cx.get(c.image).as_ref().map(|image| image.id) else {
                return;
            };
            if content.is_empty() {
                cx.set(c.comment_error, Some(COMMENT_REQUIRED.to_string()));
                return;
            }

            cx.set(c.comments_loading, true);
            cx.set(c.comment_error, None);

            let api = Arc::clone(&w.api);
            cx.spawn(async move { Completion::CommentAdded(api.add_comment(image, content).await) });
        })
    }

    pub fn delete_comment(&mut self, comment: CommentId) -> Result<FlushReport, SchedulerError> {
        self.dispatch(move |w, cx| {
            let c = w.cells;
            let Some(image) = cx.get(c.image).as_ref().map(|image| image.id) else {
                return;
            };

            cx.set(c.comments_loading, true);
            cx.set(c.comment_error, None);

            let api = Arc::clone(&w.api);
            cx.spawn(async move {
                Completion::CommentDeleted(api.delete_comment(image, comment).await)
            });
        })
    }

    /// Jobs spawned since the last call, for the host to run.
    pub fn take_tasks(&mut self) -> Vec<Task<Completion>> {
        self.runtime.take_tasks()
    }

    /// Re-run every view against the current cells.
    pub fn rerender(&mut self) {
        self.runtime.rerender(&mut self.view);
    }

    pub fn view(&self) -> &ViewModel {
        &self.view
    }

    pub fn cells(&self) -> GalleryCells {
        self.wiring.cells
    }

    pub fn get<T: 'static>(&self, state: State<T>) -> &T {
        self.runtime.get(state)
    }

    fn dispatch(
        &mut self,
        f: impl FnOnce(&Wiring, &mut Cx<'_, Completion>),
    ) -> Result<FlushReport, SchedulerError> {
        let wiring = &self.wiring;
        self.runtime.update(|cx| f(wiring, cx));
        self.runtime.flush(&mut self.view)
    }
}
