use iced::{Element, Task, Theme};
use rfd::FileDialog;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod config;
mod controller;
mod error;
mod media;
mod reactive;
mod state;
mod ui;

use api::LocalApi;
use config::Config;
use controller::{Completion, ControllerSettings, GalleryController};
use error::SchedulerError;
use reactive::FlushReport;
use state::data::CommentId;

/// Text the user has typed or picked but not yet submitted
#[derive(Debug, Default)]
pub struct Drafts {
    pub username: String,
    pub password: String,
    pub comment: String,
    pub image_title: String,
    pub image_file: Option<PathBuf>,
}

/// Main application state
struct PhotoGallery {
    controller: GalleryController,
    drafts: Drafts,
    /// Status line shown under the page
    status: String,
}

/// Application messages (events)
#[derive(Debug, Clone)]
pub enum Message {
    UsernameChanged(String),
    PasswordChanged(String),
    Login,
    Signup,
    Logout,

    PreviousUser,
    NextUser,
    PreviousImage,
    NextImage,
    DeleteImage,

    ToggleImageForm,
    ImageTitleChanged(String),
    PickImageFile,
    SubmitImage,

    CommentChanged(String),
    SubmitComment,
    DeleteComment(CommentId),
    PreviousComments,
    NextComments,

    /// A background request finished
    Resolved(Completion),
}

impl PhotoGallery {
    fn new(config: Config, api: LocalApi) -> (Self, Task<Message>) {
        let controller = GalleryController::new(Arc::new(api), ControllerSettings::from(&config));
        let mut app = PhotoGallery {
            controller,
            drafts: Drafts::default(),
            status: format!("Catalog: {}", config.catalog_path().display()),
        };

        let started = app.controller.start();
        app.settle(started);
        info!("photo gallery started");

        let tasks = app.drain();
        (app, tasks)
    }

    /// Handle application messages and update state
    fn update(&mut self, message: Message) -> Task<Message> {
        let flushed = match message {
            Message::UsernameChanged(value) => {
                self.drafts.username = value;
                return Task::none();
            }
            Message::PasswordChanged(value) => {
                self.drafts.password = value;
                return Task::none();
            }
            Message::ImageTitleChanged(value) => {
                self.drafts.image_title = value;
                return Task::none();
            }
            Message::CommentChanged(value) => {
                self.drafts.comment = value;
                return Task::none();
            }
            Message::PickImageFile => {
                self.drafts.image_file = FileDialog::new()
                    .set_title("Select an image to upload")
                    .add_filter("Images", &["png", "jpg", "jpeg", "gif", "webp", "bmp"])
                    .pick_file();
                return Task::none();
            }

            Message::Login => {
                let result = self.controller.login(&self.drafts.username, &self.drafts.password);
                self.drafts.password.clear();
                result
            }
            Message::Signup => {
                let result = self.controller.signup(&self.drafts.username, &self.drafts.password);
                self.drafts.password.clear();
                result
            }
            Message::Logout => self.controller.logout(),

            Message::PreviousUser => self.controller.previous_user(),
            Message::NextUser => self.controller.next_user(),
            Message::PreviousImage => self.controller.previous_image(),
            Message::NextImage => self.controller.next_image(),
            Message::DeleteImage => self.controller.delete_image(),

            Message::ToggleImageForm => self.controller.toggle_image_form(),
            Message::SubmitImage => {
                let file = self.drafts.image_file.take();
                let result = self.controller.add_image(&self.drafts.image_title, file);
                self.drafts.image_title.clear();
                result
            }

            Message::SubmitComment => {
                let result = self.controller.add_comment(&self.drafts.comment);
                self.drafts.comment.clear();
                result
            }
            Message::DeleteComment(id) => self.controller.delete_comment(id),
            Message::PreviousComments => self.controller.previous_comment_page(),
            Message::NextComments => self.controller.next_comment_page(),

            Message::Resolved(completion) => self.controller.resolve(completion),
        };

        self.settle(flushed);
        self.drain()
    }

    /// Build the user interface
    fn view(&self) -> Element<Message> {
        ui::gallery::page(self.controller.view(), &self.drafts, &self.status)
    }

    /// Set the application theme
    fn theme(&self) -> Theme {
        Theme::Dark
    }

    /// Surface a scheduler failure in the status line.
    fn settle(&mut self, flushed: Result<FlushReport, SchedulerError>) {
        if let Err(err) = flushed {
            error!(%err, "flush aborted");
            self.status = format!("Internal error: {}", err);
        }
    }

    /// Hand every job the controller spawned to iced's executor.
    fn drain(&mut self) -> Task<Message> {
        let tasks = self.controller.take_tasks();
        if tasks.is_empty() {
            return Task::none();
        }
        Task::batch(
            tasks
                .into_iter()
                .map(|job| Task::perform(job, Message::Resolved)),
        )
    }
}

fn main() -> iced::Result {
    let (config, load_error) = match Config::load() {
        Ok(config) => (config, None),
        Err(err) => (Config::default(), Some(err)),
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(err) = load_error {
        warn!(%err, "falling back to default settings");
    }

    // The app cannot function without its catalog
    let api = match LocalApi::open(config.catalog_path(), config.uploads_dir(), config.session_ttl_secs) {
        Ok(api) => api,
        Err(err) => {
            error!(%err, "failed to open the catalog; check permissions and disk space");
            std::process::exit(1);
        }
    };

    iced::application("Photo Gallery", PhotoGallery::update, PhotoGallery::view)
        .theme(PhotoGallery::theme)
        .centered()
        .run_with(move || PhotoGallery::new(config, api))
}
