use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use super::*;
use crate::api::{ApiError, ApiResult};
use crate::state::data::{Comment, Image, ImageFile, ImageId, User, UserId};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Call {
    ListUsers(u32),
    CountUsers,
    GetImage(ImageId),
    ListUserImages(UserId, u32),
    CountUserImages(UserId),
    DeleteImage(ImageId),
    AddImage(String),
    ListComments(ImageId, u32),
    CountComments(ImageId),
    AddComment(ImageId),
    DeleteComment(CommentId),
    CurrentUser,
    Login(String),
    Signup(String),
    Logout,
}

/// Catalog contents. Images and comments are kept newest first.
#[derive(Default)]
struct World {
    users: Vec<User>,
    images: Vec<Image>,
    comments: Vec<Comment>,
    session: Option<User>,
    failing: Vec<&'static str>,
    next_id: i64,
}

/// In-memory gallery that records every call it receives.
#[derive(Default)]
struct FakeApi {
    world: Mutex<World>,
    calls: Mutex<Vec<Call>>,
}

fn timestamp(offset: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000 + offset, 0).unwrap()
}

fn user(id: UserId, username: &str) -> User {
    User {
        id,
        username: username.to_string(),
    }
}

fn image(id: ImageId, title: &str, author: &User) -> Image {
    Image {
        id,
        title: title.to_string(),
        author: author.clone(),
        file: ImageFile {
            path: format!("/uploads/{}.png", id),
            mimetype: "image/png".to_string(),
            width: 640,
            height: 480,
            size: 2048,
            original_name: format!("{}.png", title),
            preview_path: None,
        },
        created_at: timestamp(id),
    }
}

fn comment(id: CommentId, image_id: ImageId, author: &User, content: &str) -> Comment {
    Comment {
        id,
        image_id,
        author: author.clone(),
        content: content.to_string(),
        created_at: timestamp(id),
    }
}

impl FakeApi {
    fn empty() -> Arc<Self> {
        Arc::new(Self {
            world: Mutex::new(World {
                next_id: 1000,
                ..World::default()
            }),
            calls: Mutex::default(),
        })
    }

    /// alice owns three images, bob one, carol none. alice's newest image
    /// carries three comments.
    fn seeded() -> Arc<Self> {
        let alice = user(1, "alice");
        let bob = user(2, "bob");
        let carol = user(3, "carol");

        let images = vec![
            image(11, "harbor", &alice),
            image(12, "forest", &alice),
            image(13, "dunes", &alice),
            image(21, "skyline", &bob),
        ];
        let comments = vec![
            comment(103, 11, &alice, "thanks!"),
            comment(102, 11, &bob, "love the light"),
            comment(101, 11, &bob, "where is this?"),
        ];

        Arc::new(Self {
            world: Mutex::new(World {
                users: vec![alice, bob, carol],
                images,
                comments,
                next_id: 1000,
                ..World::default()
            }),
            calls: Mutex::default(),
        })
    }

    fn fail(&self, operation: &'static str) {
        self.world.lock().failing.push(operation);
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|call| predicate(call)).count()
    }

    fn record(&self, operation: &'static str, call: Call) -> ApiResult<()> {
        self.calls.lock().push(call);
        if self.world.lock().failing.contains(&operation) {
            return Err(ApiError::new(operation, "injected failure"));
        }
        Ok(())
    }

    fn signed_in(&self, operation: &'static str) -> ApiResult<User> {
        self.world
            .lock()
            .session
            .clone()
            .ok_or_else(|| ApiError::new(operation, "not signed in"))
    }
}

#[async_trait]
impl GalleryApi for FakeApi {
    async fn list_users(&self, offset: u32) -> ApiResult<Vec<User>> {
        self.record("list_users", Call::ListUsers(offset))?;
        let world = self.world.lock();
        Ok(world.users.iter().skip(offset as usize).take(1).cloned().collect())
    }

    async fn count_users(&self) -> ApiResult<u32> {
        self.record("count_users", Call::CountUsers)?;
        Ok(self.world.lock().users.len() as u32)
    }

    async fn get_image(&self, id: ImageId) -> ApiResult<Image> {
        self.record("get_image", Call::GetImage(id))?;
        let world = self.world.lock();
        world
            .images
            .iter()
            .find(|image| image.id == id)
            .cloned()
            .ok_or_else(|| ApiError::new("get_image", "missing"))
    }

    async fn list_user_images(&self, user_id: UserId, offset: u32) -> ApiResult<Vec<Image>> {
        self.record("list_user_images", Call::ListUserImages(user_id, offset))?;
        let world = self.world.lock();
        Ok(world
            .images
            .iter()
            .filter(|image| image.author.id == user_id)
            .skip(offset as usize)
            .take(1)
            .cloned()
            .collect())
    }

    async fn count_user_images(&self, user_id: UserId) -> ApiResult<u32> {
        self.record("count_user_images", Call::CountUserImages(user_id))?;
        let world = self.world.lock();
        Ok(world.images.iter().filter(|image| image.author.id == user_id).count() as u32)
    }

    async fn delete_image(&self, id: ImageId) -> ApiResult<Image> {
        self.record("delete_image", Call::DeleteImage(id))?;
        let me = self.signed_in("delete_image")?;
        let mut world = self.world.lock();
        let index = world
            .images
            .iter()
            .position(|image| image.id == id && image.author.id == me.id)
            .ok_or_else(|| ApiError::new("delete_image", "not yours"))?;
        world.comments.retain(|comment| comment.image_id != id);
        Ok(world.images.remove(index))
    }

    async fn add_image(&self, title: String, _file: PathBuf) -> ApiResult<Image> {
        self.record("add_image", Call::AddImage(title.clone()))?;
        let me = self.signed_in("add_image")?;
        let mut world = self.world.lock();
        world.next_id += 1;
        let added = image(world.next_id, &title, &me);
        world.images.insert(0, added.clone());
        Ok(added)
    }

    async fn list_comments(&self, image_id: ImageId, page: u32, limit: u32) -> ApiResult<Vec<Comment>> {
        self.record("list_comments", Call::ListComments(image_id, page))?;
        let world = self.world.lock();
        Ok(world
            .comments
            .iter()
            .filter(|comment| comment.image_id == image_id)
            .skip((page * limit) as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn count_comments(&self, image_id: ImageId) -> ApiResult<u32> {
        self.record("count_comments", Call::CountComments(image_id))?;
        let world = self.world.lock();
        Ok(world.comments.iter().filter(|comment| comment.image_id == image_id).count() as u32)
    }

    async fn add_comment(&self, image_id: ImageId, content: String) -> ApiResult<Comment> {
        self.record("add_comment", Call::AddComment(image_id))?;
        let me = self.signed_in("add_comment")?;
        let mut world = self.world.lock();
        world.next_id += 1;
        let added = comment(world.next_id, image_id, &me, &content);
        world.comments.insert(0, added.clone());
        Ok(added)
    }

    async fn delete_comment(&self, _image_id: ImageId, comment_id: CommentId) -> ApiResult<()> {
        self.record("delete_comment", Call::DeleteComment(comment_id))?;
        let me = self.signed_in("delete_comment")?;
        let mut world = self.world.lock();
        let before = world.comments.len();
        world
            .comments
            .retain(|comment| !(comment.id == comment_id && comment.author.id == me.id));
        if world.comments.len() == before {
            return Err(ApiError::new("delete_comment", "not yours"));
        }
        Ok(())
    }

    async fn get_current_user(&self) -> ApiResult<Option<User>> {
        self.record("get_current_user", Call::CurrentUser)?;
        Ok(self.world.lock().session.clone())
    }

    async fn login(&self, username: String, _password: String) -> ApiResult<User> {
        self.record("login", Call::Login(username.clone()))?;
        let mut world = self.world.lock();
        let found = world
            .users
            .iter()
            .find(|user| user.username == username)
            .cloned()
            .ok_or_else(|| ApiError::new("login", "unknown user"))?;
        world.session = Some(found.clone());
        Ok(found)
    }

    async fn signup(&self, username: String, _password: String) -> ApiResult<User> {
        self.record("signup", Call::Signup(username.clone()))?;
        let mut world = self.world.lock();
        if world.users.iter().any(|user| user.username == username) {
            return Err(ApiError::new("signup", "taken"));
        }
        let created = user(world.users.len() as i64 + 1, &username);
        world.users.push(created.clone());
        world.session = Some(created.clone());
        Ok(created)
    }

    async fn logout(&self) -> ApiResult<()> {
        self.record("logout", Call::Logout)?;
        self.world.lock().session = None;
        Ok(())
    }
}

fn controller(api: &Arc<FakeApi>, comments_per_page: u32) -> GalleryController {
    let api: Arc<dyn GalleryApi> = api.clone();
    GalleryController::new(
        api,
        ControllerSettings {
            comments_per_page,
            max_passes: 64,
        },
    )
}

/// Run spawned jobs and feed their results back until nothing is pending.
async fn settle(controller: &mut GalleryController) {
    for _ in 0..64 {
        let tasks = controller.take_tasks();
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            let completion = task.await;
            controller.resolve(completion).unwrap();
        }
    }
    panic!("controller kept spawning jobs");
}

async fn started(api: &Arc<FakeApi>, comments_per_page: u32) -> GalleryController {
    let mut controller = controller(api, comments_per_page);
    controller.start().unwrap();
    settle(&mut controller).await;
    controller
}

async fn signed_in_as(api: &Arc<FakeApi>, username: &str, comments_per_page: u32) -> GalleryController {
    let mut controller = started(api, comments_per_page).await;
    controller.login(username, "secret").unwrap();
    settle(&mut controller).await;
    controller
}

fn owner_name(controller: &GalleryController) -> Option<String> {
    let cells = controller.cells();
    controller
        .get(cells.cur_user_gallery)
        .as_ref()
        .map(|user| user.username.clone())
}

fn image_id(controller: &GalleryController) -> Option<ImageId> {
    let cells = controller.cells();
    controller.get(cells.image).as_ref().map(|image| image.id)
}

/// Run `tasks` and feed their results back, leaving newly spawned jobs queued.
async fn resolve_all(controller: &mut GalleryController, tasks: Vec<Task<Completion>>) {
    for task in tasks {
        let completion = task.await;
        controller.resolve(completion).unwrap();
    }
}

fn is_comment_fetch(call: &Call) -> bool {
    matches!(call, Call::ListComments(..) | Call::CountComments(_))
}

#[tokio::test]
async fn test_start_shows_first_gallery() {
    let api = FakeApi::seeded();
    let controller = started(&api, 10).await;
    let cells = controller.cells();

    assert_eq!(owner_name(&controller).as_deref(), Some("alice"));
    assert_eq!(*controller.get(cells.user_count), 3);
    assert_eq!(*controller.get(cells.image_count), Some(3));
    assert_eq!(image_id(&controller), Some(11));
    assert!(!*controller.get(cells.image_loading));
    assert!(!*controller.get(cells.user_gallery_loading));

    let view = controller.view();
    assert!(view.auth.form_visible);
    assert_eq!(view.gallery.title, "@alice's Gallery");
    assert!(view.gallery.buttons_visible);
    assert!(!view.gallery.previous_enabled);
    assert!(view.gallery.next_enabled);
    assert_eq!(view.image.counter.as_deref(), Some("Gallery Image: 1/3"));
    let card = view.image.card.as_ref().unwrap();
    assert_eq!(card.title, "harbor");
    assert!(!card.delete_visible);
    assert!(!view.image.add_toggle_visible);
    assert!(!view.comments.visible);
}

#[tokio::test]
async fn test_start_runs_once() {
    let api = FakeApi::seeded();
    let mut controller = started(&api, 10).await;
    api.clear_calls();

    controller.start().unwrap();
    settle(&mut controller).await;
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_empty_catalog_shows_no_users() {
    let api = FakeApi::empty();
    let controller = started(&api, 10).await;
    let cells = controller.cells();

    assert_eq!(*controller.get(cells.user_count), 0);
    assert_eq!(owner_name(&controller), None);
    assert_eq!(*controller.get(cells.image_count), None);
    assert_eq!(*controller.get(cells.user_gallery_error), None);

    let view = controller.view();
    assert!(view.gallery.visible);
    assert_eq!(view.gallery.title, "No users found.");
    assert!(!view.gallery.buttons_visible);
    assert_eq!(view.image.counter, None);
    assert!(view.image.card.is_none());
}

#[tokio::test]
async fn test_user_change_resets_image_offset_and_refetches_count() {
    let api = FakeApi::seeded();
    let mut controller = started(&api, 10).await;
    let cells = controller.cells();

    controller.next_image().unwrap();
    settle(&mut controller).await;
    controller.next_image().unwrap();
    settle(&mut controller).await;
    assert_eq!(*controller.get(cells.image_offset), 2);
    assert_eq!(image_id(&controller), Some(13));

    api.clear_calls();
    controller.next_user().unwrap();
    settle(&mut controller).await;

    assert_eq!(owner_name(&controller).as_deref(), Some("bob"));
    assert_eq!(*controller.get(cells.image_offset), 0);
    assert_eq!(*controller.get(cells.comment_page), 0);
    assert_eq!(api.count(|call| *call == Call::CountUserImages(2)), 1);
    assert_eq!(image_id(&controller), Some(21));
    assert_eq!(controller.view().gallery.title, "@bob's Gallery");
}

#[tokio::test]
async fn test_navigation_stays_in_bounds() {
    let api = FakeApi::seeded();
    let mut controller = started(&api, 10).await;
    let cells = controller.cells();

    controller.previous_user().unwrap();
    controller.previous_image().unwrap();
    assert!(controller.take_tasks().is_empty());
    assert_eq!(*controller.get(cells.user_offset), 0);
    assert_eq!(*controller.get(cells.image_offset), 0);

    controller.next_user().unwrap();
    settle(&mut controller).await;
    controller.next_user().unwrap();
    settle(&mut controller).await;
    controller.next_user().unwrap();
    assert!(controller.take_tasks().is_empty());
    assert_eq!(*controller.get(cells.user_offset), 2);

    // carol has no images
    assert_eq!(*controller.get(cells.image_count), Some(0));
    assert_eq!(controller.view().image.counter.as_deref(), Some("No images yet."));
    controller.next_image().unwrap();
    assert_eq!(*controller.get(cells.image_offset), 0);
}

#[tokio::test]
async fn test_image_navigation_is_ignored_while_loading() {
    let api = FakeApi::seeded();
    let mut controller = started(&api, 10).await;
    let cells = controller.cells();

    controller.next_image().unwrap();
    assert!(*controller.get(cells.image_loading));
    controller.next_image().unwrap();
    settle(&mut controller).await;

    assert_eq!(*controller.get(cells.image_offset), 1);
    assert_eq!(image_id(&controller), Some(12));
}

#[tokio::test]
async fn test_no_comment_fetch_without_session() {
    let api = FakeApi::seeded();
    let mut controller = started(&api, 10).await;

    controller.next_image().unwrap();
    settle(&mut controller).await;
    controller.next_user().unwrap();
    settle(&mut controller).await;
    controller.previous_user().unwrap();
    settle(&mut controller).await;
    controller.next_comment_page().unwrap();
    settle(&mut controller).await;

    assert_eq!(api.count(is_comment_fetch), 0);
    assert!(controller.get(controller.cells().comments).is_empty());
}

#[tokio::test]
async fn test_login_loads_comments() {
    let api = FakeApi::seeded();
    let controller = signed_in_as(&api, "bob", 10).await;
    let cells = controller.cells();

    assert!(*controller.get(cells.is_authed));
    assert_eq!(controller.get(cells.username), "bob");
    assert_eq!(controller.get(cells.comments).len(), 3);
    assert_eq!(*controller.get(cells.comment_count), 3);
    assert!(api.calls().contains(&Call::ListComments(11, 0)));

    let view = controller.view();
    assert_eq!(view.auth.current_user, "Current User: bob");
    assert!(view.auth.logout_visible);
    assert!(view.comments.visible);
    assert_eq!(view.comments.total, "Total Comments: 3");
    let deletable: Vec<CommentId> = view
        .comments
        .rows
        .iter()
        .filter(|row| row.delete_visible)
        .map(|row| row.id)
        .collect();
    assert_eq!(deletable, vec![102, 101]);
}

#[tokio::test]
async fn test_login_requires_credentials() {
    let api = FakeApi::seeded();
    let mut controller = started(&api, 10).await;
    api.clear_calls();

    controller.login("   ", "secret").unwrap();
    assert!(controller.take_tasks().is_empty());
    assert_eq!(
        controller.get(controller.cells().auth_error).as_deref(),
        Some("Username and password are required.")
    );
    assert_eq!(
        controller.view().auth.error.as_deref(),
        Some("Username and password are required.")
    );
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_failed_login_sets_auth_error_only() {
    let api = FakeApi::seeded();
    let mut controller = started(&api, 10).await;
    let cells = controller.cells();

    controller.login("mallory", "secret").unwrap();
    settle(&mut controller).await;

    assert!(!*controller.get(cells.is_authed));
    assert_eq!(
        controller.get(cells.error(Section::Auth)).as_deref(),
        Some("Login failed. Please try again.")
    );
    for section in [Section::UserGallery, Section::Image, Section::Comment] {
        assert_eq!(*controller.get(cells.error(section)), None);
    }
}

#[tokio::test]
async fn test_signup_counts_new_user_and_returns_to_first_gallery() {
    let api = FakeApi::seeded();
    let mut controller = started(&api, 10).await;
    let cells = controller.cells();

    controller.next_user().unwrap();
    settle(&mut controller).await;
    assert_eq!(*controller.get(cells.user_offset), 1);

    controller.signup("dave", "secret").unwrap();
    settle(&mut controller).await;

    assert_eq!(*controller.get(cells.user_offset), 0);
    assert_eq!(*controller.get(cells.user_count), 4);
    assert_eq!(owner_name(&controller).as_deref(), Some("alice"));
    assert_eq!(controller.view().auth.current_user, "Current User: dave");
}

#[tokio::test]
async fn test_comment_page_resets_when_image_changes() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "alice", 2).await;
    let cells = controller.cells();

    controller.next_comment_page().unwrap();
    settle(&mut controller).await;
    assert_eq!(*controller.get(cells.comment_page), 1);
    assert_eq!(controller.get(cells.comments).len(), 1);

    api.clear_calls();
    controller.next_image().unwrap();
    settle(&mut controller).await;

    assert_eq!(image_id(&controller), Some(12));
    assert_eq!(*controller.get(cells.comment_page), 0);
    assert!(api.calls().contains(&Call::ListComments(12, 0)));
    assert!(controller.view().comments.empty_notice);
}

#[tokio::test]
async fn test_comment_paging_respects_bounds() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "alice", 2).await;
    let cells = controller.cells();
    assert!(controller.view().comments.next_enabled);

    controller.next_comment_page().unwrap();
    settle(&mut controller).await;
    assert_eq!(*controller.get(cells.comment_page), 1);
    assert!(!controller.view().comments.next_enabled);
    assert!(controller.view().comments.previous_enabled);

    api.clear_calls();
    controller.next_comment_page().unwrap();
    assert!(controller.take_tasks().is_empty());
    assert_eq!(*controller.get(cells.comment_page), 1);

    controller.previous_comment_page().unwrap();
    settle(&mut controller).await;
    assert_eq!(*controller.get(cells.comment_page), 0);
    assert!(api.calls().contains(&Call::ListComments(11, 0)));
}

#[tokio::test]
async fn test_empty_probe_does_not_advance() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "alice", 2).await;
    let cells = controller.cells();

    controller
        .resolve(Completion::CommentPageProbe {
            image: 11,
            page: 1,
            result: Ok(false),
        })
        .unwrap();
    assert_eq!(*controller.get(cells.comment_page), 0);

    // a probe for an image no longer on screen is ignored as well
    controller
        .resolve(Completion::CommentPageProbe {
            image: 12,
            page: 1,
            result: Ok(true),
        })
        .unwrap();
    assert_eq!(*controller.get(cells.comment_page), 0);
}

#[tokio::test]
async fn test_delete_only_image_collapses_panel() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "bob", 10).await;
    let cells = controller.cells();

    controller.next_user().unwrap();
    settle(&mut controller).await;
    assert_eq!(image_id(&controller), Some(21));
    assert!(controller.view().image.card.as_ref().unwrap().delete_visible);

    controller.delete_image().unwrap();
    settle(&mut controller).await;

    assert_eq!(image_id(&controller), None);
    assert!(controller.get(cells.comments).is_empty());
    assert_eq!(*controller.get(cells.image_count), Some(0));
    assert_eq!(*controller.get(cells.user_offset), 1);
    assert!(!*controller.get(cells.image_loading));

    let view = controller.view();
    assert!(view.image.card.is_none());
    assert_eq!(view.image.counter.as_deref(), Some("No images yet."));
    assert!(!view.comments.visible);
}

#[tokio::test]
async fn test_delete_last_of_three_steps_back_once() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "alice", 10).await;
    let cells = controller.cells();

    controller.next_image().unwrap();
    settle(&mut controller).await;
    controller.next_image().unwrap();
    settle(&mut controller).await;
    assert_eq!(image_id(&controller), Some(13));

    api.clear_calls();
    controller.delete_image().unwrap();
    settle(&mut controller).await;

    assert_eq!(*controller.get(cells.image_count), Some(2));
    assert_eq!(*controller.get(cells.image_offset), 1);
    assert_eq!(image_id(&controller), Some(12));
    assert_eq!(api.count(|call| matches!(call, Call::ListUserImages(..))), 1);
    assert_eq!(controller.view().image.counter.as_deref(), Some("Gallery Image: 2/2"));
}

#[tokio::test]
async fn test_delete_first_image_refetches_in_place() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "alice", 10).await;
    let cells = controller.cells();

    api.clear_calls();
    controller.delete_image().unwrap();
    settle(&mut controller).await;

    assert_eq!(*controller.get(cells.image_offset), 0);
    assert_eq!(*controller.get(cells.image_count), Some(2));
    assert_eq!(image_id(&controller), Some(12));
    assert_eq!(api.count(|call| *call == Call::ListUserImages(1, 0)), 1);
}

#[tokio::test]
async fn test_failed_delete_reports_image_error() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "alice", 10).await;
    let cells = controller.cells();
    api.fail("delete_image");

    controller.delete_image().unwrap();
    settle(&mut controller).await;

    assert_eq!(
        controller.get(cells.image_error).as_deref(),
        Some("Failed to delete image. Please try again.")
    );
    assert_eq!(image_id(&controller), Some(11));
    assert!(!*controller.get(cells.image_loading));
    assert!(!*controller.get(cells.comments_loading));
}

#[tokio::test]
async fn test_add_comment_on_later_page_returns_to_first() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "alice", 2).await;
    let cells = controller.cells();

    controller.next_comment_page().unwrap();
    settle(&mut controller).await;
    assert_eq!(*controller.get(cells.comment_page), 1);

    api.clear_calls();
    controller.add_comment("  golden hour  ").unwrap();
    settle(&mut controller).await;

    assert_eq!(*controller.get(cells.comment_page), 0);
    assert!(api.calls().contains(&Call::ListComments(11, 0)));
    assert_eq!(controller.get(cells.comments)[0].content, "golden hour");
    assert_eq!(*controller.get(cells.comment_count), 4);
}

#[tokio::test]
async fn test_delete_comment_refetches_first_page() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "bob", 10).await;
    let cells = controller.cells();

    api.clear_calls();
    controller.delete_comment(102).unwrap();
    settle(&mut controller).await;

    assert_eq!(api.count(|call| *call == Call::ListComments(11, 0)), 1);
    assert_eq!(*controller.get(cells.comment_count), 2);
    assert!(controller.get(cells.comments).iter().all(|comment| comment.id != 102));
}

#[tokio::test]
async fn test_empty_comment_is_rejected() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "bob", 10).await;

    controller.add_comment("   ").unwrap();
    assert!(controller.take_tasks().is_empty());
    assert_eq!(
        controller.view().comments.error.as_deref(),
        Some("Comment cannot be empty.")
    );
}

#[tokio::test]
async fn test_logout_keeps_image_and_hides_comments() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "alice", 10).await;
    let cells = controller.cells();

    controller.next_image().unwrap();
    settle(&mut controller).await;
    assert_eq!(controller.get(cells.comments).len(), 0);

    controller.previous_image().unwrap();
    settle(&mut controller).await;
    assert_eq!(controller.get(cells.comments).len(), 3);

    controller.logout().unwrap();
    settle(&mut controller).await;

    assert!(!*controller.get(cells.is_authed));
    assert_eq!(image_id(&controller), Some(11));
    assert_eq!(*controller.get(cells.image_offset), 0);
    assert!(controller.get(cells.comments).is_empty());

    let view = controller.view();
    assert!(view.auth.form_visible);
    assert!(!view.comments.visible);
    assert!(view.image.card.is_some());
}

#[tokio::test]
async fn test_stale_gallery_response_is_dropped() {
    let api = FakeApi::seeded();
    let mut controller = started(&api, 10).await;
    let cells = controller.cells();

    controller.next_user().unwrap();
    let first = controller.take_tasks();
    assert_eq!(first.len(), 1);

    // Signing in returns to the first gallery while bob's is still loading
    controller.login("carol", "secret").unwrap();
    let login = controller.take_tasks();
    resolve_all(&mut controller, login).await;
    let second = controller.take_tasks();
    resolve_all(&mut controller, second).await;
    resolve_all(&mut controller, first).await;
    settle(&mut controller).await;

    assert_eq!(*controller.get(cells.user_offset), 0);
    assert_eq!(owner_name(&controller).as_deref(), Some("alice"));
    assert_eq!(image_id(&controller), Some(11));
    assert_eq!(controller.view().gallery.title, "@alice's Gallery");
    assert!(!*controller.get(cells.user_gallery_loading));
}

#[tokio::test]
async fn test_user_navigation_is_ignored_while_gallery_loads() {
    let api = FakeApi::seeded();
    let mut controller = started(&api, 10).await;
    let cells = controller.cells();

    api.clear_calls();
    controller.next_user().unwrap();
    assert!(*controller.get(cells.user_gallery_loading));
    controller.next_user().unwrap();
    controller.previous_user().unwrap();
    assert_eq!(*controller.get(cells.user_offset), 1);
    settle(&mut controller).await;

    assert_eq!(api.count(|call| matches!(call, Call::ListUsers(_))), 1);
    assert_eq!(owner_name(&controller).as_deref(), Some("bob"));
}

#[tokio::test]
async fn test_stale_image_response_is_dropped() {
    let api = FakeApi::seeded();
    let mut controller = started(&api, 10).await;
    let cells = controller.cells();

    controller.next_image().unwrap();
    let old = controller.take_tasks();
    assert_eq!(old.len(), 1);

    controller.next_user().unwrap();
    settle(&mut controller).await;
    assert_eq!(image_id(&controller), Some(21));

    resolve_all(&mut controller, old).await;

    assert_eq!(image_id(&controller), Some(21));
    assert_eq!(*controller.get(cells.image_offset), 0);
    assert!(!*controller.get(cells.image_loading));
    assert_eq!(controller.view().image.counter.as_deref(), Some("Gallery Image: 1/1"));
}

/// Leaves a fetch of alice's second comment page in flight.
async fn with_second_comment_page_pending(api: &Arc<FakeApi>) -> (GalleryController, Vec<Task<Completion>>) {
    let mut controller = signed_in_as(api, "alice", 2).await;
    controller.next_comment_page().unwrap();
    let lookahead = controller.take_tasks();
    resolve_all(&mut controller, lookahead).await;
    assert_eq!(*controller.get(controller.cells().comment_page), 1);

    let pending = controller.take_tasks();
    assert_eq!(pending.len(), 1);
    (controller, pending)
}

#[tokio::test]
async fn test_comments_arriving_after_logout_are_dropped() {
    let api = FakeApi::seeded();
    let (mut controller, pending) = with_second_comment_page_pending(&api).await;
    let cells = controller.cells();

    controller.logout().unwrap();
    settle(&mut controller).await;
    resolve_all(&mut controller, pending).await;

    assert!(!*controller.get(cells.is_authed));
    assert!(controller.get(cells.comments).is_empty());
    assert!(!*controller.get(cells.comments_loading));
    assert!(!controller.view().comments.visible);
}

#[tokio::test]
async fn test_comments_arriving_after_image_change_are_dropped() {
    let api = FakeApi::seeded();
    let (mut controller, pending) = with_second_comment_page_pending(&api).await;
    let cells = controller.cells();

    controller.next_image().unwrap();
    settle(&mut controller).await;
    assert_eq!(image_id(&controller), Some(12));
    resolve_all(&mut controller, pending).await;

    assert!(controller.get(cells.comments).is_empty());
    assert_eq!(*controller.get(cells.comment_count), 0);
    assert_eq!(*controller.get(cells.comment_page), 0);
    assert!(controller.view().comments.empty_notice);
}

#[tokio::test]
async fn test_comment_page_failure_keeps_count() {
    let api = FakeApi::seeded();
    api.fail("list_comments");
    let controller = signed_in_as(&api, "alice", 10).await;
    let cells = controller.cells();

    assert!(controller.get(cells.comments).is_empty());
    assert_eq!(*controller.get(cells.comment_count), 3);
    assert_eq!(
        controller.get(cells.comment_error).as_deref(),
        Some("Failed to load comments. Please try again.")
    );
    assert!(!*controller.get(cells.comments_loading));
    assert_eq!(controller.view().comments.total, "Total Comments: 3");
}

#[tokio::test]
async fn test_gallery_failure_does_not_claim_empty_catalog() {
    let api = FakeApi::seeded();
    api.fail("list_users");
    let controller = started(&api, 10).await;
    let cells = controller.cells();

    assert_eq!(*controller.get(cells.user_count), 3);
    assert_eq!(owner_name(&controller), None);

    let view = controller.view();
    assert_ne!(view.gallery.title, "No users found.");
    assert!(!view.gallery.buttons_visible);
    assert_eq!(
        view.gallery.error.as_deref(),
        Some("Failed to load the user gallery. Please try again.")
    );
}

#[tokio::test]
async fn test_delete_landing_after_gallery_change_keeps_loading_flags() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "alice", 10).await;
    let cells = controller.cells();

    controller.delete_image().unwrap();
    let delete = controller.take_tasks();
    assert_eq!(delete.len(), 1);

    controller.next_user().unwrap();
    let gallery = controller.take_tasks();
    resolve_all(&mut controller, gallery).await;
    let bob_image = controller.take_tasks();
    assert!(!bob_image.is_empty());

    resolve_all(&mut controller, delete).await;
    assert!(*controller.get(cells.image_loading));
    assert!(controller.view().image.spinner_visible);
    assert_eq!(*controller.get(cells.image_count), Some(1));
    assert_eq!(*controller.get(cells.image_error), None);

    resolve_all(&mut controller, bob_image).await;
    settle(&mut controller).await;
    assert_eq!(image_id(&controller), Some(21));
    assert!(!*controller.get(cells.image_loading));
}

#[tokio::test]
async fn test_delete_landing_after_gallery_reload_keeps_server_count() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "alice", 10).await;
    let cells = controller.cells();

    controller.delete_image().unwrap();
    let mut deleted = Vec::new();
    for task in controller.take_tasks() {
        deleted.push(task.await);
    }

    // Away and back: the reload already counts the deleted image out
    controller.next_user().unwrap();
    settle(&mut controller).await;
    controller.previous_user().unwrap();
    settle(&mut controller).await;
    assert_eq!(*controller.get(cells.image_count), Some(2));

    for completion in deleted {
        controller.resolve(completion).unwrap();
    }
    settle(&mut controller).await;

    assert_eq!(*controller.get(cells.image_count), Some(2));
    assert_eq!(*controller.get(cells.image_offset), 0);
    assert_eq!(image_id(&controller), Some(12));
    assert_eq!(controller.view().image.counter.as_deref(), Some("Gallery Image: 1/2"));
}

#[tokio::test]
async fn test_comment_count_failure_keeps_page() {
    let api = FakeApi::seeded();
    api.fail("count_comments");
    let controller = signed_in_as(&api, "alice", 10).await;
    let cells = controller.cells();

    assert_eq!(controller.get(cells.comments).len(), 3);
    assert_eq!(*controller.get(cells.comment_count), 0);
    assert_eq!(
        controller.get(cells.comment_error).as_deref(),
        Some("Failed to load comment count. Please try again.")
    );
    assert_eq!(*controller.get(cells.image_error), None);
    assert!(!*controller.get(cells.comments_loading));
}

#[tokio::test]
async fn test_image_failure_is_scoped_to_image_section() {
    let api = FakeApi::seeded();
    api.fail("list_user_images");
    let controller = started(&api, 10).await;
    let cells = controller.cells();

    assert_eq!(
        controller.view().image.error.as_deref(),
        Some("Failed to get image. Please try again.")
    );
    assert!(!*controller.get(cells.image_loading));
    assert_eq!(image_id(&controller), None);
    assert_eq!(*controller.get(cells.user_gallery_error), None);
    assert_eq!(controller.view().gallery.title, "@alice's Gallery");
}

#[tokio::test]
async fn test_add_image_shows_newest_upload() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "alice", 10).await;
    let cells = controller.cells();

    assert!(controller.view().image.add_toggle_visible);
    controller.toggle_image_form().unwrap();
    assert!(controller.view().image.add_form_visible);

    controller.next_image().unwrap();
    settle(&mut controller).await;

    controller
        .add_image("sunset", Some(PathBuf::from("/photos/sunset.png")))
        .unwrap();
    settle(&mut controller).await;

    assert!(!*controller.get(cells.image_form_open));
    assert_eq!(*controller.get(cells.image_count), Some(4));
    assert_eq!(*controller.get(cells.image_offset), 0);
    assert_eq!(controller.get(cells.image).as_ref().unwrap().title, "sunset");
    assert_eq!(controller.view().image.counter.as_deref(), Some("Gallery Image: 1/4"));
}

#[tokio::test]
async fn test_add_image_requires_title_and_file() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "alice", 10).await;

    controller.add_image("sunset", None).unwrap();
    assert!(controller.take_tasks().is_empty());
    assert_eq!(
        controller.view().image.error.as_deref(),
        Some("Image title and file are required.")
    );
}

#[tokio::test]
async fn test_add_image_toggle_only_in_own_gallery() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "bob", 10).await;
    assert!(!controller.view().image.add_toggle_visible);

    controller.next_user().unwrap();
    settle(&mut controller).await;
    assert!(controller.view().image.add_toggle_visible);
}

#[tokio::test]
async fn test_rerender_is_idempotent() {
    let api = FakeApi::seeded();
    let mut controller = signed_in_as(&api, "bob", 10).await;

    let before = controller.view().mutations();
    let snapshot = controller.view().clone();
    controller.rerender();
    controller.rerender();

    assert_eq!(controller.view().mutations(), before);
    assert_eq!(controller.view().comments, snapshot.comments);
    assert_eq!(controller.view().image, snapshot.image);
}
