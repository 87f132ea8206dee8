/// User interface module
///
/// - view_model.rs: plain render sink the binder projects cells into
/// - gallery.rs: iced widgets drawn from the view model

pub mod gallery;
pub mod view_model;
