use iced::widget::image::Handle;
use iced::widget::{
    button, column, container, horizontal_space, image, row, scrollable, text, text_input, Column,
    Row,
};
use iced::{Alignment, Color, Element, Length};

use super::view_model::{CommentPanel, GalleryNav, ImagePanel, ViewModel};
use crate::{Drafts, Message};

const ERROR_COLOR: Color = Color::from_rgb(0.93, 0.36, 0.36);
const MUTED_COLOR: Color = Color::from_rgb(0.6, 0.6, 0.6);

/// Lay out the whole page from the view model and the form drafts.
pub fn page<'a>(model: &'a ViewModel, drafts: &'a Drafts, status: &'a str) -> Element<'a, Message> {
    let body = row![
        container(image_panel(&model.image, drafts)).width(Length::FillPortion(3)),
        container(comment_panel(&model.comments, drafts)).width(Length::FillPortion(2)),
    ]
    .spacing(24);

    let content = column![
        header(model, drafts),
        gallery_nav(&model.gallery),
        body,
        text(status).size(14).color(MUTED_COLOR),
    ]
    .spacing(20)
    .padding(24);

    container(scrollable(content))
        .width(Length::Fill)
        .height(Length::Fill)
        .into()
}

fn header<'a>(model: &'a ViewModel, drafts: &'a Drafts) -> Element<'a, Message> {
    let auth = &model.auth;

    let mut controls = Row::new().spacing(10).align_y(Alignment::Center);
    if auth.form_visible {
        let ready = !drafts.username.trim().is_empty() && !drafts.password.trim().is_empty();
        controls = controls
            .push(
                text_input("Username", &drafts.username)
                    .on_input(Message::UsernameChanged)
                    .padding(8)
                    .width(Length::Fixed(160.0)),
            )
            .push(
                text_input("Password", &drafts.password)
                    .on_input(Message::PasswordChanged)
                    .on_submit(Message::Login)
                    .secure(true)
                    .padding(8)
                    .width(Length::Fixed(160.0)),
            )
            .push(button("Login").on_press_maybe(ready.then_some(Message::Login)).padding(8))
            .push(button("Sign up").on_press_maybe(ready.then_some(Message::Signup)).padding(8));
    }
    if auth.logout_visible {
        controls = controls
            .push(text(&auth.current_user).size(16))
            .push(button("Logout").on_press(Message::Logout).padding(8));
    }

    column![
        row![text("Photo Gallery").size(36), horizontal_space(), controls].align_y(Alignment::Center),
    ]
    .push_maybe(banner(&auth.error))
    .spacing(8)
    .into()
}

fn gallery_nav(nav: &GalleryNav) -> Element<'_, Message> {
    let mut column = Column::new().spacing(8);
    if nav.visible {
        let mut line = Row::new().spacing(12).align_y(Alignment::Center);
        if nav.buttons_visible {
            line = line.push(
                button("Previous user")
                    .on_press_maybe(nav.previous_enabled.then_some(Message::PreviousUser))
                    .padding(8),
            );
        }
        line = line.push(text(&nav.title).size(24));
        if nav.buttons_visible {
            line = line.push(
                button("Next user")
                    .on_press_maybe(nav.next_enabled.then_some(Message::NextUser))
                    .padding(8),
            );
        }
        column = column.push(line);
    }
    column.push_maybe(banner(&nav.error)).into()
}

fn image_panel<'a>(panel: &'a ImagePanel, drafts: &'a Drafts) -> Element<'a, Message> {
    let mut column = Column::new().spacing(12);

    if panel.add_toggle_visible {
        let label = if panel.add_form_visible { "Cancel" } else { "Add image" };
        column = column.push(button(label).on_press(Message::ToggleImageForm).padding(8));
    }
    if panel.add_form_visible {
        let picked = drafts
            .image_file
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "No file chosen".to_string());
        column = column.push(
            row![
                text_input("Title", &drafts.image_title)
                    .on_input(Message::ImageTitleChanged)
                    .padding(8)
                    .width(Length::Fixed(220.0)),
                button("Choose file").on_press(Message::PickImageFile).padding(8),
                text(picked).size(14).color(MUTED_COLOR),
                button("Upload").on_press(Message::SubmitImage).padding(8),
            ]
            .spacing(10)
            .align_y(Alignment::Center),
        );
    }

    column = column.push_maybe(banner(&panel.error));

    if panel.spinner_visible {
        column = column.push(text("Loading image...").size(16).color(MUTED_COLOR));
    }
    if let Some(counter) = &panel.counter {
        column = column.push(text(counter).size(16));
    }

    if let Some(card) = &panel.card {
        let mut title = Row::new()
            .spacing(12)
            .align_y(Alignment::Center)
            .push(text(&card.title).size(22))
            .push(text(format!("by {}", card.author)).size(16).color(MUTED_COLOR));
        if card.delete_visible {
            title = title.push(button("Delete").on_press(Message::DeleteImage).padding(6));
        }

        column = column
            .push(title)
            .push(
                image(Handle::from_path(&card.path))
                    .width(Length::Fill)
                    .height(Length::Fixed(420.0)),
            )
            .push(
                row![
                    button("Previous")
                        .on_press_maybe(panel.previous_enabled.then_some(Message::PreviousImage))
                        .padding(8),
                    button("Next")
                        .on_press_maybe(panel.next_enabled.then_some(Message::NextImage))
                        .padding(8),
                ]
                .spacing(10),
            );
    }

    column.into()
}

fn comment_panel<'a>(panel: &'a CommentPanel, drafts: &'a Drafts) -> Element<'a, Message> {
    if !panel.visible {
        return Column::new().into();
    }

    let mut column = Column::new().spacing(12).push(text(&panel.total).size(18));

    if panel.form_visible {
        column = column.push(
            row![
                text_input("Write a comment", &drafts.comment)
                    .on_input(Message::CommentChanged)
                    .on_submit(Message::SubmitComment)
                    .padding(8),
                button("Post").on_press(Message::SubmitComment).padding(8),
            ]
            .spacing(10),
        );
    }

    column = column.push_maybe(banner(&panel.error));

    if panel.spinner_visible {
        column = column.push(text("Loading comments...").size(16).color(MUTED_COLOR));
    }
    if panel.empty_notice {
        column = column.push(text("No comments yet.").size(16).color(MUTED_COLOR));
    }

    for comment in &panel.rows {
        let mut meta = Row::new()
            .spacing(10)
            .align_y(Alignment::Center)
            .push(text(&comment.author).size(14))
            .push(text(&comment.posted).size(12).color(MUTED_COLOR));
        if comment.delete_visible {
            meta = meta.push(
                button(text("Delete").size(12))
                    .on_press(Message::DeleteComment(comment.id))
                    .padding(4),
            );
        }
        column = column.push(column![meta, text(&comment.content).size(16)].spacing(4));
    }

    column
        .push(
            row![
                button("Newer")
                    .on_press_maybe(panel.previous_enabled.then_some(Message::PreviousComments))
                    .padding(6),
                button("Older")
                    .on_press_maybe(panel.next_enabled.then_some(Message::NextComments))
                    .padding(6),
            ]
            .spacing(10),
        )
        .into()
}

fn banner(error: &Option<String>) -> Option<Element<'_, Message>> {
    error
        .as_ref()
        .map(|message| text(message).size(14).color(ERROR_COLOR).into())
}
