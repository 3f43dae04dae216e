use std::path::Path;

use maud::{DOCTYPE, Markup, html};
use serde_json::Value as JsonValue;

use crate::chat_api::{Chat, ChatMessage};
use crate::id_token::IdTokenClaims;
use crate::types::ChatId;

fn layout(title: &str, body: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1";
                title { (title) " | chatvault" }
            }
            body {
                main { (body) }
            }
        }
    }
}

fn claim_value(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn chat_href(chat_id: &ChatId) -> String {
    format!("/chats/{}", urlencoding::encode(chat_id.as_str()))
}

pub(super) fn index(user: &IdTokenClaims) -> Markup {
    let display_name = user
        .name()
        .or_else(|| user.preferred_username())
        .or_else(|| user.sub())
        .unwrap_or("signed-in user");

    layout(
        "Home",
        html! {
            h1 { "Welcome, " (display_name) }
            nav {
                a href="/chats" { "My chats" }
                " | "
                a href="/logout" { "Sign out" }
            }
            h2 { "Claims" }
            table {
                @for (name, value) in user.iter() {
                    tr {
                        th { (name) }
                        td { (claim_value(value)) }
                    }
                }
            }
        },
    )
}

pub(super) fn chats(chats: &[Chat]) -> Markup {
    layout(
        "Chats",
        html! {
            h1 { "Chats" }
            @if chats.is_empty() {
                p { "No chats found." }
            } @else {
                ul {
                    @for chat in chats {
                        li {
                            a href=(chat_href(&chat.id)) {
                                (chat.topic.as_deref().unwrap_or(chat.id.as_str()))
                            }
                            @if let Some(kind) = &chat.chat_type {
                                " (" (kind) ")"
                            }
                            @if let Some(updated) = &chat.last_updated_date_time {
                                " updated " (updated)
                            }
                        }
                    }
                }
            }
            a href="/" { "Back" }
        },
    )
}

pub(super) fn messages(chat_id: &ChatId, messages: &[ChatMessage]) -> Markup {
    layout(
        "Messages",
        html! {
            h1 { "Messages" }
            p {
                a href={ (chat_href(chat_id)) "/download" } { "Save to file" }
                " | "
                a href="/chats" { "All chats" }
            }
            @if messages.is_empty() {
                p { "No messages." }
            }
            @for message in messages {
                article {
                    header {
                        strong { (message.sender_name().unwrap_or("system")) }
                        @if let Some(at) = &message.created_date_time {
                            " " time { (at) }
                        }
                    }
                    p { (message.content()) }
                }
            }
        },
    )
}

pub(super) fn saved(path: &Path) -> Markup {
    layout(
        "Saved",
        html! {
            p { "Messages saved to: " code { (path.display().to_string()) } }
            a href="/chats" { "All chats" }
        },
    )
}

pub(super) fn auth_error(error: &str, description: &str) -> Markup {
    layout(
        "Sign-in failed",
        html! {
            h1 { "Sign-in failed" }
            p { strong { (error) } }
            p { (description) }
            a href="/login" { "Try again" }
        },
    )
}

pub(super) fn downstream_error(status: u16, body: &str) -> Markup {
    layout(
        "API call failed",
        html! {
            h1 { "API call failed: " (status) }
            pre { (body) }
            a href="/" { "Home" }
        },
    )
}
