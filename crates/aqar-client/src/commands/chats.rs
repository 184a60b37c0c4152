use anyhow::Context;

use aqar_shared::chat::Chat;

use crate::query::{QueryKey, QueryOptions};
use crate::state::AppState;

pub async fn list_chats(state: &AppState) -> anyhow::Result<()> {
    let chats = state
        .queries
        .fetch_query(QueryKey::chats(), QueryOptions::default(), || state.chats.my_chats())
        .await
        .context("Could not load chats")?;

    if chats.is_empty() {
        println!("No conversations yet");
    }
    for chat in &chats {
        println!("{}", chat_line(chat));
    }
    Ok(())
}

pub async fn unread(state: &AppState) -> anyhow::Result<()> {
    let count = state
        .queries
        .fetch_query(QueryKey::unread_count(), QueryOptions::default(), || {
            state.chats.unread_count()
        })
        .await
        .context("Could not load unread count")?;
    println!("{count}");
    Ok(())
}

fn chat_line(chat: &Chat) -> String {
    let name = chat
        .other_user
        .as_ref()
        .map_or("Unknown", |user| user.name.as_str());
    let preview = chat.last_message.as_ref().map_or("", |m| m.text());
    let unread = if chat.unread_count > 0 {
        format!(" ({} unread)", chat.unread_count)
    } else {
        String::new()
    };
    format!("#{} {name}{unread}: {preview}", chat.id)
}
