//! Interactive chat with one peer on stdin/stdout.

use std::collections::HashSet;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use aqar_shared::chat::ChatMessage;
use aqar_shared::{MessageId, UserId};

use crate::chat::{spawn_chat_sync, ChatPhase, ChatView};
use crate::events::{Notice, NoticeLevel, ViewEvent};
use crate::state::AppState;

pub async fn run_chat(
    state: &AppState,
    peer: UserId,
    notices: &mut mpsc::UnboundedReceiver<Notice>,
) -> anyhow::Result<()> {
    let current_user = state.current_user()?;
    let (handle, mut events, task) = spawn_chat_sync(state.chat_context(), current_user, Some(peer));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = HashSet::new();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ViewEvent::PhaseChanged(phase)) => {
                    if let Some(line) = phase_line(&phase) {
                        println!("{line}");
                    }
                    if phase.is_terminal() {
                        break;
                    }
                }
                Some(ViewEvent::ScrollToLatest { .. }) => print_new(&handle.view(), &mut printed),
                Some(ViewEvent::DraftChanged(draft)) if !draft.is_empty() => {
                    println!("(not sent, draft kept: {draft})");
                }
                Some(ViewEvent::DraftChanged(_)) => {}
                None => break,
            },

            Some(notice) = notices.recv() => print_notice(&notice),

            line = stdin.next_line() => match line? {
                Some(line) if line.trim() == "/quit" => break,
                Some(line) => {
                    handle.edit_draft(line)?;
                    handle.send()?;
                }
                None => break,
            },
        }
        prompt()?;
    }

    // Already stopped after a terminal phase.
    let _ = handle.close();
    task.await?;
    Ok(())
}

fn prompt() -> io::Result<()> {
    print!("> ");
    io::stdout().flush()
}

fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Error => eprintln!("! {}", notice.message),
        NoticeLevel::Info => println!("{}", notice.message),
    }
}

fn print_new(view: &ChatView, printed: &mut HashSet<MessageId>) {
    for message in view.messages() {
        if printed.insert(message.id) {
            println!("{}", message_line(message, view.current_user));
        }
    }
}

fn phase_line(phase: &ChatPhase) -> Option<String> {
    let line = match phase {
        ChatPhase::Idle | ChatPhase::Closed => return None,
        ChatPhase::Starting => "Opening conversation...".to_string(),
        ChatPhase::Active { chat_id } => format!("Chat #{chat_id} open. Type a message, /quit to leave."),
        ChatPhase::Failed { reason } => reason.clone(),
        ChatPhase::NoContact => "This listing has no contact to message.".to_string(),
        ChatPhase::SelfChat => "You can't message yourself.".to_string(),
        ChatPhase::Anonymous => "Log in to chat: aqar-chat login <email> <password>".to_string(),
    };
    Some(line)
}

fn message_line(message: &ChatMessage, current_user: Option<UserId>) -> String {
    let who = if Some(message.sender_id) == current_user {
        "me".to_string()
    } else {
        message
            .sender
            .as_ref()
            .map_or_else(|| format!("#{}", message.sender_id), |s| s.name.clone())
    };
    let body = match (message.message.as_deref(), &message.image_url) {
        (Some(text), _) if !text.is_empty() => text.to_string(),
        (_, Some(url)) => format!("[image] {url}"),
        _ => String::new(),
    };
    format!("[{}] {who}: {body}", message.created_at.format("%H:%M"))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use aqar_shared::ChatId;

    use super::*;

    fn message(sender: u64, text: Option<&str>) -> ChatMessage {
        ChatMessage {
            id: MessageId(1),
            chat_id: ChatId(42),
            sender_id: UserId(sender),
            message: text.map(str::to_string),
            image_url: Some("https://cdn.example/a.jpg".into()),
            video_url: None,
            is_read: true,
            reply_to: None,
            created_at: Utc.with_ymd_and_hms(2025, 3, 1, 9, 5, 0).unwrap(),
            sender: None,
        }
    }

    #[test]
    fn own_and_peer_lines() {
        assert_eq!(message_line(&message(7, Some("hi")), Some(UserId(7))), "[09:05] me: hi");
        assert_eq!(
            message_line(&message(9, None), Some(UserId(7))),
            "[09:05] #9: [image] https://cdn.example/a.jpg"
        );
    }

    #[test]
    fn quiet_phases() {
        assert!(phase_line(&ChatPhase::Idle).is_none());
        assert!(phase_line(&ChatPhase::Closed).is_none());
        assert_eq!(
            phase_line(&ChatPhase::Failed { reason: "nope".into() }).as_deref(),
            Some("nope")
        );
    }

    #[test]
    fn prints_each_message_once() {
        let mut view = ChatView::new(Some(UserId(7)), Some(UserId(9)));
        view.buffer.push_if_absent(message(7, Some("hi")));
        let mut printed = HashSet::new();
        print_new(&view, &mut printed);
        print_new(&view, &mut printed);
        assert_eq!(printed.len(), 1);
    }
}
