//! An open chat: the message list of one conversation plus sending.

use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use tracing::{debug, info, warn};
use unimart_backend::{decode, FieldUpdate, LiveQuery, NewDocument, Query, Shape};
use unimart_shared::constants::{CONVERSATIONS, MESSAGES};
use unimart_shared::validation::validate_message_text;
use unimart_shared::{sort_messages, Conversation, Message, MessageId, UserId, UserProfile};

use super::profile::get_user;
use super::report_failure;
use crate::error::{ClientError, Result};
use crate::state::AppState;

/// Everything the chat screen shows. Dropping it stops the message feed.
pub struct ChatSession {
    pub conversation: Conversation,
    pub me: UserId,
    pub other: UserId,
    /// `None` when the other user never saved a profile.
    pub other_profile: Option<UserProfile>,
    pub messages: LiveQuery<Message>,
}

impl ChatSession {
    /// Header name: the other user's profile name, else the name stored on
    /// the conversation.
    pub fn title(&self) -> String {
        match &self.other_profile {
            Some(profile) if !profile.name.trim().is_empty() => profile.display_name(),
            _ => self.conversation.name_of(&self.other).to_string(),
        }
    }
}

/// Mark every unread message sent by `sender` as read. Individual failures
/// are logged and skipped.
async fn mark_read(state: &AppState, conversation: &Conversation, sender: &UserId) -> Result<usize> {
    let query = Query::collection(MESSAGES)
        .where_eq("conversationId", conversation.id.as_str())
        .where_eq("senderId", sender.as_str());
    let unread: Vec<MessageId> = state
        .backend()
        .query(&query)
        .await?
        .into_iter()
        .filter_map(|doc| decode::<Message>(doc).ok())
        .filter(|m| !m.read)
        .map(|m| m.id)
        .collect();

    let updates = unread.iter().map(|id| async move {
        let res = state
            .backend()
            .update(MESSAGES, id.as_str(), vec![FieldUpdate::set("read", true)])
            .await;
        if let Err(e) = &res {
            warn!(message = %id, "could not mark message read: {e}");
        }
        res.is_ok()
    });
    let marked = join_all(updates).await.into_iter().filter(|ok| *ok).count();
    Ok(marked)
}

/// Open a conversation and start its message feed. Resetting my unread
/// counter, marking the other side's messages read and loading their
/// profile are best-effort; only a missing sign-in or a foreign
/// conversation fails.
pub async fn open_chat(state: &AppState, conversation: &Conversation) -> Result<ChatSession> {
    let result = async {
        let me = state.require_user("view messages")?.uid;
        if !conversation.involves(&me) {
            return Err(ClientError::NotOwner);
        }
        let other = conversation
            .other_participant(&me)
            .cloned()
            .ok_or_else(|| ClientError::NotFound("Chat partner".into()))?;

        // The feed starts even when the bookkeeping below fails.
        if let Err(e) = state
            .backend()
            .update(
                CONVERSATIONS,
                conversation.id.as_str(),
                vec![FieldUpdate::set(format!("unreadCount.{me}"), 0)],
            )
            .await
        {
            warn!(conversation = %conversation.id, "could not reset unread count: {e}");
        }
        match mark_read(state, conversation, &other).await {
            Ok(marked) => debug!(conversation = %conversation.id, marked, "messages marked read"),
            Err(e) => warn!(conversation = %conversation.id, "could not mark messages read: {e}"),
        }

        let other_profile = match get_user(state, &other).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user = %other, "could not load chat partner profile: {e}");
                None
            }
        };

        let query = Query::collection(MESSAGES).where_eq("conversationId", conversation.id.as_str());
        let shape: Shape<Message> = Box::new(|mut messages: Vec<Message>| {
            sort_messages(&mut messages);
            messages
        });
        let messages = state.live(query, Some(shape));

        Ok::<_, ClientError>(ChatSession {
            conversation: conversation.clone(),
            me,
            other,
            other_profile,
            messages,
        })
    }
    .await;

    report_failure(state, result, "Failed to open chat: ")
}

/// Append a message and bump the other participant's unread counter. Blank
/// text is rejected without a notice.
pub async fn send_message(state: &AppState, conversation: &Conversation, text: &str) -> Result<MessageId> {
    let text = validate_message_text(text)?;

    let result = async {
        let me = state.require_user("send messages")?.uid;
        let other = conversation
            .other_participant(&me)
            .cloned()
            .ok_or_else(|| ClientError::NotFound("Chat partner".into()))?;
        let now = Utc::now();

        let body = json!({
            "conversationId": conversation.id,
            "senderId": me,
            "text": text,
            "timestamp": now,
            "read": false,
        });
        let doc = NewDocument::new(body.as_object().cloned().unwrap_or_default());
        let id = state.backend().create(MESSAGES, doc).await?;

        state
            .backend()
            .update(
                CONVERSATIONS,
                conversation.id.as_str(),
                vec![
                    FieldUpdate::set("lastMessage", text.as_str()),
                    FieldUpdate::set("lastMessageTime", json!(now)),
                    FieldUpdate::increment(format!("unreadCount.{other}"), 1),
                ],
            )
            .await?;
        Ok::<_, ClientError>(MessageId(id))
    }
    .await;

    let id = report_failure(state, result, "Failed to send message: ")?;
    info!(conversation = %conversation.id, message = %id, "message sent");
    Ok(id)
}
