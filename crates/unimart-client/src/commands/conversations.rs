use std::collections::BTreeMap;

use tracing::{debug, info};
use unimart_backend::{decode, LiveQuery, NewDocument, Query, SetMode, Shape};
use unimart_shared::constants::CONVERSATIONS;
use unimart_shared::{
    sort_conversations, Conversation, ConversationId, Product, UserId, UserProfile, ValidationError,
};

use super::profile::get_user;
use super::report_failure;
use crate::error::{ClientError, Result};
use crate::state::AppState;

/// Profile of `uid`, or a bare one carrying only the email so a display
/// name can still be derived.
async fn profile_or_email(state: &AppState, uid: &UserId, email: Option<&str>) -> Result<UserProfile> {
    Ok(get_user(state, uid).await?.unwrap_or_else(|| UserProfile {
        id: uid.clone(),
        email: email.map(str::to_string),
        ..Default::default()
    }))
}

/// Open the conversation with the seller of `product`, creating it on first
/// contact. Both sides get the same conversation whoever starts it.
pub async fn start_conversation(state: &AppState, product: &Product) -> Result<Conversation> {
    let result = async {
        let me = state.require_user("chat with sellers")?;
        if product.is_owned_by(&me.uid) {
            return Err(ValidationError::SelfConversation.into());
        }
        let seller = &product.user_id;
        let id = ConversationId::for_listing(&me.uid, seller, &product.id);

        if let Some(existing) = get_conversation(state, &id).await? {
            debug!(conversation = %id, "conversation exists");
            return Ok(existing);
        }

        let (mine, theirs) = futures::try_join!(
            profile_or_email(state, &me.uid, me.email.as_deref()),
            profile_or_email(state, seller, product.user_email.as_deref()),
        )?;

        let mut names = BTreeMap::new();
        let mut images = BTreeMap::new();
        let mut unread = BTreeMap::new();
        for profile in [&mine, &theirs] {
            names.insert(profile.id.clone(), profile.display_name());
            if let Some(image) = &profile.profile_image {
                images.insert(profile.id.clone(), image.clone());
            }
            unread.insert(profile.id.clone(), 0);
        }

        let mut conversation = Conversation {
            id: id.clone(),
            participants: vec![me.uid.clone(), seller.clone()],
            participant_names: names,
            participant_images: images,
            product_id: Some(product.id.clone()),
            product_name: Some(product.name.clone()),
            last_message: String::new(),
            last_message_time: None,
            unread_count: unread,
            created_at: None,
        };
        let doc = NewDocument::from_record(&conversation)?.server_timestamp("createdAt");
        state
            .backend()
            .set(CONVERSATIONS, id.as_str(), doc, SetMode::Overwrite)
            .await?;

        // Read back so the caller sees the backend-assigned creation time.
        if let Some(stored) = get_conversation(state, &id).await? {
            conversation = stored;
        }
        info!(conversation = %id, product = %product.id, "conversation created");
        Ok::<_, ClientError>(conversation)
    }
    .await;

    report_failure(state, result, "Failed to start chat: ")
}

pub async fn get_conversation(state: &AppState, id: &ConversationId) -> Result<Option<Conversation>> {
    match state.backend().get(CONVERSATIONS, id.as_str()).await? {
        Some(doc) => Ok(Some(decode(doc)?)),
        None => Ok(None),
    }
}

/// My inbox: conversations that carry at least one message, most recent
/// activity first.
pub fn subscribe_conversations(state: &AppState) -> Result<LiveQuery<Conversation>> {
    let user = state.require_user("view your messages")?;
    let query = Query::collection(CONVERSATIONS).where_array_contains("participants", user.uid.as_str());
    let shape: Shape<Conversation> = Box::new(|conversations: Vec<Conversation>| {
        let mut active: Vec<Conversation> = conversations.into_iter().filter(Conversation::is_active).collect();
        sort_conversations(&mut active);
        active
    });
    Ok(state.live(query, Some(shape)))
}

/// Remove a conversation for both participants. Its messages stay behind.
pub async fn delete_conversation(state: &AppState, id: &ConversationId) -> Result<()> {
    let result = async {
        let user = state.require_user("delete conversations")?;
        let conversation = get_conversation(state, id)
            .await?
            .ok_or_else(|| ClientError::NotFound("Conversation".into()))?;
        if !conversation.involves(&user.uid) {
            return Err(ClientError::NotOwner);
        }
        state.backend().delete(CONVERSATIONS, id.as_str()).await?;
        Ok::<_, ClientError>(())
    }
    .await;

    if let Err(e) = &result {
        let message = if e.is_user_input() {
            e.to_string()
        } else {
            "Failed to delete conversation".to_string()
        };
        state.notifier().error(message);
    }
    result?;

    info!(conversation = %id, "conversation deleted");
    state.notifier().info("Conversation deleted");
    Ok(())
}

/// Sum of my unread counters, for the inbox badge.
pub fn unread_total(conversations: &[Conversation], me: &UserId) -> i64 {
    conversations.iter().map(|c| c.unread_for(me)).sum()
}
