use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::constants::UNKNOWN_USER_NAME;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(
    /// Auth identity of a user (the backend uid).
    UserId
);
string_id!(ProductId);
string_id!(ConversationId);
string_id!(MessageId);

impl ConversationId {
    /// Deterministic id for the chat between two users about one listing.
    /// The participant order does not matter.
    pub fn for_listing(a: &UserId, b: &UserId, product: &ProductId) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        Self(format!("{lo}_{hi}_{product}"))
    }
}

/// A record stored as a backend document. The document id lives outside the
/// document body and is assigned after decoding.
pub trait Record: DeserializeOwned + Send + Sync + 'static {
    fn assign_id(&mut self, id: &str);
}

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

/// A listing visible in the feed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(skip)]
    pub id: ProductId,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contact: String,
    /// Download URLs, at most three.
    #[serde(default)]
    pub images: Vec<String>,
    pub user_id: UserId,
    #[serde(default)]
    pub user_email: Option<String>,
    /// Assigned by the backend; absent while the write is pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Product {
    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.user_id == user
    }

    /// `tel:` URL for the seller's contact number, if there is one.
    pub fn dial_url(&self) -> Option<String> {
        let contact = self.contact.trim();
        if contact.is_empty() {
            None
        } else {
            Some(format!("tel:{contact}"))
        }
    }
}

impl Record for Product {
    fn assign_id(&mut self, id: &str) {
        self.id = ProductId::from(id);
    }
}

// ---------------------------------------------------------------------------
// UserProfile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(skip)]
    pub id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UserProfile {
    /// Name to show to other users: the profile name, else the local part
    /// of the email, else the generic fallback.
    pub fn display_name(&self) -> String {
        let name = self.name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        self.email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|local| !local.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| UNKNOWN_USER_NAME.to_string())
    }
}

impl Record for UserProfile {
    fn assign_id(&mut self, id: &str) {
        self.id = UserId::from(id);
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A chat thread between a buyer and a seller, optionally about a listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(skip)]
    pub id: ConversationId,
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub participant_names: BTreeMap<UserId, String>,
    #[serde(default)]
    pub participant_images: BTreeMap<UserId, String>,
    #[serde(default)]
    pub product_id: Option<ProductId>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub last_message: String,
    #[serde(default)]
    pub last_message_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: BTreeMap<UserId, i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Conversation {
    pub fn other_participant(&self, me: &UserId) -> Option<&UserId> {
        self.participants.iter().find(|p| *p != me)
    }

    pub fn unread_for(&self, user: &UserId) -> i64 {
        self.unread_count.get(user).copied().unwrap_or(0)
    }

    pub fn name_of(&self, user: &UserId) -> &str {
        self.participant_names
            .get(user)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_USER_NAME)
    }

    pub fn image_of(&self, user: &UserId) -> Option<&str> {
        self.participant_images.get(user).map(String::as_str)
    }

    /// A conversation shows up in the inbox once it carries a message.
    pub fn is_active(&self) -> bool {
        !self.last_message.trim().is_empty()
    }

    pub fn involves(&self, user: &UserId) -> bool {
        self.participants.contains(user)
    }
}

impl Record for Conversation {
    fn assign_id(&mut self, id: &str) {
        self.id = ConversationId::from(id);
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message. Append-only apart from the `read` flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(skip)]
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub text: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
}

impl Message {
    pub fn is_from(&self, user: &UserId) -> bool {
        &self.sender_id == user
    }
}

impl Record for Message {
    fn assign_id(&mut self, id: &str) {
        self.id = MessageId::from(id);
    }
}

/// Sort messages oldest first. Messages without a timestamp sort before
/// every timestamped one and keep their relative order.
pub fn sort_messages(messages: &mut [Message]) {
    messages.sort_by_key(|m| m.timestamp);
}

/// Sort conversations by most recent activity; missing times go last.
pub fn sort_conversations(conversations: &mut [Conversation]) {
    conversations.sort_by(|a, b| b.last_message_time.cmp(&a.last_message_time));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn msg(id: &str, secs: Option<i64>) -> Message {
        Message {
            id: MessageId::from(id),
            timestamp: secs.map(|s| Utc.timestamp_opt(s, 0).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn conversation_id_ignores_participant_order() {
        let a = UserId::from("alice");
        let b = UserId::from("bob");
        let p = ProductId::from("p1");
        assert_eq!(
            ConversationId::for_listing(&a, &b, &p),
            ConversationId::for_listing(&b, &a, &p)
        );
        assert_eq!(ConversationId::for_listing(&a, &b, &p).as_str(), "alice_bob_p1");
    }

    #[test]
    fn messages_sort_ascending_whatever_the_delivery_order() {
        let mut msgs = vec![msg("c", Some(30)), msg("a", Some(10)), msg("n", None), msg("b", Some(20))];
        sort_messages(&mut msgs);
        let ids: Vec<_> = msgs.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["n", "a", "b", "c"]);
    }

    #[test]
    fn conversations_sort_newest_first_missing_last() {
        let at = |s| Some(Utc.timestamp_opt(s, 0).unwrap());
        let mut convs = vec![
            Conversation { id: "old".into(), last_message_time: at(1), ..Default::default() },
            Conversation { id: "none".into(), last_message_time: None, ..Default::default() },
            Conversation { id: "new".into(), last_message_time: at(5), ..Default::default() },
        ];
        sort_conversations(&mut convs);
        let ids: Vec<_> = convs.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "old", "none"]);
    }

    #[test]
    fn conversation_helpers() {
        let me = UserId::from("me");
        let them = UserId::from("them");
        let mut conv = Conversation {
            participants: vec![me.clone(), them.clone()],
            ..Default::default()
        };
        conv.unread_count.insert(me.clone(), 4);
        conv.participant_names.insert(them.clone(), "Sam".into());

        assert_eq!(conv.other_participant(&me), Some(&them));
        assert_eq!(conv.unread_for(&me), 4);
        assert_eq!(conv.unread_for(&them), 0);
        assert_eq!(conv.name_of(&them), "Sam");
        assert_eq!(conv.name_of(&me), "User");
        assert!(!conv.is_active());
    }

    #[test]
    fn product_deserializes_backend_field_names() {
        let json = serde_json::json!({
            "name": "Desk lamp",
            "price": 12.5,
            "description": "Warm light",
            "contact": "0123456789",
            "images": ["https://img/1.jpg"],
            "userId": "u1",
            "userEmail": "u1@uni.edu",
            "createdAt": "2024-03-04T10:00:00Z"
        });
        let mut product: Product = serde_json::from_value(json).unwrap();
        product.assign_id("p9");
        assert_eq!(product.id.as_str(), "p9");
        assert!(product.is_owned_by(&UserId::from("u1")));
        assert_eq!(product.dial_url().as_deref(), Some("tel:0123456789"));
        assert!(product.created_at.is_some());
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let profile = UserProfile {
            email: Some("jo@uni.edu".into()),
            ..Default::default()
        };
        assert_eq!(profile.display_name(), "jo");
        assert_eq!(UserProfile::default().display_name(), "User");
    }
}
