use std::time::Duration;

/// Maximum number of images attached to a single listing
pub const MAX_PRODUCT_IMAGES: usize = 3;

/// Minimum length of a listing's contact number (trimmed characters)
pub const MIN_CONTACT_LEN: usize = 10;

/// Exact digit count of a profile mobile number
pub const MOBILE_DIGITS: usize = 10;

/// Maximum chat message length in characters
pub const MAX_MESSAGE_LEN: usize = 500;

const TOAST_FADE_MS: u64 = 300;
const TOAST_HOLD_MS: u64 = 2000;

/// How long a toast stays up: fade in, hold, fade out
pub const TOAST_DURATION: Duration = Duration::from_millis(TOAST_FADE_MS + TOAST_HOLD_MS + TOAST_FADE_MS);

/// Default interval between live-query polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Backend collection names
pub const PRODUCTS: &str = "products";
pub const USERS: &str = "users";
pub const CONVERSATIONS: &str = "conversations";
pub const MESSAGES: &str = "messages";

/// Fields stored as instants. Any other string stays a string even when it
/// happens to look like a date.
pub const TIMESTAMP_FIELDS: &[&str] = &["createdAt", "updatedAt", "timestamp", "lastMessageTime"];

/// Object storage prefixes
pub const PRODUCT_IMAGE_PREFIX: &str = "products";
pub const PROFILE_IMAGE_PREFIX: &str = "profiles";

/// Content type used for every uploaded image
pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

/// Fallback shown when a conversation has no name for a participant
pub const UNKNOWN_USER_NAME: &str = "User";
