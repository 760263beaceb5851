//! Object storage paths for uploaded images.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::constants::{PRODUCT_IMAGE_PREFIX, PROFILE_IMAGE_PREFIX};
use crate::types::UserId;

/// `products/{uid}/{millis}_{suffix}.jpg`. The random suffix keeps
/// concurrent uploads within one millisecond apart.
pub fn product_image_path(owner: &UserId, at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{PRODUCT_IMAGE_PREFIX}/{owner}/{}_{}.jpg",
        at.timestamp_millis(),
        &suffix[..8]
    )
}

/// `profiles/{uid}_{millis}.jpg`
pub fn profile_image_path(owner: &UserId, at: DateTime<Utc>) -> String {
    format!("{PROFILE_IMAGE_PREFIX}/{owner}_{}.jpg", at.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn product_paths_are_unique_per_call() {
        let owner = UserId::from("u1");
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let a = product_image_path(&owner, at);
        let b = product_image_path(&owner, at);
        assert!(a.starts_with("products/u1/1700000000000_"));
        assert!(a.ends_with(".jpg"));
        assert_ne!(a, b);
    }

    #[test]
    fn profile_path_layout() {
        let at = Utc.timestamp_millis_opt(42).unwrap();
        assert_eq!(profile_image_path(&UserId::from("u1"), at), "profiles/u1_42.jpg");
    }
}
