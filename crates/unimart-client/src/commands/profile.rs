use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{info, warn};
use unimart_backend::{decode, NewDocument, SetMode};
use unimart_shared::constants::{IMAGE_CONTENT_TYPE, USERS};
use unimart_shared::paths::profile_image_path;
use unimart_shared::validation::{ImageSource, ProfileDraft};
use unimart_shared::{UserId, UserProfile};

use super::report_failure;
use crate::error::{ClientError, Result};
use crate::state::AppState;

/// What to do when the new profile picture cannot be uploaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFailurePolicy {
    /// Fail the whole update.
    #[default]
    Abort,
    /// Save the text fields and keep the previous picture.
    SaveWithoutImage,
}

pub async fn get_user(state: &AppState, uid: &UserId) -> Result<Option<UserProfile>> {
    match state.backend().get(USERS, uid.as_str()).await? {
        Some(doc) => Ok(Some(decode(doc)?)),
        None => Ok(None),
    }
}

/// The signed-in user's profile. `None` until it is first saved.
pub async fn get_profile(state: &AppState) -> Result<Option<UserProfile>> {
    let user = state.require_user("view your profile")?;
    get_user(state, &user.uid).await
}

async fn upload_profile_image(state: &AppState, owner: &UserId, image: &ImageSource) -> Result<String> {
    match image {
        ImageSource::Remote(url) => Ok(url.clone()),
        ImageSource::Local(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| ClientError::ImageRead {
                    path: path.clone(),
                    source,
                })?;
            let object = profile_image_path(owner, Utc::now());
            state
                .backend()
                .upload(&object, bytes, IMAGE_CONTENT_TYPE)
                .await
                .map_err(ClientError::Upload)
        }
    }
}

/// Save my name, mobile number and optionally a new picture. Fields not
/// named here are left as they are.
pub async fn update_profile(
    state: &AppState,
    draft: &ProfileDraft,
    policy: ImageFailurePolicy,
) -> Result<UserProfile> {
    let result = async {
        draft.validate()?;
        let user = state.require_user("update your profile")?;

        let image = match &draft.image {
            Some(source) => match upload_profile_image(state, &user.uid, source).await {
                Ok(url) => Some(url),
                Err(e) if policy == ImageFailurePolicy::SaveWithoutImage => {
                    warn!(uid = %user.uid, "profile image upload failed, saving without it: {e}");
                    state.notifier().info("Profile picture could not be uploaded");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        let mut fields = Map::new();
        fields.insert("name".into(), json!(draft.name.trim()));
        fields.insert("mobile".into(), json!(draft.mobile.trim()));
        fields.insert("email".into(), json!(user.email));
        fields.insert("updatedAt".into(), json!(Utc::now()));
        if let Some(url) = image {
            fields.insert("profileImage".into(), Value::String(url));
        }
        state
            .backend()
            .set(USERS, user.uid.as_str(), NewDocument::new(fields), SetMode::Merge)
            .await?;

        let profile = get_user(state, &user.uid)
            .await?
            .ok_or_else(|| ClientError::NotFound("Profile".into()))?;
        Ok::<_, ClientError>(profile)
    }
    .await;

    let profile = report_failure(state, result, "Failed to update profile: ")?;
    info!(uid = %profile.id, "profile updated");
    state.notifier().success("Profile updated successfully");
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use unimart_backend::memory::{FailKind, FailScope};

    use super::*;
    use crate::events::NoticeKind;
    use crate::testing::{other_device, signed_in};

    fn draft(name: &str, mobile: &str, image: Option<ImageSource>) -> ProfileDraft {
        ProfileDraft {
            name: name.into(),
            mobile: mobile.into(),
            image,
        }
    }

    fn local_image(dir: &tempfile::TempDir) -> ImageSource {
        let path = dir.path().join("me.jpg");
        std::fs::write(&path, b"\xff\xd8\xff\xe0me").unwrap();
        ImageSource::Local(path)
    }

    #[tokio::test]
    async fn save_and_merge() {
        let dir = tempfile::tempdir().unwrap();
        let (state, backend) = signed_in("jo@uni.edu").await;
        assert!(get_profile(&state).await.unwrap().is_none());

        let saved = update_profile(&state, &draft(" Jo ", "0771234567", Some(local_image(&dir))), ImageFailurePolicy::Abort)
            .await
            .unwrap();
        assert_eq!(saved.name, "Jo");
        assert_eq!(saved.email.as_deref(), Some("jo@uni.edu"));
        let image = saved.profile_image.clone().unwrap();
        let uid = state.current_user().unwrap().uid;
        assert!(image.starts_with(&format!("memory://profiles/{uid}_")));
        assert!(saved.updated_at.is_some());
        assert_eq!(backend.object_paths().len(), 1);

        // A later update without a picture keeps the old one.
        let renamed = update_profile(&state, &draft("Joanna", "", None), ImageFailurePolicy::Abort)
            .await
            .unwrap();
        assert_eq!(renamed.name, "Joanna");
        assert_eq!(renamed.mobile, "");
        assert_eq!(renamed.profile_image, Some(image));

        let (other, _) = other_device(&backend, "x@uni.edu").await;
        let seen = get_user(&other, &uid).await.unwrap().unwrap();
        assert_eq!(seen.display_name(), "Joanna");
    }

    #[tokio::test]
    async fn invalid_mobile_is_rejected() {
        let (state, backend) = signed_in("jo@uni.edu").await;
        let err = update_profile(&state, &draft("Jo", "12345", None), ImageFailurePolicy::Abort)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Please enter a valid 10-digit mobile number");
        assert_eq!(backend.document_count(USERS), 0);
    }

    #[tokio::test]
    async fn upload_failure_policies() {
        let dir = tempfile::tempdir().unwrap();
        let (state, backend) = signed_in("jo@uni.edu").await;
        backend.inject_failure(FailScope::Uploads, FailKind::PermissionDenied, 0);
        let mut notices = state.notifier().subscribe();

        update_profile(&state, &draft("Jo", "", Some(local_image(&dir))), ImageFailurePolicy::Abort)
            .await
            .unwrap_err();
        let notice = notices.recv().await.unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(
            notice.message,
            "Failed to update profile: Storage permission denied. Please check the storage rules."
        );
        assert_eq!(backend.document_count(USERS), 0);

        let saved = update_profile(
            &state,
            &draft("Jo", "", Some(local_image(&dir))),
            ImageFailurePolicy::SaveWithoutImage,
        )
        .await
        .unwrap();
        assert_eq!(saved.name, "Jo");
        assert!(saved.profile_image.is_none());
        assert_eq!(notices.recv().await.unwrap().kind, NoticeKind::Info);
        assert_eq!(notices.recv().await.unwrap().message, "Profile updated successfully");
    }
}
