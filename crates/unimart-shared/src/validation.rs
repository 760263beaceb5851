//! Form validation for every user submission.
//!
//! Each form reports the first failing rule; the message of the returned
//! [`ValidationError`] is what the user sees.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_MESSAGE_LEN, MAX_PRODUCT_IMAGES, MIN_CONTACT_LEN, MOBILE_DIGITS};
use crate::error::ValidationError;

/// An image attached to a form: either already uploaded, or a local file
/// that still has to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ImageSource {
    Remote(String),
    Local(PathBuf),
}

impl ImageSource {
    /// Classify a picker result. Anything that is an http(s) URL is already
    /// uploaded; everything else (`file://`, `blob:`, plain paths) is local.
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            ImageSource::Remote(raw.to_string())
        } else {
            let path = raw.strip_prefix("file://").unwrap_or(raw);
            ImageSource::Local(PathBuf::from(path))
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, ImageSource::Remote(_))
    }
}

// ---------------------------------------------------------------------------
// Product
// ---------------------------------------------------------------------------

/// Raw listing form input, exactly as typed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    pub price: String,
    #[serde(default)]
    pub description: String,
    pub contact: String,
    #[serde(default)]
    pub images: Vec<ImageSource>,
}

/// A listing form that passed validation, with trimmed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidProduct {
    pub name: String,
    pub price: f64,
    pub description: String,
    pub contact: String,
    pub images: Vec<ImageSource>,
}

impl ProductDraft {
    pub fn add_image(&mut self, image: ImageSource) -> Result<(), ValidationError> {
        if self.images.len() >= MAX_PRODUCT_IMAGES {
            return Err(ValidationError::TooManyImages);
        }
        self.images.push(image);
        Ok(())
    }

    pub fn remove_image(&mut self, index: usize) -> Option<ImageSource> {
        (index < self.images.len()).then(|| self.images.remove(index))
    }

    /// Every failing rule, in display order.
    pub fn validate_all(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push(ValidationError::NameRequired);
        }

        if self.price.trim().is_empty() {
            errors.push(ValidationError::PriceRequired);
        } else if parse_price(&self.price).is_none() {
            errors.push(ValidationError::InvalidPrice);
        }

        let contact = self.contact.trim();
        if contact.is_empty() {
            errors.push(ValidationError::ContactRequired);
        } else if contact.chars().count() < MIN_CONTACT_LEN {
            errors.push(ValidationError::InvalidContact);
        }

        if self.images.is_empty() {
            errors.push(ValidationError::ImageRequired);
        } else if self.images.len() > MAX_PRODUCT_IMAGES {
            errors.push(ValidationError::TooManyImages);
        }

        errors
    }

    pub fn validate(&self) -> Result<ValidProduct, ValidationError> {
        if let Some(first) = self.validate_all().into_iter().next() {
            return Err(first);
        }
        Ok(ValidProduct {
            name: self.name.trim().to_string(),
            price: parse_price(&self.price).ok_or(ValidationError::InvalidPrice)?,
            description: self.description.trim().to_string(),
            contact: self.contact.trim().to_string(),
            images: self.images.clone(),
        })
    }
}

/// A strictly positive, finite price.
pub fn parse_price(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p > 0.0)
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub name: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub image: Option<ImageSource>,
}

impl ProfileDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::ProfileNameRequired);
        }
        if !self.mobile.is_empty() && !is_valid_mobile(&self.mobile) {
            return Err(ValidationError::InvalidMobile);
        }
        Ok(())
    }
}

/// Exactly ten ASCII digits once whitespace is stripped.
pub fn is_valid_mobile(raw: &str) -> bool {
    let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    digits.len() == MOBILE_DIGITS && digits.bytes().all(|b| b.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Auth forms
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignupForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.is_empty() || self.password.is_empty() || self.confirm_password.is_empty() {
            return Err(ValidationError::SignupFieldsRequired);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(ValidationError::CredentialsRequired);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

/// Trimmed message text, or the reason it cannot be sent.
pub fn validate_message_text(raw: &str) -> Result<String, ValidationError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ValidationError::EmptyMessage);
    }
    if text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ValidationError::MessageTooLong);
    }
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> ProductDraft {
        ProductDraft {
            name: "  Calculus textbook ".into(),
            price: "25".into(),
            description: " barely used ".into(),
            contact: " 0712345678 ".into(),
            images: vec![ImageSource::Remote("https://img/a.jpg".into())],
        }
    }

    #[test]
    fn valid_draft_is_trimmed() {
        let valid = draft().validate().unwrap();
        assert_eq!(valid.name, "Calculus textbook");
        assert_eq!(valid.price, 25.0);
        assert_eq!(valid.description, "barely used");
        assert_eq!(valid.contact, "0712345678");
    }

    #[test]
    fn missing_name_is_rejected_first() {
        let d = ProductDraft { name: "   ".into(), price: "".into(), ..draft() };
        assert_eq!(d.validate(), Err(ValidationError::NameRequired));
        assert_eq!(
            d.validate_all(),
            vec![ValidationError::NameRequired, ValidationError::PriceRequired]
        );
    }

    #[test]
    fn price_must_be_positive_number() {
        for bad in ["0", "-3", "abc", "NaN", "inf", "12abc"] {
            let d = ProductDraft { price: bad.into(), ..draft() };
            assert_eq!(d.validate(), Err(ValidationError::InvalidPrice), "price {bad:?}");
        }
        let d = ProductDraft { price: "0.01".into(), ..draft() };
        assert!(d.validate().is_ok());
    }

    #[test]
    fn contact_needs_ten_characters() {
        let d = ProductDraft { contact: "".into(), ..draft() };
        assert_eq!(d.validate(), Err(ValidationError::ContactRequired));
        let d = ProductDraft { contact: " 123456789 ".into(), ..draft() };
        assert_eq!(d.validate(), Err(ValidationError::InvalidContact));
        let d = ProductDraft { contact: "1234567890".into(), ..draft() };
        assert!(d.validate().is_ok());
    }

    #[test]
    fn images_between_one_and_three() {
        let d = ProductDraft { images: vec![], ..draft() };
        assert_eq!(d.validate(), Err(ValidationError::ImageRequired));

        let mut d = draft();
        d.add_image(ImageSource::parse("file:///tmp/b.jpg")).unwrap();
        d.add_image(ImageSource::parse("/tmp/c.jpg")).unwrap();
        assert_eq!(d.add_image(ImageSource::parse("/tmp/d.jpg")), Err(ValidationError::TooManyImages));
        assert_eq!(d.images.len(), 3);
        assert!(d.validate().is_ok());

        d.images.push(ImageSource::parse("/tmp/e.jpg"));
        assert_eq!(d.validate(), Err(ValidationError::TooManyImages));
    }

    #[test]
    fn removing_an_image_frees_a_slot() {
        let mut d = draft();
        d.add_image(ImageSource::parse("/tmp/b.jpg")).unwrap();
        d.add_image(ImageSource::parse("/tmp/c.jpg")).unwrap();

        assert!(d.remove_image(3).is_none());
        let removed = d.remove_image(1).unwrap();
        assert!(!removed.is_remote());
        assert_eq!(d.images.len(), 2);
        d.add_image(ImageSource::parse("/tmp/d.jpg")).unwrap();
        assert_eq!(d.images.len(), 3);
    }

    #[test]
    fn image_source_classification() {
        assert!(ImageSource::parse("https://cdn/x.jpg").is_remote());
        assert_eq!(
            ImageSource::parse("file:///data/pic.jpg"),
            ImageSource::Local(PathBuf::from("/data/pic.jpg"))
        );
        assert!(!ImageSource::parse("blob:abc").is_remote());
    }

    #[test]
    fn profile_mobile_rules() {
        let ok = ProfileDraft { name: "Ana".into(), mobile: "071 234 5678".into(), image: None };
        assert!(ok.validate().is_ok());

        let empty_mobile = ProfileDraft { mobile: String::new(), ..ok.clone() };
        assert!(empty_mobile.validate().is_ok());

        let short = ProfileDraft { mobile: "12345".into(), ..ok.clone() };
        assert_eq!(short.validate(), Err(ValidationError::InvalidMobile));

        let letters = ProfileDraft { mobile: "07123456ab".into(), ..ok.clone() };
        assert_eq!(letters.validate(), Err(ValidationError::InvalidMobile));

        let no_name = ProfileDraft { name: " ".into(), ..ok };
        assert_eq!(no_name.validate(), Err(ValidationError::ProfileNameRequired));
    }

    #[test]
    fn signup_rules() {
        let form = SignupForm {
            email: "a@uni.edu".into(),
            password: "secret1".into(),
            confirm_password: "secret2".into(),
        };
        assert_eq!(form.validate(), Err(ValidationError::PasswordMismatch));
        let form = SignupForm { confirm_password: String::new(), ..form };
        assert_eq!(form.validate(), Err(ValidationError::SignupFieldsRequired));
    }

    #[test]
    fn message_text_rules() {
        assert_eq!(validate_message_text("  hi  ").unwrap(), "hi");
        assert_eq!(validate_message_text(" \n "), Err(ValidationError::EmptyMessage));
        let long = "x".repeat(MAX_MESSAGE_LEN + 1);
        assert_eq!(validate_message_text(&long), Err(ValidationError::MessageTooLong));
    }
}
