use chrono::Utc;
use futures::future::try_join_all;
use serde_json::Value;
use tracing::{debug, info};
use unimart_backend::{decode, Direction, FieldUpdate, LiveQuery, NewDocument, Query, Shape};
use unimart_shared::constants::{IMAGE_CONTENT_TYPE, PRODUCTS};
use unimart_shared::paths::product_image_path;
use unimart_shared::search::filter_products;
use unimart_shared::validation::{ImageSource, ProductDraft};
use unimart_shared::{Product, ProductId, UserId};

use super::report_failure;
use crate::error::{ClientError, Result};
use crate::state::AppState;

/// Resolve every image of a submission to a download URL. Local files are
/// read and uploaded concurrently; the first failure fails the whole set.
pub(crate) async fn upload_images(
    state: &AppState,
    owner: &UserId,
    images: &[ImageSource],
) -> Result<Vec<String>> {
    let uploads = images.iter().map(|image| async move {
        match image {
            ImageSource::Remote(url) => Ok::<_, ClientError>(url.clone()),
            ImageSource::Local(path) => {
                let bytes = tokio::fs::read(path)
                    .await
                    .map_err(|source| ClientError::ImageRead {
                        path: path.clone(),
                        source,
                    })?;
                let object = product_image_path(owner, Utc::now());
                debug!(%object, size = bytes.len(), "uploading product image");
                state
                    .backend()
                    .upload(&object, bytes, IMAGE_CONTENT_TYPE)
                    .await
                    .map_err(ClientError::Upload)
            }
        }
    });
    try_join_all(uploads).await
}

async fn owned_product(state: &AppState, id: &ProductId, me: &UserId) -> Result<Product> {
    let product = get_product(state, id)
        .await?
        .ok_or_else(|| ClientError::NotFound("Product".into()))?;
    if !product.is_owned_by(me) {
        return Err(ClientError::NotOwner);
    }
    Ok(product)
}

/// Validate and publish a new listing.
pub async fn add_product(state: &AppState, draft: &ProductDraft) -> Result<ProductId> {
    let result = async {
        let valid = draft.validate()?;
        let user = state.require_user("add a product")?;

        let images = upload_images(state, &user.uid, &valid.images).await?;
        let product = Product {
            name: valid.name,
            price: valid.price,
            description: valid.description,
            contact: valid.contact,
            images,
            user_id: user.uid.clone(),
            user_email: user.email.clone(),
            ..Default::default()
        };
        let doc = NewDocument::from_record(&product)?.server_timestamp("createdAt");
        let id = state.backend().create(PRODUCTS, doc).await?;
        Ok::<_, ClientError>(ProductId(id))
    }
    .await;

    let id = report_failure(state, result, "Failed to add product: ")?;
    info!(product = %id, "product added");
    state.notifier().success("Product added successfully!");
    Ok(id)
}

/// Replace the editable fields of one of my listings. Images already
/// uploaded are kept as they are.
pub async fn edit_product(state: &AppState, id: &ProductId, draft: &ProductDraft) -> Result<()> {
    let result = async {
        let valid = draft.validate()?;
        let user = state.require_user("edit a product")?;
        owned_product(state, id, &user.uid).await?;

        let images = upload_images(state, &user.uid, &valid.images).await?;
        let updates = vec![
            FieldUpdate::set("name", valid.name),
            FieldUpdate::set("price", valid.price),
            FieldUpdate::set("description", valid.description),
            FieldUpdate::set("contact", valid.contact),
            FieldUpdate::set("images", Value::from(images)),
        ];
        state.backend().update(PRODUCTS, id.as_str(), updates).await?;
        Ok::<_, ClientError>(())
    }
    .await;

    report_failure(state, result, "Failed to update product: ")?;
    info!(product = %id, "product updated");
    state.notifier().success("Product updated successfully!");
    Ok(())
}

pub async fn delete_product(state: &AppState, id: &ProductId) -> Result<()> {
    let result = async {
        let user = state.require_user("delete a product")?;
        owned_product(state, id, &user.uid).await?;
        state.backend().delete(PRODUCTS, id.as_str()).await?;
        Ok::<_, ClientError>(())
    }
    .await;

    if let Err(e) = &result {
        let message = if e.is_user_input() {
            e.to_string()
        } else {
            "Failed to delete product".to_string()
        };
        state.notifier().error(message);
    }
    result?;

    info!(product = %id, "product deleted");
    state.notifier().success("Product deleted successfully");
    Ok(())
}

pub async fn get_product(state: &AppState, id: &ProductId) -> Result<Option<Product>> {
    match state.backend().get(PRODUCTS, id.as_str()).await? {
        Some(doc) => Ok(Some(decode(doc)?)),
        None => Ok(None),
    }
}

/// Every listing, newest first.
pub fn subscribe_feed(state: &AppState) -> LiveQuery<Product> {
    let query = Query::collection(PRODUCTS).order_by("createdAt", Direction::Descending);
    state.live(query, None)
}

/// My own listings, newest first. Sorted on the client so the query
/// needs no composite index.
pub fn subscribe_my_products(state: &AppState) -> Result<LiveQuery<Product>> {
    let user = state.require_user("view your products")?;
    let query = Query::collection(PRODUCTS).where_eq("userId", user.uid.as_str());
    let shape: Shape<Product> = Box::new(|mut products: Vec<Product>| {
        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        products
    });
    Ok(state.live(query, Some(shape)))
}

pub fn search<'a>(products: &'a [Product], query: &str) -> Vec<&'a Product> {
    filter_products(products, query)
}

/// The `tel:` URL to call a seller.
pub fn dial_seller(state: &AppState, product: &Product) -> Result<String> {
    product.dial_url().ok_or_else(|| {
        state.notifier().error(ClientError::NoContact.to_string());
        ClientError::NoContact
    })
}
