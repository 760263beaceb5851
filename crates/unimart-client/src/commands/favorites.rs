//! Favorites live on the device, per signed-in user.

use futures::future::try_join_all;
use tracing::{debug, info};
use unimart_shared::{Product, ProductId};

use super::products::get_product;
use super::report_failure;
use crate::error::Result;
use crate::state::AppState;

/// Flip a product in or out of my favorites and return the new state.
pub fn toggle_favorite(state: &AppState, product: &ProductId) -> Result<bool> {
    let result = state
        .require_user("save favorites")
        .and_then(|user| state.with_db(|db| db.toggle_favorite(&user.uid, product)));
    let now_favorite = report_failure(state, result, "Failed to update favorites: ")?;

    if now_favorite {
        state.notifier().info("Added to favorites");
    } else {
        state.notifier().info("Removed from favorites");
    }
    Ok(now_favorite)
}

/// Returns `true` when the product was not a favorite yet.
pub fn add_favorite(state: &AppState, product: &ProductId) -> Result<bool> {
    let user = state.require_user("save favorites")?;
    state.with_db(|db| db.add_favorite(&user.uid, product))
}

/// Returns `true` when the product was a favorite.
pub fn remove_favorite(state: &AppState, product: &ProductId) -> Result<bool> {
    let user = state.require_user("save favorites")?;
    state.with_db(|db| db.remove_favorite(&user.uid, product))
}

/// Signed-out users have no favorites.
pub fn is_favorite(state: &AppState, product: &ProductId) -> Result<bool> {
    match state.current_user() {
        Some(user) => state.with_db(|db| db.is_favorite(&user.uid, product)),
        None => Ok(false),
    }
}

/// My favorite products in the order they were added. Products that no
/// longer exist are dropped from the list for good.
pub async fn list_favorites(state: &AppState) -> Result<Vec<Product>> {
    let Some(user) = state.current_user() else {
        return Ok(Vec::new());
    };
    let ids = state.with_db(|db| db.favorite_ids(&user.uid))?;
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let found = try_join_all(ids.iter().map(|id| get_product(state, id))).await?;
    let products: Vec<Product> = found.into_iter().flatten().collect();

    if products.len() < ids.len() {
        let keep: Vec<ProductId> = products.iter().map(|p| p.id.clone()).collect();
        let pruned = state.with_db(|db| db.prune_favorites(&user.uid, &keep))?;
        info!(uid = %user.uid, pruned, "dropped favorites of deleted products");
    }
    debug!(count = products.len(), "favorites loaded");
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::auth::sign_out;
    use crate::commands::products::{add_product, delete_product};
    use crate::testing::{other_device, signed_in};
    use unimart_shared::validation::{ImageSource, ProductDraft};

    fn listing(name: &str) -> ProductDraft {
        ProductDraft {
            name: name.into(),
            price: "100".into(),
            description: String::new(),
            contact: "0771234567".into(),
            images: vec![ImageSource::Remote(format!("https://img/{name}.jpg"))],
        }
    }

    #[tokio::test]
    async fn toggling_is_idempotent_per_call() {
        let (state, _) = signed_in("buyer@uni.edu").await;
        let id = ProductId::from("p1");

        assert!(toggle_favorite(&state, &id).unwrap());
        assert!(is_favorite(&state, &id).unwrap());
        assert!(!toggle_favorite(&state, &id).unwrap());
        assert!(!is_favorite(&state, &id).unwrap());

        assert!(add_favorite(&state, &id).unwrap());
        assert!(!add_favorite(&state, &id).unwrap());
        assert!(remove_favorite(&state, &id).unwrap());
        assert!(!remove_favorite(&state, &id).unwrap());
    }

    #[tokio::test]
    async fn favorites_are_per_user() {
        let (seller, backend) = signed_in("seller@uni.edu").await;
        let (buyer, _) = other_device(&backend, "buyer@uni.edu").await;
        let id = add_product(&seller, &listing("Lamp")).await.unwrap();

        add_favorite(&buyer, &id).unwrap();
        assert!(is_favorite(&buyer, &id).unwrap());
        assert!(!is_favorite(&seller, &id).unwrap());

        sign_out(&buyer).await.unwrap();
        assert!(!is_favorite(&buyer, &id).unwrap());
        assert!(add_favorite(&buyer, &id).is_err());
    }

    #[tokio::test]
    async fn deleted_products_are_pruned() {
        let (seller, backend) = signed_in("seller@uni.edu").await;
        let lamp = add_product(&seller, &listing("Lamp")).await.unwrap();
        let desk = add_product(&seller, &listing("Desk")).await.unwrap();

        let (buyer, _) = other_device(&backend, "buyer@uni.edu").await;
        add_favorite(&buyer, &desk).unwrap();
        add_favorite(&buyer, &lamp).unwrap();

        let names: Vec<_> = list_favorites(&buyer)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["Desk", "Lamp"]);

        delete_product(&seller, &desk).await.unwrap();
        let remaining = list_favorites(&buyer).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, lamp);
        assert!(!is_favorite(&buyer, &desk).unwrap());
    }
}
