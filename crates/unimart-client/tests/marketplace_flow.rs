//! End-to-end flows across two devices sharing one in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use unimart_backend::memory::{FailKind, FailScope, MemoryBackend};
use unimart_backend::Snapshot;
use unimart_client::commands::{auth, chat, conversations, favorites, products};
use unimart_client::{AppState, ClientError, NoticeKind};
use unimart_shared::constants::PRODUCTS;
use unimart_shared::validation::{ImageSource, ProductDraft, SignupForm};
use unimart_store::Database;

const TIMEOUT: Duration = Duration::from_secs(5);

async fn device(backend: Arc<MemoryBackend>, db: Database, email: &str) -> AppState {
    let state = AppState::new(backend, db, Duration::from_millis(20));
    let form = SignupForm {
        email: email.into(),
        password: "hunter22".into(),
        confirm_password: "hunter22".into(),
    };
    auth::sign_up(&state, &form).await.unwrap();
    state
}

fn listing(name: &str, images: Vec<ImageSource>) -> ProductDraft {
    ProductDraft {
        name: name.into(),
        price: "250".into(),
        description: "Pick up on campus".into(),
        contact: "0771234567".into(),
        images,
    }
}

#[tokio::test]
async fn buyer_and_seller_chat_about_a_listing() {
    let dir = tempfile::tempdir().unwrap();
    let shared = Arc::new(MemoryBackend::new());
    let seller = device(
        Arc::new(shared.new_device()),
        Database::open_at(&dir.path().join("seller.db")).unwrap(),
        "sam@uni.edu",
    )
    .await;
    let buyer = device(
        Arc::new(shared.new_device()),
        Database::open_at(&dir.path().join("buyer.db")).unwrap(),
        "bo@uni.edu",
    )
    .await;
    let seller_id = seller.current_user().unwrap().uid;
    let buyer_id = buyer.current_user().unwrap().uid;

    // Seller lists a product with a local photo.
    let photo = dir.path().join("bike.jpg");
    std::fs::write(&photo, b"\xff\xd8\xff\xe0bike").unwrap();
    let product_id = products::add_product(&seller, &listing("Bike", vec![ImageSource::Local(photo)]))
        .await
        .unwrap();

    // Buyer sees it in the feed, saves it and contacts the seller.
    let mut feed = products::subscribe_feed(&buyer);
    let items = tokio::time::timeout(TIMEOUT, feed.wait_for(|p| !p.is_empty()))
        .await
        .unwrap()
        .unwrap();
    let product = items[0].clone();
    assert_eq!(product.id, product_id);
    assert!(favorites::toggle_favorite(&buyer, &product.id).unwrap());

    let conversation = conversations::start_conversation(&buyer, &product).await.unwrap();
    let mut seller_inbox = conversations::subscribe_conversations(&seller).unwrap();
    assert_eq!(
        tokio::time::timeout(TIMEOUT, seller_inbox.next_ready()).await.unwrap().unwrap(),
        vec![]
    );

    chat::send_message(&buyer, &conversation, "Is the bike still available?").await.unwrap();
    chat::send_message(&buyer, &conversation, "I can pay cash").await.unwrap();

    let inbox = tokio::time::timeout(TIMEOUT, seller_inbox.wait_for(|c| !c.is_empty()))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(inbox[0].last_message, "I can pay cash");
    assert_eq!(conversations::unread_total(&inbox, &seller_id), 2);
    assert_eq!(inbox[0].name_of(&buyer_id), "bo");

    // Opening the chat resets the seller's counter and marks messages read.
    let mut session = chat::open_chat(&seller, &inbox[0]).await.unwrap();
    let inbox = tokio::time::timeout(
        TIMEOUT,
        seller_inbox.wait_for(|c| c.first().is_some_and(|c| c.unread_for(&seller_id) == 0)),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(conversations::unread_total(&inbox, &seller_id), 0);

    let messages = tokio::time::timeout(TIMEOUT, session.messages.wait_for(|m| m.len() == 2))
        .await
        .unwrap()
        .unwrap();
    assert!(messages.iter().all(|m| m.read && m.is_from(&buyer_id)));
    assert_eq!(messages[0].text, "Is the bike still available?");

    // The reply lands in the open session and bumps the buyer's counter.
    chat::send_message(&seller, &session.conversation, "Yes, come by at 5").await.unwrap();
    let messages = tokio::time::timeout(TIMEOUT, session.messages.wait_for(|m| m.len() == 3))
        .await
        .unwrap()
        .unwrap();
    assert!(messages[2].is_from(&seller_id));
    let stored = conversations::get_conversation(&buyer, &conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.unread_for(&buyer_id), 1);

    // Seller sells the bike; the buyer's favorite disappears.
    products::delete_product(&seller, &product_id).await.unwrap();
    assert!(favorites::list_favorites(&buyer).await.unwrap().is_empty());
    assert!(!favorites::is_favorite(&buyer, &product_id).unwrap());
}

#[tokio::test]
async fn failed_upload_creates_no_listing() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(MemoryBackend::new());
    let seller = device(backend.clone(), Database::open_in_memory().unwrap(), "sam@uni.edu").await;
    let mut notices = seller.notifier().subscribe();

    let photos: Vec<ImageSource> = ["a.jpg", "b.jpg", "c.jpg"]
        .iter()
        .map(|name| {
            let path = dir.path().join(name);
            std::fs::write(&path, b"jpeg").unwrap();
            ImageSource::Local(path)
        })
        .collect();

    backend.inject_failure(FailScope::Uploads, FailKind::Network, 1);
    let err = products::add_product(&seller, &listing("Desk", photos.clone()))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Upload(_)));
    assert_eq!(backend.document_count(PRODUCTS), 0);

    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice.message, "Failed to add product: Network error. Check your connection.");

    // Once the storage recovers the same submission goes through.
    backend.clear_failures();
    products::add_product(&seller, &listing("Desk", photos)).await.unwrap();
    assert_eq!(backend.document_count(PRODUCTS), 1);
}

#[tokio::test]
async fn session_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("unimart.db");
    let backend = Arc::new(MemoryBackend::new());

    let uid = {
        let state = device(backend.clone(), Database::open_at(&db_path).unwrap(), "jo@uni.edu").await;
        favorites::add_favorite(&state, &"p1".into()).unwrap();
        state.current_user().unwrap().uid
    };

    let restarted = AppState::new(
        Arc::new(backend.new_device()),
        Database::open_at(&db_path).unwrap(),
        Duration::from_millis(20),
    );
    assert!(restarted.current_user().is_none());
    let user = auth::restore_session(&restarted).await.unwrap().unwrap();
    assert_eq!(user.uid, uid);
    assert!(favorites::is_favorite(&restarted, &"p1".into()).unwrap());

    let feed = products::subscribe_feed(&restarted);
    assert_eq!(feed.current(), Snapshot::Loading);
}
