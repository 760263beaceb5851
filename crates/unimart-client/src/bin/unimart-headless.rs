//! Headless UniMart client.
//!
//! Drives the command layer with JSON-over-stdio IPC, for scripting and
//! end-to-end tests. Logging and notices go to stderr; stdout is reserved
//! for the protocol.
//!
//! On startup, emits a `ready` JSON line to stdout. Then reads one
//! `Request` JSON line at a time from stdin and answers each with one
//! `Response` line.
//!
//! The backend is chosen by the `UNIMART_*` environment variables.

use std::collections::HashMap;
use std::io::Write;

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use unimart_backend::BackendError;
use unimart_client::commands::chat::ChatSession;
use unimart_client::commands::profile::ImageFailurePolicy;
use unimart_client::commands::{auth, chat, conversations, favorites, products, profile, settings};
use unimart_client::{AppState, ClientConfig, ClientError};
use unimart_shared::time::{clock_label, relative_label};
use unimart_shared::validation::{ImageSource, ProductDraft, ProfileDraft, SignInForm, SignupForm};
use unimart_shared::{Categorize, ConversationId, ErrorCategory, ProductId, UserId};
use unimart_store::AppSettings;

// ── IPC types ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ReadyEvent {
    event: &'static str,
    backend: &'static str,
    user: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
enum Request {
    SignUp {
        email: String,
        password: String,
        confirm_password: String,
    },
    SignIn {
        email: String,
        password: String,
    },
    SignOut,
    CurrentUser,
    AddProduct {
        #[serde(flatten)]
        listing: Listing,
    },
    EditProduct {
        id: String,
        #[serde(flatten)]
        listing: Listing,
    },
    DeleteProduct {
        id: String,
    },
    GetProduct {
        id: String,
    },
    ListProducts {
        #[serde(default)]
        query: String,
    },
    MyProducts,
    ToggleFavorite {
        product_id: String,
    },
    ListFavorites,
    StartConversation {
        product_id: String,
    },
    ListConversations,
    DeleteConversation {
        id: String,
    },
    OpenChat {
        conversation_id: String,
    },
    ChatMessages {
        conversation_id: String,
    },
    CloseChat {
        conversation_id: String,
    },
    SendMessage {
        conversation_id: String,
        text: String,
    },
    GetProfile,
    GetUser {
        uid: String,
    },
    UpdateProfile {
        name: String,
        #[serde(default)]
        mobile: String,
        #[serde(default)]
        image: Option<String>,
        #[serde(default)]
        policy: ImageFailurePolicy,
    },
    GetSettings,
    UpdateSettings {
        settings: AppSettings,
    },
    Shutdown,
}

/// Listing form fields. Images are URLs or local paths.
#[derive(Deserialize)]
struct Listing {
    name: String,
    price: String,
    #[serde(default)]
    description: String,
    contact: String,
    #[serde(default)]
    images: Vec<String>,
}

impl Listing {
    fn into_draft(self) -> ProductDraft {
        ProductDraft {
            name: self.name,
            price: self.price,
            description: self.description,
            contact: self.contact,
            images: self.images.iter().map(|raw| ImageSource::parse(raw)).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "status")]
enum Response {
    Ok { data: Option<Value> },
    Err { message: String, category: ErrorCategory },
}

// ── Helpers ──────────────────────────────────────────────────────────

fn init_logging_stderr() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,unimart_client=debug"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

fn emit_json(value: &impl Serialize) -> anyhow::Result<()> {
    let line = serde_json::to_string(value).context("JSON serialization failed")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").context("stdout write failed")?;
    stdout.flush().context("stdout flush failed")?;
    Ok(())
}

/// Records keep their id outside the body; put it back for the wire.
fn with_id<T: Serialize>(id: &str, record: &T) -> Result<Value, ClientError> {
    let mut value = serde_json::to_value(record).map_err(BackendError::from)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("id".into(), Value::String(id.to_string()));
    }
    Ok(value)
}

fn list<T: Serialize>(items: &[T], id: impl Fn(&T) -> &str) -> Result<Value, ClientError> {
    items
        .iter()
        .map(|item| with_id(id(item), item))
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

fn to_value(value: &impl Serialize) -> Result<Value, ClientError> {
    Ok(serde_json::to_value(value).map_err(BackendError::from)?)
}

async fn conversation(state: &AppState, id: &str) -> Result<unimart_shared::Conversation, ClientError> {
    conversations::get_conversation(state, &ConversationId::from(id))
        .await?
        .ok_or_else(|| ClientError::NotFound("Conversation".into()))
}

/// The latest message list of an open chat, with display labels.
async fn chat_view(session: &mut ChatSession) -> Result<Value, ClientError> {
    let messages = session.messages.next_ready().await.map_err(ClientError::Subscription)?;
    let mut rows = Vec::with_capacity(messages.len());
    for m in &messages {
        let mut row = with_id(m.id.as_str(), m)?;
        row["clock"] = json!(clock_label(m.timestamp));
        row["mine"] = json!(m.is_from(&session.me));
        rows.push(row);
    }
    Ok(json!({
        "title": session.title(),
        "other": session.other,
        "messages": rows,
    }))
}

/// Mirror notices to stderr as JSON lines so a driver sees what a user would.
fn spawn_notice_forwarder(state: &AppState) {
    let mut notices = state.notifier().subscribe();
    tokio::spawn(async move {
        loop {
            match notices.recv().await {
                Ok(notice) => match serde_json::to_string(&notice) {
                    Ok(line) => eprintln!("{line}"),
                    Err(e) => warn!("could not encode notice: {e}"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "notices dropped"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

// ── Dispatch ─────────────────────────────────────────────────────────

async fn dispatch(
    state: &AppState,
    chats: &mut HashMap<ConversationId, ChatSession>,
    request: Request,
) -> Result<Option<Value>, ClientError> {
    let data = match request {
        Request::SignUp {
            email,
            password,
            confirm_password,
        } => {
            let form = SignupForm {
                email,
                password,
                confirm_password,
            };
            to_value(&auth::sign_up(state, &form).await?)?
        }
        Request::SignIn { email, password } => {
            to_value(&auth::sign_in(state, &SignInForm { email, password }).await?)?
        }
        Request::SignOut => {
            chats.clear();
            auth::sign_out(state).await?;
            return Ok(None);
        }
        Request::CurrentUser => to_value(&auth::current_user(state))?,

        Request::AddProduct { listing } => {
            let id = products::add_product(state, &listing.into_draft()).await?;
            json!({ "id": id })
        }
        Request::EditProduct { id, listing } => {
            products::edit_product(state, &ProductId::from(id), &listing.into_draft()).await?;
            return Ok(None);
        }
        Request::DeleteProduct { id } => {
            products::delete_product(state, &ProductId::from(id)).await?;
            return Ok(None);
        }
        Request::GetProduct { id } => match products::get_product(state, &ProductId::from(id)).await? {
            Some(product) => with_id(product.id.as_str(), &product)?,
            None => Value::Null,
        },
        Request::ListProducts { query } => {
            let mut feed = products::subscribe_feed(state);
            let all = feed.next_ready().await.map_err(ClientError::Subscription)?;
            let found: Vec<_> = products::search(&all, &query).into_iter().cloned().collect();
            list(&found, |p| p.id.as_str())?
        }
        Request::MyProducts => {
            let mut mine = products::subscribe_my_products(state)?;
            let items = mine.next_ready().await.map_err(ClientError::Subscription)?;
            list(&items, |p| p.id.as_str())?
        }

        Request::ToggleFavorite { product_id } => {
            let now = favorites::toggle_favorite(state, &ProductId::from(product_id))?;
            json!({ "favorite": now })
        }
        Request::ListFavorites => {
            let items = favorites::list_favorites(state).await?;
            list(&items, |p| p.id.as_str())?
        }

        Request::StartConversation { product_id } => {
            let product = products::get_product(state, &ProductId::from(product_id))
                .await?
                .ok_or_else(|| ClientError::NotFound("Product".into()))?;
            let conv = conversations::start_conversation(state, &product).await?;
            with_id(conv.id.as_str(), &conv)?
        }
        Request::ListConversations => {
            let mut inbox = conversations::subscribe_conversations(state)?;
            let items = inbox.next_ready().await.map_err(ClientError::Subscription)?;
            let me = state.require_user("view your messages")?.uid;
            let now = Utc::now();
            let mut rows = Vec::with_capacity(items.len());
            for c in &items {
                let mut row = with_id(c.id.as_str(), c)?;
                row["timeLabel"] = json!(c.last_message_time.map(|t| relative_label(t, now)));
                row["unread"] = json!(c.unread_for(&me));
                rows.push(row);
            }
            json!({
                "conversations": rows,
                "unread": conversations::unread_total(&items, &me),
            })
        }
        Request::DeleteConversation { id } => {
            let id = ConversationId::from(id);
            chats.remove(&id);
            conversations::delete_conversation(state, &id).await?;
            return Ok(None);
        }

        Request::OpenChat { conversation_id } => {
            let conv = conversation(state, &conversation_id).await?;
            let mut session = chat::open_chat(state, &conv).await?;
            let data = chat_view(&mut session).await?;
            chats.insert(conv.id.clone(), session);
            data
        }
        Request::ChatMessages { conversation_id } => {
            let session = chats
                .get_mut(&ConversationId::from(conversation_id))
                .ok_or_else(|| ClientError::NotFound("Open chat".into()))?;
            chat_view(session).await?
        }
        Request::CloseChat { conversation_id } => {
            chats.remove(&ConversationId::from(conversation_id));
            return Ok(None);
        }
        Request::SendMessage {
            conversation_id,
            text,
        } => {
            let conv = conversation(state, &conversation_id).await?;
            let id = chat::send_message(state, &conv, &text).await?;
            json!({ "id": id })
        }

        Request::GetProfile => match profile::get_profile(state).await? {
            Some(p) => with_id(p.id.as_str(), &p)?,
            None => Value::Null,
        },
        Request::GetUser { uid } => match profile::get_user(state, &UserId::from(uid)).await? {
            Some(p) => with_id(p.id.as_str(), &p)?,
            None => Value::Null,
        },
        Request::UpdateProfile {
            name,
            mobile,
            image,
            policy,
        } => {
            let draft = ProfileDraft {
                name,
                mobile,
                image: image.as_deref().map(ImageSource::parse),
            };
            let saved = profile::update_profile(state, &draft, policy).await?;
            with_id(saved.id.as_str(), &saved)?
        }

        Request::GetSettings => to_value(&settings::get_settings(state)?)?,
        Request::UpdateSettings { settings: new } => {
            settings::update_settings(state, &new)?;
            return Ok(None);
        }

        // Handled by the command loop.
        Request::Shutdown => return Ok(None),
    };
    Ok(Some(data))
}

// ── Main ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging_stderr();

    let config = ClientConfig::from_env();
    info!(backend = ?config.backend, "unimart-headless starting");
    let state = AppState::from_config(&config).context("failed to initialise client")?;
    spawn_notice_forwarder(&state);

    if let Err(e) = auth::restore_session(&state).await {
        warn!("could not restore session: {e}");
    }

    emit_json(&ReadyEvent {
        event: "ready",
        backend: state.backend().name(),
        user: state.current_user().map(|u| u.uid.to_string()),
    })?;
    info!("Ready event emitted");

    let mut chats = HashMap::new();
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => {
                info!("stdin closed, shutting down");
                break;
            }
            Err(e) => {
                error!("stdin read error: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                emit_json(&Response::Err {
                    message: format!("Invalid command JSON: {e}"),
                    category: ErrorCategory::Validation,
                })?;
                continue;
            }
        };
        let shutdown = matches!(request, Request::Shutdown);

        let response = match dispatch(&state, &mut chats, request).await {
            Ok(data) => Response::Ok { data },
            Err(e) => Response::Err {
                message: e.to_string(),
                category: e.category(),
            },
        };
        emit_json(&response)?;

        if shutdown {
            info!("Shutdown command received");
            break;
        }
    }

    chats.clear();
    info!("Shutdown complete");
    Ok(())
}
