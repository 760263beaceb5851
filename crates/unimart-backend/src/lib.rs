//! The hosted backend as seen by the client: authentication, a document
//! database with live queries, and object storage.
//!
//! [`Backend`] is the seam. [`firebase::FirebaseBackend`] talks to the real
//! service over REST; [`memory::MemoryBackend`] keeps everything in process
//! for tests and offline runs.

pub mod document;
pub mod error;
pub mod firebase;
pub mod live;
pub mod memory;
pub mod query;
pub mod traits;

pub use document::{decode, encode, Document, FieldUpdate, NewDocument, SetMode};
pub use error::{AuthError, BackendError, Result};
pub use live::{LiveQuery, Shape, Snapshot};
pub use query::{Direction, Filter, OrderBy, Query};
pub use traits::{AuthProvider, AuthSession, AuthUser, Backend, DocumentStore, ObjectStorage};
