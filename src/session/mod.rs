//! Client-side session: store synchronization, chat/upload controller and
//! the pure render step that turns controller state into a display model.

pub mod client;
pub mod controller;
pub mod model;
pub mod render;
pub mod sync;

pub use client::{HttpApiClient, StoreApi};
pub use controller::{ChatController, QueryTicket, UploadOptions, UploadTicket};
pub use model::{ChatMessage, Citation, Notice, NoticeLevel, PickedFile, QueryPhase, Role, UploadPhase};
pub use render::{ChatView, CitationView, MessageView};
pub use sync::{StoreSynchronizer, SyncOutcome};
