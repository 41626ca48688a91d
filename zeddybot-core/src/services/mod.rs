pub mod chat_send;
pub mod event_ingest;

pub use chat_send::{ChatSendService, QuickMessage};
pub use event_ingest::EventIngestor;
