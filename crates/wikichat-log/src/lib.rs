pub mod chat_log;
pub mod error;
pub mod ranking;
pub mod record;
pub mod store;

pub use chat_log::ChatLog;
pub use error::{LogError, RecordError, Result};
pub use store::ChatLogStore;
