pub mod chat;

pub use chat::{AppState, AppStateInner};
