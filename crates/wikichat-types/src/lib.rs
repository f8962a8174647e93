pub mod api;
pub mod events;
pub mod models;

/// Author label used when a poster leaves the name field blank.
pub const DEFAULT_ANONYMOUS_NAME: &str = "名無しさん";
