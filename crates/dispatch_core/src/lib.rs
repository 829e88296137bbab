pub mod config;
pub mod error;
pub mod events;
pub mod fanout;
pub mod geo;
pub mod lifecycle;
pub mod persistence;
pub mod request;
pub mod selection;
pub mod store;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
