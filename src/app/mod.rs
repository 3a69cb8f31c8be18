pub mod error;
pub mod panel;
pub mod store;
pub mod sync;
