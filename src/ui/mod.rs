//! Terminal chat interface.

pub mod app;
pub mod view;

pub use app::ChatApp;
pub use view::{ChatView, Viewport};
