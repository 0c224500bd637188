// Session / navigation controller.
// Sessions are explicit per-request context (see `extract`), never global state.

pub mod extract;
pub mod handlers;
pub mod navigation;
pub mod store;
