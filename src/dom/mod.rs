//! Minimal in-memory document used as the host for views.
//!
//! Nodes are shared handles; events bubble from the target to the root with
//! jQuery-style delegated listeners and namespaced unbinding.

mod element;
mod event;
mod selector;

pub use element::Element;
pub use event::{DomEvent, DomHandler};
pub use selector::Selector;
