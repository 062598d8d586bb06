//! Base component layer: element binding, event specs and teardown.

mod core;
mod events;

pub use self::core::{Component, ViewBase, ViewOptions, delegate_events, install};
pub use events::{EventMap, EventSpec, Handler, HandlerFn, split_event_key};
