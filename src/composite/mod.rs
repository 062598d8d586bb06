//! Composite components: child registry, placeholder mounting and delegated child events.

mod core;
mod registry;

pub use self::core::{CompositeView, PlaceOptions, RegisterOptions};
