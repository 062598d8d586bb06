//! Observable models and ordered collections.

mod collection;
mod core;

pub use collection::{Collection, CollectionEvent, CollectionEventKind, Comparator, compare_values};
pub use self::core::{Model, ModelEvent};
