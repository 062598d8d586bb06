//! List views kept in step with an ordered collection.

mod core;

pub use self::core::{ChildFactory, CollectionView, CollectionViewBuilder, EmptyContent};
