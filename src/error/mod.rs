mod types;

pub use types::{Result, ViewError};
