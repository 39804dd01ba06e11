pub mod classify;
pub mod clusters;
pub mod engine;
pub mod executor;
pub mod geo;
pub mod normalize;
pub mod priority;
pub mod similarity;

pub use crate::domain::model::{DeleteEntry, DuplicateGroup, Place, Report};
pub use crate::domain::ports::{PlaceStore, Storage};
pub use crate::utils::error::Result;
