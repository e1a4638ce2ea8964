pub mod catalog;
pub mod config;
pub mod database;
pub mod metadata;
pub mod models;
pub mod recommendations;
pub mod saved;

pub use catalog::{InMemoryCatalog, ReferenceCatalog};
pub use config::RecommenderConfig;
pub use metadata::MetadataClient;
pub use models::EntityKind;
pub use recommendations::{RecommendationEngine, RecommendationRequest, RecommendationSet};
pub use saved::SavedItemStore;
