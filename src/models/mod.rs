pub mod history;
pub mod recommendation;
pub mod user_id;

pub use history::HistoryRecord;
pub use recommendation::{CatalogEntry, RecommendationResult};
pub use user_id::{UserId, UserIdFormat, USER_ID_HEADER};

/// Fixed-length vector produced by the embedding provider
pub type Embedding = Vec<f32>;
