pub mod partitioner;
pub mod providers;
pub mod recommendations;

pub use partitioner::{build_partitioner, HashRing, ModuloPartitioner, Partitioner};
pub use recommendations::{RecommendationService, RecommendationSettings};
