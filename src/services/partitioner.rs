use std::collections::BTreeMap;
use xxhash_rust::xxh3::{xxh3_128, xxh3_64};

use crate::config::RoutingStrategy;
use crate::error::{AppError, AppResult};

/// Maps a user identifier onto one backend endpoint
///
/// Implementations are pure functions of the key and the endpoint list, so the
/// gateway holds no per-user state.
pub trait Partitioner: Send + Sync {
    /// Index into `endpoints()` chosen for `key`
    fn index_for(&self, key: &str) -> usize;

    fn endpoints(&self) -> &[String];

    fn route(&self, key: &str) -> &str {
        &self.endpoints()[self.index_for(key)]
    }
}

/// Builds the partitioner selected by configuration
pub fn build_partitioner(
    strategy: RoutingStrategy,
    endpoints: Vec<String>,
    virtual_nodes: usize,
) -> AppResult<Box<dyn Partitioner>> {
    Ok(match strategy {
        RoutingStrategy::Modulo => Box::new(ModuloPartitioner::new(endpoints)?),
        RoutingStrategy::Ring => Box::new(HashRing::new(endpoints, virtual_nodes)?),
    })
}

fn check_endpoints(endpoints: &[String]) -> AppResult<()> {
    if endpoints.is_empty() {
        return Err(AppError::Configuration(
            "At least one backend endpoint is required".to_string(),
        ));
    }
    Ok(())
}

/// 128-bit xxh3 digest reduced modulo the endpoint count
///
/// Any change to the endpoint list remaps most keys. That is acceptable while
/// each replica's cache can be rebuilt from the stores; use [`HashRing`] when
/// membership changes often.
pub struct ModuloPartitioner {
    endpoints: Vec<String>,
}

impl ModuloPartitioner {
    pub fn new(endpoints: Vec<String>) -> AppResult<Self> {
        check_endpoints(&endpoints)?;
        Ok(Self { endpoints })
    }
}

impl Partitioner for ModuloPartitioner {
    fn index_for(&self, key: &str) -> usize {
        let digest = xxh3_128(key.as_bytes());
        (digest % self.endpoints.len() as u128) as usize
    }

    fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}

/// Consistent-hash ring with virtual nodes
///
/// Adding or removing one endpoint moves roughly `1/n` of the keys.
pub struct HashRing {
    endpoints: Vec<String>,
    /// ring position -> endpoint index
    ring: BTreeMap<u64, usize>,
}

impl HashRing {
    pub fn new(endpoints: Vec<String>, virtual_nodes: usize) -> AppResult<Self> {
        check_endpoints(&endpoints)?;

        let mut ring = BTreeMap::new();
        for (idx, endpoint) in endpoints.iter().enumerate() {
            for replica in 0..virtual_nodes.max(1) {
                let position = xxh3_64(format!("{}#{}", endpoint, replica).as_bytes());
                // First writer wins on the (unlikely) position collision
                ring.entry(position).or_insert(idx);
            }
        }

        Ok(Self { endpoints, ring })
    }
}

impl Partitioner for HashRing {
    fn index_for(&self, key: &str) -> usize {
        let hash = xxh3_64(key.as_bytes());
        self.ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, idx)| *idx)
            .unwrap_or(0)
    }

    fn endpoints(&self) -> &[String] {
        &self.endpoints
    }
}
