//! Error types for prov-idcache
//!
//! Precondition violations are rejected before any mutation, so the index
//! is left exactly as it was. Persistence errors are surfaced here but the
//! lifecycle hooks (`start`/`stop`) log them instead of propagating.

use thiserror::Error;
use uuid::Uuid;

use crate::proxy::EntityKind;

/// Result type for cache operations
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Identifier cache error type
#[derive(Debug, Error)]
pub enum CacheError {
    /// `resolve` called without identifiers
    #[error("Cannot resolve an empty identifier set")]
    EmptyQuery,

    /// `resolve` called with a candidate limit of zero
    #[error("Candidate limit must be at least 1")]
    ZeroCandidateLimit,

    /// `update` called for an entity that was never registered
    #[error("Entity {kind} {system_id} is not registered")]
    UnknownEntity { system_id: Uuid, kind: EntityKind },

    /// Persisted data could not be decoded or encoded
    #[error("Cache format error: {0}")]
    Codec(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A previous lock holder panicked; the index is no longer trusted
    #[error("Resolver lock poisoned")]
    LockPoisoned,

    /// prov-common error
    #[error("Common error: {0}")]
    Common(#[from] prov_common::Error),
}
