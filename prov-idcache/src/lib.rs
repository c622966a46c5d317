//! # prov-idcache
//!
//! Local identifiable-resolution cache for the provenance graph.
//!
//! Maps sets of external identifiers (paths, checksums, names, external IDs)
//! onto canonical person, resource and tool entities so that workflow code
//! can detect an entity it has already seen before minting a new one.
//!
//! ```no_run
//! use std::sync::Arc;
//! use prov_idcache::{CacheStore, IdentifierProxy, IdentifierResolver, ProvEntity, Resource};
//! use uuid::Uuid;
//!
//! let resolver = IdentifierResolver::<ProvEntity>::new()
//!     .with_store(CacheStore::json_lines("identifiers.jsonl"));
//! resolver.start();
//!
//! let checksum = IdentifierProxy::new("hash", "md5", "abc123");
//! let mut guard = resolver.lock()?;
//! if guard.resolve(5, &[checksum.clone()])?.is_empty() {
//!     let fresh: Arc<ProvEntity> =
//!         Arc::new(Resource::new(Uuid::new_v4()).with_identifier(checksum).into());
//!     guard.register(&[fresh]);
//! }
//! drop(guard);
//!
//! resolver.stop();
//! # Ok::<(), prov_idcache::CacheError>(())
//! ```

pub mod compact_set;
pub mod error;
pub mod identifier_set;
pub mod index;
pub mod models;
pub mod persistence;
pub mod proxy;
pub mod ranking;
pub mod resolver;

pub use crate::compact_set::CompactSet;
pub use crate::error::{CacheError, CacheResult};
pub use crate::identifier_set::IdentifierSet;
pub use crate::index::{IdentifierIndex, IndexStats};
pub use crate::models::{BlankEntityFactory, EntityFactory, Person, ProvEntity, Resource, Tool};
pub use crate::persistence::{CacheCodec, CacheRecord, CacheStore, JsonLinesCodec};
pub use crate::proxy::{EntityKind, Identifiable, IdentifiableProxy, Identifier, IdentifierProxy};
pub use crate::resolver::{
    Candidate, CandidateState, IdentifierResolver, ResolverGuard, ResolverOptions,
};
