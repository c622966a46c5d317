//! Identifiable resolution service
//!
//! [`IdentifierResolver`] owns the index behind a single mutex. Every index
//! operation lives on [`ResolverGuard`], which only [`IdentifierResolver::lock`]
//! hands out, so holding the lock is checked at compile time. Callers keep
//! the guard across a sequence that must appear atomic, typically
//! resolve → (maybe) register. Dropping the guard releases the lock.
//!
//! # Lifecycle
//!
//! - [`start`](IdentifierResolver::start) loads the persisted cache. Any
//!   failure is logged and the resolver continues with an empty index.
//! - [`stop`](IdentifierResolver::stop) writes the index back. Any failure
//!   is logged and the in-memory state is simply not persisted.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use prov_common::config::ResolverConfig;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{CacheError, CacheResult};
use crate::identifier_set::IdentifierSet;
use crate::index::{IdentifierIndex, IndexStats};
use crate::models::EntityFactory;
use crate::persistence::{CacheRecord, CacheStore};
use crate::proxy::{Identifiable, IdentifiableProxy, Identifier, IdentifierProxy};

/// Resolver behaviour switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Build a stub entity (through the configured factory) for matches
    /// that have no live object
    pub instantiate_missing: bool,
}

impl From<&ResolverConfig> for ResolverOptions {
    fn from(config: &ResolverConfig) -> Self {
        Self {
            instantiate_missing: config.instantiate_missing,
        }
    }
}

/// What a resolve match is backed by
#[derive(Debug, Clone)]
pub enum CandidateState<E> {
    /// An owner still holds the entity; it is fully hydrated
    Live(Arc<E>),
    /// Freshly built from the index entry; carries identifiers only and
    /// must be hydrated from the record store before use
    Stub(Arc<E>),
    /// Known to the index but no object exists and none was built
    Detached,
}

/// One ranked resolve result
#[derive(Debug, Clone)]
pub struct Candidate<E> {
    pub proxy: IdentifiableProxy,
    /// Fraction of queried identifiers this entity carries, in `(0, 1]`
    pub relevance: f64,
    pub state: CandidateState<E>,
}

impl<E> Candidate<E> {
    /// Entity object behind this match, live or stub
    pub fn entity(&self) -> Option<&Arc<E>> {
        match &self.state {
            CandidateState::Live(entity) | CandidateState::Stub(entity) => Some(entity),
            CandidateState::Detached => None,
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.state, CandidateState::Live(_))
    }
}

/// Deduplicates entities by their identifiers
pub struct IdentifierResolver<E> {
    index: Mutex<IdentifierIndex<E>>,
    store: Option<CacheStore>,
    factory: Option<Box<dyn EntityFactory<E>>>,
    options: ResolverOptions,
}

impl<E: Identifiable> IdentifierResolver<E> {
    /// In-memory resolver without persistence
    pub fn new() -> Self {
        Self {
            index: Mutex::new(IdentifierIndex::new()),
            store: None,
            factory: None,
            options: ResolverOptions::default(),
        }
    }

    /// Persist through `store` on start/stop
    pub fn with_store(mut self, store: CacheStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_factory(mut self, factory: impl EntityFactory<E> + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> Option<&CacheStore> {
        self.store.as_ref()
    }

    pub fn options(&self) -> ResolverOptions {
        self.options
    }

    /// Acquire the index lock
    ///
    /// Blocks until the lock is free. Fails only if a previous holder
    /// panicked, since the index may then be half-updated.
    pub fn lock(&self) -> CacheResult<ResolverGuard<'_, E>> {
        let index = self.index.lock().map_err(|_| {
            error!("Identifier index lock poisoned");
            CacheError::LockPoisoned
        })?;
        Ok(ResolverGuard {
            index,
            factory: self.factory.as_deref(),
            options: self.options,
        })
    }

    /// Load the persisted cache, logging instead of failing
    ///
    /// Returns the number of records merged. On error the index is left
    /// empty.
    pub fn start(&self) -> usize {
        match self.read_cache() {
            Ok(count) => {
                info!(records = count, "Identifier cache started");
                count
            }
            Err(e) => {
                warn!(error = %e, "Failed to read identifier cache, starting empty");
                match self.lock() {
                    Ok(mut guard) => guard.index.clear(),
                    Err(e) => error!(error = %e, "Cannot clear index after failed cache read"),
                }
                0
            }
        }
    }

    /// Write the index back, logging instead of failing
    ///
    /// Returns the number of records written.
    pub fn stop(&self) -> usize {
        match self.write_cache() {
            Ok(count) => {
                info!(records = count, "Identifier cache stopped");
                count
            }
            Err(e) => {
                error!(error = %e, "Failed to write identifier cache, changes not persisted");
                0
            }
        }
    }

    /// Merge every persisted record into the index
    pub fn read_cache(&self) -> CacheResult<usize> {
        let Some(store) = &self.store else {
            debug!("No cache store configured, nothing to read");
            return Ok(0);
        };

        let mut guard = self.lock()?;
        let mut skipped = 0usize;
        let count = store.read(&mut |record| {
            if !guard.index.insert_record(record) {
                skipped += 1;
            }
        })?;

        if skipped > 0 {
            warn!(skipped, "Skipped cached entries without valid identifiers");
        }
        Ok(count - skipped)
    }

    /// Persist every entry that has at least one valid identifier
    ///
    /// An empty index writes nothing and leaves any existing file alone.
    pub fn write_cache(&self) -> CacheResult<usize> {
        let Some(store) = &self.store else {
            debug!("No cache store configured, nothing to write");
            return Ok(0);
        };

        let records = {
            let guard = self.lock()?;
            if guard.index.is_empty() {
                debug!("Identifier index empty, skipping cache write");
                return Ok(0);
            }
            guard.index.records()
        };

        store.write(&records)
    }
}

impl<E: Identifiable> Default for IdentifierResolver<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to the index; dropping it unlocks
pub struct ResolverGuard<'a, E> {
    index: MutexGuard<'a, IdentifierIndex<E>>,
    factory: Option<&'a dyn EntityFactory<E>>,
    options: ResolverOptions,
}

impl<E: Identifiable> ResolverGuard<'_, E> {
    /// Start tracking `entities`; already known ones are updated
    ///
    /// Returns the number of newly indexed entities.
    pub fn register(&mut self, entities: &[Arc<E>]) -> usize {
        self.index.register(entities)
    }

    /// Re-sync known entities with their current identifiers
    pub fn update(&mut self, entities: &[Arc<E>]) -> CacheResult<()> {
        self.index.update(entities)
    }

    /// Stop tracking `entities`; returns how many were known
    pub fn unregister(&mut self, entities: &[Arc<E>]) -> usize {
        self.index.unregister(entities)
    }

    /// Live entity registered under `system_id`
    pub fn lookup(&self, system_id: Uuid) -> Option<Arc<E>> {
        self.index.lookup(system_id)
    }

    /// Proxy of the indexed entity with this system id, live or not
    pub fn find(&self, system_id: Uuid) -> Option<IdentifiableProxy> {
        self.index.find(system_id)
    }

    pub fn contains(&self, proxy: &IdentifiableProxy) -> bool {
        self.index.contains(proxy)
    }

    /// Indexed identifiers of `proxy`, in key order
    pub fn identifiers_of(&self, proxy: &IdentifiableProxy) -> Option<Vec<IdentifierProxy>> {
        self.index.get(proxy).map(IdentifierSet::sorted_valid)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn stats(&self) -> IndexStats {
        self.index.stats()
    }

    /// Every entry with a valid identifier, as it would be persisted
    pub fn records(&self) -> Vec<CacheRecord> {
        self.index.records()
    }

    /// Rank indexed entities against `identifiers`
    ///
    /// Returns at most `candidate_limit` candidates, most relevant first.
    /// Duplicate identifiers count once. Invalid ones never match but still
    /// count toward the query size. No overlap at all yields an empty list.
    ///
    /// # Errors
    /// `EmptyQuery` if `identifiers` is empty, `ZeroCandidateLimit` if
    /// `candidate_limit` is 0. The index is not touched in either case.
    pub fn resolve<I: Identifier>(
        &mut self,
        candidate_limit: usize,
        identifiers: &[I],
    ) -> CacheResult<Vec<Candidate<E>>> {
        if identifiers.is_empty() {
            return Err(CacheError::EmptyQuery);
        }
        if candidate_limit == 0 {
            return Err(CacheError::ZeroCandidateLimit);
        }

        let query: HashSet<IdentifierProxy> = identifiers
            .iter()
            .map(Identifier::to_proxy)
            .collect();
        if !query.iter().any(IdentifierProxy::is_valid) {
            debug!("Resolve query has no valid identifiers");
            return Ok(Vec::new());
        }

        let ranked = self.index.rank(candidate_limit, &query);
        let candidates: Vec<Candidate<E>> = ranked
            .into_iter()
            .map(|(proxy, relevance)| Candidate {
                proxy,
                relevance,
                state: self.materialize(&proxy),
            })
            .collect();

        debug!(
            query = query.len(),
            candidates = candidates.len(),
            limit = candidate_limit,
            "Resolved identifiers"
        );
        Ok(candidates)
    }

    fn materialize(&mut self, proxy: &IdentifiableProxy) -> CandidateState<E> {
        let Some(set) = self.index.get_mut(proxy) else {
            panic!("identifier index corrupt: ranked {} has no forward entry", proxy);
        };
        if let Some(entity) = set.live_entity() {
            return CandidateState::Live(entity);
        }

        match self.factory {
            Some(factory) if self.options.instantiate_missing => {
                let entity = factory.instantiate(proxy, set.sorted_valid());
                set.attach(&entity);
                debug!(entity = %proxy, "Instantiated stub entity");
                CandidateState::Stub(entity)
            }
            _ => CandidateState::Detached,
        }
    }
}
