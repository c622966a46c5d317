//! Bidirectional identifier index
//!
//! Two maps are kept in lockstep:
//! - `targets`: entity proxy → [`IdentifierSet`] (identifiers + weak entity)
//! - `identifiers`: identifier proxy → set of entity proxies
//!
//! Every identifier in a target's set has that target in its reverse bucket
//! and every reverse bucket entry points at a target that tracks the
//! identifier. Reverse buckets never stay empty. Only valid identifiers
//! (non-empty value) are indexed.
//!
//! A missing reverse bucket for an identifier the forward map tracks is
//! index corruption and panics instead of being patched.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};
use uuid::Uuid;

use crate::compact_set::CompactSet;
use crate::error::{CacheError, CacheResult};
use crate::identifier_set::IdentifierSet;
use crate::persistence::CacheRecord;
use crate::proxy::{EntityKind, Identifiable, IdentifiableProxy, IdentifierProxy};
use crate::ranking::TopK;

/// Counts describing the index contents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub entities: usize,
    pub persons: usize,
    pub resources: usize,
    pub tools: usize,
    /// Distinct identifiers in the reverse map
    pub identifiers: usize,
    /// Entries whose entity object is still alive
    pub live_entities: usize,
}

/// Entity ↔ identifier index
pub struct IdentifierIndex<E> {
    targets: HashMap<IdentifiableProxy, IdentifierSet<E>>,
    identifiers: HashMap<IdentifierProxy, CompactSet<IdentifiableProxy>>,
}

fn valid_identifiers<E: Identifiable>(entity: &E) -> HashSet<IdentifierProxy> {
    entity
        .identifiers()
        .into_iter()
        .filter(IdentifierProxy::is_valid)
        .collect()
}

impl<E> IdentifierIndex<E> {
    pub fn new() -> Self {
        Self {
            targets: HashMap::new(),
            identifiers: HashMap::new(),
        }
    }

    /// Number of indexed entities
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn clear(&mut self) {
        self.targets.clear();
        self.identifiers.clear();
    }

    pub fn contains(&self, proxy: &IdentifiableProxy) -> bool {
        self.targets.contains_key(proxy)
    }

    pub fn get(&self, proxy: &IdentifiableProxy) -> Option<&IdentifierSet<E>> {
        self.targets.get(proxy)
    }

    pub(crate) fn get_mut(&mut self, proxy: &IdentifiableProxy) -> Option<&mut IdentifierSet<E>> {
        self.targets.get_mut(proxy)
    }

    /// Entities currently tracking `identifier`
    pub fn candidates(&self, identifier: &IdentifierProxy) -> Option<&CompactSet<IdentifiableProxy>> {
        self.identifiers.get(identifier)
    }

    /// Proxy of the indexed entity with this system id, whatever its kind
    pub fn find(&self, system_id: Uuid) -> Option<IdentifiableProxy> {
        EntityKind::ALL
            .into_iter()
            .map(|kind| IdentifiableProxy::new(system_id, kind))
            .find(|proxy| self.targets.contains_key(proxy))
    }

    /// Live entity registered under `system_id`
    ///
    /// `None` if unknown or if its owner has dropped it.
    pub fn lookup(&self, system_id: Uuid) -> Option<Arc<E>> {
        EntityKind::ALL.into_iter().find_map(|kind| {
            self.targets
                .get(&IdentifiableProxy::new(system_id, kind))
                .and_then(IdentifierSet::live_entity)
        })
    }

    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            entities: self.targets.len(),
            identifiers: self.identifiers.len(),
            ..IndexStats::default()
        };
        for (proxy, set) in &self.targets {
            match proxy.kind() {
                EntityKind::Person => stats.persons += 1,
                EntityKind::Resource => stats.resources += 1,
                EntityKind::Tool => stats.tools += 1,
            }
            if set.has_live_entity() {
                stats.live_entities += 1;
            }
        }
        stats
    }

    /// Remove an entity and all its reverse entries; `false` if unknown
    pub fn unregister_proxy(&mut self, proxy: &IdentifiableProxy) -> bool {
        let Some(mut set) = self.targets.remove(proxy) else {
            trace!(entity = %proxy, "Unregister of unknown entity ignored");
            return false;
        };

        for identifier in set.identifiers() {
            self.unlink(proxy, identifier);
        }
        set.identifiers_mut().clear();
        set.detach();

        debug!(entity = %proxy, "Unregistered entity");
        true
    }

    /// Merge a persisted record into the index
    ///
    /// Invalid identifiers are dropped. Returns `false` if nothing valid
    /// remained and the record was skipped.
    pub fn insert_record(&mut self, record: CacheRecord) -> bool {
        let CacheRecord { proxy, identifiers } = record;
        let valid: Vec<IdentifierProxy> = identifiers.into_iter().filter(IdentifierProxy::is_valid).collect();
        if valid.is_empty() {
            trace!(entity = %proxy, "Skipping record without valid identifiers");
            return false;
        }

        let set = self.targets.entry(proxy).or_default();
        let added: Vec<IdentifierProxy> = valid
            .into_iter()
            .filter(|identifier| set.identifiers_mut().insert(identifier.clone()))
            .collect();
        for identifier in &added {
            self.link(proxy, identifier);
        }
        true
    }

    /// Snapshot of every entry holding at least one valid identifier
    ///
    /// Identifiers within a record are in key order.
    pub fn records(&self) -> Vec<CacheRecord> {
        self.targets
            .iter()
            .filter(|(_, set)| set.has_valid_identifier())
            .map(|(proxy, set)| CacheRecord {
                proxy: *proxy,
                identifiers: set.sorted_valid(),
            })
            .collect()
    }

    /// Score every entity sharing an identifier with `query`
    ///
    /// Relevance is the fraction of `query` the entity tracks, so it lies in
    /// `(0, 1]` for every returned candidate. Each entity is scored once even
    /// when it shares several queried identifiers. Invalid query identifiers
    /// are never indexed, so they only widen the denominator. At most
    /// `limit` results are returned, most relevant first.
    pub fn rank(&self, limit: usize, query: &HashSet<IdentifierProxy>) -> Vec<(IdentifiableProxy, f64)> {
        let mut processed: HashSet<IdentifiableProxy> = HashSet::new();
        let mut best = TopK::new(limit);

        for identifier in query {
            let Some(bucket) = self.identifiers.get(identifier) else {
                continue;
            };

            for proxy in bucket {
                if !processed.insert(*proxy) {
                    continue;
                }
                let Some(set) = self.targets.get(proxy) else {
                    panic!(
                        "identifier index corrupt: {} lists {} but it has no forward entry",
                        identifier, proxy
                    );
                };

                let relevance = set.overlap(query) as f64 / query.len() as f64;
                trace!(entity = %proxy, relevance, "Scored candidate");
                best.push(*proxy, relevance);
            }
        }

        best.into_sorted_vec()
    }

    /// Walk both maps and check they mirror each other
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let forward_ok = self.targets.iter().all(|(proxy, set)| {
            set.identifiers().iter().all(|identifier| {
                self.identifiers
                    .get(identifier)
                    .is_some_and(|bucket| bucket.contains(proxy))
            })
        });
        let reverse_ok = self.identifiers.iter().all(|(identifier, bucket)| {
            !bucket.is_empty()
                && bucket.iter().all(|proxy| {
                    self.targets
                        .get(proxy)
                        .is_some_and(|set| set.identifiers().contains(identifier))
                })
        });
        forward_ok && reverse_ok
    }

    fn link(&mut self, proxy: IdentifiableProxy, identifier: &IdentifierProxy) {
        self.identifiers
            .entry(identifier.clone())
            .or_default()
            .insert(proxy);
    }

    fn unlink(&mut self, proxy: &IdentifiableProxy, identifier: &IdentifierProxy) {
        let Some(bucket) = self.identifiers.get_mut(identifier) else {
            panic!(
                "identifier index corrupt: {} tracks {} but no reverse bucket exists",
                proxy, identifier
            );
        };
        if !bucket.remove(proxy) {
            panic!(
                "identifier index corrupt: reverse bucket for {} does not list {}",
                identifier, proxy
            );
        }
        if bucket.is_empty() {
            self.identifiers.remove(identifier);
        }
    }
}

impl<E: Identifiable> IdentifierIndex<E> {
    /// Start tracking `entities`
    ///
    /// Entities without a valid identifier are skipped, since they could
    /// never be matched. Known entities are updated instead. Returns the
    /// number of newly indexed entities.
    pub fn register(&mut self, entities: &[Arc<E>]) -> usize {
        let mut added = 0;
        for entity in entities {
            let proxy = entity.proxy();
            let identifiers = valid_identifiers(&**entity);
            if identifiers.is_empty() {
                trace!(entity = %proxy, "Skipping entity without valid identifiers");
                continue;
            }
            if self.targets.contains_key(&proxy) {
                self.apply_update(proxy, entity);
                continue;
            }

            let mut set = IdentifierSet::from_identifiers(identifiers.iter().cloned());
            set.attach(entity);
            self.targets.insert(proxy, set);
            for identifier in &identifiers {
                self.link(proxy, identifier);
            }

            debug!(entity = %proxy, identifiers = identifiers.len(), "Registered entity");
            added += 1;
        }
        added
    }

    /// Bring the indexed identifiers of `entities` in line with their
    /// current identifiers and refresh the back-reference
    ///
    /// An entity left without valid identifiers is dropped from the index.
    ///
    /// Fails without touching the index if any entity is not registered.
    pub fn update(&mut self, entities: &[Arc<E>]) -> CacheResult<()> {
        if let Some(unknown) = entities
            .iter()
            .map(|entity| entity.proxy())
            .find(|proxy| !self.targets.contains_key(proxy))
        {
            return Err(CacheError::UnknownEntity {
                system_id: unknown.system_id(),
                kind: unknown.kind(),
            });
        }

        for entity in entities {
            self.apply_update(entity.proxy(), entity);
        }
        Ok(())
    }

    /// Stop tracking `entities`; unknown ones are ignored
    ///
    /// Returns the number of entities removed.
    pub fn unregister(&mut self, entities: &[Arc<E>]) -> usize {
        entities
            .iter()
            .filter(|entity| self.unregister_proxy(&entity.proxy()))
            .count()
    }

    fn apply_update(&mut self, proxy: IdentifiableProxy, entity: &Arc<E>) {
        let current = valid_identifiers(&**entity);
        let Some(set) = self.targets.get_mut(&proxy) else {
            return;
        };

        let stale: Vec<IdentifierProxy> = set
            .identifiers()
            .iter()
            .filter(|identifier| !current.contains(*identifier))
            .cloned()
            .collect();
        let fresh: Vec<IdentifierProxy> = current
            .into_iter()
            .filter(|identifier| !set.identifiers().contains(identifier))
            .collect();

        for identifier in &stale {
            set.identifiers_mut().remove(identifier);
        }
        for identifier in &fresh {
            set.identifiers_mut().insert(identifier.clone());
        }
        set.attach(entity);

        for identifier in &stale {
            self.unlink(&proxy, identifier);
        }
        for identifier in &fresh {
            self.link(proxy, identifier);
        }

        // Nothing left to match on
        if self.targets.get(&proxy).is_some_and(|set| set.identifiers().is_empty()) {
            self.unregister_proxy(&proxy);
            return;
        }

        if !stale.is_empty() || !fresh.is_empty() {
            debug!(
                entity = %proxy,
                added = fresh.len(),
                removed = stale.len(),
                "Updated entity identifiers"
            );
        }
    }
}

impl<E> Default for IdentifierIndex<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProvEntity, Resource, Tool};

    fn path(value: &str) -> IdentifierProxy {
        IdentifierProxy::new("fs", "path", value)
    }

    fn md5(value: &str) -> IdentifierProxy {
        IdentifierProxy::new("hash", "md5", value)
    }

    fn resource(ids: &[IdentifierProxy]) -> Arc<ProvEntity> {
        let mut resource = Resource::new(Uuid::new_v4());
        resource.identifiers = ids.to_vec();
        Arc::new(resource.into())
    }

    fn with_identifiers(entity: &ProvEntity, ids: &[IdentifierProxy]) -> Arc<ProvEntity> {
        let mut replacement = entity.clone();
        if let ProvEntity::Resource(r) = &mut replacement {
            r.identifiers = ids.to_vec();
        }
        Arc::new(replacement)
    }

    #[test]
    fn test_register_links_both_directions() {
        let mut index = IdentifierIndex::new();
        let r = resource(&[path("/a"), md5("abc")]);

        assert_eq!(index.register(&[r.clone()]), 1);
        assert!(index.is_consistent());
        assert!(index.candidates(&path("/a")).unwrap().contains(&r.proxy()));
        assert!(index.candidates(&md5("abc")).unwrap().contains(&r.proxy()));
        assert_eq!(index.get(&r.proxy()).unwrap().identifiers().len(), 2);
    }

    #[test]
    fn test_register_without_valid_identifiers_is_noop() {
        let mut index = IdentifierIndex::new();
        let bare = resource(&[]);
        let empty_value = resource(&[path("")]);

        assert_eq!(index.register(&[bare, empty_value]), 0);
        assert!(index.is_empty());
        assert_eq!(index.stats().identifiers, 0);
    }

    #[test]
    fn test_register_twice_is_idempotent() {
        let mut index = IdentifierIndex::new();
        let r = resource(&[path("/a"), md5("abc")]);

        index.register(&[r.clone()]);
        let before = index.stats();
        assert_eq!(index.register(&[r.clone()]), 0);

        assert_eq!(index.stats(), before);
        assert!(index.is_consistent());
    }

    #[test]
    fn test_update_applies_difference() {
        let mut index = IdentifierIndex::new();
        let original = resource(&[path("/a"), md5("abc")]);
        index.register(&[original.clone()]);

        let moved = with_identifiers(&original, &[path("/b"), md5("abc")]);
        index.update(&[moved.clone()]).unwrap();

        assert!(index.candidates(&path("/a")).is_none());
        assert!(index.candidates(&path("/b")).unwrap().contains(&moved.proxy()));
        assert!(index.is_consistent());

        // Back-reference now points at the replacement object
        let live = index.lookup(moved.system_id()).unwrap();
        assert!(Arc::ptr_eq(&live, &moved));
    }

    #[test]
    fn test_update_unknown_entity_leaves_index_untouched() {
        let mut index = IdentifierIndex::new();
        let known = resource(&[path("/a")]);
        index.register(&[known.clone()]);

        let changed = with_identifiers(&known, &[path("/z")]);
        let stranger = resource(&[path("/b")]);
        let err = index.update(&[changed, stranger.clone()]).unwrap_err();

        assert!(matches!(
            err,
            CacheError::UnknownEntity { system_id, .. } if system_id == stranger.system_id()
        ));
        assert!(index.candidates(&path("/a")).is_some());
        assert!(index.candidates(&path("/z")).is_none());
    }

    #[test]
    fn test_update_to_no_identifiers_drops_entity() {
        let mut index = IdentifierIndex::new();
        let r = resource(&[path("/a")]);
        let other = resource(&[path("/b")]);
        index.register(&[r.clone(), other.clone()]);

        let stripped = with_identifiers(&r, &[path("")]);
        index.update(&[stripped.clone()]).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.find(stripped.system_id()).is_none());
        assert!(index.lookup(stripped.system_id()).is_none());
        assert!(index.candidates(&path("/a")).is_none());
        assert_eq!(index.records().len(), 1);
        assert!(index.is_consistent());
    }

    #[test]
    fn test_unregister_removes_exclusive_identifiers_only() {
        let mut index = IdentifierIndex::new();
        let shared = IdentifierProxy::new("tool", "name", "samtools");
        let a = resource(&[path("/a"), shared.clone()]);
        let b = resource(&[path("/b"), shared.clone()]);
        index.register(&[a.clone(), b.clone()]);

        assert_eq!(index.unregister(&[a.clone()]), 1);
        assert!(index.lookup(a.system_id()).is_none());
        assert!(index.candidates(&path("/a")).is_none());
        assert_eq!(index.candidates(&shared).unwrap().len(), 1);
        assert!(index.is_consistent());

        // Unknown is ignored
        assert_eq!(index.unregister(&[a]), 0);
    }

    #[test]
    fn test_lookup_scans_every_kind() {
        let mut index = IdentifierIndex::new();
        let tool: Arc<ProvEntity> = Arc::new(
            Tool::new(Uuid::new_v4(), "bwa")
                .with_identifier(IdentifierProxy::new("biotools", "id", "bwa"))
                .into(),
        );
        index.register(&[tool.clone()]);

        assert_eq!(index.find(tool.system_id()), Some(tool.proxy()));
        assert!(index.lookup(tool.system_id()).is_some());
        assert!(index.lookup(Uuid::new_v4()).is_none());

        drop(tool);
        assert_eq!(index.stats().live_entities, 0);
    }

    #[test]
    fn test_rank_scores_overlap_fraction() {
        let mut index = IdentifierIndex::new();
        let r1 = resource(&[path("/data/a.csv")]);
        let r2 = resource(&[path("/data/b.csv"), md5("abc123")]);
        index.register(&[r1.clone(), r2.clone()]);

        let query: HashSet<_> = [path("/data/a.csv"), md5("abc123"), md5("zzz")].into_iter().collect();
        let ranked = index.rank(10, &query);

        assert_eq!(ranked.len(), 2);
        for (_, relevance) in &ranked {
            assert!((*relevance - 1.0 / 3.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_shared_identifiers_counted_once_per_entity() {
        let mut index = IdentifierIndex::new();
        let r = resource(&[path("/a"), md5("abc")]);
        index.register(&[r.clone()]);

        let query: HashSet<_> = [path("/a"), md5("abc")].into_iter().collect();
        let ranked = index.rank(5, &query);
        assert_eq!(ranked, vec![(r.proxy(), 1.0)]);
    }

    #[test]
    fn test_records_skip_invalid_and_sort() {
        let mut index: IdentifierIndex<ProvEntity> = IdentifierIndex::new();
        let proxy = IdentifiableProxy::new(Uuid::new_v4(), EntityKind::Person);
        assert!(index.insert_record(CacheRecord {
            proxy,
            identifiers: vec![
                IdentifierProxy::new("orcid", "id", "0000-0001"),
                IdentifierProxy::new("email", "addr", ""),
                IdentifierProxy::new("name", "full", "Ada Lovelace"),
            ],
        }));
        assert!(!index.insert_record(CacheRecord {
            proxy: IdentifiableProxy::new(Uuid::new_v4(), EntityKind::Tool),
            identifiers: vec![IdentifierProxy::new("biotools", "id", "")],
        }));

        let records = index.records();
        assert_eq!(records.len(), 1);
        let schemas: Vec<&str> = records[0].identifiers.iter().map(|id| id.schema_id()).collect();
        assert_eq!(schemas, vec!["name", "orcid"]);
        assert!(index.is_consistent());
    }

    #[test]
    fn test_insert_record_merges_duplicates() {
        let mut index: IdentifierIndex<ProvEntity> = IdentifierIndex::new();
        let proxy = IdentifiableProxy::new(Uuid::new_v4(), EntityKind::Resource);
        index.insert_record(CacheRecord { proxy, identifiers: vec![path("/a")] });
        index.insert_record(CacheRecord { proxy, identifiers: vec![path("/a"), md5("abc")] });

        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&proxy).unwrap().identifiers().len(), 2);
        assert_eq!(index.candidates(&path("/a")).unwrap().len(), 1);
        assert!(index.is_consistent());
    }
}
