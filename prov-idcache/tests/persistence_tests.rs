//! Cache persistence and lifecycle tests
//!
//! Uses temp directories for cache files; nothing touches the user's
//! data directory.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use prov_idcache::{
    CacheStore, CandidateState, Identifiable, IdentifiableProxy, IdentifierProxy,
    IdentifierResolver, Person, ProvEntity, Resource, Tool,
};
use tempfile::TempDir;
use uuid::Uuid;

type Snapshot = HashMap<IdentifiableProxy, HashSet<IdentifierProxy>>;

fn resolver_at(dir: &TempDir) -> IdentifierResolver<ProvEntity> {
    IdentifierResolver::new()
        .with_store(CacheStore::json_lines(dir.path().join("identifiers.jsonl")))
}

fn snapshot(resolver: &IdentifierResolver<ProvEntity>) -> Snapshot {
    resolver
        .lock()
        .unwrap()
        .records()
        .into_iter()
        .map(|record| (record.proxy, record.identifiers.into_iter().collect()))
        .collect()
}

fn sample_entities() -> Vec<Arc<ProvEntity>> {
    vec![
        Arc::new(
            Person::new(Uuid::new_v4(), "Grace Hopper")
                .with_identifier(IdentifierProxy::new("orcid", "id", "0000-0002-1825-0097"))
                .with_identifier(IdentifierProxy::new("name", "full", "Grace Hopper").with_context(""))
                .into(),
        ),
        Arc::new(
            Resource::new(Uuid::new_v4())
                .with_location("/data/b.csv")
                .with_identifier(IdentifierProxy::new("fs", "path", "/data/b.csv"))
                .with_identifier(IdentifierProxy::new("hash", "md5", "abc123"))
                .into(),
        ),
        Arc::new(
            Tool::new(Uuid::new_v4(), "samtools")
                .with_identifier(IdentifierProxy::new("biotools", "id", "samtools").with_context("v1"))
                .into(),
        ),
    ]
}

#[test]
fn test_round_trip_reproduces_index() {
    let dir = TempDir::new().unwrap();
    let entities = sample_entities();

    let first = resolver_at(&dir);
    first.lock().unwrap().register(&entities);
    let expected = snapshot(&first);
    assert_eq!(first.stop(), 3);

    let second = resolver_at(&dir);
    assert_eq!(second.start(), 3);
    assert_eq!(snapshot(&second), expected);
}

#[test]
fn test_loaded_entries_resolve_without_live_objects() {
    let dir = TempDir::new().unwrap();
    {
        let first = resolver_at(&dir);
        first.lock().unwrap().register(&sample_entities());
        first.stop();
    }

    let second = resolver_at(&dir);
    second.start();
    let mut guard = second.lock().unwrap();
    let hits = guard
        .resolve(5, &[IdentifierProxy::new("hash", "md5", "abc123")])
        .unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].relevance, 1.0);
    assert!(matches!(hits[0].state, CandidateState::Detached));
    assert!(guard.lookup(hits[0].proxy.system_id()).is_none());
}

#[test]
fn test_entries_without_valid_identifiers_are_not_written() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver_at(&dir);

    let mixed: Arc<ProvEntity> = Arc::new(
        Resource::new(Uuid::new_v4())
            .with_identifier(IdentifierProxy::new("fs", "path", ""))
            .with_identifier(IdentifierProxy::new("hash", "md5", "abc123"))
            .into(),
    );
    let hollow: Arc<ProvEntity> = Arc::new(
        Resource::new(Uuid::new_v4())
            .with_identifier(IdentifierProxy::new("fs", "path", ""))
            .into(),
    );
    resolver.lock().unwrap().register(&[mixed.clone(), hollow]);
    assert_eq!(resolver.stop(), 1);

    let text = std::fs::read_to_string(dir.path().join("identifiers.jsonl")).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.contains("abc123"));
    assert!(!text.contains("\"fs\""));
}

#[test]
fn test_empty_index_does_not_overwrite_existing_cache() {
    let dir = TempDir::new().unwrap();
    {
        let first = resolver_at(&dir);
        first.lock().unwrap().register(&sample_entities());
        first.stop();
    }
    let before = std::fs::read_to_string(dir.path().join("identifiers.jsonl")).unwrap();

    let empty = resolver_at(&dir);
    assert_eq!(empty.stop(), 0);

    let after = std::fs::read_to_string(dir.path().join("identifiers.jsonl")).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_corrupt_cache_starts_empty() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("identifiers.jsonl");
    std::fs::write(
        &path,
        "{\"system_id\":\"00000000-0000-0000-0000-000000000001\",\"kind\":\"Tool\",\
         \"identifiers\":[{\"schema_id\":\"biotools\",\"type\":\"id\",\"id\":\"bwa\"}]}\n\
         this is not json\n",
    )
    .unwrap();

    let resolver = resolver_at(&dir);
    assert!(resolver.read_cache().is_err());

    let resolver = resolver_at(&dir);
    assert_eq!(resolver.start(), 0);
    assert!(resolver.lock().unwrap().is_empty());
}

#[test]
fn test_missing_id_element_is_dropped_on_read() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("identifiers.jsonl"),
        "{\"system_id\":\"00000000-0000-0000-0000-000000000002\",\"kind\":\"Resource\",\
         \"identifiers\":[{\"schema_id\":\"fs\",\"type\":\"path\"},\
         {\"schema_id\":\"hash\",\"type\":\"md5\",\"id\":\"abc123\"}]}\n\
         {\"system_id\":\"00000000-0000-0000-0000-000000000003\",\"kind\":\"Resource\",\
         \"identifiers\":[{\"schema_id\":\"fs\",\"type\":\"path\"}]}\n",
    )
    .unwrap();

    let resolver = resolver_at(&dir);
    assert_eq!(resolver.start(), 1);

    let guard = resolver.lock().unwrap();
    let records = guard.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].identifiers, vec![IdentifierProxy::new("hash", "md5", "abc123")]);
}

#[test]
fn test_start_without_cache_file() {
    let dir = TempDir::new().unwrap();
    let resolver = resolver_at(&dir);
    assert_eq!(resolver.start(), 0);
    assert!(resolver.lock().unwrap().is_empty());
}

#[test]
fn test_resolver_without_store_is_memory_only() {
    let resolver: IdentifierResolver<ProvEntity> = IdentifierResolver::new();
    resolver.lock().unwrap().register(&sample_entities());
    assert_eq!(resolver.start(), 0);
    assert_eq!(resolver.stop(), 0);
    assert_eq!(resolver.lock().unwrap().len(), 3);
}

#[test]
fn test_identifier_order_is_stable_across_writes() {
    let dir = TempDir::new().unwrap();
    let entities = sample_entities();
    let resolver = resolver_at(&dir);
    resolver.lock().unwrap().register(&entities[1..2]);

    resolver.stop();
    let first = std::fs::read_to_string(dir.path().join("identifiers.jsonl")).unwrap();
    resolver.stop();
    let second = std::fs::read_to_string(dir.path().join("identifiers.jsonl")).unwrap();

    assert_eq!(first, second);
    let fs_at = first.find("\"fs\"").unwrap();
    let hash_at = first.find("\"hash\"").unwrap();
    assert!(fs_at < hash_at);
}

#[test]
fn test_stripped_entity_stays_dropped_after_restart() {
    let dir = TempDir::new().unwrap();
    let entities = sample_entities();
    let first = resolver_at(&dir);
    first.lock().unwrap().register(&entities);

    let mut stripped = Resource::new(entities[1].system_id());
    stripped.identifiers = vec![IdentifierProxy::new("fs", "path", "")];
    let stripped: Arc<ProvEntity> = Arc::new(stripped.into());
    {
        let mut guard = first.lock().unwrap();
        guard.update(&[stripped.clone()]).unwrap();
        assert_eq!(guard.len(), 2);
        assert!(guard.find(stripped.system_id()).is_none());
    }
    first.stop();

    let second = resolver_at(&dir);
    second.start();
    assert_eq!(second.lock().unwrap().len(), 2);
    assert_eq!(snapshot(&second), snapshot(&first));
}
