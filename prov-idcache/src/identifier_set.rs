//! Indexed identifiers of one entity plus a non-owning link to the live object

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use crate::compact_set::CompactSet;
use crate::proxy::IdentifierProxy;

/// Identifiers tracked for one entity
///
/// The entity itself is owned elsewhere. The set only keeps a `Weak`
/// back-reference, so dropping the last `Arc` makes
/// [`live_entity`](Self::live_entity) report `None`.
pub struct IdentifierSet<E> {
    identifiers: CompactSet<IdentifierProxy>,
    entity: Weak<E>,
}

impl<E> IdentifierSet<E> {
    pub fn new() -> Self {
        Self {
            identifiers: CompactSet::new(),
            entity: Weak::new(),
        }
    }

    pub fn from_identifiers(identifiers: impl IntoIterator<Item = IdentifierProxy>) -> Self {
        Self {
            identifiers: identifiers.into_iter().collect(),
            entity: Weak::new(),
        }
    }

    pub fn identifiers(&self) -> &CompactSet<IdentifierProxy> {
        &self.identifiers
    }

    pub(crate) fn identifiers_mut(&mut self) -> &mut CompactSet<IdentifierProxy> {
        &mut self.identifiers
    }

    /// Point the back-reference at `entity` without extending its lifetime
    pub fn attach(&mut self, entity: &Arc<E>) {
        self.entity = Arc::downgrade(entity);
    }

    pub fn detach(&mut self) {
        self.entity = Weak::new();
    }

    /// The backing entity, if some owner still holds it
    pub fn live_entity(&self) -> Option<Arc<E>> {
        self.entity.upgrade()
    }

    pub fn has_live_entity(&self) -> bool {
        self.entity.strong_count() > 0
    }

    pub fn has_valid_identifier(&self) -> bool {
        self.identifiers.iter().any(IdentifierProxy::is_valid)
    }

    /// Valid identifiers in key order
    pub fn sorted_valid(&self) -> Vec<IdentifierProxy> {
        let mut identifiers: Vec<IdentifierProxy> = self
            .identifiers
            .iter()
            .filter(|id| id.is_valid())
            .cloned()
            .collect();
        identifiers.sort();
        identifiers
    }

    /// Number of tracked identifiers that also appear in `query`
    pub fn overlap(&self, query: &HashSet<IdentifierProxy>) -> usize {
        self.identifiers.iter().filter(|id| query.contains(*id)).count()
    }
}

impl<E> Default for IdentifierSet<E> {
    fn default() -> Self {
        Self::new()
    }
}
