//! Provenance entities and the kind-keyed factory
//!
//! Persons, resources and tools are owned by the workflow code. The cache
//! works against the [`Identifiable`] trait, and [`ProvEntity`] is the
//! tagged union used where one container has to hold every kind.

use std::sync::Arc;
use uuid::Uuid;

use crate::proxy::{EntityKind, Identifiable, IdentifiableProxy, IdentifierProxy};

/// Person taking part in a workflow (author, operator, reviewer)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Person {
    pub system_id: Uuid,
    pub name: String,
    pub identifiers: Vec<IdentifierProxy>,
}

/// Data resource consumed or produced by a workflow step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub system_id: Uuid,
    pub location: Option<String>,
    pub identifiers: Vec<IdentifierProxy>,
}

/// Software tool used by a workflow step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tool {
    pub system_id: Uuid,
    pub name: String,
    pub version: Option<String>,
    pub identifiers: Vec<IdentifierProxy>,
}

impl Person {
    pub fn new(system_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            system_id,
            name: name.into(),
            identifiers: Vec::new(),
        }
    }

    pub fn with_identifier(mut self, identifier: IdentifierProxy) -> Self {
        self.identifiers.push(identifier);
        self
    }
}

impl Resource {
    pub fn new(system_id: Uuid) -> Self {
        Self {
            system_id,
            location: None,
            identifiers: Vec::new(),
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_identifier(mut self, identifier: IdentifierProxy) -> Self {
        self.identifiers.push(identifier);
        self
    }
}

impl Tool {
    pub fn new(system_id: Uuid, name: impl Into<String>) -> Self {
        Self {
            system_id,
            name: name.into(),
            version: None,
            identifiers: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_identifier(mut self, identifier: IdentifierProxy) -> Self {
        self.identifiers.push(identifier);
        self
    }
}

/// Any provenance entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvEntity {
    Person(Person),
    Resource(Resource),
    Tool(Tool),
}

impl ProvEntity {
    /// Build an identifier-only entity of the given kind
    ///
    /// Blank entities carry no descriptive fields; callers hydrate them from
    /// their record store if they decide to keep them.
    pub fn blank(proxy: &IdentifiableProxy, identifiers: Vec<IdentifierProxy>) -> Self {
        let system_id = proxy.system_id();
        match proxy.kind() {
            EntityKind::Person => ProvEntity::Person(Person {
                system_id,
                name: String::new(),
                identifiers,
            }),
            EntityKind::Resource => ProvEntity::Resource(Resource {
                system_id,
                location: None,
                identifiers,
            }),
            EntityKind::Tool => ProvEntity::Tool(Tool {
                system_id,
                name: String::new(),
                version: None,
                identifiers,
            }),
        }
    }

    /// `true` if no descriptive field is set
    pub fn is_blank(&self) -> bool {
        match self {
            ProvEntity::Person(p) => p.name.is_empty(),
            ProvEntity::Resource(r) => r.location.is_none(),
            ProvEntity::Tool(t) => t.name.is_empty() && t.version.is_none(),
        }
    }
}

impl Identifiable for ProvEntity {
    fn system_id(&self) -> Uuid {
        match self {
            ProvEntity::Person(p) => p.system_id,
            ProvEntity::Resource(r) => r.system_id,
            ProvEntity::Tool(t) => t.system_id,
        }
    }

    fn kind(&self) -> EntityKind {
        match self {
            ProvEntity::Person(_) => EntityKind::Person,
            ProvEntity::Resource(_) => EntityKind::Resource,
            ProvEntity::Tool(_) => EntityKind::Tool,
        }
    }

    fn identifiers(&self) -> Vec<IdentifierProxy> {
        match self {
            ProvEntity::Person(p) => p.identifiers.clone(),
            ProvEntity::Resource(r) => r.identifiers.clone(),
            ProvEntity::Tool(t) => t.identifiers.clone(),
        }
    }
}

impl From<Person> for ProvEntity {
    fn from(person: Person) -> Self {
        ProvEntity::Person(person)
    }
}

impl From<Resource> for ProvEntity {
    fn from(resource: Resource) -> Self {
        ProvEntity::Resource(resource)
    }
}

impl From<Tool> for ProvEntity {
    fn from(tool: Tool) -> Self {
        ProvEntity::Tool(tool)
    }
}

/// Builds an entity object for an index entry that has no live backing
pub trait EntityFactory<E>: Send + Sync {
    fn instantiate(&self, proxy: &IdentifiableProxy, identifiers: Vec<IdentifierProxy>) -> Arc<E>;
}

/// Factory producing [`ProvEntity::blank`] stubs
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankEntityFactory;

impl EntityFactory<ProvEntity> for BlankEntityFactory {
    fn instantiate(
        &self,
        proxy: &IdentifiableProxy,
        identifiers: Vec<IdentifierProxy>,
    ) -> Arc<ProvEntity> {
        Arc::new(ProvEntity::blank(proxy, identifiers))
    }
}
