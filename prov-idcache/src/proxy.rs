//! Surrogate index keys
//!
//! The index never stores domain objects as keys. Entities are keyed by
//! [`IdentifiableProxy`] (system id + kind) and identifiers by
//! [`IdentifierProxy`] (schema, type, value, optional context). Both are
//! immutable once built.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Kind of identifiable entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EntityKind {
    Person,
    Resource,
    Tool,
}

impl EntityKind {
    /// Every kind, in a fixed order
    pub const ALL: [EntityKind; 3] = [EntityKind::Person, EntityKind::Resource, EntityKind::Tool];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Person => "Person",
            EntityKind::Resource => "Resource",
            EntityKind::Tool => "Tool",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = prov_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| prov_common::Error::InvalidInput(format!("Unknown entity kind: {}", s)))
    }
}

/// Index key standing in for an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentifiableProxy {
    system_id: Uuid,
    kind: EntityKind,
}

impl IdentifiableProxy {
    pub fn new(system_id: Uuid, kind: EntityKind) -> Self {
        Self { system_id, kind }
    }

    pub fn system_id(&self) -> Uuid {
        self.system_id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }
}

impl fmt::Display for IdentifiableProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.system_id)
    }
}

/// Index key standing in for an external identifier
///
/// Equality covers all four fields. An absent context is distinct from an
/// empty one. Ordering is lexicographic over (schema, type, value, context).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentifierProxy {
    schema_id: String,
    type_label: String,
    value: String,
    context: Option<String>,
}

impl IdentifierProxy {
    pub fn new(
        schema_id: impl Into<String>,
        type_label: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            schema_id: schema_id.into(),
            type_label: type_label.into(),
            value: value.into(),
            context: None,
        }
    }

    /// Same identifier qualified by a disambiguation context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn schema_id(&self) -> &str {
        &self.schema_id
    }

    pub fn type_label(&self) -> &str {
        &self.type_label
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }

    /// Only identifiers with a value can be indexed, matched or persisted
    pub fn is_valid(&self) -> bool {
        !self.value.is_empty()
    }
}

/// Renders as `schema:type:value`, with `|context` appended when present
///
/// `\` and `|` inside the value or context are escaped with a backslash,
/// so the first unescaped `|` always starts the context.
impl fmt::Display for IdentifierProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.schema_id, self.type_label, escape(&self.value))?;
        if let Some(context) = &self.context {
            write!(f, "|{}", escape(context))?;
        }
        Ok(())
    }
}

fn escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('|', "\\|")
}

/// Parses the `Display` form. The value may itself contain `:`.
impl FromStr for IdentifierProxy {
    type Err = prov_common::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            prov_common::Error::InvalidInput(format!(
                "Expected schema:type:value[|context], got '{}'",
                s
            ))
        };

        let mut body = String::with_capacity(s.len());
        let mut context: Option<String> = None;
        let mut chars = s.chars();
        while let Some(c) = chars.next() {
            match c {
                '|' if context.is_none() => context = Some(String::new()),
                '|' => return Err(invalid()),
                _ => {
                    let c = if c == '\\' { chars.next().ok_or_else(invalid)? } else { c };
                    context.as_mut().unwrap_or(&mut body).push(c);
                }
            }
        }

        let mut parts = body.splitn(3, ':');
        let (Some(schema_id), Some(type_label), Some(value)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid());
        };

        let proxy = IdentifierProxy::new(schema_id, type_label, value);
        Ok(match context {
            Some(context) => proxy.with_context(context),
            None => proxy,
        })
    }
}

/// Anything that can be reduced to an [`IdentifierProxy`]
pub trait Identifier {
    fn to_proxy(&self) -> IdentifierProxy;
}

impl Identifier for IdentifierProxy {
    fn to_proxy(&self) -> IdentifierProxy {
        self.clone()
    }
}

impl<T: Identifier + ?Sized> Identifier for &T {
    fn to_proxy(&self) -> IdentifierProxy {
        (**self).to_proxy()
    }
}

/// Domain entity addressable by a system id and a set of identifiers
pub trait Identifiable {
    fn system_id(&self) -> Uuid;

    fn kind(&self) -> EntityKind;

    /// Current identifiers, as seen by the owner of the entity
    fn identifiers(&self) -> Vec<IdentifierProxy>;

    fn proxy(&self) -> IdentifiableProxy {
        IdentifiableProxy::new(self.system_id(), self.kind())
    }
}
