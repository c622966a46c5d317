//! JSON Lines cache format
//!
//! One entity per line:
//!
//! ```text
//! {"system_id":"…","kind":"Resource","identifiers":[{"schema_id":"fs","type":"path","id":"/data/a.csv"}]}
//! ```
//!
//! `id` is omitted when empty and `context` when absent, so an absent
//! context and an empty one stay distinguishable. A missing `id` decodes to
//! the empty string, which the index then rejects as invalid.

use std::io::{BufRead, Write};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{CacheCodec, CacheRecord};
use crate::error::{CacheError, CacheResult};
use crate::proxy::{EntityKind, IdentifiableProxy, IdentifierProxy};

#[derive(Debug, Serialize, Deserialize)]
struct EntityLine {
    system_id: Uuid,
    kind: EntityKind,
    #[serde(default)]
    identifiers: Vec<IdentifierLine>,
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentifierLine {
    schema_id: String,
    #[serde(rename = "type")]
    type_label: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl From<IdentifierLine> for IdentifierProxy {
    fn from(line: IdentifierLine) -> Self {
        let proxy = IdentifierProxy::new(line.schema_id, line.type_label, line.id);
        match line.context {
            Some(context) => proxy.with_context(context),
            None => proxy,
        }
    }
}

impl From<&IdentifierProxy> for IdentifierLine {
    fn from(proxy: &IdentifierProxy) -> Self {
        Self {
            schema_id: proxy.schema_id().to_string(),
            type_label: proxy.type_label().to_string(),
            id: proxy.value().to_string(),
            context: proxy.context().map(str::to_string),
        }
    }
}

/// Default codec: newline-delimited JSON objects
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLinesCodec;

impl CacheCodec for JsonLinesCodec {
    fn name(&self) -> &'static str {
        "jsonl"
    }

    fn read(&self, reader: &mut dyn BufRead, sink: &mut dyn FnMut(CacheRecord)) -> CacheResult<usize> {
        let mut count = 0;
        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let entity: EntityLine = serde_json::from_str(&line)
                .map_err(|e| CacheError::Codec(format!("line {}: {}", line_no + 1, e)))?;

            sink(CacheRecord {
                proxy: IdentifiableProxy::new(entity.system_id, entity.kind),
                identifiers: entity.identifiers.into_iter().map(IdentifierProxy::from).collect(),
            });
            count += 1;
        }
        Ok(count)
    }

    fn write(&self, writer: &mut dyn Write, records: &[CacheRecord]) -> CacheResult<usize> {
        for record in records {
            let line = EntityLine {
                system_id: record.proxy.system_id(),
                kind: record.proxy.kind(),
                identifiers: record
                    .identifiers
                    .iter()
                    .filter(|id| id.is_valid())
                    .map(IdentifierLine::from)
                    .collect(),
            };
            serde_json::to_writer(&mut *writer, &line)
                .map_err(|e| CacheError::Codec(e.to_string()))?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(records.len())
    }
}
