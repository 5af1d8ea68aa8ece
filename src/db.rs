// 🗄️ Document Store - SQLite-backed collections keyed by (collection, id)
//
// Reference data (nominal codes, rules, tax rates) lives as JSON documents.
// Creation order is preserved because rule order is the priority tie-break.
// Every effective change is written to the events table as an audit trail.

use crate::entities::{NominalCode, TaxRate};
use crate::rules::NominalCodeRule;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub const NOMINAL_CODES: &str = "nominalCodes";
pub const NOMINAL_CODE_RULES: &str = "nominalCodeRules";
pub const TAX_RATES: &str = "taxRates";

const DOCUMENT_STORE_ACTOR: &str = "document_store";

/// One change to a stored document. `entity_type` is the collection name
/// and `data` carries the new (and, on updates, previous) content hash.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Documents Table (one row per document, JSON body)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection TEXT NOT NULL,
            doc_id TEXT NOT NULL,
            data TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (collection, doc_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

fn content_hash(data: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create or update a document. Returns `false` when the stored body is identical.
///
/// The row and its audit event commit together. Inside a caller's
/// transaction both writes join it instead.
pub fn upsert_document<T: Serialize>(
    conn: &Connection,
    collection: &str,
    doc_id: &str,
    document: &T,
) -> Result<bool> {
    let data = serde_json::to_string(document)
        .with_context(|| format!("Failed to serialize {}/{}", collection, doc_id))?;
    let hash = content_hash(&data);

    let tx = if conn.is_autocommit() {
        Some(conn.unchecked_transaction()?)
    } else {
        None
    };

    let previous: Option<String> = conn
        .query_row(
            "SELECT content_hash FROM documents WHERE collection = ?1 AND doc_id = ?2",
            params![collection, doc_id],
            |row| row.get(0),
        )
        .optional()?;

    if previous.as_deref() == Some(hash.as_str()) {
        tracing::debug!(collection, doc_id, "Document unchanged, skipping write");
        return Ok(false);
    }

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO documents (collection, doc_id, data, content_hash, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT (collection, doc_id) DO UPDATE SET
            data = excluded.data,
            content_hash = excluded.content_hash,
            updated_at = excluded.updated_at",
        params![collection, doc_id, data, hash, now],
    )?;

    let (event_type, payload) = match &previous {
        Some(previous_hash) => (
            "document_updated",
            serde_json::json!({ "content_hash": hash, "previous_hash": previous_hash }),
        ),
        None => ("document_created", serde_json::json!({ "content_hash": hash })),
    };
    insert_event(
        conn,
        &Event::new(event_type, collection, doc_id, payload, DOCUMENT_STORE_ACTOR),
    )
    .with_context(|| format!("Failed to record {} for {}/{}", event_type, collection, doc_id))?;

    if let Some(tx) = tx {
        tx.commit()?;
    }
    tracing::debug!(collection, doc_id, event_type, "Document written");

    Ok(true)
}

/// Write a batch of documents in one transaction. Returns how many changed.
///
/// Any failing record rolls the whole batch back.
pub fn import_documents<T, F>(
    conn: &Connection,
    collection: &str,
    documents: &[T],
    doc_id: F,
) -> Result<usize>
where
    T: Serialize,
    F: Fn(&T) -> &str,
{
    let tx = conn.unchecked_transaction()?;
    let mut changed = 0;
    for document in documents {
        let id = doc_id(document);
        if upsert_document(&tx, collection, id, document)
            .with_context(|| format!("Import of {} aborted at {}", collection, id))?
        {
            changed += 1;
        }
    }
    tx.commit()?;

    tracing::info!(collection, total = documents.len(), changed, "Batch imported");
    Ok(changed)
}

pub fn get_document<T: DeserializeOwned>(
    conn: &Connection,
    collection: &str,
    doc_id: &str,
) -> Result<Option<T>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND doc_id = ?2",
            params![collection, doc_id],
            |row| row.get(0),
        )
        .optional()?;

    data.map(|json| {
        serde_json::from_str(&json)
            .with_context(|| format!("Corrupt document {}/{}", collection, doc_id))
    })
    .transpose()
}

/// All documents in a collection, in creation order
pub fn list_documents<T: DeserializeOwned>(conn: &Connection, collection: &str) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(
        "SELECT doc_id, data FROM documents WHERE collection = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt
        .query_map([collection], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(doc_id, json)| {
            serde_json::from_str(&json)
                .with_context(|| format!("Corrupt document {}/{}", collection, doc_id))
        })
        .collect()
}

pub fn count_documents(conn: &Connection, collection: &str) -> Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE collection = ?1",
        [collection],
        |row| row.get(0),
    )?;

    Ok(count)
}

// ============================================================================
// TYPED COLLECTIONS
// ============================================================================

pub fn save_nominal_code(conn: &Connection, code: &NominalCode) -> Result<bool> {
    upsert_document(conn, NOMINAL_CODES, &code.id, code)
}

pub fn save_rule(conn: &Connection, rule: &NominalCodeRule) -> Result<bool> {
    upsert_document(conn, NOMINAL_CODE_RULES, &rule.id, rule)
}

pub fn save_tax_rate(conn: &Connection, rate: &TaxRate) -> Result<bool> {
    upsert_document(conn, TAX_RATES, &rate.id, rate)
}

pub fn load_nominal_codes(conn: &Connection) -> Result<Vec<NominalCode>> {
    list_documents(conn, NOMINAL_CODES)
}

/// Rules in creation order (the tie-break order for equal priorities)
pub fn load_rules(conn: &Connection) -> Result<Vec<NominalCodeRule>> {
    list_documents(conn, NOMINAL_CODE_RULES)
}

pub fn load_tax_rates(conn: &Connection) -> Result<Vec<TaxRate>> {
    list_documents(conn, TAX_RATES)
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, oldest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY id ASC",
    )?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(
            |(event_id, timestamp, event_type, entity_type, entity_id, data, actor)| {
                Ok(Event {
                    event_id,
                    timestamp: DateTime::parse_from_rfc3339(&timestamp)
                        .context("Invalid event timestamp")?
                        .with_timezone(&Utc),
                    event_type,
                    entity_type,
                    entity_id,
                    data: serde_json::from_str(&data).context("Invalid event data")?,
                    actor,
                })
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::ItemType;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_upsert_is_idempotent() {
        let conn = memory_db();
        let code = NominalCode::new("4000", "Sales - Labor");

        assert!(save_nominal_code(&conn, &code).unwrap());
        assert!(!save_nominal_code(&conn, &code).unwrap());
        assert_eq!(count_documents(&conn, NOMINAL_CODES).unwrap(), 1);

        let events = get_events_for_entity(&conn, NOMINAL_CODES, &code.id).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "document_created");

        println!("✅ Idempotency test PASSED");
    }

    #[test]
    fn test_update_keeps_creation_order() {
        let conn = memory_db();
        let first = NominalCodeRule::new("r-first", 10, ItemType::Part, "nc1");
        let second = NominalCodeRule::new("r-second", 10, ItemType::Part, "nc2");
        save_rule(&conn, &first).unwrap();
        save_rule(&conn, &second).unwrap();

        let edited = first.clone().with_keywords("brake");
        assert!(save_rule(&conn, &edited).unwrap());

        let rules = load_rules(&conn).unwrap();
        let ids: Vec<&str> = rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r-first", "r-second"]);
        assert_eq!(rules[0].keywords, "brake");

        let events = get_events_for_entity(&conn, NOMINAL_CODE_RULES, "r-first").unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert_eq!(types, vec!["document_created", "document_updated"]);
    }

    #[test]
    fn test_get_document() {
        let conn = memory_db();
        let rate = TaxRate::standard("T1", "Standard", 20.0);
        save_tax_rate(&conn, &rate).unwrap();

        let loaded: Option<TaxRate> = get_document(&conn, TAX_RATES, "T1").unwrap();
        assert_eq!(loaded, Some(rate));

        let missing: Option<TaxRate> = get_document(&conn, TAX_RATES, "T9").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_collections_are_separate() {
        let conn = memory_db();
        save_tax_rate(&conn, &TaxRate::new("shared-id", "Zero", 0.0)).unwrap();
        save_nominal_code(
            &conn,
            &NominalCode {
                id: "shared-id".to_string(),
                code: "4000".to_string(),
                name: "Sales".to_string(),
                secondary_code: None,
            },
        )
        .unwrap();

        assert_eq!(load_tax_rates(&conn).unwrap().len(), 1);
        assert_eq!(load_nominal_codes(&conn).unwrap().len(), 1);
        assert!(load_rules(&conn).unwrap().is_empty());
    }

    #[test]
    fn test_half_edited_rule_round_trips() {
        let conn = memory_db();
        let mut draft = NominalCodeRule::new("draft", 1, ItemType::Labor, "");
        draft.item_type = None;
        save_rule(&conn, &draft).unwrap();

        let rules = load_rules(&conn).unwrap();
        assert_eq!(rules, vec![draft]);
        assert!(!rules[0].is_well_formed());
    }

    #[test]
    fn test_update_event_records_previous_hash() {
        let conn = memory_db();
        let rate = TaxRate::new("T2", "Reduced", 5.0);
        save_tax_rate(&conn, &rate).unwrap();
        save_tax_rate(&conn, &TaxRate::new("T2", "Reduced", 7.5)).unwrap();

        let events = get_events_for_entity(&conn, TAX_RATES, "T2").unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].data.get("previous_hash").is_none());
        assert_eq!(events[1].data["previous_hash"], events[0].data["content_hash"]);
        assert_ne!(events[1].data["content_hash"], events[0].data["content_hash"]);
        assert_eq!(events[1].actor, "document_store");
    }

    #[test]
    fn test_failed_event_write_keeps_no_document() {
        let conn = memory_db();
        conn.execute("DROP TABLE events", []).unwrap();
        let rate = TaxRate::standard("T1", "Standard", 20.0);

        assert!(save_tax_rate(&conn, &rate).is_err());
        assert_eq!(count_documents(&conn, TAX_RATES).unwrap(), 0);

        // Once the audit table is back, the retry is a real write with its event
        setup_database(&conn).unwrap();
        assert!(save_tax_rate(&conn, &rate).unwrap());
        let events = get_events_for_entity(&conn, TAX_RATES, "T1").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "document_created");
    }

    /// Record whose serialization can be made to fail
    struct Flaky {
        id: String,
        broken: bool,
    }

    impl Serialize for Flaky {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            if self.broken {
                return Err(serde::ser::Error::custom("unserializable record"));
            }
            serializer.serialize_str(&self.id)
        }
    }

    #[test]
    fn test_import_documents_is_all_or_nothing() {
        let conn = memory_db();
        let batch = vec![
            Flaky { id: "a".to_string(), broken: false },
            Flaky { id: "b".to_string(), broken: true },
            Flaky { id: "c".to_string(), broken: false },
        ];

        let err = import_documents(&conn, "flaky", &batch, |f| f.id.as_str()).unwrap_err();
        assert!(err.to_string().contains("aborted at b"));
        assert_eq!(count_documents(&conn, "flaky").unwrap(), 0);
        assert!(get_events_for_entity(&conn, "flaky", "a").unwrap().is_empty());

        let rules = vec![
            NominalCodeRule::new("r1", 10, ItemType::Part, "nc1"),
            NominalCodeRule::new("r2", 5, ItemType::Labor, "nc2"),
        ];
        let changed =
            import_documents(&conn, NOMINAL_CODE_RULES, &rules, |r| r.id.as_str()).unwrap();
        assert_eq!(changed, 2);
        assert_eq!(
            import_documents(&conn, NOMINAL_CODE_RULES, &rules, |r| r.id.as_str()).unwrap(),
            0
        );
        assert_eq!(load_rules(&conn).unwrap(), rules);
    }

    #[test]
    fn test_event_log() {
        let conn = memory_db();

        let event = Event::new(
            "test_event",
            "nominalCodes",
            "test_id_123",
            serde_json::json!({"test": "data"}),
            "test_actor",
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "nominalCodes", "test_id_123").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "test_event");
        assert_eq!(events[0].actor, "test_actor");
        assert_eq!(events[0].data["test"], "data");
    }
}
