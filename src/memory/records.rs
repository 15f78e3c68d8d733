//! Tier-A (`identity_memory`) and Tier-B (`extended_memory`) row access.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::memory::meta::get_meta;
use crate::memory::types::{ExtendedRecord, IdentityRecord, MemoryEntry, Tier};

/// Category written for every gateway-routed Tier-B row.
pub const AUTO_CATEGORY: &str = "auto";

pub fn upsert_identity(conn: &Connection, key: &str, value: &str, now: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO identity_memory (key, value, last_updated) VALUES (?1, ?2, ?3) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, last_updated = excluded.last_updated",
        params![key, value, now],
    )?;
    Ok(())
}

pub fn get_identity(conn: &Connection, key: &str) -> Result<Option<IdentityRecord>> {
    let row = conn
        .query_row(
            "SELECT key, value, last_updated FROM identity_memory WHERE key = ?1",
            [key],
            |row| {
                Ok(IdentityRecord {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    last_updated: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

pub fn delete_identity(conn: &Connection, key: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM identity_memory WHERE key = ?1", [key])? > 0)
}

/// All Tier-A rows ordered by key.
pub fn list_identity(conn: &Connection) -> Result<Vec<IdentityRecord>> {
    let mut stmt =
        conn.prepare("SELECT key, value, last_updated FROM identity_memory ORDER BY key")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(IdentityRecord {
                key: row.get(0)?,
                value: row.get(1)?,
                last_updated: row.get(2)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn upsert_extended(
    conn: &Connection,
    key: &str,
    value: &str,
    category: &str,
    now: &str,
) -> Result<()> {
    conn.execute(
        "INSERT INTO extended_memory (key, value, category, last_updated) VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, category = excluded.category, \
         last_updated = excluded.last_updated",
        params![key, value, category, now],
    )?;
    Ok(())
}

fn extended_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ExtendedRecord> {
    Ok(ExtendedRecord {
        key: row.get(0)?,
        value: row.get(1)?,
        category: row.get(2)?,
        last_updated: row.get(3)?,
    })
}

pub fn get_extended(conn: &Connection, key: &str) -> Result<Option<ExtendedRecord>> {
    let row = conn
        .query_row(
            "SELECT key, value, category, last_updated FROM extended_memory WHERE key = ?1",
            [key],
            extended_from_row,
        )
        .optional()?;
    Ok(row)
}

pub fn delete_extended(conn: &Connection, key: &str) -> Result<bool> {
    Ok(conn.execute("DELETE FROM extended_memory WHERE key = ?1", [key])? > 0)
}

/// All Tier-B rows ordered by key.
pub fn list_extended(conn: &Connection) -> Result<Vec<ExtendedRecord>> {
    let mut stmt = conn.prepare(
        "SELECT key, value, category, last_updated FROM extended_memory ORDER BY key",
    )?;
    let rows = stmt
        .query_map([], extended_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Every stored attribute with its provenance, Tier-A first.
pub fn list_memories(conn: &Connection) -> Result<Vec<MemoryEntry>> {
    let mut entries = Vec::new();
    for record in list_identity(conn)? {
        let meta = get_meta(conn, &record.key)?;
        entries.push(MemoryEntry {
            tier: Tier::Identity,
            key: record.key,
            value: record.value,
            last_updated: record.last_updated,
            meta,
        });
    }
    for record in list_extended(conn)? {
        let meta = get_meta(conn, &record.key)?;
        entries.push(MemoryEntry {
            tier: Tier::Extended,
            key: record.key,
            value: record.value,
            last_updated: record.last_updated,
            meta,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[test]
    fn identity_upsert_overwrites() {
        let conn = open_memory_database().unwrap();
        upsert_identity(&conn, "location", "Berlin", "t1").unwrap();
        upsert_identity(&conn, "location", "Lisbon", "t2").unwrap();

        let rec = get_identity(&conn, "location").unwrap().unwrap();
        assert_eq!(rec.value, "Lisbon");
        assert_eq!(rec.last_updated, "t2");
        assert_eq!(list_identity(&conn).unwrap().len(), 1);
    }

    #[test]
    fn identity_rejects_unknown_key_at_storage_level() {
        let conn = open_memory_database().unwrap();
        assert!(upsert_identity(&conn, "shoe_size", "44", "t").is_err());
    }

    #[test]
    fn extended_crud() {
        let conn = open_memory_database().unwrap();
        upsert_extended(&conn, "occupation", "Engineer", AUTO_CATEGORY, "t1").unwrap();
        let rec = get_extended(&conn, "occupation").unwrap().unwrap();
        assert_eq!(rec.category, "auto");

        assert!(delete_extended(&conn, "occupation").unwrap());
        assert!(get_extended(&conn, "occupation").unwrap().is_none());
        assert!(!delete_extended(&conn, "occupation").unwrap());
    }

    #[test]
    fn list_memories_orders_tiers() {
        let conn = open_memory_database().unwrap();
        upsert_extended(&conn, "goals", "- run", AUTO_CATEGORY, "t").unwrap();
        upsert_identity(&conn, "timezone", "UTC", "t").unwrap();

        let entries = list_memories(&conn).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].tier, Tier::Identity);
        assert_eq!(entries[1].key, "goals");
        assert!(entries[1].meta.is_none());
    }
}
