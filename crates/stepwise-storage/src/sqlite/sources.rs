//! Named sources and their display nicknames.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use stepwise_core::{Source, SourceNickname, SourceRegistry};

use crate::error::{Result, StorageError};
use crate::sqlite::agents::format_datetime;
use crate::sqlite::store::SqliteStore;

impl SqliteStore {
    /// Inserts or replaces a source, keeping any nickname already attached.
    pub fn put_source_impl(&self, name: &str, source: &Source) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(StorageError::validation("source name is required"));
        }
        let conn = self.lock_conn()?;
        conn.execute(
            "INSERT INTO sources (name, data, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
            params![name, serde_json::to_string(source)?, format_datetime(&Utc::now())],
        )?;
        Ok(())
    }

    pub fn get_source_impl(&self, name: &str) -> Result<Source> {
        let conn = self.lock_conn()?;
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM sources WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;
        let data = data.ok_or_else(|| StorageError::not_found("source", name))?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn set_source_nickname_impl(&self, name: &str, nickname: &SourceNickname) -> Result<()> {
        let conn = self.lock_conn()?;
        let n = conn.execute(
            "UPDATE sources SET nickname = ?1, download_url = ?2 WHERE name = ?3",
            params![nickname.nickname, nickname.download_url, name],
        )?;
        if n == 0 {
            return Err(StorageError::not_found("source", name));
        }
        Ok(())
    }

    pub fn list_sources_impl(&self) -> Result<SourceRegistry> {
        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT name, data, nickname, download_url FROM sources ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut registry = SourceRegistry::new();
        for row in rows {
            let (name, data, nickname, download_url) = row?;
            registry.add_source(name.clone(), serde_json::from_str(&data)?);
            if let Some(nickname) = nickname {
                registry.set_nickname(
                    &name,
                    SourceNickname {
                        nickname,
                        download_url,
                    },
                )?;
            }
        }
        Ok(registry)
    }

    /// Deletes a source; its nickname lives on the same row and goes with it.
    pub fn delete_source_impl(&self, name: &str) -> Result<()> {
        let conn = self.lock_conn()?;
        let n = conn.execute("DELETE FROM sources WHERE name = ?1", params![name])?;
        if n == 0 {
            return Err(StorageError::not_found("source", name));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use stepwise_core::enums::SourceKind;

    fn nick(name: &str) -> SourceNickname {
        SourceNickname {
            nickname: name.into(),
            download_url: "https://files.example/leads.csv".into(),
        }
    }

    #[test]
    fn put_get_list() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .put_source_impl("leads_csv", &Source::new(SourceKind::Csv, "a,b\n1,2"))
            .unwrap();
        let source = store.get_source_impl("leads_csv").unwrap();
        assert_eq!(source.kind, SourceKind::Csv);

        let registry = store.list_sources_impl().unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.lookup_source("leads_csv").is_some());
    }

    #[test]
    fn nickname_survives_replace_and_dies_with_delete() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .put_source_impl("leads_csv", &Source::new(SourceKind::Csv, "v1"))
            .unwrap();
        store.set_source_nickname_impl("leads_csv", &nick("Leads")).unwrap();
        store
            .put_source_impl("leads_csv", &Source::new(SourceKind::Csv, "v2"))
            .unwrap();

        let registry = store.list_sources_impl().unwrap();
        assert_eq!(registry.nickname("leads_csv").unwrap().nickname, "Leads");
        assert_eq!(registry.lookup_source("leads_csv").unwrap().processed_data, "v2");

        store.delete_source_impl("leads_csv").unwrap();
        store
            .put_source_impl("leads_csv", &Source::new(SourceKind::Csv, "v3"))
            .unwrap();
        assert!(store.list_sources_impl().unwrap().nickname("leads_csv").is_none());
    }

    #[test]
    fn missing_source_errors() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.get_source_impl("x").unwrap_err().is_not_found());
        assert!(store.delete_source_impl("x").unwrap_err().is_not_found());
        assert!(store.set_source_nickname_impl("x", &nick("X")).unwrap_err().is_not_found());
    }
}
