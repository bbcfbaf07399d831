//! SQLite-backed vector store using the `sqlite-vec` extension.

use std::mem::transmute;
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Once;

use async_trait::async_trait;
use regex::Regex;
use tokio_rusqlite::{Connection, OptionalExtension, ffi};
use tracing::debug;

use super::{IndexRecord, RecordMetadata, RetrievalMatch, VectorStore};
use crate::types::PipelineError;

/// Vector index persisted in SQLite with cosine search via `sqlite-vec`.
///
/// The index is provisioned with a fixed dimensionality at open time;
/// reopening an existing database with a different dimensionality is a
/// fatal configuration error raised before any data operation.
#[derive(Clone, Debug)]
pub struct SqliteVectorStore {
    conn: Connection,
    dimensions: usize,
}

impl SqliteVectorStore {
    /// Opens (or creates) the index at `path`, provisioned for `dimensions`.
    pub async fn open(path: impl AsRef<Path>, dimensions: usize) -> Result<Self, PipelineError> {
        if dimensions == 0 {
            return Err(PipelineError::Configuration(
                "vector index dimensionality must be non-zero".into(),
            ));
        }
        register_sqlite_vec()?;

        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(path)
            .await
            .map_err(|err| PipelineError::Configuration(err.to_string()))?;

        // Fail fast if the extension did not load into this connection.
        conn.call(|conn| {
            conn.query_row("select vec_version()", [], |row| row.get::<_, String>(0))
                .map_err(tokio_rusqlite::Error::Rusqlite)
        })
        .await
        .map_err(|err| PipelineError::Configuration(format!("sqlite-vec unavailable: {err}")))?;

        let store = Self { conn, dimensions };
        store.provision().await?;
        Ok(store)
    }

    /// Dimensionality this index was provisioned with.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn provision(&self) -> Result<(), PipelineError> {
        if let Some(existing) = self.declared_dimensions().await? {
            if existing != self.dimensions {
                return Err(PipelineError::Configuration(format!(
                    "index provisioned for {existing} dimensions, configured for {}",
                    self.dimensions
                )));
            }
            return Ok(());
        }

        let dimensions = self.dimensions;
        self.conn
            .call(move |conn| {
                conn.execute(
                    "CREATE TABLE IF NOT EXISTS records (
                        id TEXT PRIMARY KEY,
                        filename TEXT NOT NULL,
                        text TEXT NOT NULL
                    )",
                    [],
                )?;
                conn.execute(
                    &format!(
                        "CREATE VIRTUAL TABLE records_embeddings USING vec0(embedding float[{dimensions}])"
                    ),
                    [],
                )?;
                Ok(())
            })
            .await
            .map_err(|err| PipelineError::Configuration(err.to_string()))?;
        debug!(dimensions, "provisioned vector index");
        Ok(())
    }

    /// Reads the dimensionality the embeddings table was created with, if it
    /// exists, by parsing its declaration out of `sqlite_master`.
    async fn declared_dimensions(&self) -> Result<Option<usize>, PipelineError> {
        let sql: Option<String> = self
            .conn
            .call(|conn| {
                conn.query_row(
                    "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'records_embeddings'",
                    [],
                    |row| row.get(0),
                )
                .optional()
                .map_err(tokio_rusqlite::Error::Rusqlite)
            })
            .await
            .map_err(|err| PipelineError::Configuration(err.to_string()))?;

        let Some(sql) = sql else {
            return Ok(None);
        };
        let pattern = Regex::new(r"float\[(\d+)\]").expect("static regex");
        let dims = pattern
            .captures(&sql)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<usize>().ok())
            .ok_or_else(|| {
                PipelineError::Configuration(format!(
                    "could not determine provisioned dimensionality from '{sql}'"
                ))
            })?;
        Ok(Some(dims))
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn upsert(&self, records: Vec<IndexRecord>) -> Result<(), PipelineError> {
        if records.is_empty() {
            return Ok(());
        }
        for record in &records {
            if record.vector.len() != self.dimensions {
                return Err(PipelineError::DimensionMismatch {
                    expected: self.dimensions,
                    actual: record.vector.len(),
                });
            }
        }

        let mut payload = Vec::with_capacity(records.len());
        for record in records {
            let vector_json = serde_json::to_string(&record.vector)
                .map_err(|err| PipelineError::Storage(err.to_string()))?;
            payload.push((record, vector_json));
        }

        let count = payload.len();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                for (record, vector_json) in payload {
                    let existing: Option<i64> = tx
                        .query_row(
                            "SELECT rowid FROM records WHERE id = ?",
                            [&record.id],
                            |row| row.get(0),
                        )
                        .optional()?;

                    let rowid = match existing {
                        Some(rowid) => {
                            tx.execute(
                                "UPDATE records SET filename = ?1, text = ?2 WHERE rowid = ?3",
                                (&record.metadata.filename, &record.metadata.text, rowid),
                            )?;
                            tx.execute(
                                "DELETE FROM records_embeddings WHERE rowid = ?",
                                [rowid],
                            )?;
                            rowid
                        }
                        None => {
                            tx.execute(
                                "INSERT INTO records (id, filename, text) VALUES (?1, ?2, ?3)",
                                (&record.id, &record.metadata.filename, &record.metadata.text),
                            )?;
                            tx.last_insert_rowid()
                        }
                    };

                    tx.execute(
                        "INSERT INTO records_embeddings (rowid, embedding) VALUES (?1, ?2)",
                        (rowid, &vector_json),
                    )?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))?;
        debug!(count, "upserted records");
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalMatch>, PipelineError> {
        if vector.len() != self.dimensions {
            return Err(PipelineError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let vector_json =
            serde_json::to_string(vector).map_err(|err| PipelineError::Storage(err.to_string()))?;

        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!(
                    "SELECT r.id, r.filename, r.text, \
                     vec_distance_cosine(e.embedding, vec_f32(?)) AS distance \
                     FROM records r \
                     JOIN records_embeddings e ON e.rowid = r.rowid \
                     ORDER BY distance ASC, r.rowid DESC \
                     LIMIT {top_k}"
                ))?;

                let rows = stmt.query_map([&vector_json], |row| {
                    let distance: f32 = row.get(3)?;
                    Ok(RetrievalMatch {
                        id: row.get(0)?,
                        // Cosine distance to similarity.
                        score: 1.0 - distance,
                        metadata: RecordMetadata {
                            filename: row.get(1)?,
                            text: row.get(2)?,
                        },
                    })
                })?;

                let mut matches = Vec::new();
                for row in rows {
                    matches.push(row?);
                }
                Ok(matches)
            })
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))
    }

    async fn delete_all(&self) -> Result<(), PipelineError> {
        self.conn
            .call(|conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM records_embeddings", [])?;
                tx.execute("DELETE FROM records", [])?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))
    }

    async fn count(&self) -> Result<usize, PipelineError> {
        self.conn
            .call(|conn| {
                let count: i64 = conn
                    .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
                    .map_err(tokio_rusqlite::Error::Rusqlite)?;
                Ok(count as usize)
            })
            .await
            .map_err(|err| PipelineError::Storage(err.to_string()))
    }
}

fn register_sqlite_vec() -> Result<(), PipelineError> {
    use std::sync::Mutex;

    static INIT: Once = Once::new();
    static INIT_RESULT: Mutex<Option<Result<(), String>>> = Mutex::new(None);

    INIT.call_once(|| {
        let result = unsafe {
            type SqliteExtensionInit = unsafe extern "C" fn(
                *mut ffi::sqlite3,
                *mut *mut c_char,
                *const ffi::sqlite3_api_routines,
            ) -> i32;

            let init: unsafe extern "C" fn() = sqlite_vec::sqlite3_vec_init;
            let init_fn: SqliteExtensionInit =
                transmute::<unsafe extern "C" fn(), SqliteExtensionInit>(init);
            let rc = ffi::sqlite3_auto_extension(Some(init_fn));
            if rc != 0 {
                Err(format!("failed to register sqlite-vec extension (code {rc})"))
            } else {
                Ok(())
            }
        };
        *INIT_RESULT.lock().expect("init result mutex poisoned") = Some(result);
    });

    INIT_RESULT
        .lock()
        .expect("init result mutex poisoned")
        .clone()
        .expect("init was called but result not set")
        .map_err(PipelineError::Configuration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(id: &str, vector: Vec<f32>, filename: &str, text: &str) -> IndexRecord {
        IndexRecord::new(
            id,
            vector,
            RecordMetadata {
                filename: filename.to_string(),
                text: text.to_string(),
            },
        )
    }

    #[tokio::test]
    async fn upsert_then_query_returns_nearest_first() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("index.sqlite"), 3)
            .await
            .unwrap();

        store
            .upsert(vec![
                record("a-0", vec![1.0, 0.0, 0.0], "a.txt", "alpha"),
                record("a-1", vec![0.0, 1.0, 0.0], "a.txt", "beta"),
                record("b-0", vec![0.0, 0.0, 1.0], "b.txt", "gamma"),
            ])
            .await
            .unwrap();

        let matches = store.query(&[0.0, 0.9, 0.1], 2).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].id, "a-1");
        assert_eq!(matches[0].metadata.text, "beta");
        assert!(matches[0].score > matches[1].score);
    }

    #[tokio::test]
    async fn reupsert_overwrites_by_id() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("index.sqlite"), 3)
            .await
            .unwrap();

        store
            .upsert(vec![record("a-0", vec![1.0, 0.0, 0.0], "a.txt", "old")])
            .await
            .unwrap();
        store
            .upsert(vec![record("a-0", vec![0.0, 1.0, 0.0], "a.txt", "new")])
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let matches = store.query(&[0.0, 1.0, 0.0], 1).await.unwrap();
        assert_eq!(matches[0].metadata.text, "new");
        assert!(matches[0].score > 0.99);
    }

    #[tokio::test]
    async fn delete_all_empties_the_index() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("index.sqlite"), 3)
            .await
            .unwrap();

        store
            .upsert(vec![record("a-0", vec![1.0, 0.0, 0.0], "a.txt", "alpha")])
            .await
            .unwrap();
        store.delete_all().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.query(&[1.0, 0.0, 0.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reopening_with_different_dimensions_is_fatal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.sqlite");
        SqliteVectorStore::open(&path, 3).await.unwrap();

        let err = SqliteVectorStore::open(&path, 4).await.unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }

    #[tokio::test]
    async fn wrong_length_vector_is_rejected_before_storage() {
        let dir = tempdir().unwrap();
        let store = SqliteVectorStore::open(dir.path().join("index.sqlite"), 3)
            .await
            .unwrap();

        let err = store
            .upsert(vec![record("a-0", vec![1.0, 0.0], "a.txt", "alpha")])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }
}
