//! faceid-store — Postgres persistence for face embeddings.
//!
//! One table, one vector column. The `vector` extension and the table are
//! created by an explicit idempotent startup step, never as a side effect of
//! a request. Each operation is a single statement against the pool; no
//! transaction spans a save-then-read.

use faceid_core::Embedding;
use pgvector::Vector;
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// One persisted face registration.
#[derive(Debug, Clone)]
pub struct FaceRecord {
    pub id: i64,
    pub user_id: i64,
    /// Informational metadata; the registration flow leaves it unset.
    pub image_path: Option<String>,
    pub embedding: Embedding,
}

#[derive(FromRow)]
struct FaceRow {
    id: i64,
    user_id: i64,
    image_path: Option<String>,
    embedding: Vector,
}

impl From<FaceRow> for FaceRecord {
    fn from(row: FaceRow) -> Self {
        FaceRecord {
            id: row.id,
            user_id: row.user_id,
            image_path: row.image_path,
            embedding: Embedding::new(row.embedding.to_vec()),
        }
    }
}

/// Pool-backed embedding store with a fixed vector dimensionality.
#[derive(Clone)]
pub struct FaceStore {
    pool: PgPool,
    dimension: usize,
}

impl FaceStore {
    /// Connect to Postgres. The dimensionality must match the configured
    /// recognition model; every write is checked against it.
    pub async fn connect(database_url: &str, dimension: usize) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { pool, dimension })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Idempotent schema bootstrap: enable the `vector` extension and create
    /// the embeddings table. Run once at startup, before serving traffic.
    pub async fn init_schema(&self) -> Result<(), StorageError> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(&self.pool)
            .await?;
        sqlx::query(&create_table_sql(self.dimension))
            .execute(&self.pool)
            .await?;
        tracing::info!(dimension = self.dimension, "face_embeddings schema ready");
        Ok(())
    }

    /// Insert one embedding for the user and return the store-assigned id.
    ///
    /// A user may own any number of records; no uniqueness is enforced.
    pub async fn save(&self, user_id: i64, embedding: &Embedding) -> Result<i64, StorageError> {
        ensure_dimension(self.dimension, embedding.len())?;

        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO face_embeddings (user_id, embedding) VALUES ($1, $2) RETURNING id",
        )
        .bind(user_id)
        .bind(Vector::from(embedding.values.clone()))
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(record_id = id, user_id, "embedding saved");
        Ok(id)
    }

    /// All records registered for the user, oldest first. An empty result is
    /// a normal "nothing registered" outcome, not an error.
    pub async fn find_by_user(&self, user_id: i64) -> Result<Vec<FaceRecord>, StorageError> {
        let rows: Vec<FaceRow> = sqlx::query_as(
            "SELECT id, user_id, image_path, embedding \
             FROM face_embeddings WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(FaceRecord::from).collect())
    }
}

fn ensure_dimension(expected: usize, actual: usize) -> Result<(), StorageError> {
    if expected == actual {
        Ok(())
    } else {
        Err(StorageError::Dimension { expected, actual })
    }
}

fn create_table_sql(dimension: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS face_embeddings (\
            id BIGSERIAL PRIMARY KEY, \
            user_id BIGINT NOT NULL, \
            image_path TEXT, \
            embedding vector({dimension})\
        )"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_dimension_accepts_match() {
        assert!(ensure_dimension(4096, 4096).is_ok());
    }

    #[test]
    fn test_ensure_dimension_rejects_mismatch() {
        let err = ensure_dimension(4096, 512).unwrap_err();
        match err {
            StorageError::Dimension { expected, actual } => {
                assert_eq!(expected, 4096);
                assert_eq!(actual, 512);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_create_table_sql_embeds_dimension() {
        let sql = create_table_sql(4096);
        assert!(sql.contains("vector(4096)"));
        assert!(sql.contains("IF NOT EXISTS"));
    }

    #[test]
    fn test_embedding_wire_roundtrip() {
        // Through the pgvector wire type and back, within float tolerance.
        let values: Vec<f32> = (0..512).map(|i| (i as f32) * 0.001 - 0.25).collect();
        let original = Embedding::new(values);

        let wire = Vector::from(original.values.clone());
        let restored = Embedding::new(wire.to_vec());

        assert_eq!(original.len(), restored.len());
        for (a, b) in original.values.iter().zip(restored.values.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_face_row_conversion() {
        let row = FaceRow {
            id: 1,
            user_id: 42,
            image_path: None,
            embedding: Vector::from(vec![0.1, 0.2, 0.3]),
        };
        let record = FaceRecord::from(row);
        assert_eq!(record.id, 1);
        assert_eq!(record.user_id, 42);
        assert_eq!(record.image_path, None);
        assert_eq!(record.embedding.len(), 3);
    }
}
