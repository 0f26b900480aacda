//! LanceDB Vector Store - 영속 벡터 인덱스
//!
//! 데이터 디렉토리 아래에 컬렉션 이름으로 테이블을 하나 두고,
//! 청크 ID를 키로 merge-insert(upsert) 합니다.
//! 같은 디렉토리/컬렉션으로 다시 열면 별도 마이그레이션 없이 모든 레코드를 복구합니다.
//! ref: https://lancedb.github.io/lancedb/

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray,
};
use arrow_schema::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::table::Table;
use lancedb::DistanceType;
use tokio::sync::Mutex;

use super::vector::{ChunkMetadata, SearchResult, StoredChunk, VectorEntry, VectorStore};
use crate::error::IndexError;

/// 벡터 컬럼 이름
const VECTOR_COLUMN: &str = "vector";

// ============================================================================
// LanceVectorStore
// ============================================================================

/// 읽기마다 최신 테이블 버전을 확인 (다른 프로세스/인스턴스의 쓰기 반영)
const READ_CONSISTENCY_INTERVAL: Duration = Duration::ZERO;

/// LanceDB 벡터 저장소 구현
///
/// 쓰기는 내부 뮤텍스로 직렬화하고, 읽기는 LanceDB 버전 스냅샷을 사용합니다.
/// 같은 디렉토리를 여는 다른 인스턴스의 쓰기도 다음 읽기부터 보입니다.
pub struct LanceVectorStore {
    db: Connection,
    table: Table,
    collection: String,
    dimension: usize,
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LanceVectorStore {
    /// 저장소 열기 (컬렉션이 없으면 생성)
    ///
    /// # Arguments
    /// * `data_dir` - LanceDB 데이터 디렉토리
    /// * `collection` - 테이블 이름
    /// * `dimension` - 임베딩 차원 (기존 테이블과 다르면 실패)
    pub async fn open(
        data_dir: &Path,
        collection: &str,
        dimension: usize,
    ) -> Result<Self, IndexError> {
        Self::open_inner(data_dir, collection, dimension)
            .await
            .map_err(|e| match e.downcast::<IndexError>() {
                Ok(index_err) => index_err,
                Err(other) => IndexError::Open(format!("{:#}", other)),
            })
    }

    async fn open_inner(data_dir: &Path, collection: &str, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            anyhow::bail!("Embedding dimension must be positive");
        }

        if !data_dir.exists() {
            tokio::fs::create_dir_all(data_dir)
                .await
                .context("Failed to create LanceDB directory")?;
        }

        let path_str = data_dir
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("Invalid path encoding"))?;

        let db = lancedb::connect(path_str)
            .read_consistency_interval(READ_CONSISTENCY_INTERVAL)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        let names = db
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;

        let table = if names.iter().any(|n| n == collection) {
            let table = db
                .open_table(collection)
                .execute()
                .await
                .context("Failed to open existing table")?;

            let existing = table
                .schema()
                .await
                .context("Failed to read table schema")?;
            let stored_dimension = vector_dimension(&existing)
                .ok_or_else(|| anyhow::anyhow!("Table has no vector column"))?;
            if stored_dimension != dimension {
                return Err(IndexError::DimensionMismatch {
                    expected: stored_dimension,
                    actual: dimension,
                }
                .into());
            }
            table
        } else {
            db.create_empty_table(collection, Self::create_schema(dimension))
                .execute()
                .await
                .context("Failed to create table")?
        };

        tracing::debug!(
            "Vector index ready: {:?} (collection={}, dimension={})",
            data_dir,
            collection,
            dimension
        );

        Ok(Self {
            db,
            table,
            collection: collection.to_string(),
            dimension,
            data_dir: data_dir.to_path_buf(),
            write_lock: Mutex::new(()),
        })
    }

    /// 컬렉션 이름
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// 데이터 디렉토리
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// 현재 테이블 목록 (운영 점검용)
    pub async fn collections(&self) -> Result<Vec<String>, IndexError> {
        self.db
            .table_names()
            .execute()
            .await
            .map_err(|e| IndexError::Read(e.to_string()))
    }

    /// 벡터 테이블 스키마 생성
    fn create_schema(dimension: usize) -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("file_path", DataType::Utf8, false),
            Field::new("sequence_index", DataType::Int64, false),
            Field::new("text", DataType::Utf8, false),
            Field::new(
                VECTOR_COLUMN,
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
        ]))
    }

    /// 엔트리를 Arrow RecordBatch로 변환
    fn entry_to_batch(&self, entry: &VectorEntry) -> Result<RecordBatch> {
        let schema = Self::create_schema(self.dimension);

        let values = Float32Array::from(entry.embedding.clone());
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vectors = FixedSizeListArray::try_new(
            field,
            self.dimension as i32,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
        .context("Failed to create embedding array")?;

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(StringArray::from(vec![entry.id.as_str()])),
                Arc::new(StringArray::from(vec![entry.metadata.file_path.as_str()])),
                Arc::new(Int64Array::from(vec![entry.metadata.sequence_index as i64])),
                Arc::new(StringArray::from(vec![entry.text.as_str()])),
                Arc::new(vectors),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    async fn upsert_inner(&self, entry: &VectorEntry) -> Result<()> {
        let batch = self.entry_to_batch(entry)?;
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)], schema));

        let _guard = self.write_lock.lock().await;

        let mut merge = self.table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(reader)
            .await
            .context("Failed to merge chunk into table")?;

        Ok(())
    }

    async fn search_inner(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        let batches: Vec<RecordBatch> = self
            .table
            .vector_search(query_embedding.to_vec())
            .context("Failed to create vector search")?
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .context("Failed to execute vector search")?
            .try_collect()
            .await
            .context("Failed to read search results")?;

        let mut results = Vec::new();

        for batch in batches {
            // _distance 컬럼 (LanceDB가 자동 추가)
            let distances = batch
                .column_by_name("_distance")
                .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
                .ok_or_else(|| anyhow::anyhow!("Missing _distance column"))?;

            for (i, chunk) in batch_to_chunks(&batch)?.into_iter().enumerate() {
                // 코사인 거리 -> 코사인 유사도
                let score = 1.0 - distances.value(i);
                results.push(SearchResult {
                    id: chunk.id,
                    text: chunk.text,
                    metadata: chunk.metadata,
                    score,
                });
            }
        }

        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);

        Ok(results)
    }

    async fn list_inner(&self, limit: usize) -> Result<Vec<StoredChunk>> {
        let batches: Vec<RecordBatch> = self
            .table
            .query()
            .limit(limit)
            .execute()
            .await
            .context("Failed to execute table scan")?
            .try_collect()
            .await
            .context("Failed to read table scan")?;

        let mut chunks = Vec::new();
        for batch in batches {
            chunks.extend(batch_to_chunks(&batch)?);
        }
        chunks.truncate(limit);

        Ok(chunks)
    }
}

#[async_trait]
impl VectorStore for LanceVectorStore {
    async fn upsert(&self, entry: VectorEntry) -> Result<(), IndexError> {
        if entry.embedding.len() != self.dimension {
            return Err(IndexError::Write {
                id: entry.id,
                reason: format!(
                    "expected {} dimensions, got {}",
                    self.dimension,
                    entry.embedding.len()
                ),
            });
        }

        self.upsert_inner(&entry)
            .await
            .map_err(|e| IndexError::Write {
                id: entry.id.clone(),
                reason: format!("{:#}", e),
            })
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<SearchResult>, IndexError> {
        if query_embedding.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query_embedding.len(),
            });
        }

        if k == 0 || self.count().await? == 0 {
            return Ok(vec![]);
        }

        self.search_inner(query_embedding, k)
            .await
            .map_err(|e| IndexError::Read(format!("{:#}", e)))
    }

    async fn list(&self, limit: usize) -> Result<Vec<StoredChunk>, IndexError> {
        if limit == 0 {
            return Ok(vec![]);
        }

        self.list_inner(limit)
            .await
            .map_err(|e| IndexError::Read(format!("{:#}", e)))
    }

    async fn count(&self) -> Result<usize, IndexError> {
        self.table
            .count_rows(None)
            .await
            .map_err(|e| IndexError::Read(format!("Failed to count rows: {}", e)))
    }

    async fn clear(&self) -> Result<(), IndexError> {
        let _guard = self.write_lock.lock().await;

        self.table
            .delete("id IS NOT NULL")
            .await
            .map_err(|e| IndexError::Write {
                id: "*".to_string(),
                reason: format!("Failed to clear collection: {}", e),
            })?;

        tracing::info!("Cleared collection: {}", self.collection);
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 스키마에서 벡터 차원 추출
fn vector_dimension(schema: &Schema) -> Option<usize> {
    match schema.field_with_name(VECTOR_COLUMN).ok()?.data_type() {
        DataType::FixedSizeList(_, size) => Some(*size as usize),
        _ => None,
    }
}

/// RecordBatch 행을 StoredChunk로 변환
fn batch_to_chunks(batch: &RecordBatch) -> Result<Vec<StoredChunk>> {
    let ids = string_column(batch, "id")?;
    let files = string_column(batch, "file_path")?;
    let texts = string_column(batch, "text")?;
    let indices = batch
        .column_by_name("sequence_index")
        .and_then(|c| c.as_any().downcast_ref::<Int64Array>())
        .ok_or_else(|| anyhow::anyhow!("Missing sequence_index column"))?;

    Ok((0..batch.num_rows())
        .map(|i| StoredChunk {
            id: ids.value(i).to_string(),
            text: texts.value(i).to_string(),
            metadata: ChunkMetadata {
                file_path: files.value(i).to_string(),
                sequence_index: indices.value(i).max(0) as usize,
            },
        })
        .collect())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| anyhow::anyhow!("Missing {} column", name))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const DIM: usize = 4;

    fn entry(path: &str, index: usize, text: &str, embedding: [f32; DIM]) -> VectorEntry {
        VectorEntry {
            id: crate::knowledge::chunk_id(path, index),
            text: text.to_string(),
            embedding: embedding.to_vec(),
            metadata: ChunkMetadata {
                file_path: path.to_string(),
                sequence_index: index,
            },
        }
    }

    async fn open_store(dir: &TempDir) -> LanceVectorStore {
        LanceVectorStore::open(dir.path(), "test_collection", DIM)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_empty_store() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&[1.0, 0.0, 0.0, 0.0], 5).await.unwrap().is_empty());
        assert!(store.list(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_id() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert(entry("a.py", 0, "old", [1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert(entry("a.py", 0, "new", [0.0, 1.0, 0.0, 0.0]))
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 1);
        let listed = store.list(10).await.unwrap();
        assert_eq!(listed[0].text, "new");
        assert_eq!(listed[0].id, "a.py_0");
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert(entry("far.py", 0, "far", [0.0, 0.0, 1.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert(entry("near.py", 0, "near", [1.0, 0.1, 0.0, 0.0]))
            .await
            .unwrap();
        store
            .upsert(entry("mid.py", 0, "mid", [1.0, 1.0, 0.0, 0.0]))
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0, 0.0, 0.0], 3).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].text, "near");
        assert_eq!(results[2].text, "far");
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }

        let top = store.search(&[1.0, 0.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].metadata.file_path, "near.py");
    }

    #[tokio::test]
    async fn test_search_returns_fewer_than_k() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert(entry("only.py", 0, "only", [0.5, 0.5, 0.0, 0.0]))
            .await
            .unwrap();

        let results = store.search(&[1.0, 0.0, 0.0, 0.0], 5).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_recovers_records() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = open_store(&temp_dir).await;
            store
                .upsert(entry("keep.py", 0, "persisted", [1.0, 0.0, 0.0, 0.0]))
                .await
                .unwrap();
            store
                .upsert(entry("keep.py", 1, "persisted too", [0.0, 1.0, 0.0, 0.0]))
                .await
                .unwrap();
        }

        let reopened = open_store(&temp_dir).await;
        assert_eq!(reopened.count().await.unwrap(), 2);

        let results = reopened.search(&[1.0, 0.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].text, "persisted");
    }

    #[tokio::test]
    async fn test_sees_writes_from_other_instance() {
        let temp_dir = TempDir::new().unwrap();
        let reader = open_store(&temp_dir).await;
        let writer = open_store(&temp_dir).await;

        assert_eq!(reader.count().await.unwrap(), 0);

        writer
            .upsert(entry("shared.py", 0, "from writer", [1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();

        assert_eq!(reader.count().await.unwrap(), 1);
        let results = reader.search(&[1.0, 0.0, 0.0, 0.0], 1).await.unwrap();
        assert_eq!(results[0].text, "from writer");
    }

    #[tokio::test]
    async fn test_dimension_mismatch_on_reopen() {
        let temp_dir = TempDir::new().unwrap();
        drop(open_store(&temp_dir).await);

        let result = LanceVectorStore::open(temp_dir.path(), "test_collection", 8).await;
        assert!(matches!(
            result,
            Err(IndexError::DimensionMismatch { expected: 4, actual: 8 })
        ));
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dimension() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        let mut bad = entry("bad.py", 0, "bad", [1.0, 0.0, 0.0, 0.0]);
        bad.embedding.push(1.0);

        let err = store.upsert(bad).await.unwrap_err();
        assert!(matches!(err, IndexError::Write { ref id, .. } if id == "bad.py_0"));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let first = LanceVectorStore::open(temp_dir.path(), "first", DIM).await.unwrap();
        let second = LanceVectorStore::open(temp_dir.path(), "second", DIM).await.unwrap();

        first
            .upsert(entry("a.py", 0, "a", [1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();

        assert_eq!(first.count().await.unwrap(), 1);
        assert_eq!(second.count().await.unwrap(), 0);

        let names = second.collections().await.unwrap();
        assert!(names.contains(&"first".to_string()));
        assert!(names.contains(&"second".to_string()));
    }

    #[tokio::test]
    async fn test_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = open_store(&temp_dir).await;

        store
            .upsert(entry("a.py", 0, "a", [1.0, 0.0, 0.0, 0.0]))
            .await
            .unwrap();
        store.clear().await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.search(&[1.0, 0.0, 0.0, 0.0], 3).await.unwrap().is_empty());
    }
}
