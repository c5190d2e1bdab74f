//! LanceDB-backed corpus store.
//!
//! Five tables: `notes` and `manual_chunks` carry the retrievable corpus
//! with a nullable 384-wide vector column; `machines`, `manuals`, and
//! `machine_manuals` form the registry that scope filtering resolves
//! against. Scoped note queries match the machine's notes plus global
//! (untagged) notes; scoped chunk queries match the machine's linked
//! manuals. `manual_title` is denormalized onto chunk rows since there is
//! no join at query time.

use std::path::Path;
use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{
    FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray,
    TimestampMillisecondArray,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use tracing::debug;

use shoptalk_core::traits::CorpusStore;
use shoptalk_core::types::{
    ChunkKind, Document, Machine, Manual, ManualChunk, Note, ScoredDocument,
};
use shoptalk_core::{Error, Result};

use crate::schema::{
    chunks_schema, machine_manuals_schema, machines_schema, manuals_schema, notes_schema,
    EMBEDDING_DIM,
};

const NOTES_TABLE: &str = "notes";
const CHUNKS_TABLE: &str = "manual_chunks";
const MACHINES_TABLE: &str = "machines";
const MANUALS_TABLE: &str = "manuals";
const LINKS_TABLE: &str = "machine_manuals";

pub struct LanceStore {
    db: Connection,
}

impl LanceStore {
    /// Open (or create) the database and make sure every table exists.
    pub async fn open(db_path: &Path) -> Result<Self> {
        let db = connect(db_path.to_string_lossy().as_ref())
            .execute()
            .await
            .map_err(Error::store)?;
        let store = Self { db };
        store.ensure_table(NOTES_TABLE, notes_schema()).await?;
        store.ensure_table(CHUNKS_TABLE, chunks_schema()).await?;
        store.ensure_table(MACHINES_TABLE, machines_schema()).await?;
        store.ensure_table(MANUALS_TABLE, manuals_schema()).await?;
        store.ensure_table(LINKS_TABLE, machine_manuals_schema()).await?;
        Ok(store)
    }

    async fn ensure_table(&self, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
        let names = self.db.table_names().execute().await.map_err(Error::store)?;
        if names.contains(&name.to_string()) {
            return Ok(());
        }
        // create empty table with 0 rows
        let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
        self.db
            .create_table(name, Box::new(iter))
            .execute()
            .await
            .map_err(Error::store)?;
        Ok(())
    }

    async fn open_table(&self, name: &str) -> Result<Table> {
        self.db.open_table(name).execute().await.map_err(Error::store)
    }

    async fn add_batch(&self, table: &str, batch: RecordBatch) -> Result<()> {
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        self.open_table(table)
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(Error::store)?;
        Ok(())
    }

    /// Upsert rows keyed on `on` columns via merge_insert.
    async fn upsert_batch(&self, table: &str, on: &[&str], batch: RecordBatch) -> Result<()> {
        let schema = batch.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
        let t = self.open_table(table).await?;
        let mut mi = t.merge_insert(on);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        let _ = mi.execute(reader).await.map_err(Error::store)?;
        Ok(())
    }

    /// Manuals linked to one machine, for chunk scope filtering.
    async fn manual_ids_for_machine(&self, machine: &str) -> Result<Vec<String>> {
        let t = self.open_table(LINKS_TABLE).await?;
        let mut stream = t
            .query()
            .only_if(format!("machine_id = '{}'", quote(machine)))
            .execute()
            .await
            .map_err(Error::store)?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            let ids = str_col(&batch, "manual_id")?;
            for i in 0..batch.num_rows() {
                out.push(ids.value(i).to_string());
            }
        }
        out.sort();
        out.dedup();
        Ok(out)
    }

    fn note_filter(scope: Option<&str>) -> Option<String> {
        scope.map(|m| format!("(machine_id = '{}' OR machine_id IS NULL)", quote(m)))
    }

    fn chunk_filter(manual_ids: &[String]) -> String {
        let quoted: Vec<String> = manual_ids.iter().map(|m| format!("'{}'", quote(m))).collect();
        format!("manual_id IN ({})", quoted.join(", "))
    }

    async fn scan_notes(&self, filter: Option<String>) -> Result<Vec<Note>> {
        let t = self.open_table(NOTES_TABLE).await?;
        let query = t.query();
        let query = match filter {
            Some(f) => query.only_if(f),
            None => query,
        };
        let mut stream = query.execute().await.map_err(Error::store)?;
        let mut notes = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            notes.extend(notes_from_batch(&batch)?);
        }
        notes.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(notes)
    }

    async fn scan_chunks(&self, filter: Option<String>) -> Result<Vec<ManualChunk>> {
        let t = self.open_table(CHUNKS_TABLE).await?;
        let query = t.query();
        let query = match filter {
            Some(f) => query.only_if(f),
            None => query,
        };
        let mut stream = query.execute().await.map_err(Error::store)?;
        let mut chunks = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            chunks.extend(chunks_from_batch(&batch)?);
        }
        chunks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(chunks)
    }
}

#[async_trait]
impl CorpusStore for LanceStore {
    async fn register_machine(&self, machine: &Machine) -> Result<()> {
        let batch = RecordBatch::try_new(
            machines_schema(),
            vec![
                Arc::new(StringArray::from(vec![machine.id.clone()])),
                Arc::new(StringArray::from(vec![machine.name.clone()])),
                Arc::new(StringArray::from(vec![machine.description.clone()])),
            ],
        )
        .map_err(Error::store)?;
        self.upsert_batch(MACHINES_TABLE, &["id"], batch).await
    }

    async fn list_machines(&self) -> Result<Vec<Machine>> {
        let t = self.open_table(MACHINES_TABLE).await?;
        let mut stream = t.query().execute().await.map_err(Error::store)?;
        let mut machines = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            let ids = str_col(&batch, "id")?;
            let names = str_col(&batch, "name")?;
            let descriptions = str_col(&batch, "description")?;
            for i in 0..batch.num_rows() {
                machines.push(Machine {
                    id: ids.value(i).to_string(),
                    name: names.value(i).to_string(),
                    description: opt_value(descriptions, i),
                });
            }
        }
        machines.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(machines)
    }

    async fn register_manual(&self, manual: &Manual) -> Result<()> {
        let batch = RecordBatch::try_new(
            manuals_schema(),
            vec![
                Arc::new(StringArray::from(vec![manual.id.clone()])),
                Arc::new(StringArray::from(vec![manual.title.clone()])),
                Arc::new(StringArray::from(vec![manual.manual_type.clone()])),
                Arc::new(StringArray::from(vec![manual.source_url.clone()])),
                Arc::new(TimestampMillisecondArray::from(vec![Utc::now().timestamp_millis()])),
            ],
        )
        .map_err(Error::store)?;
        self.upsert_batch(MANUALS_TABLE, &["id"], batch).await?;

        if manual.machines.is_empty() {
            return Ok(());
        }
        let machine_ids: Vec<String> = manual.machines.clone();
        let manual_ids = vec![manual.id.clone(); machine_ids.len()];
        let batch = RecordBatch::try_new(
            machine_manuals_schema(),
            vec![
                Arc::new(StringArray::from(machine_ids)),
                Arc::new(StringArray::from(manual_ids)),
            ],
        )
        .map_err(Error::store)?;
        self.upsert_batch(LINKS_TABLE, &["machine_id", "manual_id"], batch).await
    }

    async fn insert_note(&self, note: &Note, vector: Option<&[f32]>) -> Result<()> {
        check_dim(vector)?;
        let batch = RecordBatch::try_new(
            notes_schema(),
            vec![
                Arc::new(StringArray::from(vec![note.id.clone()])),
                Arc::new(StringArray::from(vec![note.text.clone()])),
                Arc::new(StringArray::from(vec![note.machine.clone()])),
                Arc::new(TimestampMillisecondArray::from(vec![note.created_at.timestamp_millis()])),
                Arc::new(vector_array(vector)),
            ],
        )
        .map_err(Error::store)?;
        self.add_batch(NOTES_TABLE, batch).await
    }

    async fn insert_chunk(&self, chunk: &ManualChunk, vector: Option<&[f32]>) -> Result<()> {
        check_dim(vector)?;
        let batch = RecordBatch::try_new(
            chunks_schema(),
            vec![
                Arc::new(StringArray::from(vec![chunk.id.clone()])),
                Arc::new(StringArray::from(vec![chunk.manual_id.clone()])),
                Arc::new(StringArray::from(vec![chunk.manual_title.clone()])),
                Arc::new(Int32Array::from(vec![chunk.page_number as i32])),
                Arc::new(StringArray::from(vec![chunk.section_title.clone()])),
                Arc::new(StringArray::from(vec![chunk.kind.as_str().to_string()])),
                Arc::new(StringArray::from(vec![chunk.text.clone()])),
                Arc::new(TimestampMillisecondArray::from(vec![chunk.created_at.timestamp_millis()])),
                Arc::new(vector_array(vector)),
            ],
        )
        .map_err(Error::store)?;
        self.add_batch(CHUNKS_TABLE, batch).await
    }

    async fn delete_by_manual(&self, manual_id: &str) -> Result<()> {
        debug!(manual_id, "deleting manual chunks");
        self.open_table(CHUNKS_TABLE)
            .await?
            .delete(&format!("manual_id = '{}'", quote(manual_id)))
            .await
            .map_err(Error::store)?;
        Ok(())
    }

    async fn nearest_notes(
        &self,
        vector: &[f32],
        k: usize,
        scope: Option<&str>,
    ) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let t = self.open_table(NOTES_TABLE).await?;
        let mut query = t
            .vector_search(vector.to_vec())
            .map_err(Error::store)?
            .distance_type(DistanceType::Cosine)
            .limit(k);
        // Documents without an embedding are lexical-only.
        query = match Self::note_filter(scope) {
            Some(filter) => query.only_if(format!("{filter} AND vector IS NOT NULL")),
            None => query.only_if("vector IS NOT NULL"),
        };
        let mut stream = query.execute().await.map_err(Error::store)?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            let distances = f32_col(&batch, "_distance")?;
            for (i, note) in notes_from_batch(&batch)?.into_iter().enumerate() {
                out.push(ScoredDocument {
                    document: Document::Note(note),
                    distance: distances.value(i),
                });
            }
        }
        Ok(out)
    }

    async fn nearest_chunks(
        &self,
        vector: &[f32],
        k: usize,
        scope: Option<&str>,
    ) -> Result<Vec<ScoredDocument>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let filter = match scope {
            Some(machine) => {
                let manual_ids = self.manual_ids_for_machine(machine).await?;
                if manual_ids.is_empty() {
                    return Ok(Vec::new());
                }
                Some(Self::chunk_filter(&manual_ids))
            }
            None => None,
        };
        let t = self.open_table(CHUNKS_TABLE).await?;
        let mut query = t
            .vector_search(vector.to_vec())
            .map_err(Error::store)?
            .distance_type(DistanceType::Cosine)
            .limit(k);
        query = match filter {
            Some(filter) => query.only_if(format!("{filter} AND vector IS NOT NULL")),
            None => query.only_if("vector IS NOT NULL"),
        };
        let mut stream = query.execute().await.map_err(Error::store)?;
        let mut out = Vec::new();
        while let Some(batch) = stream.try_next().await.map_err(Error::store)? {
            let distances = f32_col(&batch, "_distance")?;
            for (i, chunk) in chunks_from_batch(&batch)?.into_iter().enumerate() {
                out.push(ScoredDocument {
                    document: Document::Chunk(chunk),
                    distance: distances.value(i),
                });
            }
        }
        Ok(out)
    }

    async fn all_documents(&self, scope: Option<&str>) -> Result<Vec<Document>> {
        let notes = self.scan_notes(Self::note_filter(scope)).await?;

        let chunk_filter = match scope {
            Some(machine) => {
                let manual_ids = self.manual_ids_for_machine(machine).await?;
                if manual_ids.is_empty() {
                    // No linked manuals: notes only.
                    return Ok(notes.into_iter().map(Document::Note).collect());
                }
                Some(Self::chunk_filter(&manual_ids))
            }
            None => None,
        };
        let chunks = self.scan_chunks(chunk_filter).await?;

        let mut documents: Vec<Document> = notes.into_iter().map(Document::Note).collect();
        documents.extend(chunks.into_iter().map(Document::Chunk));
        Ok(documents)
    }
}

fn quote(s: &str) -> String {
    s.replace('\'', "''")
}

fn check_dim(vector: Option<&[f32]>) -> Result<()> {
    if let Some(v) = vector {
        if v.len() != EMBEDDING_DIM as usize {
            return Err(Error::store(format!(
                "embedding has {} dims, vector column expects {}",
                v.len(),
                EMBEDDING_DIM
            )));
        }
    }
    Ok(())
}

fn vector_array(vector: Option<&[f32]>) -> FixedSizeListArray {
    let rows: Vec<Option<Vec<Option<f32>>>> =
        vec![vector.map(|v| v.iter().map(|&x| Some(x)).collect())];
    FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(rows.into_iter(), EMBEDDING_DIM)
}

fn str_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| Error::store(format!("missing column '{name}'")))
}

fn i32_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Int32Array>())
        .ok_or_else(|| Error::store(format!("missing column '{name}'")))
}

fn f32_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Float32Array> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<Float32Array>())
        .ok_or_else(|| Error::store(format!("missing column '{name}'")))
}

fn ts_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a TimestampMillisecondArray> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<TimestampMillisecondArray>())
        .ok_or_else(|| Error::store(format!("missing column '{name}'")))
}

fn opt_value(col: &StringArray, i: usize) -> Option<String> {
    if col.is_null(i) {
        None
    } else {
        Some(col.value(i).to_string())
    }
}

fn timestamp(col: &TimestampMillisecondArray, i: usize) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(col.value(i)).unwrap_or_default()
}

fn notes_from_batch(batch: &RecordBatch) -> Result<Vec<Note>> {
    let ids = str_col(batch, "id")?;
    let texts = str_col(batch, "text")?;
    let machines = str_col(batch, "machine_id")?;
    let created = ts_col(batch, "created_at")?;
    let mut notes = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        notes.push(Note {
            id: ids.value(i).to_string(),
            text: texts.value(i).to_string(),
            machine: opt_value(machines, i),
            created_at: timestamp(created, i),
        });
    }
    Ok(notes)
}

fn chunks_from_batch(batch: &RecordBatch) -> Result<Vec<ManualChunk>> {
    let ids = str_col(batch, "id")?;
    let manual_ids = str_col(batch, "manual_id")?;
    let manual_titles = str_col(batch, "manual_title")?;
    let pages = i32_col(batch, "page_number")?;
    let sections = str_col(batch, "section_title")?;
    let kinds = str_col(batch, "chunk_type")?;
    let texts = str_col(batch, "text")?;
    let created = ts_col(batch, "created_at")?;
    let mut chunks = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        chunks.push(ManualChunk {
            id: ids.value(i).to_string(),
            manual_id: manual_ids.value(i).to_string(),
            manual_title: manual_titles.value(i).to_string(),
            page_number: pages.value(i).max(0) as u32,
            section_title: opt_value(sections, i),
            kind: ChunkKind::parse(kinds.value(i)),
            text: texts.value(i).to_string(),
            created_at: timestamp(created, i),
        });
    }
    Ok(chunks)
}
