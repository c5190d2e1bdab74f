//! Arrow schemas for the corpus tables.

use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

/// Width of the vector column; must match the embedder's output.
pub const EMBEDDING_DIM: i32 = 384;

fn vector_field() -> Field {
    // Nullable: a document without an embedding is lexical-only.
    Field::new(
        "vector",
        DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float32, true)),
            EMBEDDING_DIM,
        ),
        true,
    )
}

pub fn notes_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("machine_id", DataType::Utf8, true),
        Field::new("created_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        vector_field(),
    ]))
}

pub fn chunks_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("manual_id", DataType::Utf8, false),
        Field::new("manual_title", DataType::Utf8, false),
        Field::new("page_number", DataType::Int32, false),
        Field::new("section_title", DataType::Utf8, true),
        Field::new("chunk_type", DataType::Utf8, false),
        Field::new("text", DataType::Utf8, false),
        Field::new("created_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
        vector_field(),
    ]))
}

pub fn machines_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, false),
        Field::new("description", DataType::Utf8, true),
    ]))
}

pub fn manuals_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("title", DataType::Utf8, false),
        Field::new("manual_type", DataType::Utf8, true),
        Field::new("source_url", DataType::Utf8, true),
        Field::new("created_at", DataType::Timestamp(TimeUnit::Millisecond, None), false),
    ]))
}

pub fn machine_manuals_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("machine_id", DataType::Utf8, false),
        Field::new("manual_id", DataType::Utf8, false),
    ]))
}
