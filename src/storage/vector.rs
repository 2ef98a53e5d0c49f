//! Vector storage using LanceDB for local, on-disk memory

use std::collections::HashMap;
use std::sync::Arc;

use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use futures::TryStreamExt;
use lance_arrow::FixedSizeListArrayExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, DistanceType};

use super::{
    CollectionSpec, EnsureOutcome, MemoryPayload, Metric, QueryMatch, VectorIndex, VectorRecord,
};
use crate::config::Config;
use crate::error::{Error, Result};

const METRIC_KEY: &str = "vibe.metric";

/// Vector storage backend using LanceDB; one table per collection
pub struct LanceIndex {
    db: lancedb::Connection,
}

impl LanceIndex {
    /// Open (or create) the database under `config.vector_db_path()`
    pub async fn new(config: &Config) -> Result<Self> {
        config.ensure_dirs()?;
        let path = config.vector_db_path();
        let uri = path
            .to_str()
            .ok_or_else(|| Error::config(format!("non-UTF-8 data dir: {:?}", path)))?;

        let db = connect(uri)
            .execute()
            .await
            .map_err(|e| Error::vector_db(e.to_string()))?;

        Ok(Self { db })
    }

    fn schema(dimension: usize, metric: Metric) -> Schema {
        let mut metadata = HashMap::new();
        metadata.insert(METRIC_KEY.to_string(), metric.to_string());

        Schema::new_with_metadata(
            vec![
                Field::new("id", DataType::Utf8, false),
                Field::new("text", DataType::Utf8, false),
                Field::new(
                    "vector",
                    DataType::FixedSizeList(
                        Arc::new(Field::new("item", DataType::Float32, true)),
                        dimension as i32,
                    ),
                    false,
                ),
            ],
            metadata,
        )
    }

    async fn open(&self, collection: &str) -> Result<lancedb::Table> {
        self.db
            .open_table(collection)
            .execute()
            .await
            .map_err(|e| Error::vector_db(e.to_string()))
    }

    /// Dimension and metric recorded in an existing table's schema
    async fn describe(&self, collection: &str) -> Result<(usize, Metric)> {
        let table = self.open(collection).await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| Error::vector_db(e.to_string()))?;

        let field = schema
            .field_with_name("vector")
            .map_err(|e| Error::vector_db(e.to_string()))?;
        let dimension = match field.data_type() {
            DataType::FixedSizeList(_, size) => *size as usize,
            other => {
                return Err(Error::vector_db(format!(
                    "vector column has unexpected type {:?}",
                    other
                )))
            }
        };
        let metric = match schema.metadata().get(METRIC_KEY) {
            Some(value) => value.parse()?,
            None => Metric::Cosine,
        };

        Ok((dimension, metric))
    }
}

fn distance_type(metric: Metric) -> DistanceType {
    match metric {
        Metric::Cosine => DistanceType::Cosine,
        Metric::Euclidean => DistanceType::L2,
        Metric::Dotproduct => DistanceType::Dot,
    }
}

/// Map a LanceDB distance onto "higher is more similar"
fn distance_to_score(metric: Metric, distance: f32) -> f32 {
    match metric {
        Metric::Cosine | Metric::Dotproduct => 1.0 - distance,
        Metric::Euclidean => 1.0 / (1.0 + distance),
    }
}

#[async_trait]
impl VectorIndex for LanceIndex {
    fn provider_name(&self) -> &'static str {
        "lancedb"
    }

    async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<EnsureOutcome> {
        let tables = self
            .db
            .table_names()
            .execute()
            .await
            .map_err(|e| Error::vector_db(e.to_string()))?;

        if tables.contains(&spec.name) {
            let (dimension, metric) = self.describe(&spec.name).await?;
            spec.check_existing(dimension, metric)?;
            return Ok(EnsureOutcome::Existing);
        }

        // Create empty table with schema
        let schema = Arc::new(Self::schema(spec.dimension, spec.metric));
        let empty_batch = RecordBatch::new_empty(schema.clone());
        let reader = RecordBatchIterator::new(vec![empty_batch].into_iter().map(Ok), schema);

        self.db
            .create_table(&spec.name, Box::new(reader))
            .execute()
            .await
            .map_err(|e| Error::vector_db(e.to_string()))?;

        Ok(EnsureOutcome::Created)
    }

    async fn upsert(&self, collection: &str, records: &[VectorRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let (dimension, metric) = self.describe(collection).await?;
        for record in records {
            if record.vector.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    actual: record.vector.len(),
                });
            }
        }

        let table = self.open(collection).await?;

        // Delete existing rows first; ids are UUIDs so quoting is safe
        let ids: Vec<String> = records.iter().map(|r| format!("'{}'", r.id)).collect();
        table
            .delete(&format!("id IN ({})", ids.join(", ")))
            .await
            .map_err(|e| Error::vector_db(e.to_string()))?;

        let id_array = StringArray::from(records.iter().map(|r| r.id.clone()).collect::<Vec<_>>());
        let text_array = StringArray::from(
            records
                .iter()
                .map(|r| r.payload.text.clone())
                .collect::<Vec<_>>(),
        );
        let values = Float32Array::from(
            records
                .iter()
                .flat_map(|r| r.vector.iter().copied())
                .collect::<Vec<f32>>(),
        );
        let vector_array = FixedSizeListArray::try_new_from_values(values, dimension as i32)
            .map_err(|e: arrow_schema::ArrowError| Error::vector_db(e.to_string()))?;

        let schema = Arc::new(Self::schema(dimension, metric));
        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(id_array) as Arc<dyn Array>,
                Arc::new(text_array),
                Arc::new(vector_array),
            ],
        )
        .map_err(|e| Error::vector_db(e.to_string()))?;

        let reader = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);
        table
            .add(Box::new(reader))
            .execute()
            .await
            .map_err(|e| Error::vector_db(e.to_string()))?;

        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<QueryMatch>> {
        if top_k == 0 {
            return Err(Error::vector_db("top_k must be positive"));
        }

        let (_, metric) = self.describe(collection).await?;
        let table = self.open(collection).await?;

        let stream = table
            .vector_search(vector.to_vec())
            .map_err(|e: lancedb::Error| Error::vector_db(e.to_string()))?
            .distance_type(distance_type(metric))
            .limit(top_k)
            .execute()
            .await
            .map_err(|e: lancedb::Error| Error::vector_db(e.to_string()))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect::<Vec<RecordBatch>>()
            .await
            .map_err(|e: lancedb::Error| Error::vector_db(e.to_string()))?;

        let mut matches = Vec::new();
        for batch in batches {
            let ids = string_column(&batch, "id")?;
            let texts = string_column(&batch, "text")?;
            let distances = batch
                .column_by_name("_distance")
                .ok_or_else(|| Error::vector_db("Missing _distance column"))?
                .as_any()
                .downcast_ref::<Float32Array>()
                .ok_or_else(|| Error::vector_db("_distance column is not Float32Array"))?;

            for i in 0..batch.num_rows() {
                matches.push(QueryMatch {
                    id: ids.value(i).to_string(),
                    score: distance_to_score(metric, distances.value(i)),
                    payload: MemoryPayload {
                        text: texts.value(i).to_string(),
                    },
                });
            }
        }

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| Error::vector_db(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| Error::vector_db(format!("{} column is not StringArray", name)))
}
