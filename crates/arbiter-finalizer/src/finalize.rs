//! Finalization: turn `debug/embeddings.jsonl` into the columnar
//! `embeddings.arrow` (§4.10), with a provenance record either way.
//!
//! Grounded on `vector_db_lance.rs`'s `build_schema`/`make_record_batch`
//! pattern (fixed-size-list-of-float32 column), adapted from a per-row
//! LanceDB insert into a single run-wide Arrow IPC file.

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

use arbiter_types::embedding::{EmbeddingRecord, EmbeddingStatus};
use arbiter_writer::RunPaths;
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch};
use arrow_schema::{DataType, Field, Schema};

use crate::error::FinalizerError;
use crate::provenance::{EmbeddingsProvenance, FinalizationStatus, ProvenanceCounts};

pub struct FinalizationOutcome {
    pub provenance: EmbeddingsProvenance,
}

/// Reads `debug/embeddings.jsonl`, writes `embeddings.arrow` and
/// `embeddings.provenance.json`, and applies post-finalization cleanup.
///
/// Never returns `Err` for a bad embedding vector or a dimension
/// mismatch — those degrade to [`FinalizationStatus::JsonlFallback`] in
/// the returned provenance. It returns `Err` only when the debug JSONL
/// itself (which the writer always opens) cannot be read at all.
pub fn finalize(
    paths: &RunPaths,
    requested_embedding_model: &str,
    debug: bool,
) -> Result<FinalizationOutcome, FinalizerError> {
    let records = read_records(paths)?;

    let mut total = 0u32;
    let mut skipped = 0u32;
    let mut failed = 0u32;
    let mut success: Vec<(&EmbeddingRecord, Vec<f32>)> = Vec::new();
    let mut decode_error: Option<String> = None;

    for record in &records {
        total += 1;
        match record.embedding_status {
            EmbeddingStatus::Skipped => skipped += 1,
            EmbeddingStatus::Failed => failed += 1,
            EmbeddingStatus::Success => {
                let Some(encoded) = record.vector_b64.as_deref() else {
                    decode_error.get_or_insert_with(|| {
                        format!("trial {} marked success with no vector_b64", record.trial_id)
                    });
                    continue;
                };
                match EmbeddingRecord::decode_vector(encoded) {
                    Ok(vector) => success.push((record, vector)),
                    Err(err) => {
                        decode_error.get_or_insert(err);
                    }
                }
            }
        }
    }

    let generation_ids: Vec<String> = {
        let mut seen = BTreeMap::new();
        for (record, _) in &success {
            if let Some(id) = &record.generation_id {
                seen.insert(id.clone(), ());
            }
        }
        seen.into_keys().collect()
    };

    let dimension = success.first().map(|(_, vector)| vector.len() as u32);
    if let Some(dim) = dimension {
        if success.iter().any(|(_, vector)| vector.len() as u32 != dim) {
            decode_error.get_or_insert_with(|| "embedding vectors do not share a dimension".to_string());
        }
    }

    success.sort_by_key(|(record, _)| record.trial_id);

    let counts = ProvenanceCounts { total, embedded: success.len() as u32, skipped, failed };

    let (status, error) = if success.is_empty() {
        (FinalizationStatus::NotGenerated, decode_error)
    } else if let Some(err) = decode_error {
        (FinalizationStatus::JsonlFallback, Some(err))
    } else {
        match write_arrow(paths, &success, dimension.expect("non-empty success implies a dimension")) {
            Ok(()) => (FinalizationStatus::ArrowGenerated, None),
            Err(err) => (FinalizationStatus::JsonlFallback, Some(err)),
        }
    };

    let debug_jsonl_retained = cleanup(paths, status, debug)?;

    let provenance = EmbeddingsProvenance {
        status,
        requested_embedding_model: requested_embedding_model.to_string(),
        generation_ids,
        dimension,
        counts,
        debug_jsonl_retained,
        error,
    };

    arbiter_writer::write_json_atomic(&paths.embeddings_provenance_json(), &provenance)
        .map_err(|source| FinalizerError::Provenance(source.to_string()))?;

    Ok(FinalizationOutcome { provenance })
}

fn read_records(paths: &RunPaths) -> Result<Vec<EmbeddingRecord>, FinalizerError> {
    let path = paths.debug_embeddings_jsonl();
    let contents = std::fs::read_to_string(&path).map_err(|source| FinalizerError::Read {
        path: path.display().to_string(),
        source,
    })?;

    let mut records = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: EmbeddingRecord = serde_json::from_str(line)
            .map_err(|source| FinalizerError::MalformedLine { line: index + 1, source })?;
        records.push(record);
    }
    Ok(records)
}

fn write_arrow(
    paths: &RunPaths,
    success: &[(&EmbeddingRecord, Vec<f32>)],
    dimension: u32,
) -> Result<(), String> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("trial_id", DataType::Int32, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dimension as i32),
            false,
        ),
    ]));

    let trial_id_values: Vec<i32> = success.iter().map(|(record, _)| record.trial_id as i32).collect();
    let trial_ids = Int32Array::from(trial_id_values);
    let vectors = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
        success
            .iter()
            .map(|(_, vector)| Some(vector.iter().map(|v| Some(*v)).collect::<Vec<_>>())),
        dimension as i32,
    );

    let batch = RecordBatch::try_new(schema.clone(), vec![Arc::new(trial_ids), Arc::new(vectors)])
        .map_err(|err| err.to_string())?;

    let dest = paths.embeddings_arrow();
    let parent = dest.parent().expect("embeddings.arrow always has a parent");
    let mut temp = tempfile::NamedTempFile::new_in(parent).map_err(|err| err.to_string())?;
    {
        let mut ipc_writer =
            arrow_ipc::writer::FileWriter::try_new(&mut temp, &schema).map_err(|err| err.to_string())?;
        ipc_writer.write(&batch).map_err(|err| err.to_string())?;
        ipc_writer.finish().map_err(|err| err.to_string())?;
    }
    temp.flush().map_err(|err| err.to_string())?;
    temp.persist(&dest).map_err(|err| err.to_string())?;
    Ok(())
}

/// When `--debug` is off and finalization produced `embeddings.arrow`,
/// the debug JSONL has served its purpose and is removed along with the
/// now-empty `debug/` directory. Returns whether the JSONL was retained.
fn cleanup(paths: &RunPaths, status: FinalizationStatus, debug: bool) -> Result<bool, FinalizerError> {
    if debug || status != FinalizationStatus::ArrowGenerated {
        return Ok(true);
    }

    let jsonl = paths.debug_embeddings_jsonl();
    if let Err(source) = std::fs::remove_file(&jsonl) {
        if source.kind() != std::io::ErrorKind::NotFound {
            return Err(FinalizerError::Cleanup { path: jsonl.display().to_string(), source });
        }
    }
    let dir = paths.debug_dir();
    let _ = std::fs::remove_dir(&dir);
    Ok(false)
}
