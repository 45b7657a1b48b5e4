// ============================================================
// Layer 4 — Tensor Batcher
// ============================================================
// Converts a pipeline Batch into Burn tensors for a model
// forward pass.
//
// How batching works here:
//   Input:  Batch of N ExampleRecords, every feature fixed-length
//   Output: one [N, length] float tensor per feature
//
//   Each feature is flattened row-major then reshaped:
//   [r1_t1, ..., r1_tL, r2_t1, ..., rN_tL] → [N, L]
//
// Reference: Burn Book §4 (Batcher)

use std::collections::BTreeMap;

use burn::{prelude::*, tensor::TensorData};

use crate::data::example::serialize_record;
use crate::data::pipeline::Batch;
use crate::domain::error::{Result, VocoderError};
use crate::domain::example::{ExampleRecord, FeatureSchema};

// ─── FeatureBatch ─────────────────────────────────────────────────────────────
/// A batch of examples ready for the model.
#[derive(Debug, Clone)]
pub struct FeatureBatch<B: Backend> {
    /// Target audio — shape: [batch_size, audio_length]
    pub audio: Tensor<B, 2>,

    /// Conditioning signals keyed by name — each [batch_size, input_length]
    pub inputs: BTreeMap<String, Tensor<B, 2>>,
}

impl<B: Backend> FeatureBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.audio.dims()[0]
    }

    /// Pull one row back out of the tensors as a plain record.
    pub fn row(&self, row: usize) -> Result<ExampleRecord> {
        if row >= self.batch_size() {
            return Err(VocoderError::Config(format!(
                "row {row} out of range for a batch of {}",
                self.batch_size()
            )));
        }
        let mut record = ExampleRecord::new().with("audio", row_values(&self.audio, row)?);
        for (name, tensor) in &self.inputs {
            record.features.insert(name.clone(), row_values(tensor, row)?);
        }
        Ok(record)
    }

    /// Serialize one row as a tf.train.Example, the same wire form
    /// the record files hold.
    pub fn serialize_row(&self, row: usize) -> Result<Vec<u8>> {
        Ok(serialize_record(&self.row(row)?))
    }
}

fn row_values<B: Backend>(tensor: &Tensor<B, 2>, row: usize) -> Result<Vec<f32>> {
    tensor
        .clone()
        .narrow(0, row, 1)
        .into_data()
        .to_vec::<f32>()
        .map_err(|e| VocoderError::Decode(format!("cannot read tensor row {row}: {e:?}")))
}

// ─── FeatureBatcher ───────────────────────────────────────────────────────────
/// Holds the target device and the schema every batch must follow.
#[derive(Clone, Debug)]
pub struct FeatureBatcher<B: Backend> {
    pub device: B::Device,
    schema: FeatureSchema,
}

impl<B: Backend> FeatureBatcher<B> {
    pub fn new(device: B::Device, schema: FeatureSchema) -> Self {
        Self { device, schema }
    }

    pub fn batch(&self, batch: &Batch) -> Result<FeatureBatch<B>> {
        if batch.is_empty() {
            return Err(VocoderError::Config("cannot build tensors from an empty batch".into()));
        }
        let mut audio = None;
        let mut inputs = BTreeMap::new();

        for (name, length) in self.schema.fields() {
            let flat = batch
                .feature(name)
                .ok_or_else(|| VocoderError::Decode(format!("batch lacks feature '{name}'")))?;
            if flat.len() != batch.len() * length {
                return Err(VocoderError::Decode(format!(
                    "feature '{name}' does not have length {length} in every record"
                )));
            }
            let data = TensorData::new(flat, [batch.len(), *length]);
            let tensor = Tensor::<B, 2>::from_data(data, &self.device);
            if name == "audio" {
                audio = Some(tensor);
            } else {
                inputs.insert(name.clone(), tensor);
            }
        }

        let audio = audio.ok_or_else(|| VocoderError::Config("schema has no audio feature".into()))?;
        Ok(FeatureBatch { audio, inputs })
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::example::parse_example;
    use burn::backend::NdArray;

    fn schema() -> FeatureSchema {
        let mut s = FeatureSchema::new();
        s.push("audio", 3);
        s.push("f0", 2);
        s
    }

    #[test]
    fn test_tensor_shapes() {
        let batch = Batch::new(vec![
            ExampleRecord::new().with("audio", vec![1.0, 2.0, 3.0]).with("f0", vec![5.0, 6.0]),
            ExampleRecord::new().with("audio", vec![4.0, 5.0, 6.0]).with("f0", vec![7.0, 8.0]),
        ]);
        let batcher = FeatureBatcher::<NdArray>::new(Default::default(), schema());
        let out = batcher.batch(&batch).unwrap();
        assert_eq!(out.audio.dims(), [2, 3]);
        assert_eq!(out.inputs["f0"].dims(), [2, 2]);
        let values = out.inputs["f0"].clone().into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_row_serializes_as_example() {
        let second = ExampleRecord::new().with("audio", vec![4.0, 5.0, 6.0]).with("f0", vec![7.0, 8.0]);
        let batch = Batch::new(vec![
            ExampleRecord::new().with("audio", vec![1.0, 2.0, 3.0]).with("f0", vec![5.0, 6.0]),
            second.clone(),
        ]);
        let out = FeatureBatcher::<NdArray>::new(Default::default(), schema()).batch(&batch).unwrap();

        let bytes = out.serialize_row(1).unwrap();
        assert_eq!(parse_example(&bytes, &schema()).unwrap(), second);
        assert!(matches!(out.serialize_row(2), Err(VocoderError::Config(_))));
    }

    #[test]
    fn test_missing_feature_rejected() {
        let batch = Batch::new(vec![ExampleRecord::new().with("audio", vec![1.0, 2.0, 3.0])]);
        let batcher = FeatureBatcher::<NdArray>::new(Default::default(), schema());
        assert!(batcher.batch(&batch).is_err());
    }
}
