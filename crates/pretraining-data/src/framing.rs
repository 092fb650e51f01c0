use candle_core::{Device, Tensor};

use crate::errors::{Error, Result};

/// One next-token-prediction example.
///
/// Both halves are views of one `sequence_length + 1` content buffer:
/// `samples = buffer[..L]` and `targets = buffer[1..]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub samples: Vec<u32>,
    pub targets: Vec<u32>,
}

impl Sample {
    pub fn sequence_length(&self) -> usize {
        self.samples.len()
    }

    /// Rebuilds the content buffer the pair was sliced from.
    pub fn content_buffer(&self) -> Vec<u32> {
        let mut buffer = self.samples.clone();
        buffer.extend(self.targets.last().copied());
        buffer
    }

    /// `[L]` i64 tensors for `samples` and `targets`.
    pub fn to_tensors(&self, device: &Device) -> Result<(Tensor, Tensor)> {
        let len = self.samples.len();
        let samples = Tensor::from_vec(widen(&self.samples), len, device)?;
        let targets = Tensor::from_vec(widen(&self.targets), len, device)?;
        Ok((samples, targets))
    }
}

/// Frames `tokens` into a fixed-width pair.
///
/// The first `min(tokens.len(), sequence_length + 1)` ids are copied verbatim
/// and the rest of the buffer is filled with `pad_token_id`.
pub fn frame_tokens(tokens: &[u32], sequence_length: usize, pad_token_id: u32) -> Sample {
    let valid = tokens.len().min(sequence_length + 1);
    let mut buffer = vec![pad_token_id; sequence_length + 1];
    buffer[..valid].copy_from_slice(&tokens[..valid]);

    let targets = buffer[1..].to_vec();
    buffer.truncate(sequence_length);
    Sample {
        samples: buffer,
        targets,
    }
}

/// A stack of samples ready for a training step.
#[derive(Debug)]
pub struct SampleBatch {
    /// `[batch, sequence_length]` i64 input ids.
    pub samples: Tensor,
    /// `[batch, sequence_length]` i64 labels.
    pub targets: Tensor,
    pub batch_size: usize,
    pub sequence_length: usize,
}

/// Stacks equally sized samples into `[batch, sequence_length]` tensors.
pub fn collate(batch: &[Sample], device: &Device) -> Result<SampleBatch> {
    let first = batch
        .first()
        .ok_or_else(|| Error::invalid_config("cannot collate an empty batch"))?;
    let sequence_length = first.sequence_length();

    if let Some(odd) = batch
        .iter()
        .position(|sample| sample.sequence_length() != sequence_length)
    {
        return Err(Error::invalid_config(format!(
            "sample {} has length {} but the batch expects {}",
            odd,
            batch[odd].sequence_length(),
            sequence_length
        )));
    }

    let mut samples = Vec::with_capacity(batch.len() * sequence_length);
    let mut targets = Vec::with_capacity(batch.len() * sequence_length);
    for sample in batch {
        samples.extend(sample.samples.iter().map(|&id| id as i64));
        targets.extend(sample.targets.iter().map(|&id| id as i64));
    }

    let shape = (batch.len(), sequence_length);
    Ok(SampleBatch {
        samples: Tensor::from_vec(samples, shape, device)?,
        targets: Tensor::from_vec(targets, shape, device)?,
        batch_size: batch.len(),
        sequence_length,
    })
}

// i64 avoids signedness surprises in embedding lookups and losses.
fn widen(ids: &[u32]) -> Vec<i64> {
    ids.iter().map(|&id| id as i64).collect()
}
