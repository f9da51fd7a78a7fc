//! CLIP visual encoder session and batch inference.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use crate::device::Device;
use crate::error::PipelineError;

use super::session::build_session;

/// Fallback output names, tried after the configured one.
const FALLBACK_OUTPUTS: &[&str] = &["image_embeds", "pooler_output"];

/// Wraps an ONNX Runtime session for a CLIP vision tower.
///
/// Uses a `Mutex` because `Session::run` requires `&mut self`.
pub struct ClipVisualSession {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
}

impl ClipVisualSession {
    pub fn load(model_path: &Path, device: Device, output_name: &str) -> Result<Self, PipelineError> {
        let session = build_session(model_path, device)?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .unwrap_or_else(|| "pixel_values".to_string());

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name: output_name.to_string(),
        })
    }

    /// Run one inference call over a stack of `[1, 3, S, S]` tensors.
    ///
    /// Returns one L2-normalized vector per input, in input order.
    pub fn embed_batch(
        &self,
        tensors: &[Array4<f32>],
        paths: &[PathBuf],
    ) -> Result<Vec<Vec<f32>>, PipelineError> {
        let batch_size = tensors.len();
        if batch_size == 0 {
            return Ok(vec![]);
        }
        let first_path = paths.first().cloned().unwrap_or_default();

        let (batch_shape, flat_data) = stack_batch(tensors).map_err(|(i, message)| {
            PipelineError::Embedding {
                path: paths.get(i).cloned().unwrap_or_default(),
                message,
            }
        })?;

        let input_value =
            Value::from_array((batch_shape, flat_data)).map_err(|e| PipelineError::Embedding {
                path: first_path.clone(),
                message: format!("Failed to create batch input tensor: {e}"),
            })?;

        let mut session = self.session.lock().map_err(|e| PipelineError::Embedding {
            path: first_path.clone(),
            message: format!("Session lock poisoned: {e}"),
        })?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_value])
            .map_err(|e| PipelineError::Embedding {
                path: first_path.clone(),
                message: format!("ONNX batch inference failed: {e}"),
            })?;

        let wanted: Vec<&str> = std::iter::once(self.output_name.as_str())
            .chain(FALLBACK_OUTPUTS.iter().copied())
            .collect();
        let output = wanted
            .iter()
            .find_map(|want| outputs.iter().find(|(name, _)| name == want))
            .or_else(|| outputs.iter().next())
            .ok_or_else(|| PipelineError::Embedding {
                path: first_path.clone(),
                message: "Model produced no outputs".to_string(),
            })?;

        let (shape, data) =
            output
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Embedding {
                    path: first_path.clone(),
                    message: format!("Failed to extract {} tensor: {e}", output.0),
                })?;

        split_embeddings(&shape, data, batch_size).map_err(|message| PipelineError::Embedding {
            path: first_path,
            message,
        })
    }
}

/// Stack `[1, C, H, W]` tensors into one flat `[N, C, H, W]` buffer.
///
/// On a shape mismatch returns the offending index.
fn stack_batch(tensors: &[Array4<f32>]) -> Result<(Vec<i64>, Vec<f32>), (usize, String)> {
    let shape_0 = tensors[0].shape();
    for (i, t) in tensors.iter().enumerate().skip(1) {
        if t.shape() != shape_0 {
            return Err((
                i,
                format!(
                    "Tensor shape mismatch in batch: expected {:?}, got {:?}",
                    shape_0,
                    t.shape()
                ),
            ));
        }
    }

    let mut flat_data = Vec::with_capacity(tensors.len() * tensors[0].len());
    for t in tensors {
        flat_data.extend(t.iter().copied());
    }
    let shape = vec![
        tensors.len() as i64,
        shape_0[1] as i64,
        shape_0[2] as i64,
        shape_0[3] as i64,
    ];
    Ok((shape, flat_data))
}

/// Split a `[N, D]` (or `[N, T, D]`, first token) output into normalized rows.
fn split_embeddings(
    shape: &[i64],
    data: &[f32],
    batch_size: usize,
) -> Result<Vec<Vec<f32>>, String> {
    let (row_stride, dim) = match shape.len() {
        1 => (data.len() / batch_size, data.len() / batch_size),
        2 => (shape[1] as usize, shape[1] as usize),
        3 => ((shape[1] * shape[2]) as usize, shape[2] as usize),
        _ => return Err(format!("Unexpected output shape: {shape:?}")),
    };
    if dim == 0 || data.len() < row_stride * batch_size {
        return Err(format!(
            "Output shape {shape:?} does not hold {batch_size} embeddings"
        ));
    }

    Ok(data
        .chunks(row_stride)
        .take(batch_size)
        .map(|row| crate::math::l2_normalize(&row[..dim]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stack_batch_detects_shape_mismatch() {
        let tensors = [
            Array4::<f32>::zeros((1, 3, 224, 224)),
            Array4::<f32>::zeros((1, 3, 336, 336)),
        ];
        let err = stack_batch(&tensors).unwrap_err();
        assert_eq!(err.0, 1);
    }

    #[test]
    fn test_stack_batch_layout() {
        let t1 = Array4::<f32>::ones((1, 3, 2, 2));
        let mut t2 = Array4::<f32>::zeros((1, 3, 2, 2));
        t2[[0, 0, 0, 0]] = 2.0;

        let (shape, flat) = stack_batch(&[t1, t2]).unwrap();
        assert_eq!(shape, vec![2, 3, 2, 2]);
        assert_eq!(flat.len(), 24);
        assert!(flat[..12].iter().all(|&v| v == 1.0));
        assert_eq!(flat[12], 2.0);
    }

    #[test]
    fn test_split_embeddings_2d() {
        let data = [3.0, 4.0, 0.0, 2.0];
        let rows = split_embeddings(&[2, 2], &data, 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert!((rows[0][0] - 0.6).abs() < 1e-6);
        assert!((rows[1][1] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_split_embeddings_takes_first_token() {
        // [N=1, T=2, D=2]: only the first token row is used.
        let data = [1.0, 0.0, 0.0, 5.0];
        let rows = split_embeddings(&[1, 2, 2], &data, 1).unwrap();
        assert_eq!(rows, vec![vec![1.0, 0.0]]);
    }

    #[test]
    fn test_split_embeddings_rejects_short_output() {
        assert!(split_embeddings(&[1, 4], &[1.0, 2.0, 3.0, 4.0], 2).is_err());
    }
}
