//! ONNX Runtime session construction shared by the visual and sentence encoders.

use std::path::Path;

use ort::execution_providers::CUDAExecutionProvider;
use ort::session::Session;

use crate::device::Device;
use crate::error::PipelineError;

/// Build an inference session for `model_path`.
///
/// On CUDA the CUDA execution provider is registered first; ONNX Runtime falls
/// back to CPU kernels for anything it cannot place on the GPU.
pub fn build_session(model_path: &Path, device: Device) -> Result<Session, PipelineError> {
    let builder = Session::builder().map_err(|e| PipelineError::Model {
        message: format!("Failed to create ONNX session builder: {e}"),
    })?;

    let builder = match device {
        Device::Cuda => builder
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .map_err(|e| PipelineError::Model {
                message: format!("Failed to register CUDA execution provider: {e}"),
            })?,
        Device::Cpu => builder,
    };

    let session = builder
        .commit_from_file(model_path)
        .map_err(|e| PipelineError::Model {
            message: format!("Failed to load ONNX model {}: {e}", model_path.display()),
        })?;

    tracing::debug!(
        "Loaded {:?} on {device} (inputs: {:?}, outputs: {:?})",
        model_path,
        session.inputs().iter().map(|i| i.name()).collect::<Vec<_>>(),
        session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>()
    );

    Ok(session)
}
