//! ONNX Runtime backend.

use super::{ElementType, InferenceModel, InputSignature, ModelError, ModelLoader};
use crate::services::preprocess::ImageTensor;
use ort::session::Session;
use ort::tensor::TensorElementType;
use ort::value::{TensorRef, ValueType};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const RUNTIME_VERSION: &str = "onnxruntime (ort 2.0.0-rc.10)";

/// Loads ONNX artifacts into a small pool of sessions.
#[derive(Debug, Clone)]
pub struct OnnxModelLoader {
    sessions: usize,
}

impl OnnxModelLoader {
    pub fn new(sessions: usize) -> Self {
        Self {
            sessions: sessions.max(1),
        }
    }
}

impl Default for OnnxModelLoader {
    fn default() -> Self {
        Self::new(1)
    }
}

fn load_session(path: &Path) -> Result<Session, ModelError> {
    Session::builder()
        .and_then(|b| b.commit_from_file(path))
        .map_err(|e| ModelError::Load {
            path: path.to_path_buf(),
            reason: format!("failed to create ONNX session: {}", e),
        })
}

fn input_signature(session: &Session, path: &Path) -> Result<InputSignature, ModelError> {
    let input = session.inputs.first().ok_or_else(|| ModelError::Load {
        path: path.to_path_buf(),
        reason: "model declares no inputs".to_string(),
    })?;

    match &input.input_type {
        ValueType::Tensor { ty, shape, .. } => {
            let dims: Vec<i64> = shape.iter().copied().collect();
            if dims.len() != 4 {
                return Err(ModelError::Load {
                    path: path.to_path_buf(),
                    reason: format!("expected a 4D image input, model declares {:?}", dims),
                });
            }
            let element_type = match ty {
                TensorElementType::Float32 => ElementType::Float32,
                other => ElementType::Other(format!("{:?}", other)),
            };
            Ok(InputSignature {
                name: input.name.clone(),
                dims,
                element_type,
            })
        }
        other => Err(ModelError::Load {
            path: path.to_path_buf(),
            reason: format!("input '{}' is not a tensor: {:?}", input.name, other),
        }),
    }
}

impl ModelLoader for OnnxModelLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn InferenceModel>, ModelError> {
        if !path.exists() {
            return Err(ModelError::NotFound(path.to_path_buf()));
        }

        tracing::info!(model_path = %path.display(), sessions = self.sessions, "Loading ONNX model");

        let sessions = (0..self.sessions)
            .map(|_| load_session(path))
            .collect::<Result<Vec<_>, _>>()?;

        // Pool size is at least one, so the first session always exists.
        let first = &sessions[0];
        let input = input_signature(first, path)?;
        let output_name = first
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| ModelError::Load {
                path: path.to_path_buf(),
                reason: "model declares no outputs".to_string(),
            })?;

        tracing::info!(
            model_path = %path.display(),
            input = %input,
            output = %output_name,
            "ONNX model loaded"
        );

        Ok(Arc::new(OnnxModel {
            sessions: sessions.into_iter().map(Mutex::new).collect(),
            next_idx: AtomicUsize::new(0),
            input,
            output_name,
            model_path: path.to_path_buf(),
        }))
    }

    fn runtime_version(&self) -> String {
        RUNTIME_VERSION.to_string()
    }
}

/// A loaded ONNX classifier.
///
/// `Session::run` needs exclusive access, so each session sits behind its own
/// mutex and calls are spread round-robin across the pool.
pub struct OnnxModel {
    sessions: Vec<Mutex<Session>>,
    next_idx: AtomicUsize,
    input: InputSignature,
    output_name: String,
    model_path: PathBuf,
}

impl std::fmt::Debug for OnnxModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxModel")
            .field("sessions", &self.sessions.len())
            .field("input", &self.input)
            .field("output_name", &self.output_name)
            .field("model_path", &self.model_path)
            .finish()
    }
}

impl InferenceModel for OnnxModel {
    fn input_signature(&self) -> &InputSignature {
        &self.input
    }

    fn classify(&self, tensor: &ImageTensor) -> Result<f32, ModelError> {
        let input_tensor = TensorRef::from_array_view(tensor.view()).map_err(|e| {
            ModelError::Inference(format!(
                "failed to bind input tensor with shape {:?}: {}",
                tensor.shape(),
                e
            ))
        })?;
        let inputs = ort::inputs![self.input.name.as_str() => input_tensor];

        let idx = self.next_idx.fetch_add(1, Ordering::Relaxed) % self.sessions.len();
        let mut session = self.sessions[idx].lock().map_err(|_| {
            ModelError::Inference(format!(
                "session {}/{} lock poisoned",
                idx,
                self.sessions.len()
            ))
        })?;

        let outputs = session
            .run(inputs)
            .map_err(|e| ModelError::Inference(format!("forward pass failed: {}", e)))?;

        let (_, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                ModelError::Inference(format!(
                    "failed to read output '{}' as f32: {}",
                    self.output_name, e
                ))
            })?;

        match data {
            [probability] => Ok(*probability),
            _ => Err(ModelError::Inference(format!(
                "expected a single scalar output, got {} values",
                data.len()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_artifact_is_not_found() {
        let loader = OnnxModelLoader::default();
        let err = loader
            .load(Path::new("does/not/exist/model.onnx"))
            .err().unwrap();
        assert!(matches!(err, ModelError::NotFound(_)));
        assert!(err.to_string().contains("does/not/exist/model.onnx"));
    }

    #[test]
    fn malformed_artifact_fails_to_load() {
        let path = std::env::temp_dir().join(format!("malformed-{}.onnx", std::process::id()));
        std::fs::write(&path, b"not an onnx graph").unwrap();

        let err = OnnxModelLoader::default().load(&path).err().unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(matches!(err, ModelError::Load { .. }), "got {err:?}");
    }
}
