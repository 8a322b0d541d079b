//! Inference engine adapter.
//!
//! A [`ModelLoader`] turns an artifact path into a ready [`InferenceModel`];
//! the [`ModelRegistry`] owns the single live handle and swaps it on reload.
//! Backends: ONNX Runtime for production and a static backend for tests.

pub mod mock;
pub mod onnx;
pub mod registry;

pub use mock::{StaticModel, StaticModelLoader};
pub use onnx::{OnnxModel, OnnxModelLoader};
pub use registry::ModelRegistry;

use crate::services::preprocess::ImageTensor;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model file not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to load model from {}: {reason}", .path.display())]
    Load { path: PathBuf, reason: String },

    #[error("Input mismatch: model expects {expected}, got {actual:?} f32")]
    ShapeMismatch {
        expected: InputSignature,
        actual: Vec<usize>,
    },

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Element type of a declared model input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementType {
    Float32,
    Other(String),
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Float32 => f.write_str("f32"),
            ElementType::Other(name) => f.write_str(name),
        }
    }
}

/// The input slot a model declares. Negative dimensions are dynamic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputSignature {
    pub name: String,
    pub dims: Vec<i64>,
    pub element_type: ElementType,
}

impl InputSignature {
    /// Whether an `f32` tensor of `shape` can be bound to this slot.
    pub fn accepts(&self, shape: &[usize]) -> bool {
        self.element_type == ElementType::Float32
            && self.dims.len() == shape.len()
            && self
                .dims
                .iter()
                .zip(shape)
                .all(|(&declared, &actual)| declared < 0 || declared as usize == actual)
    }
}

impl fmt::Display for InputSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' {:?} {}", self.name, self.dims, self.element_type)
    }
}

/// A loaded, ready-to-run classification model.
///
/// Implementations must tolerate concurrent `classify` calls.
pub trait InferenceModel: Send + Sync {
    fn input_signature(&self) -> &InputSignature;

    /// One forward pass returning the raw positive-class score.
    ///
    /// Callers validate the tensor against [`Self::input_signature`] first.
    fn classify(&self, tensor: &ImageTensor) -> Result<f32, ModelError>;
}

/// Builds fully initialised models from artifacts. Loading is blocking.
pub trait ModelLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<Arc<dyn InferenceModel>, ModelError>;

    /// Human-readable name and version of the inference runtime.
    fn runtime_version(&self) -> String;
}

pub(crate) fn check_input(model: &dyn InferenceModel, tensor: &ImageTensor) -> Result<(), ModelError> {
    let signature = model.input_signature();
    if signature.accepts(tensor.shape()) {
        Ok(())
    } else {
        Err(ModelError::ShapeMismatch {
            expected: signature.clone(),
            actual: tensor.shape().to_vec(),
        })
    }
}

pub(crate) fn check_probability(value: f32) -> Result<f32, ModelError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ModelError::Inference(format!(
            "model output {} is not a probability in [0, 1]",
            value
        )))
    }
}
