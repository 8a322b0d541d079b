//! Static model backend for testing.

use super::{ElementType, InferenceModel, InputSignature, ModelError, ModelLoader};
use crate::services::preprocess::ImageTensor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Model that returns the same score for every input.
#[derive(Debug)]
pub struct StaticModel {
    probability: f32,
    input: InputSignature,
}

impl StaticModel {
    pub fn new(probability: f32) -> Self {
        Self::with_dims(probability, vec![1, 64, 64, 3])
    }

    pub fn with_dims(probability: f32, dims: Vec<i64>) -> Self {
        Self {
            probability,
            input: InputSignature {
                name: "input_1".to_string(),
                dims,
                element_type: ElementType::Float32,
            },
        }
    }
}

impl InferenceModel for StaticModel {
    fn input_signature(&self) -> &InputSignature {
        &self.input
    }

    fn classify(&self, _tensor: &ImageTensor) -> Result<f32, ModelError> {
        Ok(self.probability)
    }
}

/// Loader producing [`StaticModel`]s; the score, declared input shape and
/// whether loading fails can be changed between loads.
#[derive(Debug)]
pub struct StaticModelLoader {
    probability_bits: AtomicU32,
    dims: Vec<i64>,
    failing: AtomicBool,
    loads: AtomicUsize,
}

impl StaticModelLoader {
    pub fn new(probability: f32) -> Self {
        Self::with_dims(probability, vec![1, 64, 64, 3])
    }

    pub fn with_dims(probability: f32, dims: Vec<i64>) -> Self {
        Self {
            probability_bits: AtomicU32::new(probability.to_bits()),
            dims,
            failing: AtomicBool::new(false),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn set_probability(&self, probability: f32) {
        self.probability_bits
            .store(probability.to_bits(), Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful loads so far.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for StaticModelLoader {
    fn load(&self, path: &Path) -> Result<Arc<dyn InferenceModel>, ModelError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ModelError::Load {
                path: path.to_path_buf(),
                reason: "static loader configured to fail".to_string(),
            });
        }

        let probability = f32::from_bits(self.probability_bits.load(Ordering::SeqCst));
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StaticModel::with_dims(probability, self.dims.clone())))
    }

    fn runtime_version(&self) -> String {
        "static".to_string()
    }
}
