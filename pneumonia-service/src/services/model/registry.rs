//! The process-wide model handle.

use super::{check_input, check_probability, InferenceModel, ModelError, ModelLoader};
use crate::services::preprocess::{expected_shape, ImageTensor};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;

/// Owns exactly one live model.
///
/// Readers clone the current `Arc` and release the lock before running
/// inference, so a reload never tears down a model mid-request: the old
/// handle is dropped once its last in-flight call finishes. Reloads are
/// serialized and only swap after the replacement loaded successfully.
pub struct ModelRegistry {
    loader: Arc<dyn ModelLoader>,
    model_path: PathBuf,
    current: RwLock<Arc<dyn InferenceModel>>,
    reload_lock: Mutex<()>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("model_path", &self.model_path)
            .field("input", self.current().input_signature())
            .finish()
    }
}

async fn load_blocking(
    loader: Arc<dyn ModelLoader>,
    path: PathBuf,
) -> Result<Arc<dyn InferenceModel>, ModelError> {
    let join_path = path.clone();
    tokio::task::spawn_blocking(move || loader.load(&path))
        .await
        .map_err(|e| ModelError::Load {
            path: join_path,
            reason: format!("loader task failed: {}", e),
        })?
}

impl ModelRegistry {
    /// Performs the initial load. No registry exists without a loaded model.
    pub async fn load(
        loader: Arc<dyn ModelLoader>,
        model_path: impl Into<PathBuf>,
    ) -> Result<Self, ModelError> {
        let model_path = model_path.into();
        let model = load_blocking(loader.clone(), model_path.clone()).await?;

        Ok(Self {
            loader,
            model_path,
            current: RwLock::new(model),
            reload_lock: Mutex::new(()),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn runtime_version(&self) -> String {
        self.loader.runtime_version()
    }

    /// Snapshot of the live handle.
    pub fn current(&self) -> Arc<dyn InferenceModel> {
        // The guarded value is a plain Arc swap, so a poisoned lock still
        // holds a complete handle.
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Whether the live handle can serve a prediction: its input slot takes
    /// the preprocessed `[1, 64, 64, 3]` f32 tensor.
    pub fn is_loaded(&self) -> bool {
        self.current().input_signature().accepts(&expected_shape())
    }

    /// Validates the tensor against the live model's input slot and runs one
    /// forward pass on the blocking pool.
    pub async fn classify(&self, tensor: ImageTensor) -> Result<f32, ModelError> {
        let model = self.current();
        check_input(model.as_ref(), &tensor)?;

        let start = Instant::now();
        let raw = tokio::task::spawn_blocking(move || model.classify(&tensor))
            .await
            .map_err(|e| ModelError::Inference(format!("inference task failed: {}", e)))??;

        metrics::histogram!("inference_duration_seconds").record(start.elapsed().as_secs_f64());

        check_probability(raw)
    }

    /// Reloads from the configured path and swaps only on success. A failed
    /// reload leaves the previous model in service.
    pub async fn reload(&self) -> Result<(), ModelError> {
        let _guard = self.reload_lock.lock().await;

        tracing::info!(model_path = %self.model_path.display(), "Reloading model");

        match load_blocking(self.loader.clone(), self.model_path.clone()).await {
            Ok(model) => {
                let previous = {
                    let mut current = self
                        .current
                        .write()
                        .unwrap_or_else(|poisoned| poisoned.into_inner());
                    std::mem::replace(&mut *current, model)
                };
                drop(previous);

                metrics::counter!("model_reloads_total", "outcome" => "success").increment(1);
                tracing::info!(model_path = %self.model_path.display(), "Model reloaded");
                Ok(())
            }
            Err(e) => {
                metrics::counter!("model_reloads_total", "outcome" => "failure").increment(1);
                tracing::error!(
                    model_path = %self.model_path.display(),
                    error = %e,
                    "Model reload failed; keeping previous model"
                );
                Err(e)
            }
        }
    }
}
