//! Raw upload bytes → normalized NHWC tensor.

use image::imageops::FilterType;
use image::DynamicImage;
use ndarray::{Array4, ArrayView4};
use thiserror::Error;

pub const INPUT_HEIGHT: u32 = 64;
pub const INPUT_WIDTH: u32 = 64;
pub const INPUT_CHANNELS: usize = 3;

/// Bicubic, the same family of filter most imaging stacks default to.
const RESIZE_FILTER: FilterType = FilterType::CatmullRom;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("preprocessing failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("preprocessing failed: {0}")]
    Layout(#[from] ndarray::ShapeError),

    #[error("preprocessing failed: {0}")]
    Task(String),
}

/// Batch of one `f32` image in NHWC layout with values in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor(Array4<f32>);

impl ImageTensor {
    pub fn new(data: Array4<f32>) -> Self {
        Self(data)
    }

    pub fn shape(&self) -> &[usize] {
        self.0.shape()
    }

    pub fn view(&self) -> ArrayView4<'_, f32> {
        self.0.view()
    }

    pub fn as_slice(&self) -> Option<&[f32]> {
        self.0.as_slice()
    }
}

/// The `[batch, height, width, channels]` shape every tensor from
/// [`preprocess`] has.
pub fn expected_shape() -> [usize; 4] {
    [1, INPUT_HEIGHT as usize, INPUT_WIDTH as usize, INPUT_CHANNELS]
}

/// Decode, resize to 64×64 (aspect ratio is not preserved), force RGB,
/// scale to `[0, 1]` and add the batch axis.
pub fn preprocess(raw: &[u8]) -> Result<ImageTensor, PreprocessError> {
    let decoded = image::load_from_memory(raw)?;
    let resized = resize(decoded);
    let rgb = resized.to_rgb8();

    let values: Vec<f32> = rgb
        .into_raw()
        .into_iter()
        .map(|sample| f32::from(sample) / 255.0)
        .collect();

    let tensor = Array4::from_shape_vec(expected_shape(), values)?;
    Ok(ImageTensor(tensor))
}

/// [`preprocess`] on the blocking pool. Decoding a large upload would
/// otherwise stall every task sharing the worker thread.
pub async fn preprocess_blocking(raw: Vec<u8>) -> Result<ImageTensor, PreprocessError> {
    tokio::task::spawn_blocking(move || preprocess(&raw))
        .await
        .map_err(|e| PreprocessError::Task(format!("preprocessing task failed: {}", e)))?
}

fn resize(image: DynamicImage) -> DynamicImage {
    if image.width() == INPUT_WIDTH && image.height() == INPUT_HEIGHT {
        return image;
    }
    image.resize_exact(INPUT_WIDTH, INPUT_HEIGHT, RESIZE_FILTER)
}
