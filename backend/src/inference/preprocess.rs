use crate::inference::model::InferenceError;
use image::imageops::FilterType;
use tch::Tensor;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Decode uploaded bytes into a normalized NCHW float tensor.
pub fn image_to_tensor(image: &[u8], size: u32) -> Result<Tensor, InferenceError> {
    let img = image::load_from_memory(image)?.to_rgb8();
    let resized = image::imageops::resize(&img, size, size, FilterType::Triangle);

    let side = size as usize;
    let mut data = vec![0f32; 3 * side * side];
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            data[c * side * side + y as usize * side + x as usize] =
                (value - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
        }
    }

    Ok(Tensor::from_slice(&data).view([1, 3, size as i64, size as i64]))
}
