pub mod extract;
pub mod resolve;

pub use extract::{Confidence, Extraction, ModelCategory, ModelReference, RefSource};
pub use resolve::ModelLocator;

/// File extensions that mark a value as a model weight file. The superset of
/// what the per-family tools accepted (gguf showed up with Wan2, onnx with
/// face-analysis models).
pub const MODEL_EXTENSIONS: &[&str] =
    &[".safetensors", ".ckpt", ".pth", ".pt", ".bin", ".onnx", ".gguf"];

/// True when `value` names a model weight file by extension.
pub fn is_model_filename(value: &str) -> bool {
    let lower = value.to_ascii_lowercase();
    MODEL_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}
