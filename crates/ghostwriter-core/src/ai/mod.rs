pub mod huggingface;
pub mod workers;

pub use huggingface::HuggingFaceClient;
pub use workers::WorkersAiClient;
