mod error;
pub mod image;
mod orchestrator;
pub mod providers;
pub mod raster;
mod retry;
pub mod secrets;
pub mod state;
pub mod types;
pub mod utils;

pub use error::{Result, TriptychError};
pub use image::ImageModel;
pub use orchestrator::Orchestrator;
pub use providers::{GoogleImages, OpenAiImages};
pub use retry::RetryPolicy;
pub use secrets::{CredentialStore, Credentials, Env, FileCredentialStore};
pub use state::{BoardSnapshot, RunBoard, RunState};
pub use types::{GenerationIntent, ImageRef, Mode, ModelId, SourceImage};
