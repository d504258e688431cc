use async_trait::async_trait;

use crate::Result;
use crate::types::{GenerationIntent, ImageRef, Mode, ModelId};

/// One provider-backed image model. Implementations translate the
/// normalized intent into the provider's wire format and parse the
/// provider's response back into an [`ImageRef`].
#[async_trait]
pub trait ImageModel: Send + Sync {
    fn id(&self) -> ModelId;

    fn supports(&self, mode: Mode) -> bool;

    async fn generate(&self, intent: &GenerationIntent) -> Result<ImageRef>;
}
