pub mod google;
pub mod openai;

pub use google::GoogleImages;
pub use openai::OpenAiImages;
