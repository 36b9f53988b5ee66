pub mod attributes;
pub mod backend;
pub mod classifier;
pub mod fallback;
pub mod generator;
pub mod types;

pub use generator::PromptGenerator;
pub use types::{AttributeLayer, GenerationOutcome};
