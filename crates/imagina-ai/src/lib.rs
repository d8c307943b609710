//! # imagina-ai
//!
//! Clients for the generative providers behind Imagina: an image generator
//! and a tag/prompt suggester.  The gallery only sees the two traits in
//! [`provider`]; [`gemini::GeminiClient`] implements both against the Google
//! Generative Language API.

pub mod error;
pub mod gemini;
pub mod prompt;
pub mod provider;
pub mod suggest;

pub use error::{AiError, Result};
pub use gemini::{GeminiClient, GeminiConfig};
pub use provider::{GeneratedImage, GenerationRequest, ImageGenerator, Suggestions, TagSuggester};
