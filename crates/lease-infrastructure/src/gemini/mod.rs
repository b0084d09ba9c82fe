//! Gemini-backed document intelligence

pub mod client;
pub mod prompts;

pub use client::{GeminiClient, GeminiConfig};
