pub mod content_guard;
pub mod credential;
pub mod elevenlabs;
pub mod error;
pub mod gemini;
pub mod http;
pub mod pdf;
