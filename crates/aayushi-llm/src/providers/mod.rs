pub mod common;
pub mod groq;

pub use groq::GroqProvider;
