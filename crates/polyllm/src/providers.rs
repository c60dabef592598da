pub mod anthropic;
pub mod base;
pub mod configs;
pub mod factory;
pub mod google;
pub mod ollama;
pub mod openai;
pub mod utils;

#[cfg(test)]
pub mod mock;
