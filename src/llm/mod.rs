//! Local/remote language model adapter for free-form questions

pub mod client;

pub use client::LlmClient;
