//! LLM provider clients and abstractions
//!
//! The chat pipeline only sees [`LLMClient`], a streaming completion source
//! that yields text deltas and a usage report. The module provides:
//! - [`client`] - the trait, model allow-list and provider content model
//! - [`openai`] - the OpenAI-compatible adapter built on `async-openai`
//!
//! # Example
//!
//! ```ignore
//! use mnemo::llm::{ChatMessage, ChatModel, LLMClient, Provider};
//!
//! let client = Provider::OpenAI { api_key, api_base, request_timeout_secs: 120 }.create_client()?;
//! let response = client.complete(&[ChatMessage::user("What is 2+2?")], ChatModel::default()).await?;
//! println!("{}", response.content);
//! ```

pub mod client;
pub mod openai;

pub use client::{
    ChatMessage, ChatModel, ChatRole, CompletionStream, ContentPart, ImageUrl, LLMClient,
    LLMResponse, MessageContent, Provider, StreamChunk,
};
pub use openai::OpenAIClient;
