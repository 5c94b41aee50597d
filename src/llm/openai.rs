use crate::llm::client::{ChatMessage, ChatModel, CompletionStream, LLMClient, StreamChunk};
use crate::types::{AppError, Result, TokenUsage};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{CreateChatCompletionRequest, CreateChatCompletionStreamResponse},
    Client,
};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Streaming client for the OpenAI chat completions API (and compatible servers).
pub struct OpenAIClient {
    client: Client<OpenAIConfig>,
}

impl OpenAIClient {
    /// `request_timeout_secs` bounds the wait for each read, so a long reply
    /// keeps streaming as long as chunks keep arriving.
    pub fn new(api_key: String, api_base: String, request_timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .read_timeout(Duration::from_secs(request_timeout_secs))
            .build()
            .map_err(|e| AppError::LLM(format!("Failed to build HTTP client: {}", e)))?;

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base.trim_end_matches('/'));

        Ok(Self {
            client: Client::with_config(config).with_http_client(http),
        })
    }
}

fn to_chunks(response: CreateChatCompletionStreamResponse) -> Vec<StreamChunk> {
    let mut chunks: Vec<StreamChunk> = response
        .choices
        .into_iter()
        .filter_map(|choice| choice.delta.content)
        .filter(|text| !text.is_empty())
        .map(StreamChunk::Delta)
        .collect();

    if let Some(usage) = response.usage {
        chunks.push(StreamChunk::Usage(TokenUsage {
            prompt_tokens: u64::from(usage.prompt_tokens),
            completion_tokens: u64::from(usage.completion_tokens),
            total_tokens: u64::from(usage.total_tokens),
        }));
    }

    chunks
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn stream_chat(
        &self,
        messages: &[ChatMessage],
        model: ChatModel,
    ) -> Result<CompletionStream> {
        // ChatMessage already serializes in the wire format, including image parts.
        let request: CreateChatCompletionRequest = serde_json::from_value(serde_json::json!({
            "model": model.as_str(),
            "messages": messages,
            "stream": true,
            "stream_options": { "include_usage": true },
        }))
        .map_err(|e| AppError::LLM(format!("Failed to build request: {}", e)))?;

        let mut stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| AppError::LLM(format!("OpenAI API error: {}", e)))?;

        // Connection and status failures arrive as the first item.
        let first = match stream.next().await {
            Some(Ok(response)) => to_chunks(response),
            Some(Err(e)) => return Err(AppError::LLM(format!("OpenAI API error: {}", e))),
            None => Vec::new(),
        };

        tracing::debug!(model = %model, "Streaming completion started");

        let chunks = async_stream::stream! {
            for chunk in first {
                yield Ok(chunk);
            }
            while let Some(item) = stream.next().await {
                match item {
                    Ok(response) => {
                        for chunk in to_chunks(response) {
                            yield Ok(chunk);
                        }
                    }
                    Err(e) => {
                        yield Err(AppError::LLM(format!("Stream error: {}", e)));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(chunks))
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
