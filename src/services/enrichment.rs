//! 图片描述服务 - 业务能力层
//!
//! 只负责"给一张图片生成描述"这一能力，不关心上传流程。
//! 上传流程只依赖 `Enricher` trait；调用失败由流程层吞掉并记录日志。
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 兼容 OpenAI API 的服务（支持 Vision 的模型）

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use std::time::Duration;
use base64::Engine;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;

/// 图片描述请求
#[derive(Debug, Clone)]
pub struct EnrichmentRequest {
    /// 图片内容；没有本地文件时为 `None`
    pub image_bytes: Option<Vec<u8>>,
    pub mime_type: String,
    pub file_name: String,
}

/// 图片描述响应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentResponse {
    pub success: bool,
    pub description: Option<String>,
}

impl EnrichmentResponse {
    pub fn described(description: impl Into<String>) -> Self {
        Self {
            success: true,
            description: Some(description.into()),
        }
    }

    /// 有效的描述文本（成功且非空）
    pub fn into_description(self) -> Option<String> {
        if !self.success {
            return None;
        }
        self.description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
    }
}

/// 图片描述失败
#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("图片描述服务不可用")]
    Unavailable,
    #[error("图片描述请求失败: {0}")]
    Request(String),
    #[error("图片描述返回内容为空")]
    EmptyResponse,
    #[error("图片描述超时 ({0:?})")]
    Timeout(Duration),
}

/// 图片描述协作方
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn describe(
        &self,
        request: EnrichmentRequest,
    ) -> Result<EnrichmentResponse, EnrichmentError>;
}

/// 未配置描述服务时使用：永远返回不可用
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableEnricher;

#[async_trait]
impl Enricher for UnavailableEnricher {
    async fn describe(
        &self,
        _request: EnrichmentRequest,
    ) -> Result<EnrichmentResponse, EnrichmentError> {
        Err(EnrichmentError::Unavailable)
    }
}

const SYSTEM_PROMPT: &str = "你是一个专业的图片分析助手。请用一两句话简洁地描述图片内容，包括主要物体、场景和颜色。";

/// 基于 LLM Vision 接口的图片描述
pub struct LlmEnricher {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl LlmEnricher {
    /// 创建新的图片描述服务
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.llm_api_key)
            .with_api_base(&config.llm_api_base_url);

        Self {
            client: Client::with_config(openai_config),
            model_name: config.llm_model_name.clone(),
        }
    }

    fn build_user_message(
        request: &EnrichmentRequest,
    ) -> Result<ChatCompletionRequestMessage, EnrichmentError> {
        let text = format!(
            "请描述这张图片。文件名: {}，类型: {}",
            request.file_name, request.mime_type
        );

        let user_msg = match &request.image_bytes {
            Some(bytes) if !bytes.is_empty() => {
                let data_url = format!(
                    "data:{};base64,{}",
                    request.mime_type,
                    base64::engine::general_purpose::STANDARD.encode(bytes)
                );
                debug!("使用 Vision API，图片大小 {} 字节", bytes.len());

                let content_parts = vec![
                    ChatCompletionRequestUserMessageContentPart::Text(
                        ChatCompletionRequestMessageContentPartText { text },
                    ),
                    ChatCompletionRequestUserMessageContentPart::ImageUrl(
                        ChatCompletionRequestMessageContentPartImage {
                            image_url: ImageUrl {
                                url: data_url,
                                detail: Some(ImageDetail::Low),
                            },
                        },
                    ),
                ];

                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(
                        content_parts,
                    ))
                    .build()
            }
            // 没有图片内容，只根据文件名描述
            _ => ChatCompletionRequestUserMessageArgs::default()
                .content(text)
                .build(),
        }
        .map_err(|e| EnrichmentError::Request(e.to_string()))?;

        Ok(ChatCompletionRequestMessage::User(user_msg))
    }
}

#[async_trait]
impl Enricher for LlmEnricher {
    async fn describe(
        &self,
        request: EnrichmentRequest,
    ) -> Result<EnrichmentResponse, EnrichmentError> {
        debug!(
            "调用图片描述，模型: {}, 文件: {}",
            self.model_name, request.file_name
        );

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_PROMPT)
            .build()
            .map_err(|e| EnrichmentError::Request(e.to_string()))?;

        let messages = vec![
            ChatCompletionRequestMessage::System(system_msg),
            Self::build_user_message(&request)?,
        ];

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.3)
            .max_tokens(300u32)
            .build()
            .map_err(|e| EnrichmentError::Request(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| {
                warn!("图片描述 API 调用失败: {}", e);
                EnrichmentError::Request(e.to_string())
            })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(EnrichmentError::EmptyResponse)?;

        Ok(EnrichmentResponse::described(content))
    }
}
