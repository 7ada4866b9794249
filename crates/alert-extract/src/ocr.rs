//! 이미지 OCR 어댑터.
//!
//! 이미지 바이트를 보내고 행/열 순서가 보존된 테이블 텍스트를 받습니다.
//! 어댑터는 상태가 없으며 같은 이미지에 대해 멱등입니다.

use crate::error::{ExtractError, Result};
use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

/// OCR 결과 테이블.
///
/// 각 행은 셀 문자열의 목록입니다. 행과 열 순서는 원본 이미지의
/// 표 순서를 따릅니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableText {
    /// 테이블 행 목록
    pub rows: Vec<Vec<String>>,
}

impl TableText {
    /// 비어 있는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// OCR 응답 텍스트를 테이블로 정규화합니다.
    ///
    /// 마크다운 파이프 테이블 행은 `|` 기준으로, 일반 행은 공백 기준으로
    /// 셀을 분리합니다. 마크다운 구분선(`---`)은 버립니다.
    pub fn from_text(text: &str) -> Self {
        let mut rows = Vec::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let cells: Vec<String> = if line.contains('|') {
                line.split('|')
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty())
                    .collect()
            } else {
                line.split_whitespace().map(|c| c.to_string()).collect()
            };

            if cells.is_empty() {
                continue;
            }
            // 마크다운 테이블 구분선 제거
            if cells.iter().all(|c| c.chars().all(|ch| ch == '-' || ch == ':')) {
                continue;
            }
            rows.push(cells);
        }

        Self { rows }
    }
}

/// OCR 어댑터 계약.
#[async_trait]
pub trait OcrClient: Send + Sync {
    /// 이미지를 OCR하여 테이블 텍스트를 반환합니다.
    async fn ocr(&self, image: &[u8], hint: &str) -> Result<TableText>;
}

// =============================================================================
// Mistral OCR 응답 구조체
// =============================================================================

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// Mistral 비전 모델 기반 OCR 어댑터.
pub struct MistralOcr {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

const MISTRAL_URL: &str = "https://api.mistral.ai/v1/chat/completions";

impl MistralOcr {
    /// 새 OCR 어댑터를 생성합니다.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, deadline: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(deadline)
            .build()
            .map_err(|e| ExtractError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
        })
    }
}

#[async_trait]
impl OcrClient for MistralOcr {
    async fn ocr(&self, image: &[u8], hint: &str) -> Result<TableText> {
        let base64_image = base64::engine::general_purpose::STANDARD.encode(image);

        let prompt = if hint.is_empty() {
            "Extract all text from this image. Preserve table rows and columns; \
             include all tickers, numbers and trend labels exactly as shown."
                .to_string()
        } else {
            format!(
                "Extract all text from this image. Focus on tables matching: {}. \
                 Preserve table rows and columns; include all tickers, numbers and \
                 trend labels exactly as shown.",
                hint
            )
        };

        let payload = serde_json::json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt },
                    {
                        "type": "image_url",
                        "image_url": { "url": format!("data:image/png;base64,{}", base64_image) }
                    }
                ]
            }]
        });

        let response = self
            .client
            .post(MISTRAL_URL)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ExtractError::OcrError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "OCR 요청 실패");
            return Err(ExtractError::OcrError(format!("HTTP {}: {}", status, body)));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractError::OcrError(e.to_string()))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default();

        let table = TableText::from_text(content);
        debug!(rows = table.rows.len(), chars = content.len(), "OCR 완료");
        Ok(table)
    }
}
