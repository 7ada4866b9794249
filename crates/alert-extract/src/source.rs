//! 뉴스레터 메시지 소스 어댑터.
//!
//! Gmail REST API를 통해 제목 질의와 조회 기간으로 메시지를 나열하고,
//! 본문 HTML과 인라인 이미지를 MIME 트리 순서대로 가져옵니다.
//! 이미지의 위치 인덱스는 MIME 트리 등장 순서로 부여되며, 크립토
//! 파서가 이 인덱스에 의존합니다.

use crate::error::{ExtractError, Result};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 메시지 목록 항목.
#[derive(Debug, Clone)]
pub struct MessageHeader {
    /// 소스 메시지 ID
    pub id: String,
    /// 제목
    pub subject: String,
    /// 수신 시각 (Date 헤더)
    pub date: DateTime<Utc>,
}

/// 인라인 이미지.
#[derive(Debug, Clone)]
pub struct InlineImage {
    /// MIME 트리 등장 순서 기준 위치 인덱스 (0부터)
    pub index: usize,
    /// MIME 타입
    pub mime_type: String,
    /// 디코딩된 이미지 바이트
    pub data: Vec<u8>,
}

/// 일반 첨부 파일.
#[derive(Debug, Clone)]
pub struct Attachment {
    /// 파일명
    pub filename: String,
    /// MIME 타입
    pub mime_type: String,
    /// 디코딩된 바이트
    pub data: Vec<u8>,
}

/// 가져온 메시지 전체.
#[derive(Debug, Clone, Default)]
pub struct SourceMessage {
    /// 소스 메시지 ID
    pub id: String,
    /// 제목
    pub subject: String,
    /// 수신 시각
    pub date: Option<DateTime<Utc>>,
    /// 본문 HTML 파트 (트리 순서)
    pub html_parts: Vec<String>,
    /// 인라인 이미지 (위치 인덱스 포함)
    pub inline_images: Vec<InlineImage>,
    /// 일반 첨부 파일
    pub attachments: Vec<Attachment>,
}

impl SourceMessage {
    /// 위치 인덱스로 인라인 이미지를 찾습니다.
    pub fn image_at(&self, index: usize) -> Option<&InlineImage> {
        self.inline_images.iter().find(|img| img.index == index)
    }
}

/// 메시지 소스 계약.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// 제목 질의와 조회 기간으로 메시지를 나열합니다.
    async fn list_messages(
        &self,
        subject_query: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<MessageHeader>>;

    /// 메시지 전체를 가져옵니다.
    async fn fetch(&self, id: &str) -> Result<SourceMessage>;
}

/// 지수 백오프 재시도 정책.
///
/// 일시적 전송 오류는 초기 500ms, 배수 2, 상한 8s로 최대 4회까지
/// 재시도하며, 최종 실패는 `SourceUnavailable`로 표면화됩니다.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// 초기 대기 시간
    pub initial: Duration,
    /// 대기 시간 배수
    pub factor: f64,
    /// 대기 시간 상한
    pub max: Duration,
    /// 최대 시도 횟수
    pub max_attempts: u32,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            factor: 2.0,
            max: Duration::from_secs(8),
            max_attempts: 4,
        }
    }
}

impl Backoff {
    /// n번째 재시도 전 대기 시간을 계산합니다 (0부터).
    pub fn delay(&self, attempt: u32) -> Duration {
        let scaled = self.initial.as_secs_f64() * self.factor.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max.as_secs_f64()))
    }
}

// =============================================================================
// Gmail REST 응답 구조체
// =============================================================================

#[derive(Debug, Deserialize)]
struct GmailListResponse {
    #[serde(default)]
    messages: Vec<GmailMessageRef>,
}

#[derive(Debug, Deserialize)]
struct GmailMessageRef {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailMessage {
    id: String,
    /// 수신 시각 (epoch 밀리초 문자열)
    #[serde(default)]
    internal_date: Option<String>,
    payload: GmailPart,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailPart {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    filename: String,
    #[serde(default)]
    headers: Vec<GmailHeader>,
    #[serde(default)]
    body: Option<GmailBody>,
    #[serde(default)]
    parts: Option<Vec<GmailPart>>,
}

#[derive(Debug, Deserialize)]
struct GmailHeader {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailBody {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    attachment_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GmailAttachmentBody {
    data: String,
}

/// Gmail REST 기반 메시지 소스.
pub struct GmailSource {
    client: reqwest::Client,
    access_token: String,
    backoff: Backoff,
}

const GMAIL_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

impl GmailSource {
    /// 액세스 토큰으로 소스를 생성합니다.
    pub fn new(access_token: impl Into<String>, deadline: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(deadline)
            .build()
            .map_err(|e| ExtractError::InvalidConfig(e.to_string()))?;

        Ok(Self {
            client,
            access_token: access_token.into(),
            backoff: Backoff::default(),
        })
    }

    /// 토큰 파일에서 소스를 생성합니다.
    ///
    /// 토큰 파일은 `{"access_token": "..."}` 형식의 JSON입니다.
    pub fn from_token_file(path: &str, deadline: Duration) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ExtractError::InvalidConfig(format!("토큰 파일 {}: {}", path, e)))?;
        let value: serde_json::Value = serde_json::from_str(&raw)?;
        let token = value
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ExtractError::InvalidConfig(format!("토큰 파일에 access_token 없음: {}", path))
            })?;
        Self::new(token, deadline)
    }

    /// 재시도/백오프가 적용된 GET 요청.
    async fn get_with_retry(&self, url: &str) -> Result<serde_json::Value> {
        let mut last_error = String::new();

        for attempt in 0..self.backoff.max_attempts {
            if attempt > 0 {
                let delay = self.backoff.delay(attempt - 1);
                debug!(attempt = attempt, delay_ms = delay.as_millis() as u64, "소스 재시도 대기");
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .get(url)
                .bearer_auth(&self.access_token)
                .send()
                .await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        return resp
                            .json()
                            .await
                            .map_err(|e| ExtractError::ParseError(e.to_string()));
                    }
                    // 5xx / 429는 일시적 오류로 재시도
                    if status.is_server_error() || status.as_u16() == 429 {
                        last_error = format!("HTTP {}", status);
                        warn!(status = %status, attempt = attempt, "소스 일시 오류");
                        continue;
                    }
                    return Err(ExtractError::SourceUnavailable(format!("HTTP {}", status)));
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    last_error = e.to_string();
                    warn!(error = %e, attempt = attempt, "소스 전송 오류");
                    continue;
                }
                Err(e) => return Err(ExtractError::SourceUnavailable(e.to_string())),
            }
        }

        Err(ExtractError::SourceUnavailable(format!(
            "재시도 {}회 소진: {}",
            self.backoff.max_attempts, last_error
        )))
    }

    /// 첨부 본문을 가져와 디코딩합니다.
    async fn fetch_attachment_data(&self, message_id: &str, attachment_id: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/messages/{}/attachments/{}",
            GMAIL_BASE, message_id, attachment_id
        );
        let value = self.get_with_retry(&url).await?;
        let body: GmailAttachmentBody = serde_json::from_value(value)?;
        decode_base64url(&body.data)
    }

    /// MIME 트리를 순서대로 순회하며 본문과 이미지를 수집합니다.
    async fn walk_parts(&self, message_id: &str, part: &GmailPart, out: &mut SourceMessage) -> Result<()> {
        // 리프 파트 처리
        if part.mime_type.starts_with("text/html") {
            if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_ref()) {
                let bytes = decode_base64url(data)?;
                out.html_parts.push(String::from_utf8_lossy(&bytes).into_owned());
            }
        } else if part.mime_type.starts_with("image/") {
            let data = match part.body.as_ref() {
                Some(GmailBody { data: Some(inline), .. }) => decode_base64url(inline)?,
                Some(GmailBody { attachment_id: Some(att_id), .. }) => {
                    self.fetch_attachment_data(message_id, att_id).await?
                }
                _ => Vec::new(),
            };
            if !data.is_empty() {
                let index = out.inline_images.len();
                out.inline_images.push(InlineImage {
                    index,
                    mime_type: part.mime_type.clone(),
                    data,
                });
            }
        } else if !part.filename.is_empty() {
            if let Some(GmailBody { attachment_id: Some(att_id), .. }) = part.body.as_ref() {
                let data = self.fetch_attachment_data(message_id, att_id).await?;
                out.attachments.push(Attachment {
                    filename: part.filename.clone(),
                    mime_type: part.mime_type.clone(),
                    data,
                });
            }
        }

        // 자식 파트를 등장 순서대로 순회 (위치 인덱스 안정성 보장)
        if let Some(children) = part.parts.as_ref() {
            for child in children {
                Box::pin(self.walk_parts(message_id, child, out)).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSource for GmailSource {
    async fn list_messages(
        &self,
        subject_query: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<MessageHeader>> {
        let q = format!(
            "subject:\"{}\" after:{} before:{}",
            subject_query,
            since.timestamp(),
            until.timestamp()
        );
        let url = format!(
            "{}/messages?q={}&maxResults=20",
            GMAIL_BASE,
            urlencode(&q)
        );

        let value = self.get_with_retry(&url).await?;
        let list: GmailListResponse = serde_json::from_value(value)?;

        let mut headers = Vec::with_capacity(list.messages.len());
        for msg_ref in &list.messages {
            let url = format!(
                "{}/messages/{}?format=metadata&metadataHeaders=Subject",
                GMAIL_BASE, msg_ref.id
            );
            let value = self.get_with_retry(&url).await?;
            let message: GmailMessage = serde_json::from_value(value)?;

            headers.push(MessageHeader {
                id: message.id,
                subject: header_value(&message.payload.headers, "Subject").unwrap_or_default(),
                date: internal_date(message.internal_date.as_deref()),
            });
        }

        info!(
            query = subject_query,
            matched = headers.len(),
            "메시지 목록 조회 완료"
        );
        Ok(headers)
    }

    async fn fetch(&self, id: &str) -> Result<SourceMessage> {
        let url = format!("{}/messages/{}?format=full", GMAIL_BASE, id);
        let value = self.get_with_retry(&url).await?;
        let message: GmailMessage = serde_json::from_value(value)?;

        let mut out = SourceMessage {
            id: message.id.clone(),
            subject: header_value(&message.payload.headers, "Subject").unwrap_or_default(),
            date: Some(internal_date(message.internal_date.as_deref())),
            ..Default::default()
        };

        self.walk_parts(&message.id, &message.payload, &mut out).await?;

        debug!(
            id = %out.id,
            html_parts = out.html_parts.len(),
            images = out.inline_images.len(),
            attachments = out.attachments.len(),
            "메시지 가져오기 완료"
        );
        Ok(out)
    }
}

/// 헤더 목록에서 값을 찾습니다 (대소문자 무시).
fn header_value(headers: &[GmailHeader], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.clone())
}

/// internalDate (epoch 밀리초 문자열)를 UTC 시각으로 변환합니다.
fn internal_date(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| s.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

/// base64url (패딩 유무 모두) 디코딩.
fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(data.trim_end_matches('='))
        .map_err(|e| ExtractError::ParseError(format!("base64 디코딩 실패: {}", e)))
}

/// 질의 문자열 URL 인코딩 (공백/따옴표/콜론만 처리하면 충분).
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 3);
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{:02X}", byte)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let backoff = Backoff::default();
        assert_eq!(backoff.delay(0), Duration::from_millis(500));
        assert_eq!(backoff.delay(1), Duration::from_millis(1000));
        assert_eq!(backoff.delay(2), Duration::from_millis(2000));
        assert_eq!(backoff.delay(3), Duration::from_millis(4000));
        assert_eq!(backoff.delay(4), Duration::from_secs(8));
        assert_eq!(backoff.delay(10), Duration::from_secs(8)); // 상한
        assert_eq!(backoff.max_attempts, 4);
    }

    #[test]
    fn test_decode_base64url() {
        // "hello" base64url
        assert_eq!(decode_base64url("aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode_base64url("aGVsbG8=").unwrap(), b"hello");
        assert!(decode_base64url("!!!").is_err());
    }

    #[test]
    fn test_urlencode() {
        assert_eq!(urlencode("RISK RANGE"), "RISK%20RANGE");
        assert_eq!(
            urlencode("subject:\"CRYPTO QUANT\""),
            "subject%3A%22CRYPTO%20QUANT%22"
        );
    }

    #[test]
    fn test_internal_date() {
        let dt = internal_date(Some("1767312000000"));
        assert_eq!(dt.timestamp_millis(), 1767312000000);
    }

    #[test]
    fn test_mime_tree_walk_assigns_positional_indices() {
        // 중첩 multipart에서도 등장 순서대로 인덱스가 부여되는지 확인
        let payload: GmailPart = serde_json::from_value(serde_json::json!({
            "mimeType": "multipart/related",
            "parts": [
                { "mimeType": "text/html", "body": { "data": "PGI-aGk8L2I-" } },
                { "mimeType": "image/png", "body": { "data": "aW1nMA" } },
                {
                    "mimeType": "multipart/alternative",
                    "parts": [
                        { "mimeType": "image/jpeg", "body": { "data": "aW1nMQ" } }
                    ]
                },
                { "mimeType": "image/png", "body": { "data": "aW1nMg" } }
            ]
        }))
        .unwrap();

        let source = GmailSource::new("token", Duration::from_secs(1)).unwrap();
        let mut out = SourceMessage::default();
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(source.walk_parts("m1", &payload, &mut out))
            .unwrap();

        assert_eq!(out.html_parts.len(), 1);
        assert_eq!(out.inline_images.len(), 3);
        assert_eq!(out.inline_images[0].data, b"img0");
        assert_eq!(out.inline_images[1].data, b"img1");
        assert_eq!(out.inline_images[2].data, b"img2");
        assert_eq!(out.image_at(1).unwrap().mime_type, "image/jpeg");
        assert!(out.image_at(9).is_none());
    }
}
