//! 메일 전송기.
//!
//! 다이제스트를 주입된 전송기로 발송합니다. 발송 오류는 한 번
//! 재시도한 뒤 스케줄러로 표면화됩니다.

use crate::digest::AlertDigest;
use crate::error::{NotifyError, Result};
use alert_core::MailConfig;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{info, warn};

/// 메일 전송기 계약.
#[async_trait]
pub trait MailSender: Send + Sync {
    /// 다이제스트를 발송합니다.
    async fn send(&self, digest: &AlertDigest) -> Result<()>;
}

/// SMTP 기반 전송기.
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    deadline: Duration,
}

impl SmtpSender {
    /// 설정에서 전송기를 생성합니다.
    pub fn from_config(config: &MailConfig, deadline: Duration) -> Result<Self> {
        if config.to.is_empty() {
            return Err(NotifyError::InvalidConfig("수신자 목록이 비어 있음".to_string()));
        }

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .timeout(Some(deadline))
            .build();

        let from: Mailbox = config.from.parse()?;
        let to: Vec<Mailbox> = config
            .to
            .iter()
            .map(|addr| addr.parse())
            .collect::<std::result::Result<_, _>>()?;

        Ok(Self {
            transport,
            from,
            to,
            deadline,
        })
    }

    /// 다이제스트를 메일 메시지로 조립합니다.
    fn build_message(&self, digest: &AlertDigest) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(digest.subject());
        for mailbox in &self.to {
            builder = builder.to(mailbox.clone());
        }

        let message = builder.multipart(
            MultiPart::alternative()
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_PLAIN)
                        .body(digest.render_plain()),
                )
                .singlepart(
                    SinglePart::builder()
                        .header(ContentType::TEXT_HTML)
                        .body(digest.render_html()),
                ),
        )?;

        Ok(message)
    }
}

#[async_trait]
impl MailSender for SmtpSender {
    async fn send(&self, digest: &AlertDigest) -> Result<()> {
        let message = self.build_message(digest)?;

        // 발송 오류는 한 번 재시도
        for attempt in 0..2 {
            let result =
                tokio::time::timeout(self.deadline, self.transport.send(message.clone())).await;

            match result {
                Ok(Ok(_)) => {
                    info!(
                        session = %digest.session,
                        alerts = digest.alerts.len(),
                        recipients = self.to.len(),
                        "다이제스트 발송 완료"
                    );
                    return Ok(());
                }
                Ok(Err(e)) if attempt == 0 => {
                    warn!(error = %e, "발송 실패, 재시도");
                }
                Ok(Err(e)) => return Err(NotifyError::SendFailed(e.to_string())),
                Err(_) if attempt == 0 => {
                    warn!("발송 데드라인 초과, 재시도");
                }
                Err(_) => return Err(NotifyError::Timeout),
            }
        }
        unreachable!("재시도 루프는 항상 반환")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_core::{Alert, AlertKind, Category, Sentiment, TradingSession};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn config() -> MailConfig {
        MailConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "alerts@example.com".to_string(),
            password: "secret".to_string(),
            from: "alerts@example.com".to_string(),
            to: vec!["trader@example.com".to_string()],
        }
    }

    fn digest() -> AlertDigest {
        AlertDigest::from_alerts(
            TradingSession::Am,
            vec![Alert {
                ticker: "AAPL".to_string(),
                category: Category::Daily,
                kind: AlertKind::Buy,
                price: dec!(149.50),
                threshold: dec!(150.00),
                sentiment: Sentiment::Bullish,
                session: TradingSession::Am,
                generated_at: Utc::now(),
            }],
            chrono_tz::America::New_York,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_recipients_rejected() {
        let mut cfg = config();
        cfg.to.clear();
        assert!(matches!(
            SmtpSender::from_config(&cfg, Duration::from_secs(20)),
            Err(NotifyError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_build_message() {
        let sender = SmtpSender::from_config(&config(), Duration::from_secs(20)).unwrap();
        let message = sender.build_message(&digest()).unwrap();

        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.contains("Trade Alerts [AM]"));
        assert!(formatted.contains("AAPL"));
        assert!(formatted.contains("text/html"));
    }

    #[test]
    fn test_invalid_from_address() {
        let mut cfg = config();
        cfg.from = "not an address".to_string();
        assert!(SmtpSender::from_config(&cfg, Duration::from_secs(20)).is_err());
    }
}
