//! 게이트웨이 스냅샷 시세 클라이언트.
//!
//! `(host, port)`의 브로커 게이트웨이 브리지에 단일 영속 TCP 연결을
//! 유지합니다. 와이어 프로토콜 자체는 불투명하게 취급되며, 상위
//! 계층은 `fetch_quote(descriptor, deadline)`만 사용합니다. 프레임은
//! 개행으로 구분된 JSON입니다.

use crate::contract::ContractDescriptor;
use crate::error::{BrokerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// 게이트웨이가 반환한 원시 스냅샷.
///
/// 게이트웨이에 값이 없으면 해당 필드는 NaN입니다.
#[derive(Debug, Clone, Copy)]
pub struct RawQuote {
    /// 최근 체결가
    pub last: f64,
    /// 전일 종가
    pub close: f64,
    /// 매수 호가
    pub bid: f64,
    /// 매도 호가
    pub ask: f64,
    /// 틱 타임스탬프
    pub at: DateTime<Utc>,
}

/// 시세 게이트웨이 계약.
#[async_trait]
pub trait QuoteGateway: Send + Sync {
    /// 게이트웨이에 연결합니다.
    async fn connect(&self) -> Result<()>;

    /// 스냅샷 시세를 요청합니다 (스트리밍 구독 아님).
    ///
    /// 구현체는 `deadline`을 초과하면 `Timeout`을 반환해야 합니다.
    async fn fetch_quote(
        &self,
        descriptor: &ContractDescriptor,
        deadline: Duration,
    ) -> Result<RawQuote>;

    /// 연결을 종료합니다.
    async fn disconnect(&self);
}

// =============================================================================
// 와이어 프레임
// =============================================================================

#[derive(Debug, Serialize)]
struct HandshakeFrame<'a> {
    #[serde(rename = "type")]
    frame_type: &'a str,
    client_id: i32,
}

#[derive(Debug, Serialize)]
struct SnapshotRequestFrame<'a> {
    #[serde(rename = "type")]
    frame_type: &'a str,
    symbol: &'a str,
    sec_type: String,
    exchange: &'a str,
    currency: &'a str,
}

#[derive(Debug, Deserialize)]
struct SnapshotResponseFrame {
    #[serde(default)]
    last: Option<f64>,
    #[serde(default)]
    close: Option<f64>,
    #[serde(default)]
    bid: Option<f64>,
    #[serde(default)]
    ask: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// TCP 게이트웨이 클라이언트.
pub struct TcpGateway {
    host: String,
    port: u16,
    client_id: i32,
    connection: Mutex<Option<Connection>>,
}

impl TcpGateway {
    /// 새 게이트웨이 클라이언트를 생성합니다 (연결은 `connect`에서).
    pub fn new(host: impl Into<String>, port: u16, client_id: i32) -> Self {
        Self {
            host: host.into(),
            port,
            client_id,
            connection: Mutex::new(None),
        }
    }
}

#[async_trait]
impl QuoteGateway for TcpGateway {
    async fn connect(&self) -> Result<()> {
        let mut guard = self.connection.lock().await;
        if guard.is_some() {
            return Ok(());
        }

        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| {
                BrokerError::Unavailable(format!("{}:{} 연결 실패: {}", self.host, self.port, e))
            })?;
        let (read_half, write_half) = stream.into_split();
        let mut connection = Connection {
            reader: BufReader::new(read_half),
            writer: write_half,
        };

        // client_id 핸드셰이크
        let frame = serde_json::to_string(&HandshakeFrame {
            frame_type: "handshake",
            client_id: self.client_id,
        })?;
        connection
            .writer
            .write_all(format!("{}\n", frame).as_bytes())
            .await?;

        let mut ack = String::new();
        connection.reader.read_line(&mut ack).await?;
        if ack.trim().is_empty() {
            return Err(BrokerError::Unavailable("핸드셰이크 응답 없음".to_string()));
        }

        info!(host = %self.host, port = self.port, client_id = self.client_id, "게이트웨이 연결 완료");
        *guard = Some(connection);
        Ok(())
    }

    async fn fetch_quote(
        &self,
        descriptor: &ContractDescriptor,
        deadline: Duration,
    ) -> Result<RawQuote> {
        let mut guard = self.connection.lock().await;
        let connection = guard
            .as_mut()
            .ok_or_else(|| BrokerError::Disconnected("연결되지 않음".to_string()))?;

        let frame = serde_json::to_string(&SnapshotRequestFrame {
            frame_type: "snapshot",
            symbol: &descriptor.symbol,
            sec_type: descriptor.kind.to_string(),
            exchange: &descriptor.exchange,
            currency: &descriptor.currency,
        })?;
        connection
            .writer
            .write_all(format!("{}\n", frame).as_bytes())
            .await?;

        let mut line = String::new();
        let read = tokio::time::timeout(deadline, connection.reader.read_line(&mut line)).await;

        let bytes = match read {
            Err(_) => {
                // 타임아웃 이후 응답이 섞이지 않도록 연결을 버림
                warn!(symbol = %descriptor.symbol, "스냅샷 데드라인 초과, 연결 재설정");
                *guard = None;
                return Err(BrokerError::Timeout(descriptor.symbol.clone()));
            }
            Ok(result) => result?,
        };
        if bytes == 0 {
            *guard = None;
            return Err(BrokerError::Disconnected("게이트웨이가 연결을 닫음".to_string()));
        }

        let response: SnapshotResponseFrame = serde_json::from_str(line.trim())?;
        if let Some(message) = response.error {
            return Err(BrokerError::GatewayError {
                symbol: descriptor.symbol.clone(),
                message,
            });
        }

        debug!(
            symbol = %descriptor.symbol,
            last = ?response.last,
            close = ?response.close,
            "스냅샷 수신"
        );

        Ok(RawQuote {
            last: response.last.unwrap_or(f64::NAN),
            close: response.close.unwrap_or(f64::NAN),
            bid: response.bid.unwrap_or(f64::NAN),
            ask: response.ask.unwrap_or(f64::NAN),
            at: Utc::now(),
        })
    }

    async fn disconnect(&self) {
        let mut guard = self.connection.lock().await;
        if guard.take().is_some() {
            info!("게이트웨이 연결 종료");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ContractResolver;
    use alert_core::Category;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// 스냅샷 요청에 고정 응답을 주는 미니 게이트웨이.
    async fn spawn_stub_gateway(responses: Vec<String>) -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 1024];

            // 핸드셰이크 수신 + ack
            let n = socket.read(&mut buf).await.unwrap();
            assert!(String::from_utf8_lossy(&buf[..n]).contains("handshake"));
            socket.write_all(b"{\"type\":\"ack\"}\n").await.unwrap();

            for response in responses {
                let _ = socket.read(&mut buf).await.unwrap();
                socket
                    .write_all(format!("{}\n", response).as_bytes())
                    .await
                    .unwrap();
            }
        });

        port
    }

    #[tokio::test]
    async fn test_snapshot_roundtrip() {
        let port = spawn_stub_gateway(vec![
            r#"{"last": 149.50, "close": 148.00, "bid": 149.45, "ask": 149.55}"#.to_string(),
        ])
        .await;

        let gateway = TcpGateway::new("127.0.0.1", port, 7);
        gateway.connect().await.unwrap();

        let descriptor = ContractResolver::descriptor("AAPL", Category::Daily);
        let quote = gateway
            .fetch_quote(&descriptor, Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(quote.last, 149.50);
        assert_eq!(quote.close, 148.00);
        gateway.disconnect().await;
    }

    #[tokio::test]
    async fn test_missing_fields_become_nan() {
        let port = spawn_stub_gateway(vec![r#"{"close": 410.25}"#.to_string()]).await;

        let gateway = TcpGateway::new("127.0.0.1", port, 7);
        gateway.connect().await.unwrap();

        let descriptor = ContractResolver::descriptor("MSTR", Category::DigitalAssets);
        let quote = gateway
            .fetch_quote(&descriptor, Duration::from_secs(5))
            .await
            .unwrap();

        assert!(quote.last.is_nan());
        assert_eq!(quote.close, 410.25);
    }

    #[tokio::test]
    async fn test_gateway_error_frame() {
        let port = spawn_stub_gateway(vec![r#"{"error": "No security definition"}"#.to_string()])
            .await;

        let gateway = TcpGateway::new("127.0.0.1", port, 7);
        gateway.connect().await.unwrap();

        let descriptor = ContractResolver::descriptor("ZZZZ", Category::Daily);
        let err = gateway
            .fetch_quote(&descriptor, Duration::from_secs(5))
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::GatewayError { .. }));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // 아무도 리스닝하지 않는 포트
        let gateway = TcpGateway::new("127.0.0.1", 1, 7);
        let err = gateway.connect().await.unwrap_err();
        assert!(matches!(err, BrokerError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_fetch_without_connect() {
        let gateway = TcpGateway::new("127.0.0.1", 1, 7);
        let descriptor = ContractResolver::descriptor("AAPL", Category::Daily);
        let err = gateway
            .fetch_quote(&descriptor, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, BrokerError::Disconnected(_)));
    }
}
