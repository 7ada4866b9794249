//! 크립토 QUANT 파서.
//!
//! 발행사 레이아웃상 고정 위치의 인라인 이미지("crypto levels",
//! "crypto stocks")를 OCR하여 수치 행 규칙으로 파싱합니다. 이미지
//! 위치 인덱스는 설정값이며 기본은 {6, 14}입니다.
//!
//! 이미지 하나의 OCR 실패는 해당 이미지의 기여만 비우고 카테고리는
//! 부분 추출로 진행됩니다.

use crate::error::Result;
use crate::ocr::{OcrClient, TableText};
use crate::parser::table::{clean_numeric, normalize_rows, sentiment_in};
use crate::parser::NewsletterParser;
use crate::source::SourceMessage;
use alert_core::{Category, ExtractedRow, Sentiment};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// 긴 이름 → 표준 심볼 매핑.
static CRYPTO_NAME_MAP: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("BITCOIN", "BTC"),
        ("ETHEREUM", "ETH"),
        ("SOLANA", "SOL"),
        ("CARDANO", "ADA"),
        ("AVALANCHE", "AVAX"),
        ("CHAINLINK", "LINK"),
        ("POLYGON", "MATIC"),
        ("DOGECOIN", "DOGE"),
        ("LITECOIN", "LTC"),
        ("POLKADOT", "DOT"),
        ("UNISWAP", "UNI"),
    ])
});

/// 순수 크립토 심볼 (거래소 접미사 `-USD` 부여 대상).
static PURE_CRYPTO: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "BTC", "ETH", "SOL", "AVAX", "AAVE", "XRP", "ADA", "MATIC", "DOT", "LINK", "DOGE", "LTC",
        "UNI", "BNB",
    ])
});

/// 크립토 관련 주식/ETF (일반 주식으로 취급, 접미사 없음).
static CRYPTO_STOCKS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    HashSet::from([
        "IBIT", "BITO", "ETHA", "BLOK", "MSTR", "MARA", "RIOT", "COIN", "CLSK", "HUT", "BITF",
    ])
});

/// 크립토 티커를 계약 해석기가 쓰는 형식으로 정규화합니다.
///
/// 긴 이름은 표준 심볼로 바꾸고, 순수 크립토는 `-USD` 접미사를
/// 붙입니다 (예: `BTC` → `BTC-USD`). 크립토 주식은 그대로 둡니다.
pub fn normalize_crypto_ticker(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    let base = CRYPTO_NAME_MAP
        .get(upper.as_str())
        .copied()
        .unwrap_or(upper.as_str());

    if PURE_CRYPTO.contains(base) {
        format!("{}-USD", base)
    } else {
        base.to_string()
    }
}

/// 크립토 QUANT 뉴스레터 파서.
pub struct CryptoParser {
    ocr: Arc<dyn OcrClient>,
    image_indices: Vec<usize>,
}

impl CryptoParser {
    /// 새 크립토 파서를 생성합니다.
    pub fn new(ocr: Arc<dyn OcrClient>, image_indices: Vec<usize>) -> Self {
        Self { ocr, image_indices }
    }

    /// OCR 테이블 하나를 수치 행 규칙으로 파싱합니다.
    ///
    /// 행에 수치가 3개 이상이면 첫 번째는 현재가로 보고 두 번째/세 번째를
    /// 매수/매도 임계값으로 읽습니다. 정확히 2개면 그대로 매수/매도입니다.
    fn parse_table(&self, table: &TableText) -> Vec<ExtractedRow> {
        let mut rows = Vec::new();

        for cells in &table.rows {
            let joined = cells.join(" ");
            let upper = joined.to_uppercase();

            // 헤더/제목 행 건너뜀
            if upper.contains("TICKER")
                || upper.contains("RISK RANGES")
                || upper.contains("EXPOSURES")
                || upper.contains("TREND SIGNAL")
            {
                continue;
            }

            let Some(first) = cells.first() else { continue };
            let Some(token) = first.split_whitespace().next() else { continue };
            // 티커 후보: 영문자로 시작하는 토큰
            if !token.chars().next().is_some_and(|c| c.is_ascii_alphabetic()) {
                continue;
            }

            let numbers: Vec<Decimal> = cells
                .iter()
                .skip(1)
                .filter_map(|c| clean_numeric(c))
                .collect();

            let (buy, sell) = match numbers.len() {
                0 | 1 => continue,
                2 => (numbers[0], numbers[1]),
                // 첫 수치는 현재가
                _ => (numbers[1], numbers[2]),
            };

            // 크립토 가격 합리성 검사
            if !price_is_sane(buy) || !price_is_sane(sell) {
                warn!(ticker = token, buy = %buy, sell = %sell, "비정상 가격, 행 버림");
                continue;
            }

            let sentiment = sentiment_in(&joined).unwrap_or_else(|| {
                warn!(ticker = token, "센티먼트 추론 실패, NEUTRAL로 처리");
                Sentiment::Neutral
            });

            let ticker = normalize_crypto_ticker(token);
            rows.push(
                ExtractedRow::new(ticker, Category::DigitalAssets, sentiment, buy, sell)
                    .with_raw_name(token.to_string()),
            );
        }

        rows
    }
}

/// 가격이 크립토 범위에서 합리적인지 확인합니다.
fn price_is_sane(price: Decimal) -> bool {
    price > Decimal::ZERO && price < Decimal::from(10_000_000u64)
}

#[async_trait]
impl NewsletterParser for CryptoParser {
    fn category(&self) -> Category {
        Category::DigitalAssets
    }

    async fn parse(&self, message: &SourceMessage) -> Result<Vec<ExtractedRow>> {
        let mut rows = Vec::new();

        for &index in &self.image_indices {
            let Some(image) = message.image_at(index) else {
                warn!(
                    message_id = %message.id,
                    index = index,
                    available = message.inline_images.len(),
                    "해당 인덱스의 인라인 이미지 없음"
                );
                continue;
            };

            match self
                .ocr
                .ocr(&image.data, "HEDGEYE RISK RANGES / DERIVATIVE EXPOSURES")
                .await
            {
                Ok(table) => {
                    let extracted = self.parse_table(&table);
                    debug!(index = index, rows = extracted.len(), "이미지 파싱 완료");
                    rows.extend(extracted);
                }
                // OCR 실패는 해당 이미지의 기여만 비우고 계속 진행
                Err(e) => {
                    warn!(index = index, error = %e, "OCR 실패, 이미지 건너뜀");
                    continue;
                }
            }
        }

        let rows = normalize_rows(rows);
        info!(
            message_id = %message.id,
            rows = rows.len(),
            "크립토 추출 완료"
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExtractError;
    use crate::source::InlineImage;
    use rust_decimal_macros::dec;

    /// 이미지 바이트 내용으로 응답을 선택하는 테스트용 OCR.
    struct StubOcr;

    #[async_trait]
    impl OcrClient for StubOcr {
        async fn ocr(&self, image: &[u8], _hint: &str) -> Result<TableText> {
            if image == b"levels" {
                Ok(TableText::from_text(
                    "HEDGEYE RISK RANGES\n\
                     | BTC | 94,567 | 89,012 | 96,968 | BULLISH |\n\
                     | ETH | 3,456 | 3,253 | 3,924 | BEARISH |",
                ))
            } else if image == b"stocks" {
                Ok(TableText::from_text(
                    "DIRECT & DERIVATIVE EXPOSURES: RISK RANGE & TREND SIGNAL\n\
                     | IBIT | 65.19 | 61.85 | 69.17 | BULLISH |\n\
                     | MSTR | 405 | 385 | 465 | BULLISH |",
                ))
            } else {
                Err(ExtractError::OcrError("unreadable image".to_string()))
            }
        }
    }

    fn message(images: Vec<(usize, &[u8])>) -> SourceMessage {
        SourceMessage {
            id: "m-crypto".to_string(),
            subject: "CRYPTO QUANT".to_string(),
            inline_images: images
                .into_iter()
                .map(|(index, data)| InlineImage {
                    index,
                    mime_type: "image/png".to_string(),
                    data: data.to_vec(),
                })
                .collect(),
            ..Default::default()
        }
    }

    fn parser() -> CryptoParser {
        CryptoParser::new(Arc::new(StubOcr), vec![6, 14])
    }

    #[tokio::test]
    async fn test_both_images_extracted() {
        let msg = message(vec![(6, b"levels"), (14, b"stocks")]);
        let rows = parser().parse(&msg).await.unwrap();

        assert_eq!(rows.len(), 4);
        // 순수 크립토는 -USD 접미사
        assert_eq!(rows[0].ticker, "BTC-USD");
        assert_eq!(rows[0].buy_trade, dec!(89012));
        assert_eq!(rows[0].sell_trade, dec!(96968));
        assert_eq!(rows[1].ticker, "ETH-USD");
        // 크립토 주식은 접미사 없음
        assert_eq!(rows[2].ticker, "IBIT");
        assert_eq!(rows[3].ticker, "MSTR");
        assert!(rows.iter().all(|r| r.category == Category::DigitalAssets));
    }

    #[tokio::test]
    async fn test_partial_failure_commits_partial_rows() {
        // 인덱스 6은 정상, 14는 OCR 실패 → 6의 행만 유지
        let msg = message(vec![(6, b"levels"), (14, b"garbage")]);
        let rows = parser().parse(&msg).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.ticker.ends_with("-USD")));
    }

    #[tokio::test]
    async fn test_missing_image_index() {
        let msg = message(vec![(6, b"levels")]);
        let rows = parser().parse(&msg).await.unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_normalize_crypto_ticker() {
        assert_eq!(normalize_crypto_ticker("BTC"), "BTC-USD");
        assert_eq!(normalize_crypto_ticker("BITCOIN"), "BTC-USD");
        assert_eq!(normalize_crypto_ticker("ethereum"), "ETH-USD");
        assert_eq!(normalize_crypto_ticker("MSTR"), "MSTR");
        assert_eq!(normalize_crypto_ticker("IBIT"), "IBIT");
    }

    #[test]
    fn test_price_sanity() {
        assert!(price_is_sane(dec!(0.01)));
        assert!(price_is_sane(dec!(96968)));
        assert!(!price_is_sane(dec!(0)));
        assert!(!price_is_sane(dec!(10000001)));
    }
}
