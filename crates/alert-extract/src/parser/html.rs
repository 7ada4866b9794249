//! HTML 테이블 기반 레벨 파서 (daily / etfs / ideas).
//!
//! 헤더 행에 TICKER(또는 INDEX), BUY, SELL 토큰이 포함된 테이블을
//! 찾아 위에서 아래로 행을 읽습니다. "TRADE" 수식어는 선택입니다.
//! 세 카테고리는 제목 질의, 카테고리 태그, 열 순서만 다릅니다.

use crate::error::Result;
use crate::parser::table::{
    clean_numeric, extract_numbers, normalize_rows, EXCLUDED_TICKERS, TICKER_SENTIMENT_RE,
};
use crate::parser::NewsletterParser;
use crate::source::SourceMessage;
use alert_core::{Category, ExtractedRow, Sentiment};
use async_trait::async_trait;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

/// HTML 레벨 테이블 파서.
pub struct HtmlLevelsParser {
    category: Category,
    /// 티커 셀 이후 매수 임계값이 위치한 셀 인덱스
    buy_col: usize,
    /// 티커 셀 이후 매도 임계값이 위치한 셀 인덱스
    sell_col: usize,
}

impl HtmlLevelsParser {
    /// 일간 RISK RANGE 파서 (ticker | buy | sell).
    pub fn daily() -> Self {
        Self {
            category: Category::Daily,
            buy_col: 1,
            sell_col: 2,
        }
    }

    /// ETF 레벨 파서 (ticker | price | buy | sell).
    pub fn etfs() -> Self {
        Self {
            category: Category::Etfs,
            buy_col: 2,
            sell_col: 3,
        }
    }

    /// 투자 아이디어 파서 (ticker | buy | sell).
    pub fn ideas() -> Self {
        Self {
            category: Category::Ideas,
            buy_col: 1,
            sell_col: 2,
        }
    }

    /// HTML 문서 하나를 파싱합니다.
    fn parse_html(&self, html: &str) -> Vec<ExtractedRow> {
        let document = Html::parse_document(html);
        let table_sel = Selector::parse("table").expect("table selector");
        let row_sel = Selector::parse("tr").expect("tr selector");
        let cell_sel = Selector::parse("th, td").expect("cell selector");

        let mut rows = Vec::new();

        for table in document.select(&table_sel) {
            let trs: Vec<_> = table.select(&row_sel).collect();
            let Some(header) = trs.first() else { continue };

            let header_text: String = header
                .select(&cell_sel)
                .map(|c| c.text().collect::<String>())
                .collect::<Vec<_>>()
                .join(" ")
                .to_uppercase();

            // 대상 테이블 판별: TICKER/INDEX + BUY + SELL ("TRADE"는 선택)
            let has_ticker = header_text.contains("TICKER") || header_text.contains("INDEX");
            if !(has_ticker && header_text.contains("BUY") && header_text.contains("SELL")) {
                continue;
            }
            debug!(category = %self.category, "대상 테이블 발견");

            for tr in &trs[1..] {
                let cells: Vec<String> = tr
                    .select(&cell_sel)
                    .map(|c| c.text().collect::<String>().trim().to_string())
                    .collect();

                if let Some(row) = self.parse_cells(&cells) {
                    rows.push(row);
                }
            }

            if !rows.is_empty() {
                break;
            }
        }

        rows
    }

    /// 테이블 한 행의 셀을 추출 행으로 변환합니다.
    fn parse_cells(&self, cells: &[String]) -> Option<ExtractedRow> {
        // 채워진 셀이 3개 미만이면 건너뜀
        let populated = cells.iter().filter(|c| !c.is_empty()).count();
        if populated < 3 {
            return None;
        }

        let ticker_cell = cells.first()?;

        // 티커와 센티먼트 추출
        let (raw_ticker, mut sentiment) =
            match TICKER_SENTIMENT_RE.captures(&ticker_cell.to_uppercase()) {
                Some(caps) => (
                    caps.get(1)?.as_str().to_string(),
                    Sentiment::from_token(caps.get(2)?.as_str()),
                ),
                None => {
                    let token = ticker_cell.split_whitespace().next()?.to_string();
                    (token, None)
                }
            };

        // 전용 센티먼트 열이 있으면 사용
        if sentiment.is_none() {
            sentiment = cells.iter().skip(1).find_map(|c| Sentiment::from_token(c));
        }
        // 추론 실패 시 NEUTRAL로 기본 처리하고 진단 기록
        let sentiment = sentiment.unwrap_or_else(|| {
            warn!(ticker = %raw_ticker, "센티먼트 추론 실패, NEUTRAL로 처리");
            Sentiment::Neutral
        });

        let normalized = raw_ticker.to_uppercase().replace('/', ".");
        if EXCLUDED_TICKERS.contains(normalized.as_str()) {
            debug!(ticker = %normalized, "제외 대상 티커 건너뜀");
            return None;
        }

        let buy = cells.get(self.buy_col).and_then(|c| clean_numeric(c))?;
        let sell = cells.get(self.sell_col).and_then(|c| clean_numeric(c))?;

        Some(
            ExtractedRow::new(raw_ticker, self.category, sentiment, buy, sell)
                .with_raw_name(ticker_cell.clone()),
        )
    }

    /// HTML 테이블에서 아무것도 찾지 못했을 때의 텍스트 기반 폴백.
    ///
    /// `TICKER (SENTIMENT)` 패턴이 있는 줄에서 수치 두 개를 찾습니다.
    /// 수치가 모자라면 다음 줄을 이어서 봅니다.
    fn parse_text_fallback(&self, html: &str) -> Vec<ExtractedRow> {
        let document = Html::parse_document(html);
        let text: String = document
            .root_element()
            .text()
            .collect::<Vec<_>>()
            .join("\n");
        let lines: Vec<&str> = text.lines().collect();

        let mut rows = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let line = lines[i].trim();
            let upper = line.to_uppercase();
            let Some(caps) = TICKER_SENTIMENT_RE.captures(&upper) else {
                i += 1;
                continue;
            };

            let raw_ticker = caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default();
            let sentiment = caps
                .get(2)
                .and_then(|m| Sentiment::from_token(m.as_str()))
                .unwrap_or(Sentiment::Neutral);

            let normalized = raw_ticker.replace('/', ".");
            if EXCLUDED_TICKERS.contains(normalized.as_str()) {
                i += 1;
                continue;
            }

            // 현재 줄과 다음 줄에서 수치 수집
            let mut numbers = extract_numbers(line);
            if numbers.len() < 2 && i + 1 < lines.len() {
                let next = lines[i + 1].trim();
                if !TICKER_SENTIMENT_RE.is_match(&next.to_uppercase()) {
                    numbers.extend(extract_numbers(next));
                }
            }

            if numbers.len() >= 2 {
                rows.push(ExtractedRow::new(
                    raw_ticker,
                    self.category,
                    sentiment,
                    numbers[0],
                    numbers[1],
                ));
            }
            i += 1;
        }

        rows
    }
}

#[async_trait]
impl NewsletterParser for HtmlLevelsParser {
    fn category(&self) -> Category {
        self.category
    }

    async fn parse(&self, message: &SourceMessage) -> Result<Vec<ExtractedRow>> {
        let mut rows = Vec::new();

        for html in &message.html_parts {
            rows = self.parse_html(html);
            if !rows.is_empty() {
                break;
            }
        }

        // HTML 테이블 파싱 실패 시 텍스트 기반 폴백
        if rows.is_empty() {
            debug!(category = %self.category, "HTML 테이블 미발견, 텍스트 폴백 시도");
            for html in &message.html_parts {
                rows = self.parse_text_fallback(html);
                if !rows.is_empty() {
                    break;
                }
            }
        }

        let rows = normalize_rows(rows);
        info!(
            category = %self.category,
            message_id = %message.id,
            rows = rows.len(),
            "추출 완료"
        );
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn message_with_html(html: &str) -> SourceMessage {
        SourceMessage {
            id: "m1".to_string(),
            subject: "RISK RANGE SIGNALS".to_string(),
            html_parts: vec![html.to_string()],
            ..Default::default()
        }
    }

    const DAILY_HTML: &str = r#"
    <html><body>
    <table>
      <tr><th>TICKER</th><th>BUY TRADE</th><th>SELL TRADE</th></tr>
      <tr><td>AAPL (BULLISH)</td><td>$150.00</td><td>$180.00</td></tr>
      <tr><td>EWJ (BEARISH)</td><td>73.65</td><td>75.00</td></tr>
      <tr><td>VIX (BEARISH)</td><td>14.00</td><td>19.00</td></tr>
      <tr><td>SPX (BULLISH)</td><td>5,900</td><td>6,100</td></tr>
      <tr><td>incomplete</td><td></td><td></td></tr>
    </table>
    </body></html>"#;

    #[tokio::test]
    async fn test_daily_table_extraction() {
        let parser = HtmlLevelsParser::daily();
        let rows = parser.parse(&message_with_html(DAILY_HTML)).await.unwrap();

        // VIX/SPX는 제외 대상, incomplete는 셀 부족
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ticker, "AAPL");
        assert_eq!(rows[0].sentiment, Sentiment::Bullish);
        assert_eq!(rows[0].buy_trade, dec!(150.00));
        assert_eq!(rows[0].sell_trade, dec!(180.00));
        assert_eq!(rows[1].ticker, "EWJ");
        assert_eq!(rows[1].sentiment, Sentiment::Bearish);
    }

    #[tokio::test]
    async fn test_sentiment_defaults_to_neutral() {
        let html = r#"
        <table>
          <tr><th>TICKER</th><th>BUY</th><th>SELL</th></tr>
          <tr><td>XLE</td><td>85.00</td><td>92.00</td></tr>
        </table>"#;
        let parser = HtmlLevelsParser::daily();
        let rows = parser.parse(&message_with_html(html)).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sentiment, Sentiment::Neutral);
    }

    #[tokio::test]
    async fn test_dedicated_sentiment_column() {
        let html = r#"
        <table>
          <tr><th>TICKER</th><th>BUY</th><th>SELL</th><th>TREND</th></tr>
          <tr><td>XLU</td><td>70.00</td><td>76.00</td><td>BEARISH</td></tr>
        </table>"#;
        let parser = HtmlLevelsParser::daily();
        let rows = parser.parse(&message_with_html(html)).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sentiment, Sentiment::Bearish);
        // BEARISH는 buy > sell 허용이지만 여기서는 정상 순서
        assert_eq!(rows[0].buy_trade, dec!(70.00));
    }

    #[tokio::test]
    async fn test_etf_column_layout() {
        let html = r#"
        <table>
          <tr><th>TICKER</th><th>PRICE</th><th>BUY TRADE</th><th>SELL TRADE</th></tr>
          <tr><td>GLD (BULLISH)</td><td>251.10</td><td>245.00</td><td>259.00</td></tr>
        </table>"#;
        let parser = HtmlLevelsParser::etfs();
        let rows = parser.parse(&message_with_html(html)).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category, Category::Etfs);
        // PRICE(251.10)를 건너뛰고 BUY/SELL을 읽어야 함
        assert_eq!(rows[0].buy_trade, dec!(245.00));
        assert_eq!(rows[0].sell_trade, dec!(259.00));
    }

    #[tokio::test]
    async fn test_text_fallback() {
        let html = r#"<html><body>
        <p>RISK RANGE SIGNALS:</p>
        <p>NVDA (BULLISH) 132.50 145.00</p>
        <p>EWJ (BEARISH)</p>
        <p>73.65 - 75.00</p>
        </body></html>"#;
        let parser = HtmlLevelsParser::daily();
        let rows = parser.parse(&message_with_html(html)).await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ticker, "NVDA");
        assert_eq!(rows[0].buy_trade, dec!(132.50));
        assert_eq!(rows[1].ticker, "EWJ");
        assert_eq!(rows[1].buy_trade, dec!(73.65));
        assert_eq!(rows[1].sell_trade, dec!(75.00));
    }

    #[tokio::test]
    async fn test_duplicate_ticker_keeps_last() {
        let html = r#"
        <table>
          <tr><th>TICKER</th><th>BUY</th><th>SELL</th></tr>
          <tr><td>AAPL (BULLISH)</td><td>150.00</td><td>180.00</td></tr>
          <tr><td>AAPL (BEARISH)</td><td>155.00</td><td>149.00</td></tr>
        </table>"#;
        let parser = HtmlLevelsParser::daily();
        let rows = parser.parse(&message_with_html(html)).await.unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sentiment, Sentiment::Bearish);
        assert_eq!(rows[0].buy_trade, dec!(155.00));
    }
}
