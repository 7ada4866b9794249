//! 세션 다이제스트 렌더링.

use alert_core::{Alert, AlertKind, Sentiment, TradingSession};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// 세션 하나의 알림 다이제스트.
///
/// 제목에 세션, 알림 수, 날짜가 들어가며 본문은 텍스트와 HTML 두
/// 가지로 렌더링됩니다. 알림 목록이 비어 있으면 다이제스트를 만들지
/// 않습니다 (`from_alerts`가 None 반환).
#[derive(Debug, Clone)]
pub struct AlertDigest {
    /// 세션
    pub session: TradingSession,
    /// 알림 목록 (평가기 출력 순서 유지)
    pub alerts: Vec<Alert>,
    /// 생성 시각
    pub generated_at: DateTime<Utc>,
    /// 제목/본문 날짜 표기용 타임존
    tz: Tz,
}

impl AlertDigest {
    /// 알림 목록에서 다이제스트를 생성합니다.
    ///
    /// 빈 목록이면 None을 반환합니다 (메일 미발송).
    pub fn from_alerts(session: TradingSession, alerts: Vec<Alert>, tz: Tz) -> Option<Self> {
        if alerts.is_empty() {
            return None;
        }
        Some(Self {
            session,
            alerts,
            generated_at: Utc::now(),
            tz,
        })
    }

    /// 메일 제목.
    pub fn subject(&self) -> String {
        let local = self.generated_at.with_timezone(&self.tz);
        format!(
            "Trade Alerts [{}] - {} alert{} - {}",
            self.session,
            self.alerts.len(),
            if self.alerts.len() == 1 { "" } else { "s" },
            local.format("%Y-%m-%d")
        )
    }

    /// 텍스트 본문.
    pub fn render_plain(&self) -> String {
        let local = self.generated_at.with_timezone(&self.tz);
        let mut out = String::new();
        out.push_str(&format!(
            "{} session alerts - {}\n\n",
            self.session,
            local.format("%Y-%m-%d %H:%M:%S %Z")
        ));

        for kind in [AlertKind::Buy, AlertKind::Sell, AlertKind::Short, AlertKind::Cover] {
            let group: Vec<&Alert> = self.alerts.iter().filter(|a| a.kind == kind).collect();
            if group.is_empty() {
                continue;
            }
            out.push_str(&format!("{}:\n", kind));
            for alert in group {
                out.push_str(&format!(
                    "  {} ({}) price ${} vs threshold ${}\n",
                    alert.ticker, alert.category, alert.price, alert.threshold
                ));
            }
            out.push('\n');
        }

        out.push_str(
            "Rules: BULLISH/NEUTRAL - BUY at or below buy level, SELL at or above sell level. \
             BEARISH - SHORT at or above sell level, COVER at or below buy level.\n",
        );
        out
    }

    /// HTML 본문.
    pub fn render_html(&self) -> String {
        let local = self.generated_at.with_timezone(&self.tz);
        let mut rows = String::new();

        for alert in &self.alerts {
            let row_class = match alert.sentiment {
                Sentiment::Bearish => "bearish-row",
                _ => "bullish-row",
            };
            let action_class = format!("{}-action", alert.kind.as_str().to_lowercase());
            rows.push_str(&format!(
                "<tr class=\"{row_class}\">\
                 <td><strong>{ticker}</strong></td>\
                 <td>{category}</td>\
                 <td>{sentiment}</td>\
                 <td class=\"{action_class}\">{kind}</td>\
                 <td>${price}</td>\
                 <td>${threshold}</td>\
                 </tr>\n",
                ticker = alert.ticker,
                category = alert.category.as_str().to_uppercase(),
                sentiment = alert.sentiment.as_str().to_uppercase(),
                kind = alert.kind,
                price = alert.price,
                threshold = alert.threshold,
            ));
        }

        format!(
            r#"<html>
<head>
<style>
  body {{ font-family: Arial, sans-serif; margin: 20px; }}
  table {{ border-collapse: collapse; width: 100%; margin-top: 20px; }}
  th, td {{ border: 1px solid #ddd; padding: 10px; text-align: center; }}
  th {{ background-color: #37474f; color: white; }}
  .bullish-row {{ background-color: #e8f5e9; }}
  .bearish-row {{ background-color: #ffebee; }}
  .buy-action {{ color: #2e7d32; font-weight: bold; }}
  .sell-action {{ color: #d32f2f; font-weight: bold; }}
  .short-action {{ color: #f57c00; font-weight: bold; }}
  .cover-action {{ color: #1976d2; font-weight: bold; }}
  .footer {{ margin-top: 20px; font-size: 0.9em; color: #666; }}
</style>
</head>
<body>
<h2>{session} Session Alerts</h2>
<p><strong>Time:</strong> {time}</p>
<p><strong>Total:</strong> {count}</p>
<table>
<tr><th>Ticker</th><th>Category</th><th>Sentiment</th><th>Action</th><th>Price</th><th>Threshold</th></tr>
{rows}</table>
<div class="footer">
<p>BULLISH/NEUTRAL: BUY &le; buy level, SELL &ge; sell level. BEARISH: SHORT &ge; sell level, COVER &le; buy level.</p>
</div>
</body>
</html>"#,
            session = self.session,
            time = local.format("%Y-%m-%d %H:%M:%S %Z"),
            count = self.alerts.len(),
            rows = rows,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alert_core::Category;
    use rust_decimal_macros::dec;

    fn alert(ticker: &str, kind: AlertKind, sentiment: Sentiment) -> Alert {
        Alert {
            ticker: ticker.to_string(),
            category: Category::Daily,
            kind,
            price: dec!(149.50),
            threshold: dec!(150.00),
            sentiment,
            session: TradingSession::Am,
            generated_at: Utc::now(),
        }
    }

    fn eastern() -> Tz {
        chrono_tz::America::New_York
    }

    #[test]
    fn test_empty_alerts_no_digest() {
        assert!(AlertDigest::from_alerts(TradingSession::Am, vec![], eastern()).is_none());
    }

    #[test]
    fn test_subject_encodes_session_count_date() {
        let digest = AlertDigest::from_alerts(
            TradingSession::Am,
            vec![
                alert("AAPL", AlertKind::Buy, Sentiment::Bullish),
                alert("EWJ", AlertKind::Short, Sentiment::Bearish),
            ],
            eastern(),
        )
        .unwrap();

        let subject = digest.subject();
        assert!(subject.contains("[AM]"));
        assert!(subject.contains("2 alerts"));
    }

    #[test]
    fn test_subject_singular() {
        let digest = AlertDigest::from_alerts(
            TradingSession::Pm,
            vec![alert("AAPL", AlertKind::Buy, Sentiment::Bullish)],
            eastern(),
        )
        .unwrap();
        assert!(digest.subject().contains("1 alert -"));
    }

    #[test]
    fn test_plain_groups_by_kind() {
        let digest = AlertDigest::from_alerts(
            TradingSession::Am,
            vec![
                alert("AAPL", AlertKind::Buy, Sentiment::Bullish),
                alert("MSFT", AlertKind::Buy, Sentiment::Bullish),
                alert("EWJ", AlertKind::Short, Sentiment::Bearish),
            ],
            eastern(),
        )
        .unwrap();

        let plain = digest.render_plain();
        let buy_pos = plain.find("BUY:").unwrap();
        let short_pos = plain.find("SHORT:").unwrap();
        assert!(buy_pos < short_pos);
        assert!(!plain.contains("SELL:"));
        assert!(!plain.contains("COVER:"));
    }

    #[test]
    fn test_html_contains_rows_and_classes() {
        let digest = AlertDigest::from_alerts(
            TradingSession::Pm,
            vec![alert("EWJ", AlertKind::Short, Sentiment::Bearish)],
            eastern(),
        )
        .unwrap();

        let html = digest.render_html();
        assert!(html.contains("EWJ"));
        assert!(html.contains("bearish-row"));
        assert!(html.contains("short-action"));
        assert!(html.contains("PM Session Alerts"));
    }
}
