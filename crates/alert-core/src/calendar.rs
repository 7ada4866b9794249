//! 미국 시장 캘린더.
//!
//! NYSE 휴장일, 거래일 판별, 세션 구간, 다음 실행 시각 계산을 제공합니다.
//! 모든 비교는 America/New_York 타임존 기준입니다.
//!
//! 휴장일 구성:
//! - 고정일: 신정(1/1), Juneteenth(6/19), 독립기념일(7/4), 성탄절(12/25)
//! - 변동일: MLK(1월 3번째 월), Presidents(2월 3번째 월),
//!   Good Friday(부활절 2일 전), Memorial(5월 마지막 월),
//!   Labor(9월 첫 월), Thanksgiving(11월 4번째 목)
//! - 주말 대체: 토요일이면 전 금요일 휴장, 일요일이면 다음 월요일 휴장

use crate::types::{MarketSession, TradingSession};
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

/// 거래소 캘린더.
///
/// 내부 상태가 없는 순수 계산 모듈이며, 타임존만 보관합니다.
#[derive(Debug, Clone)]
pub struct MarketCalendar {
    tz: Tz,
}

impl Default for MarketCalendar {
    fn default() -> Self {
        Self::eastern()
    }
}

impl MarketCalendar {
    /// 지정한 타임존의 캘린더를 생성합니다.
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// America/New_York 캘린더를 생성합니다.
    pub fn eastern() -> Self {
        Self::new(chrono_tz::America::New_York)
    }

    /// 타임존을 반환합니다.
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// 현재 시각 (거래소 로컬).
    pub fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&self.tz)
    }

    /// UTC 시각을 거래소 로컬 날짜로 변환합니다.
    pub fn local_date(&self, t: DateTime<Utc>) -> NaiveDate {
        t.with_timezone(&self.tz).date_naive()
    }

    /// 오늘의 거래일 (거래소 로컬).
    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    /// 주어진 날짜에 시장이 열리는지 확인합니다.
    pub fn is_market_day(&self, date: NaiveDate) -> bool {
        if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            return false;
        }
        !self.is_holiday(date)
    }

    /// 주어진 날짜가 (대체 휴일 포함) 휴장일인지 확인합니다.
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        holidays_for_year(date.year())
            .iter()
            .any(|(d, _)| *d == date)
    }

    /// 주어진 날짜 이후의 다음 거래일.
    pub fn next_market_day(&self, from: NaiveDate) -> NaiveDate {
        let mut date = from + Duration::days(1);
        // 연휴 대비 최대 30일 탐색
        for _ in 0..30 {
            if self.is_market_day(date) {
                return date;
            }
            date += Duration::days(1);
        }
        date
    }

    /// 주어진 날짜 이전의 직전 거래일.
    pub fn previous_market_day(&self, from: NaiveDate) -> NaiveDate {
        let mut date = from - Duration::days(1);
        for _ in 0..30 {
            if self.is_market_day(date) {
                return date;
            }
            date -= Duration::days(1);
        }
        date
    }

    /// 해당 날짜가 ISO 주의 첫 거래일인지 확인합니다.
    ///
    /// 첫 거래일은 해당 주에서 가장 이른 비휴장 평일입니다.
    pub fn is_first_market_day_of_week(&self, date: NaiveDate) -> bool {
        if !self.is_market_day(date) {
            return false;
        }

        let monday = date - Duration::days(date.weekday().num_days_from_monday() as i64);
        let mut current = monday;
        while current <= date {
            if self.is_market_day(current) {
                return current == date;
            }
            current += Duration::days(1);
        }
        false
    }

    /// 주어진 시각이 속하는 시장 세션 구간을 반환합니다.
    pub fn today_session(&self, t: DateTime<Utc>) -> MarketSession {
        let local = t.with_timezone(&self.tz).time();
        let t0930 = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let t1200 = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let t1430 = NaiveTime::from_hms_opt(14, 30, 0).unwrap();
        let t1630 = NaiveTime::from_hms_opt(16, 30, 0).unwrap();

        if local < t0930 {
            MarketSession::Pre
        } else if local < t1200 {
            MarketSession::Am
        } else if local < t1430 {
            MarketSession::Mid
        } else if local < t1630 {
            MarketSession::Pm
        } else {
            MarketSession::Post
        }
    }

    /// 수동 실행용 세션 자동 판별.
    ///
    /// AM은 [09:30, 12:00), PM은 [12:00, 16:30) 구간입니다.
    /// 그 외 시간대에는 호출자가 세션을 명시해야 합니다.
    pub fn detect_session(&self, t: DateTime<Utc>) -> Option<TradingSession> {
        let local = t.with_timezone(&self.tz).time();
        let t0930 = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
        let t1200 = NaiveTime::from_hms_opt(12, 0, 0).unwrap();
        let t1630 = NaiveTime::from_hms_opt(16, 30, 0).unwrap();

        if local >= t0930 && local < t1200 {
            Some(TradingSession::Am)
        } else if local >= t1200 && local < t1630 {
            Some(TradingSession::Pm)
        } else {
            None
        }
    }

    /// 주어진 시각 이후, 거래일의 로컬 `fire` 시각이 처음 도래하는
    /// UTC 시각을 계산합니다.
    pub fn next_fire(&self, fire: NaiveTime, from: DateTime<Utc>) -> DateTime<Utc> {
        let local_from = from.with_timezone(&self.tz);
        let mut date = local_from.date_naive();

        // 오늘 발사 시각이 이미 지났으면 다음 날부터 탐색
        if local_from.time() >= fire || !self.is_market_day(date) {
            if local_from.time() >= fire {
                date += Duration::days(1);
            }
            while !self.is_market_day(date) {
                date += Duration::days(1);
            }
        }

        loop {
            if self.is_market_day(date) {
                // DST 전환일의 모호한 로컬 시각은 앞쪽 해석을 사용
                if let Some(local) = self
                    .tz
                    .from_local_datetime(&date.and_time(fire))
                    .earliest()
                {
                    let utc = local.with_timezone(&Utc);
                    if utc > from {
                        return utc;
                    }
                }
            }
            date += Duration::days(1);
        }
    }
}

/// 부활절 일요일 (anonymous Gregorian computus).
pub fn easter_sunday(year: i32) -> NaiveDate {
    let a = year % 19;
    let b = year / 100;
    let c = year % 100;
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = ((h + l - 7 * m + 114) % 31) + 1;
    NaiveDate::from_ymd_opt(year, month as u32, day as u32).expect("computus 결과 범위 초과")
}

/// 해당 연도의 (대체 휴일 반영된) NYSE 휴장일 목록.
pub fn holidays_for_year(year: i32) -> Vec<(NaiveDate, &'static str)> {
    let mut holidays = Vec::with_capacity(10);

    // 고정일 (주말이면 대체 적용)
    for (month, day, name) in [
        (1u32, 1u32, "New Year's Day"),
        (6, 19, "Juneteenth"),
        (7, 4, "Independence Day"),
        (12, 25, "Christmas Day"),
    ] {
        let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
        holidays.push((observe_weekend(date), name));
    }

    // 변동일 (항상 평일)
    holidays.push((nth_weekday(year, 1, Weekday::Mon, 3), "Martin Luther King Jr. Day"));
    holidays.push((nth_weekday(year, 2, Weekday::Mon, 3), "Presidents' Day"));
    holidays.push((easter_sunday(year) - Duration::days(2), "Good Friday"));
    holidays.push((last_weekday(year, 5, Weekday::Mon), "Memorial Day"));
    holidays.push((nth_weekday(year, 9, Weekday::Mon, 1), "Labor Day"));
    holidays.push((nth_weekday(year, 11, Weekday::Thu, 4), "Thanksgiving Day"));

    holidays.sort_by_key(|(d, _)| *d);
    holidays
}

/// 토요일은 전 금요일, 일요일은 다음 월요일로 대체합니다.
fn observe_weekend(date: NaiveDate) -> NaiveDate {
    match date.weekday() {
        Weekday::Sat => date - Duration::days(1),
        Weekday::Sun => date + Duration::days(1),
        _ => date,
    }
}

/// 해당 월의 n번째 요일.
fn nth_weekday(year: i32, month: u32, weekday: Weekday, n: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let offset = (7 + weekday.num_days_from_monday() as i64
        - first.weekday().num_days_from_monday() as i64)
        % 7;
    first + Duration::days(offset + 7 * (n as i64 - 1))
}

/// 해당 월의 마지막 요일.
fn last_weekday(year: i32, month: u32, weekday: Weekday) -> NaiveDate {
    let next_month = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap()
    };
    let last = next_month - Duration::days(1);
    let offset = (7 + last.weekday().num_days_from_monday() as i64
        - weekday.num_days_from_monday() as i64)
        % 7;
    last - Duration::days(offset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn test_easter_computus() {
        assert_eq!(easter_sunday(2024), ymd(2024, 3, 31));
        assert_eq!(easter_sunday(2025), ymd(2025, 4, 20));
        assert_eq!(easter_sunday(2026), ymd(2026, 4, 5));
        assert_eq!(easter_sunday(2027), ymd(2027, 3, 28));
    }

    #[test]
    fn test_holidays_2025() {
        // NYSE 공시 휴장일과 일치해야 함
        let expected = [
            ymd(2025, 1, 1),   // New Year's Day (수)
            ymd(2025, 1, 20),  // MLK
            ymd(2025, 2, 17),  // Presidents'
            ymd(2025, 4, 18),  // Good Friday
            ymd(2025, 5, 26),  // Memorial
            ymd(2025, 6, 19),  // Juneteenth (목)
            ymd(2025, 7, 4),   // Independence (금)
            ymd(2025, 9, 1),   // Labor
            ymd(2025, 11, 27), // Thanksgiving
            ymd(2025, 12, 25), // Christmas (목)
        ];
        let actual: Vec<NaiveDate> = holidays_for_year(2025).iter().map(|(d, _)| *d).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_holidays_2026_observed_independence_day() {
        // 2026-07-04는 토요일이므로 7/3 금요일 휴장
        let holidays = holidays_for_year(2026);
        assert!(holidays.iter().any(|(d, n)| *d == ymd(2026, 7, 3) && *n == "Independence Day"));
        assert!(!holidays.iter().any(|(d, _)| *d == ymd(2026, 7, 4)));
    }

    #[test]
    fn test_sunday_holiday_observed_monday() {
        // 2027-12-25는 토요일 → 12/24 금요일, 2027-07-04는 일요일 → 7/5 월요일
        let holidays = holidays_for_year(2027);
        assert!(holidays.iter().any(|(d, n)| *d == ymd(2027, 7, 5) && *n == "Independence Day"));
        assert!(holidays.iter().any(|(d, n)| *d == ymd(2027, 12, 24) && *n == "Christmas Day"));
    }

    #[test]
    fn test_is_market_day() {
        let cal = MarketCalendar::eastern();

        assert!(cal.is_market_day(ymd(2026, 3, 2))); // 월요일
        assert!(!cal.is_market_day(ymd(2026, 3, 7))); // 토요일
        assert!(!cal.is_market_day(ymd(2026, 3, 8))); // 일요일
        assert!(!cal.is_market_day(ymd(2026, 1, 1))); // 신정
        assert!(!cal.is_market_day(ymd(2026, 4, 3))); // Good Friday
        assert!(!cal.is_market_day(ymd(2026, 7, 3))); // 독립기념일 대체
    }

    #[test]
    fn test_next_previous_market_day() {
        let cal = MarketCalendar::eastern();

        // 금요일 다음 거래일은 월요일
        assert_eq!(cal.next_market_day(ymd(2026, 3, 6)), ymd(2026, 3, 9));
        // Good Friday(4/3) 전 거래일은 목요일
        assert_eq!(cal.previous_market_day(ymd(2026, 4, 6)), ymd(2026, 4, 2));
    }

    #[test]
    fn test_first_market_day_of_week() {
        let cal = MarketCalendar::eastern();

        // 평범한 주: 월요일이 첫 거래일
        assert!(cal.is_first_market_day_of_week(ymd(2026, 3, 2)));
        assert!(!cal.is_first_market_day_of_week(ymd(2026, 3, 3)));

        // 2026-09-07은 Labor Day(월) → 화요일(9/8)이 첫 거래일
        assert!(!cal.is_first_market_day_of_week(ymd(2026, 9, 7)));
        assert!(cal.is_first_market_day_of_week(ymd(2026, 9, 8)));
    }

    #[test]
    fn test_today_session_windows() {
        let cal = MarketCalendar::eastern();
        let tz = cal.timezone();
        let at = |h: u32, m: u32| {
            tz.with_ymd_and_hms(2026, 3, 2, h, m, 0)
                .unwrap()
                .with_timezone(&Utc)
        };

        assert_eq!(cal.today_session(at(8, 0)), MarketSession::Pre);
        assert_eq!(cal.today_session(at(9, 30)), MarketSession::Am);
        assert_eq!(cal.today_session(at(11, 59)), MarketSession::Am);
        assert_eq!(cal.today_session(at(12, 0)), MarketSession::Mid);
        assert_eq!(cal.today_session(at(14, 30)), MarketSession::Pm);
        assert_eq!(cal.today_session(at(16, 30)), MarketSession::Post);
    }

    #[test]
    fn test_detect_session() {
        let cal = MarketCalendar::eastern();
        let tz = cal.timezone();
        let at = |h: u32, m: u32| {
            tz.with_ymd_and_hms(2026, 3, 2, h, m, 0)
                .unwrap()
                .with_timezone(&Utc)
        };

        assert_eq!(cal.detect_session(at(10, 45)), Some(TradingSession::Am));
        assert_eq!(cal.detect_session(at(14, 30)), Some(TradingSession::Pm));
        assert_eq!(cal.detect_session(at(8, 0)), None);
        assert_eq!(cal.detect_session(at(17, 0)), None);
    }

    #[test]
    fn test_next_fire_skips_weekend_and_holiday() {
        let cal = MarketCalendar::eastern();
        let tz = cal.timezone();
        let fire = NaiveTime::from_hms_opt(9, 0, 0).unwrap();

        // 금요일 장 마감 후 → 다음 월요일 09:00
        let friday_evening = tz
            .with_ymd_and_hms(2026, 3, 6, 18, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let next = cal.next_fire(fire, friday_evening).with_timezone(&tz);
        assert_eq!(next.date_naive(), ymd(2026, 3, 9));
        assert_eq!(next.time(), fire);

        // Good Friday 전날 밤 → 다음 월요일(4/6)
        let thursday_night = tz
            .with_ymd_and_hms(2026, 4, 2, 22, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let next = cal.next_fire(fire, thursday_night).with_timezone(&tz);
        assert_eq!(next.date_naive(), ymd(2026, 4, 6));
    }

    #[test]
    fn test_next_fire_same_day_before_time() {
        let cal = MarketCalendar::eastern();
        let tz = cal.timezone();
        let fire = NaiveTime::from_hms_opt(10, 45, 0).unwrap();

        let early = tz
            .with_ymd_and_hms(2026, 3, 2, 7, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let next = cal.next_fire(fire, early).with_timezone(&tz);
        assert_eq!(next.date_naive(), ymd(2026, 3, 2));
        assert_eq!(next.time(), fire);
    }
}
