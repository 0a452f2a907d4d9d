use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use time::{Date, Weekday};

use crate::circuit_breaker::CircuitBreaker;
use crate::data_source::{HistoryRequest, PriceSource, SourceError, SourceFuture};
use crate::http_client::{HttpClient, HttpRequest, NoopHttpClient};
use crate::{ClosePoint, Ticker, UtcDateTime};

const CHART_ENDPOINT: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const REFERER: &str = "https://finance.yahoo.com/";

/// Yahoo chart adapter supporting both real API calls and offline mode.
///
/// Offline mode is selected by the transport: a client reporting
/// [`HttpClient::is_mock`] still receives the upstream call (so the circuit
/// breaker behaves identically) but the closes are synthesized from the
/// ticker, one per weekday in the requested range.
#[derive(Clone)]
pub struct YahooAdapter {
    http_client: Arc<dyn HttpClient>,
    circuit_breaker: Arc<CircuitBreaker>,
    use_real_api: bool,
    timeout_ms: u64,
}

impl Default for YahooAdapter {
    fn default() -> Self {
        Self {
            http_client: Arc::new(NoopHttpClient),
            circuit_breaker: Arc::new(CircuitBreaker::default()),
            use_real_api: false,
            timeout_ms: 10_000,
        }
    }
}

impl YahooAdapter {
    pub fn with_http_client(http_client: Arc<dyn HttpClient>) -> Self {
        let is_real = !http_client.is_mock();
        Self {
            http_client,
            use_real_api: is_real,
            ..Self::default()
        }
    }

    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = circuit_breaker;
        self
    }

    /// Per-request transport timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    fn chart_url(request: &HistoryRequest) -> String {
        let period1 = request.start.midnight().assume_utc().unix_timestamp();
        // period2 is exclusive upstream; extend to cover the end date.
        let period2 = request
            .end
            .next_day()
            .unwrap_or(request.end)
            .midnight()
            .assume_utc()
            .unix_timestamp();

        format!(
            "{CHART_ENDPOINT}/{}?period1={period1}&period2={period2}&interval=1d&events=history",
            urlencoding::encode(request.ticker.as_str()),
        )
    }

    /// Performs the upstream call behind the circuit breaker. `Ok(None)`
    /// means the upstream does not know the ticker.
    async fn fetch_chart(&self, url: &str) -> Result<Option<String>, SourceError> {
        if !self.circuit_breaker.allow_request() {
            let retry_secs = self
                .circuit_breaker
                .retry_after()
                .map_or(0, |wait| wait.as_secs());
            return Err(SourceError::unavailable(format!(
                "yahoo circuit breaker is open; skipping upstream call (retry in {retry_secs}s)"
            )));
        }

        let request = HttpRequest::get(url)
            .with_header("referer", REFERER)
            .with_timeout_ms(self.timeout_ms);

        let response = self.http_client.execute(request).await.map_err(|error| {
            self.circuit_breaker.record_failure();
            if error.is_timeout() {
                SourceError::timeout(format!("yahoo request timed out: {}", error.message()))
            } else if error.retryable() {
                SourceError::unavailable(format!("yahoo transport error: {}", error.message()))
            } else {
                SourceError::internal(format!("yahoo transport error: {}", error.message()))
            }
        })?;

        if response.status == 404 {
            self.circuit_breaker.record_success();
            return Ok(None);
        }

        if !response.is_success() {
            self.circuit_breaker.record_failure();
            return Err(SourceError::unavailable(format!(
                "yahoo upstream returned status {}",
                response.status
            )));
        }

        self.circuit_breaker.record_success();
        Ok(Some(response.body))
    }

    async fn fetch_real_closes(
        &self,
        request: &HistoryRequest,
    ) -> Result<Vec<ClosePoint>, SourceError> {
        let url = Self::chart_url(request);
        match self.fetch_chart(&url).await? {
            Some(body) => parse_chart(&body, request),
            None => Ok(Vec::new()),
        }
    }

    async fn fetch_fake_closes(
        &self,
        request: &HistoryRequest,
    ) -> Result<Vec<ClosePoint>, SourceError> {
        self.fetch_chart(&Self::chart_url(request)).await?;
        Ok(synthetic_closes(request))
    }
}

impl PriceSource for YahooAdapter {
    fn id(&self) -> &'static str {
        "yahoo"
    }

    fn daily_closes<'a>(&'a self, request: HistoryRequest) -> SourceFuture<'a, Vec<ClosePoint>> {
        Box::pin(async move {
            let points = if self.use_real_api {
                self.fetch_real_closes(&request).await?
            } else {
                self.fetch_fake_closes(&request).await?
            };

            tracing::debug!(
                source = self.id(),
                ticker = %request.ticker,
                points = points.len(),
                real = self.use_real_api,
                "fetched daily closes"
            );
            Ok(points)
        })
    }
}

// ============================================================================
// Chart payload
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResponse {
    chart: YahooChartData,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartData {
    #[serde(default)]
    result: Option<Vec<YahooChartResult>>,
    #[serde(default)]
    error: Option<YahooChartError>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartResult {
    #[serde(default)]
    meta: Option<YahooChartMeta>,
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: YahooChartIndicators,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartMeta {
    #[serde(default)]
    gmtoffset: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartIndicators {
    #[serde(default)]
    quote: Vec<YahooChartQuote>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooChartQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

fn parse_chart(body: &str, request: &HistoryRequest) -> Result<Vec<ClosePoint>, SourceError> {
    let chart_response: YahooChartResponse = serde_json::from_str(body)
        .map_err(|error| SourceError::internal(format!("failed to parse yahoo chart: {error}")))?;

    if let Some(error) = chart_response.chart.error {
        if error.code.eq_ignore_ascii_case("Not Found") {
            return Ok(Vec::new());
        }
        return Err(SourceError::unavailable(format!(
            "yahoo chart API error: {} {}",
            error.code, error.description
        )));
    }

    let Some(result) = chart_response
        .chart
        .result
        .and_then(|results| results.into_iter().next())
    else {
        return Ok(Vec::new());
    };

    let Some(timestamps) = result.timestamp else {
        return Ok(Vec::new());
    };
    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|quote| quote.close)
        .unwrap_or_default();
    let gmt_offset = result.meta.and_then(|meta| meta.gmtoffset).unwrap_or(0);

    // Keyed by exchange-local date; a repeated date keeps the later row.
    let mut by_date = BTreeMap::new();
    for (ts, close) in timestamps.iter().zip(closes) {
        let Some(close) = close else {
            continue;
        };
        let date = UtcDateTime::from_unix_timestamp(ts.saturating_add(gmt_offset))
            .map_err(|error| SourceError::internal(format!("invalid chart timestamp: {error}")))?
            .date();
        if date < request.start || date > request.end {
            continue;
        }
        match ClosePoint::new(date, close) {
            Ok(point) => {
                by_date.insert(date, point);
            }
            Err(error) => {
                tracing::debug!(%date, %error, "skipping unusable close");
            }
        }
    }

    Ok(by_date.into_values().collect())
}

// ============================================================================
// Offline data
// ============================================================================

fn ticker_seed(ticker: &Ticker) -> u64 {
    ticker
        .as_str()
        .bytes()
        .fold(0_u64, |acc, byte| acc.wrapping_mul(33).wrapping_add(u64::from(byte)))
}

fn is_trading_day(date: Date) -> bool {
    !matches!(date.weekday(), Weekday::Saturday | Weekday::Sunday)
}

fn synthetic_closes(request: &HistoryRequest) -> Vec<ClosePoint> {
    let seed = ticker_seed(&request.ticker);
    let base = 50.0 + (seed % 400) as f64;
    let mut points = Vec::new();
    let mut date = request.start;
    let mut index = 0_u64;

    while date <= request.end {
        if is_trading_day(date) {
            let swing = ((seed.wrapping_add(index) % 37) as f64 - 18.0) / 10.0;
            let drift = index as f64 * 0.05;
            let close = ((base + drift + swing) * 100.0).round() / 100.0;
            if let Ok(point) = ClosePoint::new(date, close.max(0.01)) {
                points.push(point);
            }
            index += 1;
        }
        match date.next_day() {
            Some(next) => date = next,
            None => break,
        }
    }

    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::{CircuitBreakerConfig, CircuitState};
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpError, HttpFuture, HttpResponse};
    use std::sync::Mutex;
    use time::Month;

    #[derive(Debug)]
    struct RecordingHttpClient {
        response: Result<HttpResponse, HttpError>,
        requests: Mutex<Vec<HttpRequest>>,
        mock: bool,
    }

    impl RecordingHttpClient {
        fn real(response: Result<HttpResponse, HttpError>) -> Self {
            Self {
                response,
                requests: Mutex::new(Vec::new()),
                mock: false,
            }
        }

        fn recorded_requests(&self) -> Vec<HttpRequest> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .clone()
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
            self.requests
                .lock()
                .expect("request store should not be poisoned")
                .push(request);
            let response = self.response.clone();
            Box::pin(async move { response })
        }

        fn is_mock(&self) -> bool {
            self.mock
        }
    }

    fn date(year: i32, month: Month, day: u8) -> Date {
        Date::from_calendar_date(year, month, day).expect("valid date")
    }

    fn request() -> HistoryRequest {
        HistoryRequest::new(
            Ticker::parse("AAPL").expect("valid"),
            date(2024, Month::March, 1),
            date(2024, Month::March, 31),
        )
        .expect("valid request")
    }

    // 2024-03-14, 15 and 18 at 13:30 UTC; the 15th has no close.
    const CHART_BODY: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "symbol": "AAPL", "gmtoffset": -14400 },
                "timestamp": [1710423000, 1710509400, 1710768600],
                "indicators": { "quote": [{ "close": [173.0, null, 173.72] }] }
            }],
            "error": null
        }
    }"#;

    #[tokio::test]
    async fn parses_chart_and_skips_null_closes() {
        let client = Arc::new(RecordingHttpClient::real(Ok(HttpResponse::ok_json(
            CHART_BODY,
        ))));
        let adapter = YahooAdapter::with_http_client(client.clone());

        let points = adapter.daily_closes(request()).await.expect("fetch");

        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, date(2024, Month::March, 14));
        assert_eq!(points[0].close, 173.0);
        assert_eq!(points[1].date, date(2024, Month::March, 18));

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].url.contains("/v8/finance/chart/AAPL?"));
        assert!(requests[0].url.contains("interval=1d"));
        assert!(requests[0].url.contains("period1=1709251200"));
    }

    #[tokio::test]
    async fn unknown_ticker_is_empty_history() {
        let not_found = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        for response in [
            HttpResponse::with_status(404, not_found),
            HttpResponse::ok_json(not_found),
        ] {
            let client = Arc::new(RecordingHttpClient::real(Ok(response)));
            let adapter = YahooAdapter::with_http_client(client);
            let points = adapter.daily_closes(request()).await.expect("fetch");
            assert!(points.is_empty());
        }
    }

    #[tokio::test]
    async fn malformed_payload_is_internal_error() {
        let client = Arc::new(RecordingHttpClient::real(Ok(HttpResponse::ok_json(
            "<html>",
        ))));
        let adapter = YahooAdapter::with_http_client(client);

        let error = adapter.daily_closes(request()).await.expect_err("bad body");
        assert_eq!(error.kind(), SourceErrorKind::Internal);
    }

    #[tokio::test]
    async fn circuit_breaker_opens_after_repeated_transport_failures() {
        let client = Arc::new(RecordingHttpClient::real(Err(HttpError::new(
            "upstream timeout",
        ))));
        let adapter = YahooAdapter::with_http_client(client.clone()).with_circuit_breaker(
            Arc::new(CircuitBreaker::new(CircuitBreakerConfig {
                failure_threshold: 3,
                open_timeout: std::time::Duration::from_secs(60),
            })),
        );

        for _ in 0..3 {
            let error = adapter.daily_closes(request()).await.expect_err("fails");
            assert_eq!(error.kind(), SourceErrorKind::Unavailable);
        }
        assert_eq!(adapter.circuit_breaker().state(), CircuitState::Open);

        let error = adapter.daily_closes(request()).await.expect_err("blocked");
        assert!(error.message().contains("circuit breaker is open"));
        assert_eq!(client.recorded_requests().len(), 3);
    }

    #[tokio::test]
    async fn transport_timeout_is_reported_as_timeout() {
        let client = Arc::new(RecordingHttpClient::real(Err(HttpError::timeout(
            "request timeout: deadline elapsed",
        ))));
        let adapter = YahooAdapter::with_http_client(client);

        let error = adapter.daily_closes(request()).await.expect_err("timed out");

        assert_eq!(error.kind(), SourceErrorKind::Timeout);
        assert!(error.message().contains("timed out"));
        assert_eq!(adapter.circuit_breaker().consecutive_failures(), 1);
    }

    #[tokio::test]
    async fn offline_mode_synthesizes_weekday_history() {
        let adapter = YahooAdapter::default();
        let points = adapter.daily_closes(request()).await.expect("fetch");

        // March 2024 has 21 weekdays.
        assert_eq!(points.len(), 21);
        assert!(points.iter().all(|point| is_trading_day(point.date)));
        assert!(points.windows(2).all(|pair| pair[0].date < pair[1].date));

        let again = adapter.daily_closes(request()).await.expect("fetch");
        assert_eq!(points, again);
    }
}
