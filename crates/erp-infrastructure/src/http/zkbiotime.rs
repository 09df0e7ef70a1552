// ============================================================================
// ERP Infrastructure - ZKBioTime Client
// File: crates/erp-infrastructure/src/http/zkbiotime.rs
// Description: JWT login and paginated transaction export of ZKBioTime servers
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use erp_core::domain::{ProviderTransaction, TransactionPage, TransactionQuery};
use erp_core::error::DomainError;
use erp_core::services::AttendanceProvider;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct TransactionsResponse {
    count: i64,
    next: Option<String>,
    #[serde(default)]
    data: Vec<RawTransaction>,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    id: i64,
    emp_code: String,
    punch_time: String,
    punch_state: String,
    verify_type: Option<i32>,
    terminal_sn: Option<String>,
}

impl TryFrom<RawTransaction> for ProviderTransaction {
    type Error = DomainError;

    fn try_from(raw: RawTransaction) -> Result<Self, Self::Error> {
        let punch_time = NaiveDateTime::parse_from_str(&raw.punch_time, TIME_FORMAT).map_err(|e| {
            DomainError::ExternalServiceError(format!(
                "transaction {} has invalid punch_time '{}': {}",
                raw.id, raw.punch_time, e
            ))
        })?;
        Ok(ProviderTransaction {
            id: raw.id,
            emp_code: raw.emp_code,
            punch_time,
            punch_state: raw.punch_state,
            verify_type: raw.verify_type,
            terminal_sn: raw.terminal_sn,
        })
    }
}

pub struct ZkBioTimeClient {
    client: Client,
}

impl ZkBioTimeClient {
    pub fn new(timeout_seconds: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self { client })
    }

    fn url(base_url: &str, path: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), path)
    }
}

fn transport_error(e: reqwest::Error) -> DomainError {
    warn!("Attendance API request failed: {}", e);
    DomainError::ExternalServiceError(format!("attendance API request failed: {}", e))
}

async fn ensure_success(response: reqwest::Response, what: &str) -> Result<reqwest::Response, DomainError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!(%status, "Attendance API {} rejected: {}", what, body);
    Err(DomainError::ExternalServiceError(format!(
        "attendance API {} returned {}",
        what, status
    )))
}

#[async_trait]
impl AttendanceProvider for ZkBioTimeClient {
    async fn authenticate(&self, base_url: &str, username: &str, password: &str) -> Result<String, DomainError> {
        let response = self
            .client
            .post(Self::url(base_url, "jwt-api-token-auth/"))
            .json(&TokenRequest { username, password })
            .send()
            .await
            .map_err(transport_error)?;

        let body: TokenResponse = ensure_success(response, "authentication")
            .await?
            .json()
            .await
            .map_err(|e| DomainError::ExternalServiceError(format!("malformed token response: {}", e)))?;

        if body.token.is_empty() {
            return Err(DomainError::ExternalServiceError("attendance API returned an empty token".into()));
        }
        Ok(body.token)
    }

    async fn fetch_transactions(&self, base_url: &str, token: &str, query: TransactionQuery) -> Result<TransactionPage, DomainError> {
        debug!(page = query.page, "Fetching attendance transactions");
        let url = Url::parse_with_params(
            &Self::url(base_url, "iclock/api/transactions/"),
            &[
                ("page", query.page.to_string()),
                ("page_size", query.page_size.to_string()),
                ("start_time", query.start_time.format(TIME_FORMAT).to_string()),
                ("end_time", query.end_time.format(TIME_FORMAT).to_string()),
            ],
        )
        .map_err(|e| DomainError::ExternalServiceError(format!("invalid attendance API url: {}", e)))?;

        let response = self
            .client
            .get(url)
            .header("Authorization", format!("JWT {}", token))
            .send()
            .await
            .map_err(transport_error)?;

        let body: TransactionsResponse = ensure_success(response, "transactions")
            .await?
            .json()
            .await
            .map_err(|e| DomainError::ExternalServiceError(format!("malformed transactions response: {}", e)))?;

        let transactions = body
            .data
            .into_iter()
            .map(ProviderTransaction::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TransactionPage {
            count: body.count,
            has_next: body.next.is_some(),
            transactions,
        })
    }
}
