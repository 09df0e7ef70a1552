// ============================================================================
// ERP Infrastructure - Webhook HTTP Sender
// File: crates/erp-infrastructure/src/http/webhook_sender.rs
// ============================================================================

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use erp_core::error::DomainError;
use erp_core::events::{WebhookRequest, WebhookResponse, WebhookSender};

/// POSTs signed webhook payloads. Redirects are not followed.
pub struct HttpWebhookSender {
    client: Client,
}

impl HttpWebhookSender {
    pub fn new(timeout_seconds: u64) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSender for HttpWebhookSender {
    async fn send(&self, request: WebhookRequest) -> Result<WebhookResponse, DomainError> {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .body(request.body)
            .send()
            .await
            .map_err(|e| DomainError::ExternalServiceError(e.to_string()))?;

        let status = response.status().as_u16();
        // An unreadable body still carries a usable status.
        let body = response.text().await.unwrap_or_default();
        Ok(WebhookResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(url: String) -> WebhookRequest {
        WebhookRequest {
            url,
            headers: vec![
                ("Content-Type".into(), "application/json".into()),
                ("X-Webhook-Event".into(), "lead.created".into()),
            ],
            body: br#"{"event":"lead.created"}"#.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_send_posts_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("X-Webhook-Event", "lead.created"))
            .and(body_string(r#"{"event":"lead.created"}"#))
            .respond_with(ResponseTemplate::new(202).set_body_string("accepted"))
            .expect(1)
            .mount(&server)
            .await;

        let sender = HttpWebhookSender::new(5).unwrap();
        let response = sender.send(request(format!("{}/hook", server.uri()))).await.unwrap();

        assert_eq!(response.status, 202);
        assert_eq!(response.body, "accepted");
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_non_success_status_is_returned_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let sender = HttpWebhookSender::new(5).unwrap();
        let response = sender.send(request(server.uri())).await.unwrap();
        assert_eq!(response.status, 500);
        assert!(!response.is_success());
    }

    #[tokio::test]
    async fn test_timeout_is_external_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;

        let sender = HttpWebhookSender::new(1).unwrap();
        let err = sender.send(request(server.uri())).await.unwrap_err();
        assert!(matches!(err, DomainError::ExternalServiceError(_)));
    }
}
