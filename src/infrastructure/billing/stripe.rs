//! Stripe billing provider over its form-encoded REST API

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::domain::billing::{BillingCustomer, BillingProvider, NewBillingCustomer};
use crate::domain::DomainError;

const PROVIDER: &str = "stripe";

#[derive(Debug, Deserialize)]
struct CustomerResponse {
    id: String,
}

/// Talks to `POST /v1/customers` and `POST /v1/subscriptions/{id}`
#[derive(Debug, Clone)]
pub struct StripeBillingProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl StripeBillingProvider {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| {
                DomainError::configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    async fn post_form(
        &self,
        path: &str,
        form: &[(String, String)],
    ) -> Result<reqwest::Response, DomainError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "Calling Stripe");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .form(form)
            .send()
            .await
            .map_err(|e| DomainError::provider(PROVIDER, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DomainError::provider(
                PROVIDER,
                format!("HTTP {}: {}", status, body),
            ));
        }

        Ok(response)
    }
}

#[async_trait]
impl BillingProvider for StripeBillingProvider {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn create_customer(
        &self,
        customer: NewBillingCustomer,
    ) -> Result<BillingCustomer, DomainError> {
        let mut form = vec![
            ("name".to_string(), customer.name),
            ("email".to_string(), customer.email),
        ];
        form.extend(
            customer
                .metadata
                .into_iter()
                .map(|(key, value)| (format!("metadata[{}]", key), value)),
        );

        let created: CustomerResponse = self
            .post_form("/v1/customers", &form)
            .await?
            .json()
            .await
            .map_err(|e| {
                DomainError::provider(PROVIDER, format!("Failed to parse response: {}", e))
            })?;

        Ok(BillingCustomer { id: created.id })
    }

    async fn update_subscription_quantity(
        &self,
        subscription_id: &str,
        quantity: u32,
    ) -> Result<(), DomainError> {
        let form = [("quantity".to_string(), quantity.to_string())];
        self.post_form(&format!("/v1/subscriptions/{}", subscription_id), &form)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> StripeBillingProvider {
        StripeBillingProvider::new(server.uri(), "sk_test_123", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_create_customer() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/customers"))
            .and(header("authorization", "Bearer sk_test_123"))
            .and(body_string_contains("email=owner%40x.com"))
            .and(body_string_contains("metadata%5Bteam_slug%5D=acme"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "cus_abc"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let customer = provider(&server)
            .create_customer(
                NewBillingCustomer::new("Acme", "owner@x.com").with_metadata("team_slug", "acme"),
            )
            .await
            .unwrap();

        assert_eq!(customer.id, "cus_abc");
    }

    #[tokio::test]
    async fn test_update_quantity() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/subscriptions/sub_42"))
            .and(body_string_contains("quantity=3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .expect(1)
            .mount(&server)
            .await;

        provider(&server)
            .update_subscription_quantity("sub_42", 3)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/subscriptions/sub_missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("No such subscription"))
            .mount(&server)
            .await;

        let err = provider(&server)
            .update_subscription_quantity("sub_missing", 1)
            .await
            .unwrap_err();

        match err {
            DomainError::Provider { provider, message } => {
                assert_eq!(provider, "stripe");
                assert!(message.contains("404"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
