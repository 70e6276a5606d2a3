//! Invitation emails through the Resend HTTP API

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use super::invitation_link;
use crate::domain::notification::{InvitationNotifier, TeamInvitationNotice};
use crate::domain::DomainError;

const PROVIDER: &str = "resend";

#[derive(Debug, Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    html: String,
}

/// Sends `POST /emails` with a bearer key
#[derive(Debug, Clone)]
pub struct ResendInvitationNotifier {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    from: String,
    app_url: String,
}

impl ResendInvitationNotifier {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
        app_url: impl Into<String>,
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
            from: from.into(),
            app_url: app_url.into(),
        })
    }

    fn render(&self, notice: &TeamInvitationNotice) -> SendEmailRequest<'_> {
        let link = invitation_link(&self.app_url, notice);

        SendEmailRequest {
            from: &self.from,
            to: Vec::new(),
            subject: format!("You've been invited to join {}", notice.team_name),
            html: format!(
                "<p>{} invited you to join <strong>{}</strong>.</p>\
                 <p><a href=\"{}\">Accept the invitation</a></p>",
                notice.inviter_name, notice.team_name, link
            ),
        }
    }
}

#[async_trait]
impl InvitationNotifier for ResendInvitationNotifier {
    async fn send_team_invitation(&self, notice: TeamInvitationNotice) -> Result<(), DomainError> {
        let mut body = self.render(&notice);
        body.to.push(&notice.email);

        let url = format!("{}/emails", self.base_url);
        debug!(url = %url, to = %notice.email, "Sending invitation email");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::provider(PROVIDER, format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            return Err(DomainError::provider(
                PROVIDER,
                format!("HTTP {}: {}", status, error_body),
            ));
        }

        Ok(())
    }
}
