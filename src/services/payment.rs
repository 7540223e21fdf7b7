use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::config::PaymentConfig;
use crate::validation::sanitize_text;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Basic,
    Professional,
    Enterprise,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount: f64,
    pub description: String,
    pub plan_type: PlanType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<Customer>,
    /// Account the payment is attributed to; never taken from the request body
    #[serde(skip_deserializing, skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<Uuid>,
}

impl PaymentRequest {
    pub fn normalized(mut self) -> Self {
        self.description = sanitize_text(&self.description);
        if let Some(customer) = self.customer.as_mut() {
            customer.name = sanitize_text(&customer.name);
            customer.email = customer.email.trim().to_lowercase();
        }
        self
    }
}

/// Payment as reported by the provider, which remains the source of truth
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub status: String,
    pub amount: f64,
    pub description: String,
    pub plan_type: PlanType,
    #[serde(default)]
    pub checkout_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Account id echoed back by the provider; absent for public checkouts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<String>,
}

impl Payment {
    pub fn belongs_to(&self, owner: Uuid) -> bool {
        self.external_reference
            .as_deref()
            .and_then(|reference| Uuid::parse_str(reference.trim()).ok())
            == Some(owner)
    }
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Payment provider is not configured")]
    NotConfigured,

    #[error("Invalid payment provider URL: {0}")]
    InvalidUrl(String),

    #[error("Payment {0} not found")]
    NotFound(String),

    #[error("Payment provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Payment provider returned {status}: {body}")]
    Provider { status: u16, body: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, PaymentError>;

    async fn payment_status(&self, id: &str) -> Result<Payment, PaymentError>;
}

/// JSON-over-HTTP provider client: `POST {base}/payments`, `GET {base}/payments/{id}`
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(config: &PaymentConfig) -> Result<Self, PaymentError> {
        let base_url =
            Url::parse(&config.api_url).map_err(|e| PaymentError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() || !matches!(base_url.scheme(), "http" | "https") {
            return Err(PaymentError::InvalidUrl(config.api_url.clone()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, PaymentError> {
        if self.api_key.is_empty() {
            return Err(PaymentError::NotConfigured);
        }
        Ok(builder.bearer_auth(&self.api_key))
    }

    async fn read_payment(response: Response) -> Result<Payment, PaymentError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<Payment>().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PaymentError::Provider {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, PaymentError> {
        let url = self.endpoint(&["payments"]);
        tracing::debug!("Creating payment at {}", url);

        let response = self.authorized(self.client.post(url))?.json(request).send().await?;
        Self::read_payment(response).await
    }

    async fn payment_status(&self, id: &str) -> Result<Payment, PaymentError> {
        let url = self.endpoint(&["payments", id]);
        let response = self.authorized(self.client.get(url))?.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(PaymentError::NotFound(id.to_string()));
        }
        Self::read_payment(response).await
    }
}
