#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use farmagenius::config::AppConfig;
use farmagenius::database::MemoryStore;
use farmagenius::services::payment::{Payment, PaymentError, PaymentGateway, PaymentRequest};
use farmagenius::{app, AppState};

pub const PASSWORD: &str = "Senha@123";
const BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Provider stand-in: payments are numbered `pay_test_N` in creation order
/// and echo the account they were attributed to
#[derive(Default)]
pub struct StubPayments {
    pub created: std::sync::Mutex<Vec<PaymentRequest>>,
}

fn stub_payment(id: String, status: &str, request: &PaymentRequest) -> Payment {
    Payment {
        checkout_url: Some(format!("https://checkout.test/{}", id)),
        id,
        status: status.to_string(),
        amount: request.amount,
        description: request.description.clone(),
        plan_type: request.plan_type,
        created_at: None,
        external_reference: request.external_reference.map(|owner| owner.to_string()),
    }
}

#[async_trait]
impl PaymentGateway for StubPayments {
    async fn create_payment(&self, request: &PaymentRequest) -> Result<Payment, PaymentError> {
        let mut created = self.created.lock().unwrap();
        created.push(request.clone());
        Ok(stub_payment(format!("pay_test_{}", created.len()), "pending", request))
    }

    async fn payment_status(&self, id: &str) -> Result<Payment, PaymentError> {
        let created = self.created.lock().unwrap();
        id.strip_prefix("pay_test_")
            .and_then(|n| n.parse::<usize>().ok())
            .and_then(|n| n.checked_sub(1))
            .and_then(|index| created.get(index))
            .map(|request| stub_payment(id.to_string(), "confirmed", request))
            .ok_or_else(|| PaymentError::NotFound(id.to_string()))
    }
}

fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    // Generous limits so ordinary tests never trip the limiter
    config.api.auth_rate_limit.max_requests = 1000;
    config.api.upload_rate_limit.max_requests = 1000;
    config
}

/// Router over a fresh in-memory store
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub payments: Arc<StubPayments>,
}

impl TestApp {
    pub fn new() -> Result<Self> {
        Self::with_config(test_config())
    }

    /// Same as `new`, with `email` allowed to read every audit entry
    pub fn with_audit_admin(email: &str) -> Result<Self> {
        let mut config = test_config();
        config.security.audit_admins = vec![email.to_string()];
        Self::with_config(config)
    }

    pub fn with_config(config: AppConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::new());
        let payments = Arc::new(StubPayments::default());
        let state = AppState::new(config, store.clone())?.with_payments(payments.clone());

        Ok(Self { router: app(state), store, payments })
    }

    pub async fn send(&self, request: Request<Body>) -> Result<Response> {
        let response = self.router.clone().oneshot(request).await?;
        Ok(response)
    }

    /// JSON round-trip; returns the status and the parsed envelope
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "203.0.113.10");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.send(request).await?;
        let status = response.status();
        Ok((status, read_json(response).await?))
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> Result<(StatusCode, Value)> {
        self.call(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Option<Value>) -> Result<(StatusCode, Value)> {
        self.call(Method::PUT, uri, Some(token), body).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.call(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn signup(&self, name: &str, email: &str) -> Result<(StatusCode, Value)> {
        self.post(
            "/signup",
            None,
            json!({ "name": name, "email": email, "password": PASSWORD }),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(StatusCode, Value)> {
        self.post("/auth/login", None, json!({ "email": email, "password": password }))
            .await
    }

    /// Register an account and return its session token
    pub async fn register(&self, name: &str, email: &str) -> Result<String> {
        let (status, body) = self.signup(name, email).await?;
        anyhow::ensure!(status == StatusCode::CREATED, "signup failed: {} {}", status, body);

        let (status, body) = self.login(email, PASSWORD).await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {} {}", status, body);

        body["token"]
            .as_str()
            .map(str::to_string)
            .context("login response has no token")
    }
}

pub async fn read_bytes(response: Response) -> Result<Vec<u8>> {
    Ok(to_bytes(response.into_body(), BODY_LIMIT).await?.to_vec())
}

pub async fn read_json(response: Response) -> Result<Value> {
    let bytes = read_bytes(response).await?;
    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(&bytes)?)
}

/// Hand-built `multipart/form-data` body with a single `file` part
pub fn multipart_upload(file_name: &str, contents: &[u8]) -> Result<Request<Body>> {
    let boundary = "farmagenius-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

    Ok(Request::builder()
        .method(Method::POST)
        .uri("/preview-excel")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", boundary),
        )
        .body(Body::from(body))?)
}

/// Workbook with a header row and `rows` data rows
pub fn sample_workbook(rows: u32) -> Result<Vec<u8>> {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Produção")?;
    sheet.write(0, 0, "Produto")?;
    sheet.write(0, 1, "Quantidade")?;
    for row in 1..=rows {
        sheet.write(row, 0, format!("Cápsula {}", row))?;
        sheet.write(row, 1, row as f64)?;
    }
    Ok(workbook.save_to_buffer()?)
}
