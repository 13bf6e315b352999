use anyhow::Result;
use regex::Regex;
use serde_json::json;
use std::sync::OnceLock;
use thiserror::Error;
use crate::config::delivery::DeliveryConfig;

const RESPONSE_BODY_CAP: usize = 2048;

/// Outcome classification drives everything downstream: transient failures
/// are retried and requeued, permanent ones dead-letter immediately.
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("transient delivery failure: {reason}")]
    Transient {
        reason: String,
        code: Option<i32>,
        body: Option<String>,
    },
    #[error("permanent delivery failure: {reason}")]
    Permanent {
        reason: String,
        code: Option<i32>,
        body: Option<String>,
    },
}

impl DeliveryError {
    pub fn transient(reason: impl Into<String>) -> Self {
        DeliveryError::Transient {
            reason: reason.into(),
            code: None,
            body: None,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Transient { .. })
    }

    pub fn code(&self) -> Option<i32> {
        match self {
            DeliveryError::Transient { code, .. } | DeliveryError::Permanent { code, .. } => *code,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            DeliveryError::Transient { body, .. } | DeliveryError::Permanent { body, .. } => {
                body.as_deref()
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub code: i32,
    pub body: String,
}

/// HTTP client for the external delivery API.
pub struct DeliveryService {
    client: reqwest::Client,
    config: DeliveryConfig,
}

impl DeliveryService {
    pub fn new(config: DeliveryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(DeliveryService { client, config })
    }

    /// One attempt against the delivery API. Retry policy lives in the
    /// caller; this only classifies the outcome.
    pub async fn send(&self, email: &str, message: &str) -> Result<DeliveryReceipt, DeliveryError> {
        let response = self
            .client
            .post(&self.config.url)
            .json(&json!({ "email": email, "message": message }))
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => return Err(classify_transport_error(&e)),
        };

        let code = response.status().as_u16() as i32;
        let body = truncate(response.text().await.unwrap_or_default());

        if (200..300).contains(&code) {
            Ok(DeliveryReceipt { code, body })
        } else {
            Err(classify_http_status(code, body))
        }
    }
}

fn truncate(mut body: String) -> String {
    if body.len() > RESPONSE_BODY_CAP {
        let mut cut = RESPONSE_BODY_CAP;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

/// Transport failures carry no HTTP status; timeouts are always transient,
/// everything else is judged by its message text.
fn classify_transport_error(error: &reqwest::Error) -> DeliveryError {
    let text = error.to_string();

    if error.is_timeout() {
        return DeliveryError::Transient {
            reason: format!("timeout calling delivery API: {}", text),
            code: None,
            body: None,
        };
    }

    let reason = format!("transport error calling delivery API: {}", text);
    if is_transient_error_text(&text) {
        DeliveryError::Transient {
            reason,
            code: None,
            body: None,
        }
    } else {
        DeliveryError::Permanent {
            reason,
            code: None,
            body: None,
        }
    }
}

pub fn classify_http_status(code: i32, body: String) -> DeliveryError {
    if code == 429 || (500..600).contains(&code) {
        DeliveryError::Transient {
            reason: format!("delivery API returned {}", code),
            code: Some(code),
            body: Some(body),
        }
    } else if (400..500).contains(&code) {
        DeliveryError::Permanent {
            reason: format!("delivery API returned {}", code),
            code: Some(code),
            body: Some(body),
        }
    } else {
        // Anything outside the families above is unexpected; retrying is
        // the safe default.
        DeliveryError::Transient {
            reason: format!("unexpected delivery API status {}", code),
            code: Some(code),
            body: Some(body),
        }
    }
}

/// Classify an error with no HTTP status attached, by message text.
/// Ambiguous text defaults to transient.
pub fn is_transient_error_text(text: &str) -> bool {
    static TRANSIENT: OnceLock<Regex> = OnceLock::new();
    static PERMANENT: OnceLock<Regex> = OnceLock::new();

    let transient = TRANSIENT.get_or_init(|| {
        Regex::new(r"(?i)network|timeout|ECONNREFUSED|ETIMEDOUT|rate limit|temporarily unavailable|\b5\d\d\b|\b429\b")
            .expect("transient pattern")
    });
    let permanent = PERMANENT.get_or_init(|| {
        Regex::new(r"(?i)validation|not found|unauthorized|forbidden|invalid")
            .expect("permanent pattern")
    });

    if transient.is_match(text) {
        true
    } else {
        !permanent.is_match(text)
    }
}
