//! HTTP client for the Mercado Pago API: preference creation and
//! authoritative payment / merchant-order reads.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ProcessorConfig;
use crate::processor::error::{ProcessorError, ProcessorResult};
use crate::processor::types::{MerchantOrderResource, PaymentResource, PreferenceRequest, PreferenceResponse};

#[derive(Clone)]
struct ProcessorHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl ProcessorHttpClient {
    fn new(timeout: Duration, max_retries: u32) -> ProcessorResult<Self> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            ProcessorError::NetworkError {
                message: format!("failed to initialize HTTP client: {}", e),
            }
        })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        bearer_token: &str,
        body: Option<&JsonValue>,
    ) -> ProcessorResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self
                .client
                .request(method.clone(), url)
                .timeout(self.timeout)
                .bearer_auth(bearer_token);
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request
                .send()
                .await
                .map_err(|e| ProcessorError::NetworkError {
                    message: format!("processor request failed: {}", e),
                });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            ProcessorError::InvalidResponse {
                                message: format!("invalid processor JSON response: {}", e),
                            }
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(ProcessorError::RateLimitError {
                            message: "processor rate limit exceeded".to_string(),
                            retry_after_seconds: None,
                        });
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "processor server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(ProcessorError::ApiError {
                        message: format!("HTTP {}: {}", status, text),
                        status_code: Some(status.as_u16()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(ProcessorError::NetworkError {
            message: "processor request failed".to_string(),
        }))
    }
}

pub struct MercadoPagoClient {
    base_url: String,
    access_token: String,
    http: ProcessorHttpClient,
}

impl MercadoPagoClient {
    pub fn new(config: &ProcessorConfig) -> ProcessorResult<Self> {
        let http = ProcessorHttpClient::new(
            Duration::from_secs(config.request_timeout),
            config.max_retries,
        )?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
            http,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a hosted-checkout preference for an order.
    pub async fn create_preference(
        &self,
        request: &PreferenceRequest,
    ) -> ProcessorResult<PreferenceResponse> {
        let payload = serde_json::to_value(request).map_err(|e| ProcessorError::ValidationError {
            message: format!("failed to serialize preference request: {}", e),
        })?;

        let response: PreferenceResponse = self
            .http
            .request_json(
                reqwest::Method::POST,
                &self.endpoint("/checkout/preferences"),
                &self.access_token,
                Some(&payload),
            )
            .await?;

        info!(
            preference_id = %response.id,
            external_reference = %request.external_reference,
            "checkout preference created"
        );
        Ok(response)
    }

    /// Fetch the authoritative payment resource. Webhook payloads are hints;
    /// transition decisions read this instead.
    pub async fn get_payment(&self, payment_id: &str) -> ProcessorResult<PaymentResource> {
        if payment_id.trim().is_empty() {
            return Err(ProcessorError::ValidationError {
                message: "payment id is required".to_string(),
            });
        }

        self.http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/v1/payments/{}", payment_id.trim())),
                &self.access_token,
                None,
            )
            .await
    }

    /// Fetch a merchant order from the resource URL a notification carries.
    /// Only the numeric id is taken from the URL; the request always goes to
    /// the configured API host, never to the notification-supplied one.
    pub async fn get_merchant_order(
        &self,
        resource_url: &str,
    ) -> ProcessorResult<MerchantOrderResource> {
        let order_id = merchant_order_id(resource_url).ok_or_else(|| {
            ProcessorError::ValidationError {
                message: format!("unrecognized merchant order resource: {}", resource_url),
            }
        })?;

        self.http
            .request_json(
                reqwest::Method::GET,
                &self.endpoint(&format!("/merchant_orders/{}", order_id)),
                &self.access_token,
                None,
            )
            .await
    }
}

fn merchant_order_id(resource_url: &str) -> Option<&str> {
    let tail = resource_url
        .trim_end_matches('/')
        .rsplit('/')
        .next()?
        .trim();
    if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
        Some(tail)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_merchant_order_id_from_resource_url() {
        assert_eq!(
            merchant_order_id("https://api.mercadolibre.com/merchant_orders/4242"),
            Some("4242")
        );
        assert_eq!(
            merchant_order_id("https://api.mercadopago.com/merchant_orders/7/"),
            Some("7")
        );
    }

    #[test]
    fn rejects_non_numeric_resource_tails() {
        assert_eq!(merchant_order_id("https://evil.example/latest"), None);
        assert_eq!(merchant_order_id(""), None);
    }
}
