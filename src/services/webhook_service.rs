//! Webhook dispatcher: subscription registry and signed event fan-out.
//!
//! This module handles subscription registration, event delivery, and HMAC
//! signing. Each emitted event is delivered to every matching subscription in
//! its own task; one subscriber failing or hanging never holds up another.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    crypto,
    error::{AppError, DeliveryError},
    models::webhook::{
        WebhookEvent, WebhookSubscription, WebhookSubscriptionRequest, WebhookSubscriptionResponse,
    },
    observability::{LogLevel, Observability, SpanStatus},
    storage::SubscriptionStore,
};

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";
pub const EVENT_HEADER: &str = "X-Webhook-Event";

/// Background retry policy for failed deliveries.
///
/// Retries never run inside [`WebhookDispatcher::emit`]; they are scheduled on a
/// detached task once the first attempt has failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    const MAX_DELAY: Duration = Duration::from_secs(60);

    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::ZERO,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.max_retries > 0
    }

    /// Exponential backoff: `base * 2^(attempt - 1)`, capped at one minute.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(Self::MAX_DELAY)
            .min(Self::MAX_DELAY)
    }
}

/// Settled outcome of one `emit` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub matched: usize,
    pub delivered: usize,
    pub failed: usize,
    pub retries_scheduled: usize,
}

/// How the first attempt of one delivery settled.
enum DeliveryOutcome {
    Delivered,
    Failed { retry_scheduled: bool },
}

pub struct WebhookDispatcher {
    store: Arc<dyn SubscriptionStore>,
    client: reqwest::Client,
    observability: Arc<Observability>,
    retry: RetryPolicy,
}

impl WebhookDispatcher {
    /// Build a dispatcher whose HTTP client enforces `timeout` on every delivery.
    pub fn new(
        store: Arc<dyn SubscriptionStore>,
        observability: Arc<Observability>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            store,
            client,
            observability,
            retry,
        })
    }

    /// Register a new subscription for `tenant_id`.
    ///
    /// # Process
    ///
    /// 1. Validate URL format and event list
    /// 2. Use the caller's secret or generate one (32 bytes)
    /// 3. Append to the tenant's subscriptions (duplicates are allowed)
    /// 4. Return the subscription with its secret (only shown once)
    pub async fn register(
        &self,
        tenant_id: Uuid,
        request: WebhookSubscriptionRequest,
    ) -> Result<WebhookSubscriptionResponse, AppError> {
        validate_webhook_url(&request.url)?;

        if request.events.is_empty() {
            return Err(AppError::InvalidRequest(
                "At least one event must be subscribed".to_string(),
            ));
        }

        let secret = request
            .secret
            .filter(|s| !s.is_empty())
            .unwrap_or_else(crypto::generate_secret);

        let subscription =
            WebhookSubscription::new(tenant_id, request.url, secret.clone(), request.events);
        self.store.append(subscription.clone()).await?;

        tracing::info!(
            subscription_id = %subscription.id,
            tenant_id = %tenant_id,
            "Webhook subscription registered"
        );

        Ok(WebhookSubscriptionResponse::from(subscription).with_secret(secret))
    }

    /// List active subscriptions of a tenant. Secrets are never returned.
    pub async fn list(
        &self,
        tenant_id: Uuid,
    ) -> Result<Vec<WebhookSubscriptionResponse>, AppError> {
        let subscriptions = self.store.list_by_tenant(tenant_id).await?;

        Ok(subscriptions
            .into_iter()
            .filter(|s| s.is_active)
            .map(Into::into)
            .collect())
    }

    /// Stop deliveries to a subscription (soft delete).
    pub async fn deactivate(&self, tenant_id: Uuid, subscription_id: Uuid) -> Result<(), AppError> {
        if !self.store.deactivate(tenant_id, subscription_id).await? {
            return Err(AppError::NotFound("Webhook subscription"));
        }

        Ok(())
    }

    /// Deliver `event` to every active subscription of its tenant that listens for it.
    ///
    /// Always completes once every delivery has settled. Failures are logged and
    /// counted in the report; they are never returned to the caller.
    pub async fn emit(&self, event: WebhookEvent) -> DispatchReport {
        let mut span = self
            .observability
            .start_span("webhook.emit", &[("event", event.event.as_str())]);
        let mut report = DispatchReport::default();

        let subscriptions = match self.store.list_by_tenant(event.tenant_id).await {
            Ok(subscriptions) => subscriptions,
            Err(err) => {
                self.observability.log(
                    LogLevel::Error,
                    "Failed to load webhook subscriptions",
                    json!({ "tenant_id": event.tenant_id, "error": err.to_string() }),
                );
                self.observability
                    .finish_span(span, SpanStatus::Error, Some(err.to_string()));
                return report;
            }
        };

        let payload = match event.to_payload() {
            Ok(payload) => payload,
            Err(err) => {
                let err = DeliveryError::from(err);
                self.observability
                    .finish_span(span, SpanStatus::Error, Some(err.to_string()));
                return report;
            }
        };

        let targets: Vec<WebhookSubscription> = subscriptions
            .into_iter()
            .filter(|s| s.wants(&event.event))
            .collect();
        report.matched = targets.len();

        let handles: Vec<JoinHandle<DeliveryOutcome>> = targets
            .into_iter()
            .map(|subscription| {
                let client = self.client.clone();
                let observability = self.observability.clone();
                let event_name = event.event.clone();
                let payload = payload.clone();
                let retry = self.retry;
                tokio::spawn(async move {
                    let first_attempt =
                        deliver(&client, &observability, &subscription, &event_name, payload.clone())
                            .await;

                    match first_attempt {
                        Ok(()) => DeliveryOutcome::Delivered,
                        // Starts before sibling deliveries settle.
                        Err(_) if retry.is_enabled() => {
                            schedule_retry(client, observability, retry, subscription, event_name, payload);
                            DeliveryOutcome::Failed {
                                retry_scheduled: true,
                            }
                        }
                        Err(_) => DeliveryOutcome::Failed {
                            retry_scheduled: false,
                        },
                    }
                })
            })
            .collect();

        for joined in join_all(handles).await {
            match joined {
                Ok(DeliveryOutcome::Delivered) => report.delivered += 1,
                Ok(DeliveryOutcome::Failed { retry_scheduled }) => {
                    report.failed += 1;
                    if retry_scheduled {
                        report.retries_scheduled += 1;
                    }
                }
                Err(join_err) => {
                    report.failed += 1;
                    let err = DeliveryError::Aborted(join_err.to_string());
                    tracing::error!(error = %err, "Webhook delivery task did not complete");
                }
            }
        }

        span.set_tag("matched", report.matched as f64);
        span.set_tag("delivered", report.delivered as f64);
        span.set_tag("failed", report.failed as f64);
        self.observability
            .finish_span(span, SpanStatus::Success, None);

        report
    }

    /// Fire-and-forget variant of [`Self::emit`] for domain code that must not wait.
    pub fn emit_detached(self: &Arc<Self>, event: WebhookEvent) -> JoinHandle<DispatchReport> {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move { dispatcher.emit(event).await })
    }
}

/// Redeliver in the background with exponential backoff until one attempt succeeds.
fn schedule_retry(
    client: reqwest::Client,
    observability: Arc<Observability>,
    policy: RetryPolicy,
    subscription: WebhookSubscription,
    event_name: String,
    payload: Vec<u8>,
) {
    tokio::spawn(async move {
        for attempt in 1..=policy.max_retries {
            tokio::time::sleep(policy.delay_for(attempt)).await;

            if deliver(&client, &observability, &subscription, &event_name, payload.clone())
                .await
                .is_ok()
            {
                return;
            }
        }

        observability.log(
            LogLevel::Error,
            "Webhook delivery abandoned after retries",
            json!({
                "subscription_id": subscription.id,
                "url": subscription.url,
                "event": event_name,
                "retries": policy.max_retries,
            }),
        );
    });
}

/// Send a single signed delivery and record its outcome.
///
/// # Headers Sent
///
/// - `Content-Type: application/json`
/// - `X-Webhook-Signature: sha256=<hex>`
/// - `X-Webhook-Event: <event name>`
async fn deliver(
    client: &reqwest::Client,
    observability: &Observability,
    subscription: &WebhookSubscription,
    event_name: &str,
    payload: Vec<u8>,
) -> Result<(), DeliveryError> {
    let subscription_id = subscription.id.to_string();
    let span = observability.start_span(
        "webhook.deliver",
        &[
            ("subscription_id", subscription_id.as_str()),
            ("event", event_name),
        ],
    );

    let signature = crypto::sign_payload(&subscription.secret, &payload);
    let result = send(client, &subscription.url, event_name, &signature, payload).await;

    match &result {
        Ok(()) => {
            observability.record_metric("webhook.delivery", 1.0, &[("outcome", "success")]);
            observability.finish_span(span, SpanStatus::Success, None);
        }
        Err(err) => {
            observability.record_metric("webhook.delivery", 1.0, &[("outcome", "failure")]);
            observability.log(
                LogLevel::Warn,
                "Webhook delivery failed",
                json!({
                    "subscription_id": subscription.id,
                    "url": subscription.url,
                    "event": event_name,
                    "error": err.to_string(),
                }),
            );
            observability.finish_span(span, SpanStatus::Error, Some(err.to_string()));
        }
    }

    result
}

async fn send(
    client: &reqwest::Client,
    url: &str,
    event_name: &str,
    signature: &str,
    payload: Vec<u8>,
) -> Result<(), DeliveryError> {
    let response = client
        .post(url)
        .header(CONTENT_TYPE, "application/json")
        .header(SIGNATURE_HEADER, signature)
        .header(EVENT_HEADER, event_name)
        .body(payload)
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        Ok(())
    } else {
        Err(DeliveryError::Status(status.as_u16()))
    }
}

/// Validate webhook URL format.
///
/// # Rules
///
/// - Must be valid URL
/// - Must be HTTPS (HTTP localhost allowed for development)
/// - Maximum 2048 characters
fn validate_webhook_url(url: &str) -> Result<(), AppError> {
    if url.len() > 2048 {
        return Err(AppError::InvalidWebhookUrl(
            "URL exceeds 2048 characters".to_string(),
        ));
    }

    let parsed = url::Url::parse(url)
        .map_err(|_| AppError::InvalidWebhookUrl("Invalid URL format".to_string()))?;

    match parsed.scheme() {
        "https" => Ok(()),
        "http" => {
            // Allow HTTP for localhost/127.0.0.1 (testing)
            if matches!(
                parsed.host_str(),
                Some("localhost") | Some("127.0.0.1") | Some("0.0.0.0")
            ) {
                Ok(())
            } else {
                Err(AppError::InvalidWebhookUrl(
                    "HTTP is only allowed for localhost. Use HTTPS for production.".to_string(),
                ))
            }
        }
        _ => Err(AppError::InvalidWebhookUrl(
            "URL must use HTTP or HTTPS".to_string(),
        )),
    }
}
