//! Bulk delivery of rendered messages with bounded parallelism and
//! per-recipient failure isolation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::domain::{MemberId, Recipient};
use crate::email_client::EmailClient;
use crate::template::RenderedMessage;

/// Cooperative stop signal shared between the dispatcher and the process
/// shutdown path. Cancelling stops new sends from being issued; in-flight
/// sends run to completion so partial counts survive.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    pub recipient: MemberId,
    pub delivered: bool,
    pub error: Option<String>,
}

/// Aggregate result of one dispatch call. `success` is deliberately lenient:
/// at least one message delivered, not all.
#[derive(Debug, Default)]
pub struct DeliveryResult {
    pub sent: usize,
    pub failed: usize,
    pub outcomes: Vec<DeliveryOutcome>,
}

impl DeliveryResult {
    pub fn success(&self) -> bool {
        self.sent > 0
    }

    fn record(&mut self, outcome: DeliveryOutcome) {
        if outcome.delivered {
            self.sent += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(outcome);
    }
}

#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("email provider is unavailable: {0}")]
    ProviderUnavailable(String),
}

#[derive(Clone)]
pub struct Dispatcher {
    email_client: EmailClient,
    max_in_flight: usize,
}

impl Dispatcher {
    pub fn new(email_client: EmailClient, max_in_flight: usize) -> Self {
        Self {
            email_client,
            max_in_flight: max_in_flight.max(1),
        }
    }

    /// Attempts every message independently: one recipient's failure never
    /// aborts the rest. In test mode only the first message (the resolver's
    /// deterministic ordering) is attempted.
    ///
    /// Permits are acquired before spawning, so issuance itself is
    /// backpressured against the provider.
    #[tracing::instrument(
        name = "Dispatch campaign batch",
        skip(self, messages, cancel),
        fields(recipients = messages.len(), test_mode)
    )]
    pub async fn dispatch(
        &self,
        messages: Vec<(Recipient, RenderedMessage)>,
        test_mode: bool,
        cancel: &CancelHandle,
    ) -> Result<DeliveryResult, DispatchError> {
        self.email_client
            .ensure_configured()
            .map_err(DispatchError::ProviderUnavailable)?;

        let batch: Vec<(Recipient, RenderedMessage)> = if test_mode {
            messages.into_iter().take(1).collect()
        } else {
            messages
        };

        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks: JoinSet<DeliveryOutcome> = JoinSet::new();
        let mut result = DeliveryResult::default();

        let mut pending = batch.into_iter();
        while let Some((recipient, message)) = pending.next() {
            if cancel.is_cancelled() {
                tracing::info!("Dispatch cancelled, no further sends will be issued");
                result.record(skipped(recipient.id));
                for (remaining, _) in pending.by_ref() {
                    result.record(skipped(remaining.id));
                }
                break;
            }

            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("delivery semaphore closed");
            let email_client = self.email_client.clone();

            tasks.spawn(async move {
                let _permit = permit;
                let recipient_id = recipient.id;
                match email_client
                    .send_email(&recipient.email, &message.subject, &message.body)
                    .await
                {
                    Ok(()) => DeliveryOutcome {
                        recipient: recipient_id,
                        delivered: true,
                        error: None,
                    },
                    Err(err) => {
                        tracing::warn!(
                            error.message = %err,
                            recipient_id = %recipient_id,
                            "Failed to deliver campaign email"
                        );
                        DeliveryOutcome {
                            recipient: recipient_id,
                            delivered: false,
                            error: Some(err.to_string()),
                        }
                    }
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => result.record(outcome),
                Err(err) => {
                    tracing::error!(error.message = %err, "A delivery task failed to complete");
                }
            }
        }

        tracing::info!(
            sent = result.sent,
            failed = result.failed,
            "Dispatch finished"
        );
        Ok(result)
    }
}

fn skipped(recipient: MemberId) -> DeliveryOutcome {
    DeliveryOutcome {
        recipient,
        delivered: false,
        error: Some("delivery cancelled before send".into()),
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::time::Duration;

    use secrecy::SecretString;
    use wiremock::matchers::any;
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;
    use crate::domain::{EmailAddress, TierId};
    use crate::email_client::SenderIdentity;
    use crate::template::RenderedMessage;

    fn recipient(id: i64) -> Recipient {
        Recipient {
            id: MemberId(id),
            email: EmailAddress::parse(format!("member{id}@example.com")).unwrap(),
            first_name: format!("First{id}"),
            last_name: format!("Last{id}"),
            tier_id: TierId::new("family"),
            join_date: "2023-01-01".parse().unwrap(),
            renewal_date: "2026-06-01".parse().unwrap(),
        }
    }

    fn message_for(id: i64) -> (Recipient, RenderedMessage) {
        (
            recipient(id),
            RenderedMessage {
                subject: format!("Hello {id}"),
                body: format!("<p>Body {id}</p>"),
            },
        )
    }

    fn dispatcher(base_url: String, max_in_flight: usize) -> Dispatcher {
        let email_client = EmailClient::new(
            base_url,
            SenderIdentity {
                email: EmailAddress::parse("noreply@example.com".into()).unwrap(),
                name: "Membership Desk".into(),
            },
            SecretString::from("test-token"),
            Duration::from_millis(500),
        );
        Dispatcher::new(email_client, max_in_flight)
    }

    /// Matches send requests addressed to any of the given member emails.
    struct ToAnyOf(HashSet<String>);

    impl wiremock::Match for ToAnyOf {
        fn matches(&self, request: &Request) -> bool {
            let body: serde_json::Value = match serde_json::from_slice(&request.body) {
                Ok(body) => body,
                Err(_) => return false,
            };
            body["to"][0]["email"]
                .as_str()
                .is_some_and(|email| self.0.contains(email))
        }
    }

    #[tokio::test]
    async fn every_message_is_attempted_and_counted() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(10)
            .mount(&mock_server)
            .await;

        let messages = (1..=10).map(message_for).collect();
        let result = dispatcher(mock_server.uri(), 3)
            .dispatch(messages, false, &CancelHandle::new())
            .await
            .unwrap();

        assert_eq!(result.sent, 10);
        assert_eq!(result.failed, 0);
        assert!(result.success());
    }

    #[tokio::test]
    async fn partial_failures_are_isolated_and_aggregated() {
        let mock_server = MockServer::start().await;
        let failing: HashSet<String> = [3, 4, 5, 6]
            .iter()
            .map(|id| format!("member{id}@example.com"))
            .collect();

        Mock::given(ToAnyOf(failing))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&mock_server)
            .await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(6)
            .mount(&mock_server)
            .await;

        let messages = (1..=10).map(message_for).collect();
        let result = dispatcher(mock_server.uri(), 4)
            .dispatch(messages, false, &CancelHandle::new())
            .await
            .unwrap();

        assert_eq!(result.sent, 6);
        assert_eq!(result.failed, 4);
        assert!(result.success());
        assert_eq!(result.outcomes.len(), 10);
    }

    #[tokio::test]
    async fn test_mode_sends_only_the_first_message() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let messages = (1..=25).map(message_for).collect();
        let result = dispatcher(mock_server.uri(), 4)
            .dispatch(messages, true, &CancelHandle::new())
            .await
            .unwrap();

        assert_eq!(result.sent, 1);
        assert_eq!(result.failed, 0);
    }

    #[tokio::test]
    async fn a_cancelled_dispatch_issues_no_sends_but_keeps_counts() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let cancel = CancelHandle::new();
        cancel.cancel();

        let messages = (1..=5).map(message_for).collect();
        let result = dispatcher(mock_server.uri(), 2)
            .dispatch(messages, false, &cancel)
            .await
            .unwrap();

        assert_eq!(result.sent, 0);
        assert_eq!(result.failed, 5);
        assert_eq!(result.outcomes.len(), 5);
        assert!(!result.success());
    }

    #[tokio::test]
    async fn a_blank_provider_token_fails_fast_without_sending() {
        let mock_server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let email_client = EmailClient::new(
            mock_server.uri(),
            SenderIdentity {
                email: EmailAddress::parse("noreply@example.com".into()).unwrap(),
                name: "Membership Desk".into(),
            },
            SecretString::from(""),
            Duration::from_millis(500),
        );
        let dispatcher = Dispatcher::new(email_client, 2);

        let outcome = dispatcher
            .dispatch(vec![message_for(1)], false, &CancelHandle::new())
            .await;

        assert!(matches!(outcome, Err(DispatchError::ProviderUnavailable(_))));
    }
}
