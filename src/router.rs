//! The routing loop.
//!
//! A [`Router`] takes one message from the incoming queue, decides whether its
//! release time has passed, sends it on (outgoing) or back (incoming), and
//! only then deletes the delivery it came from. If the send fails the
//! delivery is left alone so the queue redelivers it after its visibility
//! timeout.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    config::RouterConfig,
    error::Error,
    ingress::{self, event::SqsEvent},
    message::{Message, AT_TIMESTAMP},
    schedule::{self, Decision},
    transport::Transport,
};

/// Pause after a failed receive before trying again.
const RECEIVE_BACKOFF: Duration = Duration::from_secs(1);

/// Result of routing one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routed {
    /// Id of the message's first enqueue
    pub original_id: String,
    pub decision: Decision,
    /// Id the transport assigned to the copy that was sent
    pub message_id: String,
}

pub struct Router<T> {
    transport: T,
    config: RouterConfig,
    max_messages: i32,
    wait_time_seconds: i32,
}

#[bon::bon]
impl<T: Transport> Router<T> {
    #[builder]
    pub fn new(
        transport: T,
        config: RouterConfig,
        #[builder(default = 1)] max_messages: i32,
        #[builder(default = 20)] wait_time_seconds: i32,
    ) -> Self {
        Self {
            transport,
            config,
            max_messages,
            wait_time_seconds,
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Routes one message using the current system time.
    pub async fn route(&self, msg: Message) -> Result<Routed, Error> {
        self.route_at(msg, chrono::Utc::now().timestamp()).await
    }

    /// Routes one message as if the current time were `now` (Unix seconds).
    ///
    /// A missing or malformed release time makes the message eligible
    /// immediately: it is forwarded rather than dropped or held back.
    #[tracing::instrument(skip_all, fields(message_id = %msg.id))]
    pub async fn route_at(&self, mut msg: Message, now: i64) -> Result<Routed, Error> {
        tracing::debug!(?msg, "received message");

        let release = match schedule::release_time(&msg) {
            Ok(Some(release)) => release,
            Ok(None) => {
                tracing::warn!("no {AT_TIMESTAMP} attribute, releasing now");
                now
            }
            Err(e) => {
                tracing::warn!(error = %e, "releasing now");
                now
            }
        };
        tracing::debug!(release, "extracted release time");

        let original_id = msg.establish_original_id();
        tracing::info!(original_id = %original_id, "handling message");

        let decision = schedule::decide(release, now);
        let (queue_url, delay_seconds) = match decision {
            Decision::Forward => {
                tracing::info!(original_id = %original_id, "moving to outgoing");
                (&self.config.outgoing_queue_url, 0)
            }
            Decision::Requeue { delay_seconds } => {
                tracing::info!(original_id = %original_id, delay_seconds, "requeueing to incoming");
                (&self.config.incoming_queue_url, delay_seconds)
            }
        };

        let message_id = self
            .transport
            .send(queue_url, &msg.body, &msg.attributes, delay_seconds)
            .await?;

        tracing::info!(original_id = %original_id, "deleting from incoming");
        self.transport
            .delete(&self.config.incoming_queue_url, &msg.receipt_handle)
            .await?;

        Ok(Routed {
            original_id,
            decision,
            message_id,
        })
    }

    /// Drains the incoming queue until `cancel` fires.
    ///
    /// Messages of one receive are routed concurrently; a failure is logged
    /// and leaves that message for redelivery without affecting the others.
    /// Cancellation interrupts a pending receive but never a route in
    /// progress.
    pub async fn poll(&self, cancel: CancellationToken) {
        let queue_url = &self.config.incoming_queue_url;
        tracing::info!(queue_url = %queue_url, "polling incoming queue");

        while !cancel.is_cancelled() {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = self.transport.receive(queue_url, self.max_messages, self.wait_time_seconds) => received,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(e) => {
                    tracing::warn!(error = ?e, "receive failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(RECEIVE_BACKOFF) => continue,
                    }
                }
            };

            let routes = messages.into_iter().map(|msg| async move {
                let result = match msg {
                    Ok(msg) => self.route(msg).await.map(|_| ()),
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    tracing::error!(error = ?e, "failed to handle message");
                }
            });
            futures_util::future::join_all(routes).await;
        }

        tracing::info!(queue_url = %queue_url, "stopped polling");
    }

    /// Routes every record of a pushed batch, in order.
    ///
    /// The first failure stops the batch and is returned, so the caller can
    /// have the whole batch redelivered.
    pub async fn handle_event(&self, event: SqsEvent) -> Result<Vec<Routed>, Error> {
        let mut routed = Vec::with_capacity(event.records.len());
        for record in event.records {
            let result = match ingress::event::from_record(record) {
                Ok(msg) => self.route(msg).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(r) => routed.push(r),
                Err(e) => {
                    tracing::error!(error = ?e, "failed to handle event record");
                    return Err(e);
                }
            }
        }
        Ok(routed)
    }

    /// Decodes a JSON event batch and routes it with [`Router::handle_event`].
    pub async fn handle_event_json(&self, payload: &[u8]) -> Result<Vec<Routed>, Error> {
        let event = ingress::event::decode_event(payload).inspect_err(|e| {
            tracing::error!(error = ?e, "failed to decode event");
        })?;
        self.handle_event(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        message::{MessageAttribute, ORIGINAL_MESSAGE_ID},
        transport::memory::InMemoryTransport,
    };

    const INCOMING: &str = "https://sqs.example/incoming";
    const OUTGOING: &str = "https://sqs.example/outgoing";

    fn router() -> Router<InMemoryTransport> {
        Router::builder()
            .transport(InMemoryTransport::new())
            .config(RouterConfig {
                incoming_queue_url: INCOMING.into(),
                outgoing_queue_url: OUTGOING.into(),
            })
            .build()
    }

    async fn receive_one(router: &Router<InMemoryTransport>) -> Message {
        router
            .transport()
            .receive(INCOMING, 1, 0)
            .await
            .unwrap()
            .pop()
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_route_forward_past_timestamp() {
        let router = router();
        let id = router.transport().enqueue(
            INCOMING,
            "hello",
            [(AT_TIMESTAMP.to_owned(), MessageAttribute::number("1613142260"))].into(),
        );
        let msg = receive_one(&router).await;
        let receipt = msg.receipt_handle.clone();

        let routed = router.route_at(msg, 1613142260 + 10).await.unwrap();

        assert_eq!(routed.decision, Decision::Forward);
        assert_eq!(routed.original_id, id);

        let sent = router.transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].queue_url, OUTGOING);
        assert_eq!(sent[0].delay_seconds, 0);
        assert_eq!(sent[0].body, "hello");
        assert_eq!(
            sent[0].attributes.get(ORIGINAL_MESSAGE_ID),
            Some(&MessageAttribute::string(id))
        );

        let deleted = router.transport().deleted();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].queue_url, INCOMING);
        assert_eq!(deleted[0].receipt_handle, receipt);
    }

    #[tokio::test]
    async fn test_route_requeue_clamped() {
        let router = router();
        router.transport().enqueue(
            INCOMING,
            "later",
            [(
                AT_TIMESTAMP.to_owned(),
                MessageAttribute::string("2021-02-13T01:21:55+09:00"),
            )]
            .into(),
        );
        let msg = receive_one(&router).await;

        let routed = router.route_at(msg, 1613146915 - 2000).await.unwrap();

        assert_eq!(
            routed.decision,
            Decision::Requeue { delay_seconds: 900 }
        );
        let sent = router.transport().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].queue_url, INCOMING);
        assert_eq!(sent[0].delay_seconds, 900);
        assert_eq!(router.transport().deleted().len(), 1);
    }
}
