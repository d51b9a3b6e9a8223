//! In-memory implementation of the queue transport.
//!
//! Keeps every queue in process and records each send and delete so that
//! callers can inspect exactly what the router did. Delays are recorded but
//! not enforced: a requeued message is immediately receivable again, and an
//! empty receive returns after a short pause rather than the full wait time.
//! Primarily used for testing and development environments.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use rand::Rng;

use crate::{
    error::Error,
    message::{Message, MessageAttribute},
};

use super::Transport;

/// How long a receive on an empty queue waits before answering, standing in
/// for long polling.
const EMPTY_RECEIVE_PAUSE: Duration = Duration::from_millis(10);

/// A send observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub queue_url: String,
    pub message_id: String,
    pub body: String,
    pub attributes: HashMap<String, MessageAttribute>,
    pub delay_seconds: i64,
}

/// A delete observed by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedMessage {
    pub queue_url: String,
    pub receipt_handle: String,
}

#[derive(Default)]
struct State {
    queues: HashMap<String, VecDeque<SentMessage>>,
    /// Receipt handle -> queue URL, for deliveries not yet deleted
    in_flight: HashMap<String, String>,
    sent: Vec<SentMessage>,
    deleted: Vec<DeletedMessage>,
    failing_sends: HashSet<String>,
    failing_deletes: HashSet<String>,
    /// Queue URL -> envelopes that fail to decode on their next receive
    malformed: HashMap<String, usize>,
}

/// Thread-safe in-memory transport.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    state: Arc<Mutex<State>>,
}

/// Generates a random token of size N bytes, encoded in base58.
fn generate_token<const N: usize>(mut rng: impl Rng) -> String {
    let mut token = [0u8; N];
    rng.fill(&mut token[..]);
    bs58::encode(token).into_string()
}

impl InMemoryTransport {
    /// Creates a transport with no queues.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // Every update is a single push or remove, so poisoned state is still whole.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Enqueues a message directly, as an external producer would, and
    /// returns its id.
    pub fn enqueue(
        &self,
        queue_url: &str,
        body: &str,
        attributes: HashMap<String, MessageAttribute>,
    ) -> String {
        let message_id = generate_token::<16>(rand::thread_rng());
        self.state()
            .queues
            .entry(queue_url.to_owned())
            .or_default()
            .push_back(SentMessage {
                queue_url: queue_url.to_owned(),
                message_id: message_id.clone(),
                body: body.to_owned(),
                attributes,
                delay_seconds: 0,
            });
        message_id
    }

    /// Enqueues an envelope that the next receive reports as undecodable.
    /// It takes a slot in the batch like any other delivery and is then gone.
    pub fn enqueue_malformed(&self, queue_url: &str) {
        *self
            .state()
            .malformed
            .entry(queue_url.to_owned())
            .or_default() += 1;
    }

    /// Every send made through [`Transport::send`], in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state().sent.clone()
    }

    /// Sends made to one queue, in order.
    pub fn sent_to(&self, queue_url: &str) -> Vec<SentMessage> {
        self.state()
            .sent
            .iter()
            .filter(|m| m.queue_url == queue_url)
            .cloned()
            .collect()
    }

    /// Every successful delete, in order.
    pub fn deleted(&self) -> Vec<DeletedMessage> {
        self.state().deleted.clone()
    }

    /// Number of messages waiting in a queue, malformed envelopes included.
    pub fn pending(&self, queue_url: &str) -> usize {
        let state = self.state();
        state.queues.get(queue_url).map_or(0, VecDeque::len)
            + state.malformed.get(queue_url).copied().unwrap_or(0)
    }

    /// Number of received deliveries not yet deleted.
    pub fn in_flight(&self) -> usize {
        self.state().in_flight.len()
    }

    /// Makes every later send to `queue_url` fail, or succeed again.
    pub fn fail_sends_to(&self, queue_url: &str, fail: bool) {
        let mut state = self.state();
        if fail {
            state.failing_sends.insert(queue_url.to_owned());
        } else {
            state.failing_sends.remove(queue_url);
        }
    }

    /// Makes every later delete from `queue_url` fail, or succeed again.
    pub fn fail_deletes_from(&self, queue_url: &str, fail: bool) {
        let mut state = self.state();
        if fail {
            state.failing_deletes.insert(queue_url.to_owned());
        } else {
            state.failing_deletes.remove(queue_url);
        }
    }
}

impl Transport for InMemoryTransport {
    fn receive<'a>(
        &'a self,
        queue_url: &'a str,
        max_messages: i32,
        _wait_time_seconds: i32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Result<Message, Error>>, Error>> + Send + 'a>>
    {
        Box::pin(async move {
            tokio::task::yield_now().await;

            let received = {
                let mut rng = rand::thread_rng();
                let mut state = self.state();

                let mut received = Vec::new();
                for _ in 0..max_messages.max(1) {
                    if let Some(count) = state
                        .malformed
                        .get_mut(queue_url)
                        .filter(|count| **count > 0)
                    {
                        *count -= 1;
                        received.push(Err(Error::decode(format!(
                            "malformed envelope on {queue_url}"
                        ))));
                        continue;
                    }

                    let Some(stored) = state
                        .queues
                        .get_mut(queue_url)
                        .and_then(VecDeque::pop_front)
                    else {
                        break;
                    };

                    let receipt_handle = generate_token::<24>(&mut rng);
                    state
                        .in_flight
                        .insert(receipt_handle.clone(), queue_url.to_owned());

                    received.push(Ok(Message {
                        id: stored.message_id,
                        receipt_handle,
                        body: stored.body,
                        attributes: stored.attributes,
                    }));
                }
                received
            };

            if received.is_empty() {
                tokio::time::sleep(EMPTY_RECEIVE_PAUSE).await;
            }

            Ok(received)
        })
    }

    fn send<'a>(
        &'a self,
        queue_url: &'a str,
        body: &'a str,
        attributes: &'a HashMap<String, MessageAttribute>,
        delay_seconds: i64,
    ) -> Pin<Box<dyn Future<Output = Result<String, Error>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state();

            if state.failing_sends.contains(queue_url) {
                return Err(Error::send(queue_url, eyre::eyre!("injected send failure")));
            }

            let message_id = generate_token::<16>(rand::thread_rng());
            let sent = SentMessage {
                queue_url: queue_url.to_owned(),
                message_id: message_id.clone(),
                body: body.to_owned(),
                attributes: attributes.clone(),
                delay_seconds,
            };

            state.sent.push(sent.clone());
            state
                .queues
                .entry(queue_url.to_owned())
                .or_default()
                .push_back(sent);

            Ok(message_id)
        })
    }

    fn delete<'a>(
        &'a self,
        queue_url: &'a str,
        receipt_handle: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state();

            if state.failing_deletes.contains(queue_url) {
                return Err(Error::delete(
                    queue_url,
                    eyre::eyre!("injected delete failure"),
                ));
            }

            match state.in_flight.get(receipt_handle) {
                Some(owner) if owner == queue_url => {}
                _ => {
                    return Err(Error::delete(
                        queue_url,
                        eyre::eyre!("unknown receipt handle {receipt_handle}"),
                    ))
                }
            }

            state.in_flight.remove(receipt_handle);
            state.deleted.push(DeletedMessage {
                queue_url: queue_url.to_owned(),
                receipt_handle: receipt_handle.to_owned(),
            });

            Ok(())
        })
    }
}
