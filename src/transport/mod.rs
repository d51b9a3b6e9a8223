//! Queue transport abstraction.
//!
//! The router only needs three primitives from the queue service: receive a
//! batch, send one message, and delete one delivery. Keeping them behind a
//! trait lets the decision logic run against SQS in production and against
//! an in-process fake in tests.

use std::{collections::HashMap, future::Future, pin::Pin};

use crate::{
    error::Error,
    message::{Message, MessageAttribute},
};

pub mod memory;
pub mod sqs;

/// Core trait for queue transports.
///
/// Implementations own retries, timeouts and batching of the underlying
/// service. Errors are returned as [`Error::Receive`], [`Error::Send`] or
/// [`Error::Delete`].
pub trait Transport: Send + Sync + 'static {
    /// Receives up to `max_messages` messages with all of their attributes,
    /// waiting at most `wait_time_seconds` for one to arrive.
    ///
    /// An empty result is not an error. Each entry is decoded on its own, so
    /// one malformed envelope does not hide the rest of the batch.
    fn receive<'a>(
        &'a self,
        queue_url: &'a str,
        max_messages: i32,
        wait_time_seconds: i32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Result<Message, Error>>, Error>> + Send + 'a>>;

    /// Sends a message and returns the id the transport assigned to it.
    ///
    /// `delay_seconds` must already be clamped to
    /// [`MAX_DELAY_SECONDS`](crate::schedule::MAX_DELAY_SECONDS).
    fn send<'a>(
        &'a self,
        queue_url: &'a str,
        body: &'a str,
        attributes: &'a HashMap<String, MessageAttribute>,
        delay_seconds: i64,
    ) -> Pin<Box<dyn Future<Output = Result<String, Error>> + Send + 'a>>;

    /// Deletes one delivery, identified by its receipt handle.
    fn delete<'a>(
        &'a self,
        queue_url: &'a str,
        receipt_handle: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'a>>;
}
