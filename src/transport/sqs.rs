//! Amazon SQS transport.
//!
//! Works against AWS itself or any SQS-compatible server reachable through an
//! endpoint override.

use std::{collections::HashMap, future::Future, pin::Pin};

use aws_config::BehaviorVersion;
use aws_sdk_sqs::{primitives::Blob, types::MessageAttributeValue};

use crate::{
    error::Error,
    ingress,
    message::{AttributeValue, Message, MessageAttribute},
};

use super::Transport;

/// SQS implementation of the [`Transport`] trait.
#[derive(Clone)]
pub struct SqsTransport {
    client: aws_sdk_sqs::Client,
}

impl SqsTransport {
    /// Creates a transport around an already configured client.
    pub fn new(client: aws_sdk_sqs::Client) -> Self {
        Self { client }
    }

    /// Loads AWS configuration from the environment, optionally pointing the
    /// client at a different endpoint.
    pub async fn from_env(endpoint_url: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(url) = endpoint_url {
            loader = loader.endpoint_url(url);
        }
        let config = loader.load().await;

        Self::new(aws_sdk_sqs::Client::new(&config))
    }
}

fn to_sqs_attributes(
    attributes: &HashMap<String, MessageAttribute>,
) -> eyre::Result<HashMap<String, MessageAttributeValue>> {
    attributes
        .iter()
        .map(|(name, attr)| {
            let builder = MessageAttributeValue::builder().data_type(attr.data_type());
            let builder = match attr.value() {
                AttributeValue::Text(s) => builder.string_value(s),
                AttributeValue::Binary(b) => builder.binary_value(Blob::new(b.to_vec())),
            };
            Ok((name.clone(), builder.build()?))
        })
        .collect()
}

/// `DelaySeconds` for a send. No delay leaves the parameter out, so the
/// target queue's own default delay still applies.
fn send_delay(delay_seconds: i64) -> eyre::Result<Option<i32>> {
    if delay_seconds <= 0 {
        return Ok(None);
    }
    let delay = i32::try_from(delay_seconds)
        .map_err(|e| eyre::eyre!("delay {delay_seconds} out of range: {e}"))?;
    Ok(Some(delay))
}

impl Transport for SqsTransport {
    fn receive<'a>(
        &'a self,
        queue_url: &'a str,
        max_messages: i32,
        wait_time_seconds: i32,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Result<Message, Error>>, Error>> + Send + 'a>>
    {
        Box::pin(async move {
            let output = self
                .client
                .receive_message()
                .queue_url(queue_url)
                .max_number_of_messages(max_messages)
                .wait_time_seconds(wait_time_seconds)
                .message_attribute_names("All")
                .send()
                .await
                .map_err(|e| Error::receive(queue_url, e))?;

            Ok(output
                .messages
                .unwrap_or_default()
                .into_iter()
                .map(ingress::sqs::from_sqs)
                .collect())
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
            let attributes =
                to_sqs_attributes(attributes).map_err(|e| Error::send(queue_url, e))?;

            let delay_seconds =
                send_delay(delay_seconds).map_err(|e| Error::send(queue_url, e))?;

            let output = self
                .client
                .send_message()
                .queue_url(queue_url)
                .message_body(body)
                .set_message_attributes(Some(attributes))
                .set_delay_seconds(delay_seconds)
                .send()
                .await
                .map_err(|e| Error::send(queue_url, e))?;

            output
                .message_id
                .ok_or_else(|| Error::send(queue_url, eyre::eyre!("No message id in response")))
        })
    }

    fn delete<'a>(
        &'a self,
        queue_url: &'a str,
        receipt_handle: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), Error>> + Send + 'a>> {
        Box::pin(async move {
            self.client
                .delete_message()
                .queue_url(queue_url)
                .receipt_handle(receipt_handle)
                .send()
                .await
                .map_err(|e| Error::delete(queue_url, e))?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_delay() {
        let cases = vec![
            (0, Some(None)),
            (-5, Some(None)),
            (1, Some(Some(1))),
            (900, Some(Some(900))),
            (i64::from(i32::MAX) + 1, None),
        ];

        for (input, expected) in cases {
            assert_eq!(send_delay(input).ok(), expected, "delay {input}");
        }
    }

    #[test]
    fn test_to_sqs_attributes() {
        let attributes = HashMap::from([
            ("At".to_owned(), MessageAttribute::number("1613142260")),
            (
                "Custom".to_owned(),
                MessageAttribute::new("String.label", AttributeValue::Text("x".into())),
            ),
            ("Raw".to_owned(), MessageAttribute::binary(vec![9u8, 8])),
        ]);

        let converted = to_sqs_attributes(&attributes).unwrap();

        assert_eq!(converted.len(), 3);

        let at = &converted["At"];
        assert_eq!(at.data_type(), "Number");
        assert_eq!(at.string_value(), Some("1613142260"));

        let custom = &converted["Custom"];
        assert_eq!(custom.data_type(), "String.label");
        assert_eq!(custom.string_value(), Some("x"));

        let raw = &converted["Raw"];
        assert_eq!(raw.data_type(), "Binary");
        assert_eq!(raw.binary_value().map(|b| b.as_ref()), Some(&[9u8, 8][..]));
        assert_eq!(raw.string_value(), None);
    }
}
