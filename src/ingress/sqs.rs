use std::collections::HashMap;

use bytes::Bytes;

use crate::{error::Error, message::Message};

use super::{scalar_attribute, RawAttribute};

/// Converts a message returned by `ReceiveMessage`.
pub fn from_sqs(msg: aws_sdk_sqs::types::Message) -> Result<Message, Error> {
    let id = msg
        .message_id
        .ok_or_else(|| Error::decode("message has no MessageId"))?;
    let receipt_handle = msg
        .receipt_handle
        .ok_or_else(|| Error::decode(format!("message {id} has no ReceiptHandle")))?;

    let mut attributes = HashMap::new();
    for (name, attr) in msg.message_attributes.unwrap_or_default() {
        let raw = RawAttribute {
            data_type: attr.data_type,
            string_value: attr.string_value,
            binary_value: attr.binary_value.map(|b| Bytes::from(b.into_inner())),
            string_list_len: attr.string_list_values.map_or(0, |v| v.len()),
            binary_list_len: attr.binary_list_values.map_or(0, |v| v.len()),
        };
        if let Some(attr) = scalar_attribute(&name, raw)? {
            attributes.insert(name, attr);
        }
    }

    Ok(Message {
        id,
        receipt_handle,
        body: msg.body.unwrap_or_default(),
        attributes,
    })
}

#[cfg(test)]
mod tests {
    use aws_sdk_sqs::{primitives::Blob, types::MessageAttributeValue};

    use super::*;
    use crate::message::{MessageAttribute, AT_TIMESTAMP};

    fn attr(data_type: &str) -> aws_sdk_sqs::types::builders::MessageAttributeValueBuilder {
        MessageAttributeValue::builder().data_type(data_type)
    }

    #[test]
    fn test_from_sqs() {
        let msg = aws_sdk_sqs::types::Message::builder()
            .message_id("m-1")
            .receipt_handle("r-1")
            .body("payload")
            .message_attributes(
                AT_TIMESTAMP,
                attr("Number").string_value("1613142260").build().unwrap(),
            )
            .message_attributes(
                "Raw",
                attr("Binary").binary_value(Blob::new(vec![1, 2, 3])).build().unwrap(),
            )
            .message_attributes(
                "Tags",
                attr("String")
                    .string_list_values("a")
                    .string_list_values("b")
                    .build()
                    .unwrap(),
            )
            .build();

        let msg = from_sqs(msg).unwrap();

        assert_eq!(msg.id, "m-1");
        assert_eq!(msg.receipt_handle, "r-1");
        assert_eq!(msg.body, "payload");
        assert_eq!(msg.attributes.len(), 2);
        assert_eq!(
            msg.attributes.get(AT_TIMESTAMP),
            Some(&MessageAttribute::number("1613142260"))
        );
        assert_eq!(
            msg.attributes.get("Raw"),
            Some(&MessageAttribute::binary(vec![1u8, 2, 3]))
        );
        assert!(!msg.attributes.contains_key("Tags"));
    }

    #[test]
    fn test_from_sqs_missing_receipt_handle() {
        let msg = aws_sdk_sqs::types::Message::builder()
            .message_id("m-1")
            .body("payload")
            .build();

        match from_sqs(msg) {
            Err(Error::Decode { .. }) => {}
            other => panic!("expected Decode error, got {other:?}"),
        }
    }
}
