//! Conversion of transport envelopes into [`Message`](crate::message::Message)s.
//!
//! Messages reach the router either from a `ReceiveMessage` call
//! ([`sqs`]) or inside a pushed event batch ([`event`]). Both paths end in
//! [`scalar_attribute`], so the router never sees a list-valued attribute:
//! SQS rejects those on `SendMessage`, which would make the message
//! impossible to requeue.

use bytes::Bytes;

use crate::{
    error::Error,
    message::{AttributeValue, MessageAttribute},
};

pub mod event;
pub mod sqs;

/// Attribute as it appears on the wire, before normalization.
pub(crate) struct RawAttribute {
    pub data_type: String,
    pub string_value: Option<String>,
    pub binary_value: Option<Bytes>,
    pub string_list_len: usize,
    pub binary_list_len: usize,
}

/// Reduces a wire attribute to its scalar value.
///
/// Non-empty list values are purged with a warning. An attribute left with
/// no value at all is dropped (`Ok(None)`) if it only carried lists, and is a
/// decode error otherwise.
pub(crate) fn scalar_attribute(
    name: &str,
    raw: RawAttribute,
) -> Result<Option<MessageAttribute>, Error> {
    if raw.string_list_len > 0 {
        tracing::warn!(
            attribute = name,
            "purging StringListValues from message attribute, list values are not supported by SendMessage"
        );
    }
    if raw.binary_list_len > 0 {
        tracing::warn!(
            attribute = name,
            "purging BinaryListValues from message attribute, list values are not supported by SendMessage"
        );
    }

    let value = match (raw.string_value, raw.binary_value) {
        (Some(s), _) => AttributeValue::Text(s),
        (None, Some(b)) => AttributeValue::Binary(b),
        (None, None) if raw.string_list_len > 0 || raw.binary_list_len > 0 => {
            return Ok(None);
        }
        (None, None) => {
            return Err(Error::decode(format!(
                "message attribute {name} has no value"
            )))
        }
    };

    Ok(Some(MessageAttribute::new(raw.data_type, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(data_type: &str) -> RawAttribute {
        RawAttribute {
            data_type: data_type.to_owned(),
            string_value: None,
            binary_value: None,
            string_list_len: 0,
            binary_list_len: 0,
        }
    }

    #[test]
    fn test_scalar_attribute_keeps_scalars() {
        let attr = scalar_attribute(
            "a",
            RawAttribute {
                string_value: Some("x".into()),
                ..raw("String")
            },
        )
        .unwrap();
        assert_eq!(attr, Some(MessageAttribute::string("x")));

        let attr = scalar_attribute(
            "b",
            RawAttribute {
                binary_value: Some(Bytes::from_static(b"\x00\x01")),
                ..raw("Binary.raw")
            },
        )
        .unwrap();
        assert_eq!(
            attr,
            Some(MessageAttribute::new(
                "Binary.raw",
                AttributeValue::Binary(Bytes::from_static(b"\x00\x01"))
            ))
        );
    }

    #[test]
    fn test_scalar_attribute_drops_list_only() {
        let attr = scalar_attribute(
            "tags",
            RawAttribute {
                string_list_len: 2,
                ..raw("String")
            },
        )
        .unwrap();
        assert_eq!(attr, None);

        let attr = scalar_attribute(
            "blobs",
            RawAttribute {
                binary_list_len: 1,
                ..raw("Binary")
            },
        )
        .unwrap();
        assert_eq!(attr, None);
    }

    #[test]
    fn test_scalar_attribute_purges_lists_beside_scalar() {
        let attr = scalar_attribute(
            "mixed",
            RawAttribute {
                string_value: Some("kept".into()),
                string_list_len: 3,
                ..raw("String")
            },
        )
        .unwrap();
        assert_eq!(attr, Some(MessageAttribute::string("kept")));
    }

    #[test]
    fn test_scalar_attribute_without_value() {
        match scalar_attribute("empty", raw("String")) {
            Err(Error::Decode { .. }) => {}
            other => panic!("expected Decode error, got {other:?}"),
        }
    }
}
