//! Message and attribute types shared by every stage of the router.
//!
//! A [`Message`] is the normalized form of one delivery from the incoming
//! queue, independent of whether it arrived through polling or a pushed
//! event batch. Attributes keep their SQS data type so that they can be sent
//! again exactly as they were received.
//!
//! # Identity across hops
//!
//! Every time a message is requeued the transport assigns it a new id and a
//! new receipt handle. The id of the first enqueue is carried forward in the
//! [`ORIGINAL_MESSAGE_ID`] attribute, which is written once and never
//! replaced.

use std::{collections::HashMap, str::FromStr};

use bytes::Bytes;
use strum::{Display, EnumString};

/// Attribute holding the earliest time the message may be forwarded.
pub const AT_TIMESTAMP: &str = "AtTimestamp";

/// Attribute holding the id of the message's first enqueue.
pub const ORIGINAL_MESSAGE_ID: &str = "OriginalMessageID";

/// Base SQS attribute data type, without any custom label.
///
/// SQS allows custom labels after a dot (`Number.int`, `Binary.png`); only
/// the part before the dot decides how the value is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
pub enum DataType {
    String,
    Number,
    Binary,
}

impl DataType {
    /// Parses the base type of a full SQS data type string.
    pub fn of(data_type: &str) -> Option<Self> {
        let base = data_type.split_once('.').map_or(data_type, |(base, _)| base);
        Self::from_str(base).ok()
    }
}

/// Scalar value of a message attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    /// Value of a `String` or `Number` attribute.
    Text(String),
    /// Value of a `Binary` attribute.
    Binary(Bytes),
}

/// A single message attribute: its full SQS data type and scalar value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAttribute {
    data_type: String,
    value: AttributeValue,
}

impl MessageAttribute {
    pub fn new(data_type: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            data_type: data_type.into(),
            value,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new("String", AttributeValue::Text(value.into()))
    }

    pub fn number(value: impl Into<String>) -> Self {
        Self::new("Number", AttributeValue::Text(value.into()))
    }

    pub fn binary(value: impl Into<Bytes>) -> Self {
        Self::new("Binary", AttributeValue::Binary(value.into()))
    }

    /// Full data type, including any custom label.
    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    /// Base data type, or `None` for a type SQS does not define.
    pub fn kind(&self) -> Option<DataType> {
        DataType::of(&self.data_type)
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    /// Text value of a `String` or `Number` attribute.
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            AttributeValue::Text(s) => Some(s),
            AttributeValue::Binary(_) => None,
        }
    }
}

/// One delivery of a message from the incoming queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Transport id of this hop
    pub id: String,
    /// Handle used to delete this delivery
    pub receipt_handle: String,
    /// Payload, passed through untouched
    pub body: String,
    /// Scalar attributes, propagated on every hop
    pub attributes: HashMap<String, MessageAttribute>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        receipt_handle: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            receipt_handle: receipt_handle.into(),
            body: body.into(),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, attr: MessageAttribute) -> Self {
        self.attributes.insert(name.into(), attr);
        self
    }

    /// Id of the message's first enqueue, if it has already been recorded.
    pub fn original_id(&self) -> Option<&str> {
        self.attributes
            .get(ORIGINAL_MESSAGE_ID)
            .and_then(MessageAttribute::as_text)
    }

    /// Records the current id as the original id unless one is already
    /// present, and returns the original id either way.
    pub fn establish_original_id(&mut self) -> String {
        if let Some(attr) = self.attributes.get(ORIGINAL_MESSAGE_ID) {
            let original = match attr.value() {
                AttributeValue::Text(s) => s.clone(),
                AttributeValue::Binary(b) => String::from_utf8_lossy(b).into_owned(),
            };
            tracing::debug!(original_id = %original, "keeping original message id");
            return original;
        }

        tracing::debug!(message_id = %self.id, "setting original message id");
        self.attributes.insert(
            ORIGINAL_MESSAGE_ID.to_owned(),
            MessageAttribute::string(self.id.clone()),
        );
        self.id.clone()
    }
}
