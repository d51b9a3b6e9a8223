//! SQS event batches, as pushed to a serverless function.
//!
//! The envelope uses camelCase keys and base64 for binary values, unlike the
//! PascalCase, raw-bytes shape returned by `ReceiveMessage`.

use std::collections::HashMap;

use base64::{prelude::BASE64_STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};

use crate::{error::Error, message::Message};

use super::{scalar_attribute, RawAttribute};

/// A batch of records delivered in one invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SqsEvent {
    #[serde(rename = "Records")]
    pub records: Vec<SqsEventRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsEventRecord {
    pub message_id: String,
    pub receipt_handle: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub body: String,
    #[serde(default)]
    pub md5_of_body: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message_attributes: HashMap<String, SqsEventAttribute>,
    #[serde(default)]
    pub event_source: Option<String>,
    #[serde(default, rename = "eventSourceARN")]
    pub event_source_arn: Option<String>,
    #[serde(default)]
    pub aws_region: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqsEventAttribute {
    pub data_type: String,
    #[serde(default)]
    pub string_value: Option<String>,
    /// Base64 encoded
    #[serde(default)]
    pub binary_value: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub string_list_values: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub binary_list_values: Vec<String>,
}

/// Event producers write `null` for empty lists and maps as often as they
/// leave the key out.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decodes a JSON encoded event batch.
pub fn decode_event(payload: &[u8]) -> Result<SqsEvent, Error> {
    Ok(serde_json::from_slice(payload)?)
}

/// Converts one record of an event batch.
pub fn from_record(record: SqsEventRecord) -> Result<Message, Error> {
    if record.message_id.is_empty() {
        return Err(Error::decode("event record has no messageId"));
    }
    if record.receipt_handle.is_empty() {
        return Err(Error::decode(format!(
            "event record {} has no receiptHandle",
            record.message_id
        )));
    }

    let mut attributes = HashMap::new();
    for (name, attr) in record.message_attributes {
        let binary_value = attr
            .binary_value
            .map(|b| BASE64_STANDARD.decode(b).map(Bytes::from))
            .transpose()?;

        let raw = RawAttribute {
            data_type: attr.data_type,
            string_value: attr.string_value,
            binary_value,
            string_list_len: attr.string_list_values.len(),
            binary_list_len: attr.binary_list_values.len(),
        };
        if let Some(attr) = scalar_attribute(&name, raw)? {
            attributes.insert(name, attr);
        }
    }

    Ok(Message {
        id: record.message_id,
        receipt_handle: record.receipt_handle,
        body: record.body,
        attributes,
    })
}
