// ============================================================
// Layer 4 — Example Wire Format
// ============================================================
// Records are serialized tf.train.Example protobuf messages:
//
//   Example  { features: Features }
//   Features { feature: map<string, Feature> }
//   Feature  { oneof kind { BytesList, FloatList, Int64List } }
//
// Every feature we write is a FloatList. Parsing checks each
// schema field is present, is a FloatList, and has exactly the
// fixed length from the metadata.

use std::collections::BTreeMap;

use prost::Message;

use crate::domain::error::{Result, VocoderError};
use crate::domain::example::{ExampleRecord, FeatureSchema};

/// Protobuf messages matching tensorflow/core/example/{example,feature}.proto
pub mod proto {
    use std::collections::BTreeMap;

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Example {
        #[prost(message, optional, tag = "1")]
        pub features: Option<Features>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Features {
        #[prost(btree_map = "string, message", tag = "1")]
        pub feature: BTreeMap<String, Feature>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Feature {
        #[prost(oneof = "feature::Kind", tags = "1, 2, 3")]
        pub kind: Option<feature::Kind>,
    }

    pub mod feature {
        #[derive(Clone, PartialEq, prost::Oneof)]
        pub enum Kind {
            #[prost(message, tag = "1")]
            BytesList(super::BytesList),
            #[prost(message, tag = "2")]
            FloatList(super::FloatList),
            #[prost(message, tag = "3")]
            Int64List(super::Int64List),
        }
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct BytesList {
        #[prost(bytes = "vec", repeated, tag = "1")]
        pub value: Vec<Vec<u8>>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct FloatList {
        #[prost(float, repeated, tag = "1")]
        pub value: Vec<f32>,
    }

    #[derive(Clone, PartialEq, prost::Message)]
    pub struct Int64List {
        #[prost(int64, repeated, tag = "1")]
        pub value: Vec<i64>,
    }
}

use proto::feature::Kind;

/// Serialize named float sequences into one Example message.
pub fn serialize_example<'a, I, S>(data: I) -> Vec<u8>
where
    I: IntoIterator<Item = (S, &'a [f32])>,
    S: Into<String>,
{
    let feature: BTreeMap<String, proto::Feature> = data
        .into_iter()
        .map(|(name, values)| {
            let kind = Kind::FloatList(proto::FloatList { value: values.to_vec() });
            (name.into(), proto::Feature { kind: Some(kind) })
        })
        .collect();
    proto::Example { features: Some(proto::Features { feature }) }.encode_to_vec()
}

/// Serialize an ExampleRecord.
pub fn serialize_record(record: &ExampleRecord) -> Vec<u8> {
    serialize_example(
        record
            .features
            .iter()
            .map(|(name, values)| (name.clone(), values.as_slice())),
    )
}

/// Decode one Example and check it against the schema.
/// Features outside the schema are dropped.
pub fn parse_example(bytes: &[u8], schema: &FeatureSchema) -> Result<ExampleRecord> {
    let example = proto::Example::decode(bytes)
        .map_err(|e| VocoderError::Decode(format!("invalid Example protobuf: {e}")))?;
    let mut features = example.features.map(|f| f.feature).unwrap_or_default();

    let mut record = ExampleRecord::new();
    for (name, expected) in schema.fields() {
        let feature = features
            .remove(name)
            .ok_or_else(|| VocoderError::Decode(format!("feature '{name}' missing")))?;
        let values = match feature.kind {
            Some(Kind::FloatList(list)) => list.value,
            _ => {
                return Err(VocoderError::Decode(format!(
                    "feature '{name}' is not a float list"
                )))
            }
        };
        if values.len() != *expected {
            return Err(VocoderError::Decode(format!(
                "feature '{name}' has {} values, expected {expected}",
                values.len()
            )));
        }
        record.features.insert(name.clone(), values);
    }
    Ok(record)
}
