//! Outbound O2lite-style messages.
//!
//! A message is an address, a timestamp (0 means "deliver now"), a type
//! signature and one argument per signature character. Framing and delivery
//! belong to the `Messenger` implementations.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::sync::OnceLock;

use crate::detect::Prediction;

/// Address that per-frame hand detections are published to.
pub const OBJECT_ADDRESS: &str = "/htclient/obj";

/// Signature of a detection message: class id, score, then the box.
pub const OBJECT_TYPES: &str = "ifffff";

/// A single message argument.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum O2Arg {
    Int32(i32),
    Float(f32),
    Double(f64),
    Str(String),
}

impl O2Arg {
    /// Type signature character for this argument.
    pub fn type_code(&self) -> char {
        match self {
            O2Arg::Int32(_) => 'i',
            O2Arg::Float(_) => 'f',
            O2Arg::Double(_) => 'd',
            O2Arg::Str(_) => 's',
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutboundMessage {
    address: String,
    timestamp: f64,
    types: String,
    args: Vec<O2Arg>,
}

impl OutboundMessage {
    /// Build a message, checking the address and that `types` describes `args` exactly.
    pub fn new(
        address: impl Into<String>,
        timestamp: f64,
        types: &str,
        args: Vec<O2Arg>,
    ) -> Result<Self> {
        let address = address.into();
        validate_address(&address)?;
        if types.chars().count() != args.len() {
            return Err(anyhow!(
                "type signature {:?} has {} entries but {} arguments were given",
                types,
                types.chars().count(),
                args.len()
            ));
        }
        for (index, (code, arg)) in types.chars().zip(&args).enumerate() {
            if code != arg.type_code() {
                return Err(anyhow!(
                    "argument {} of {}: signature says '{}' but value is '{}'",
                    index,
                    address,
                    code,
                    arg.type_code()
                ));
            }
        }
        Ok(Self {
            address,
            timestamp,
            types: types.to_string(),
            args,
        })
    }

    /// Detection message: `(class_id, score, x, y, width, height)` with signature `ifffff`.
    pub fn for_prediction(address: &str, prediction: &Prediction) -> Result<Self> {
        let [x, y, w, h] = prediction.bbox.to_array();
        Self::new(
            address,
            0.0,
            OBJECT_TYPES,
            vec![
                O2Arg::Int32(prediction.class_id),
                O2Arg::Float(prediction.score),
                O2Arg::Float(x),
                O2Arg::Float(y),
                O2Arg::Float(w),
                O2Arg::Float(h),
            ],
        )
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn types(&self) -> &str {
        &self.types
    }

    pub fn args(&self) -> &[O2Arg] {
        &self.args
    }
}

/// Addresses start with `/` (or `!` for a fully-qualified service) and contain no whitespace.
pub fn validate_address(address: &str) -> Result<()> {
    static ADDRESS_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = ADDRESS_RE.get_or_init(|| {
        regex::Regex::new(r"^[/!][^\s/]+(/[^\s/]+)*$").expect("address pattern compiles")
    });
    if !re.is_match(address) {
        return Err(anyhow!(
            "invalid address {:?}: must look like /service/node with no whitespace",
            address
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BBox;

    #[test]
    fn prediction_message_has_fixed_signature() -> Result<()> {
        let prediction = Prediction::new(1, 0.92, BBox::new(10.0, 20.0, 30.0, 40.0));
        let msg = OutboundMessage::for_prediction(OBJECT_ADDRESS, &prediction)?;
        assert_eq!(msg.address(), "/htclient/obj");
        assert_eq!(msg.timestamp(), 0.0);
        assert_eq!(msg.types(), "ifffff");
        assert_eq!(
            msg.args(),
            &[
                O2Arg::Int32(1),
                O2Arg::Float(0.92),
                O2Arg::Float(10.0),
                O2Arg::Float(20.0),
                O2Arg::Float(30.0),
                O2Arg::Float(40.0),
            ]
        );
        Ok(())
    }

    #[test]
    fn rejects_signature_mismatch() {
        let err = OutboundMessage::new("/a/b", 0.0, "if", vec![O2Arg::Float(1.0), O2Arg::Float(2.0)])
            .unwrap_err();
        assert!(err.to_string().contains("signature says 'i'"));

        assert!(OutboundMessage::new("/a/b", 0.0, "i", vec![]).is_err());
    }

    #[test]
    fn address_validation() {
        assert!(validate_address("/htclient/obj").is_ok());
        assert!(validate_address("!arco/ping").is_ok());
        assert!(validate_address("htclient/obj").is_err());
        assert!(validate_address("/ht client").is_err());
        assert!(validate_address("/").is_err());
        assert!(validate_address("/a//b").is_err());
    }

    #[test]
    fn serializes_args_as_plain_values() -> Result<()> {
        let msg = OutboundMessage::new(
            "/x/y",
            1.5,
            "isd",
            vec![O2Arg::Int32(3), O2Arg::Str("hi".into()), O2Arg::Double(0.25)],
        )?;
        let json = serde_json::to_value(&msg)?;
        assert_eq!(json["args"], serde_json::json!([3, "hi", 0.25]));
        assert_eq!(json["types"], "isd");
        Ok(())
    }
}
