//! Wire envelope for policy change notifications.
//!
//! One [`Message`] describes one mutation already committed by the sender.
//! A message is either *direct* (method-specific fields populated) or a
//! *compressed envelope* (`compressed = true`, `payload` carrying a base64
//! deflate stream of a direct message with the same method and sender id).
//!
//! | method | requires |
//! |---|---|
//! | AddOne / RemoveOne | `new_rules[0]` |
//! | UpdateOne | `old_rules[0]`, `new_rules[0]` |
//! | AddMany / RemoveMany | `new_rules` |
//! | UpdateMany | `old_rules`, `new_rules` (equal length, paired by index) |
//! | RemoveFiltered | `field_index`, `field_values` |
//! | FullReload / SaveAll / LoadAll | sender id only |
//!
//! Decoding validates these requirements, so everything past
//! [`Message::decode`] can index rule lists without re-checking.
mod update_type;
pub use update_type::*;


use serde::Deserialize;
use serde::Serialize;

use crate::ProtocolError;
use crate::Result;

/// One authorization fact, e.g. `[subject, domain, action, effect]`.
pub type Rule = Vec<String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub method: UpdateType,
    /// Sender's local identity
    pub id: String,
    /// Section, `p` for permissions or `g` for grouping
    #[serde(skip_serializing_if = "String::is_empty")]
    pub sec: String,
    /// Policy type within the section, e.g. `p`, `g2`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ptype: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub old_rules: Vec<Rule>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub new_rules: Vec<Rule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_index: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_values: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub compressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

/// Decoding view of [`Message`]. The method stays a plain string so an
/// unknown update type is reported as such rather than as a JSON error.
#[derive(Deserialize)]
struct WireMessage {
    method: String,
    id: String,
    #[serde(default)]
    sec: String,
    #[serde(default)]
    ptype: String,
    #[serde(default)]
    old_rules: Vec<Rule>,
    #[serde(default)]
    new_rules: Vec<Rule>,
    #[serde(default)]
    field_index: Option<usize>,
    #[serde(default)]
    field_values: Vec<String>,
    #[serde(default)]
    compressed: bool,
    #[serde(default)]
    payload: Option<String>,
}

impl Message {
    fn base(
        method: UpdateType,
        id: &str,
    ) -> Self {
        Self {
            method,
            id: id.to_string(),
            sec: String::new(),
            ptype: String::new(),
            old_rules: Vec::new(),
            new_rules: Vec::new(),
            field_index: None,
            field_values: Vec::new(),
            compressed: false,
            payload: None,
        }
    }

    fn scoped(
        method: UpdateType,
        id: &str,
        sec: &str,
        ptype: &str,
    ) -> Self {
        Self {
            sec: sec.to_string(),
            ptype: ptype.to_string(),
            ..Self::base(method, id)
        }
    }

    pub fn full_reload(id: &str) -> Self {
        Self::base(UpdateType::FullReload, id)
    }

    pub fn save_all(id: &str) -> Self {
        Self::base(UpdateType::SaveAll, id)
    }

    pub fn load_all(id: &str) -> Self {
        Self::base(UpdateType::LoadAll, id)
    }

    pub fn add_one(
        id: &str,
        sec: &str,
        ptype: &str,
        rule: Rule,
    ) -> Self {
        Self {
            new_rules: vec![rule],
            ..Self::scoped(UpdateType::AddOne, id, sec, ptype)
        }
    }

    pub fn remove_one(
        id: &str,
        sec: &str,
        ptype: &str,
        rule: Rule,
    ) -> Self {
        Self {
            new_rules: vec![rule],
            ..Self::scoped(UpdateType::RemoveOne, id, sec, ptype)
        }
    }

    /// Fails on an empty rule list, which no receiver would accept.
    pub fn add_many(
        id: &str,
        sec: &str,
        ptype: &str,
        rules: Vec<Rule>,
    ) -> std::result::Result<Self, ProtocolError> {
        let message = Self {
            new_rules: rules,
            ..Self::scoped(UpdateType::AddMany, id, sec, ptype)
        };
        message.validate()?;
        Ok(message)
    }

    /// Fails on an empty rule list, which no receiver would accept.
    pub fn remove_many(
        id: &str,
        sec: &str,
        ptype: &str,
        rules: Vec<Rule>,
    ) -> std::result::Result<Self, ProtocolError> {
        let message = Self {
            new_rules: rules,
            ..Self::scoped(UpdateType::RemoveMany, id, sec, ptype)
        };
        message.validate()?;
        Ok(message)
    }

    pub fn update_one(
        id: &str,
        sec: &str,
        ptype: &str,
        old_rule: Rule,
        new_rule: Rule,
    ) -> Self {
        Self {
            old_rules: vec![old_rule],
            new_rules: vec![new_rule],
            ..Self::scoped(UpdateType::UpdateOne, id, sec, ptype)
        }
    }

    /// Fails when the rule lists cannot be paired by index.
    pub fn update_many(
        id: &str,
        sec: &str,
        ptype: &str,
        old_rules: Vec<Rule>,
        new_rules: Vec<Rule>,
    ) -> std::result::Result<Self, ProtocolError> {
        if old_rules.len() != new_rules.len() {
            return Err(ProtocolError::InvalidEnvelope(format!(
                "update pairs {} old rules with {} new rules",
                old_rules.len(),
                new_rules.len()
            )));
        }
        Ok(Self {
            old_rules,
            new_rules,
            ..Self::scoped(UpdateType::UpdateMany, id, sec, ptype)
        })
    }

    /// Fails when `field_values` is empty.
    pub fn remove_filtered(
        id: &str,
        sec: &str,
        ptype: &str,
        field_index: usize,
        field_values: Vec<String>,
    ) -> std::result::Result<Self, ProtocolError> {
        let message = Self {
            field_index: Some(field_index),
            field_values,
            ..Self::scoped(UpdateType::RemoveFiltered, id, sec, ptype)
        };
        message.validate()?;
        Ok(message)
    }

    /// Wraps an already compressed and text-encoded `inner` message.
    pub fn compressed_envelope(
        inner: &Message,
        payload: String,
    ) -> Self {
        Self {
            compressed: true,
            payload: Some(payload),
            ..Self::base(inner.method, &inner.id)
        }
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> std::result::Result<Self, ProtocolError> {
        Self::decode_slice(raw.as_bytes())
    }

    pub fn decode_slice(raw: &[u8]) -> std::result::Result<Self, ProtocolError> {
        let wire: WireMessage =
            serde_json::from_slice(raw).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        let method: UpdateType = wire.method.parse()?;

        // Go senders omit a zero field index.
        let field_index = match (method, wire.field_index) {
            (UpdateType::RemoveFiltered, None) if !wire.compressed => Some(0),
            (_, index) => index,
        };

        let message = Self {
            method,
            id: wire.id,
            sec: wire.sec,
            ptype: wire.ptype,
            old_rules: wire.old_rules,
            new_rules: wire.new_rules,
            field_index,
            field_values: wire.field_values,
            compressed: wire.compressed,
            payload: wire.payload,
        };
        message.validate()?;
        Ok(message)
    }

    /// Checks the per-method field requirements and the envelope shape.
    pub fn validate(&self) -> std::result::Result<(), ProtocolError> {
        if self.compressed {
            return match &self.payload {
                Some(p) if !p.is_empty() => {
                    if self.has_direct_fields() {
                        Err(ProtocolError::InvalidEnvelope(
                            "compressed envelope also carries direct fields".into(),
                        ))
                    } else {
                        Ok(())
                    }
                }
                _ => Err(ProtocolError::InvalidEnvelope(
                    "compressed envelope without payload".into(),
                )),
            };
        }

        if self.payload.is_some() {
            return Err(ProtocolError::InvalidEnvelope(
                "payload present on uncompressed message".into(),
            ));
        }

        let method = self.method.as_str();
        let missing = |field: &'static str| ProtocolError::MissingField { method, field };

        match self.method {
            UpdateType::FullReload | UpdateType::SaveAll | UpdateType::LoadAll => {}
            UpdateType::AddOne
            | UpdateType::RemoveOne
            | UpdateType::AddMany
            | UpdateType::RemoveMany => {
                if self.new_rules.is_empty() {
                    return Err(missing("new_rules"));
                }
            }
            UpdateType::UpdateOne | UpdateType::UpdateMany => {
                if self.old_rules.is_empty() {
                    return Err(missing("old_rules"));
                }
                if self.new_rules.is_empty() {
                    return Err(missing("new_rules"));
                }
                if self.old_rules.len() != self.new_rules.len() {
                    return Err(ProtocolError::InvalidEnvelope(format!(
                        "update pairs {} old rules with {} new rules",
                        self.old_rules.len(),
                        self.new_rules.len()
                    )));
                }
            }
            UpdateType::RemoveFiltered => {
                if self.field_index.is_none() {
                    return Err(missing("field_index"));
                }
                if self.field_values.is_empty() {
                    return Err(missing("field_values"));
                }
            }
        }
        Ok(())
    }

    fn has_direct_fields(&self) -> bool {
        !self.sec.is_empty()
            || !self.ptype.is_empty()
            || !self.old_rules.is_empty()
            || !self.new_rules.is_empty()
            || self.field_index.is_some()
            || !self.field_values.is_empty()
    }

    /// Number of rule tuples carried, for logging.
    pub fn rule_count(&self) -> usize {
        self.old_rules.len().max(self.new_rules.len())
    }
}
