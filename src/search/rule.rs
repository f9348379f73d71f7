//! Match rules for historical scans.

use std::sync::Arc;

use tracing::trace;

use crate::broker::LogMessage;
use crate::codec::Codec;

/// Field holding a message's identifier.
pub const ID_FIELD: &str = "id";
/// Field holding a message's category.
pub const CATEGORY_FIELD: &str = "category";

/// What to look for. Builds one fresh `MatchRule` per scanned partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleSpec {
    /// Messages in `category`, once the message with `id` has been seen.
    Subject { id: String, category: String },
    /// Every message from the one with `id` onwards.
    Comment { id: String },
}

impl RuleSpec {
    pub fn subject(id: impl Into<String>, category: impl Into<String>) -> Self {
        Self::Subject {
            id: id.into(),
            category: category.into(),
        }
    }

    pub fn comment(id: impl Into<String>) -> Self {
        Self::Comment { id: id.into() }
    }

    pub fn target_id(&self) -> &str {
        match self {
            Self::Subject { id, .. } | Self::Comment { id } => id,
        }
    }

    pub fn build(&self, codec: Arc<dyn Codec>) -> MatchRule {
        MatchRule {
            spec: self.clone(),
            codec,
            anchor: None,
        }
    }
}

/// Stateful predicate over one sequential scan.
///
/// Not anchored until a message carrying the target id is seen; only then can
/// anything match. Feeding messages out of order invalidates the state, so a
/// rule must not be shared between scans.
pub struct MatchRule {
    spec: RuleSpec,
    codec: Arc<dyn Codec>,
    anchor: Option<i64>,
}

impl MatchRule {
    /// Offset of the most recent message carrying the target id.
    pub fn anchor(&self) -> Option<i64> {
        self.anchor
    }

    /// Feed the next message of the scan. Returns whether it matches.
    ///
    /// Messages that do not decode never match and leave the state unchanged.
    pub fn advance(&mut self, message: &LogMessage) -> bool {
        let record = match self.codec.decode(&message.value) {
            Ok(record) => record,
            Err(e) => {
                trace!(offset = message.offset, error = %e, "Undecodable message during scan");
                return false;
            }
        };

        if record.get_opt_str(ID_FIELD).ok().flatten() == Some(self.spec.target_id()) {
            self.anchor = Some(message.offset);
        }

        if self.anchor.is_none() {
            return false;
        }

        match &self.spec {
            RuleSpec::Subject { category, .. } => {
                record.get_opt_str(CATEGORY_FIELD).ok().flatten() == Some(category.as_str())
            }
            RuleSpec::Comment { .. } => true,
        }
    }
}
