//! Record → command list.

use serde_json::Value;

use super::{
    Command, ExtractError, Group, Source, UnknownGroupPolicy, COMMANDS_FIELD, LEGACY_COMMANDS_FIELD,
};
use crate::codec::{kind_of, FieldError, Record};

/// Pull the ordered command list out of a decoded record.
///
/// A record without a `commands` field (or with a null one) yields no
/// commands. Every descriptor must be a map carrying `group`, `key` and
/// `source`; `field` is required for hashes and `literal` for literal sources.
///
/// Older producers' layout is accepted too: the list under `redis`, with
/// `from` in place of `source` and `value` in place of `literal`.
pub fn extract(record: &Record, policy: UnknownGroupPolicy) -> Result<Vec<Command>, ExtractError> {
    let mut descriptors = None;
    for list_field in [COMMANDS_FIELD, LEGACY_COMMANDS_FIELD] {
        descriptors = record
            .get_list(list_field)
            .map_err(ExtractError::InvalidCommandList)?;
        if descriptors.is_some() {
            break;
        }
    }
    let Some(descriptors) = descriptors else {
        return Ok(Vec::new());
    };

    descriptors
        .iter()
        .enumerate()
        .map(|(index, descriptor)| parse_descriptor(index, descriptor, policy))
        .collect()
}

fn parse_descriptor(
    index: usize,
    descriptor: &Value,
    policy: UnknownGroupPolicy,
) -> Result<Command, ExtractError> {
    let malformed = |reason: String| ExtractError::Malformed { index, reason };
    let field_error = |e: FieldError| ExtractError::Malformed {
        index,
        reason: e.to_string(),
    };

    let descriptor = Record::from_object(descriptor).ok_or_else(|| {
        malformed(format!("descriptor should be a map, found {}", kind_of(descriptor)))
    })?;

    let group_tag = descriptor.get_str("group").map_err(field_error)?;
    let group = match (Group::parse(group_tag), policy) {
        (Some(group), _) => group,
        (None, UnknownGroupPolicy::Skip) => Group::Unrecognized(group_tag.to_string()),
        (None, UnknownGroupPolicy::Reject) => {
            return Err(malformed(format!("unrecognized group '{}'", group_tag)))
        }
    };

    let key = descriptor.get_str("key").map_err(field_error)?;

    let source_tag = match descriptor.get_opt_str("source").map_err(field_error)? {
        Some(tag) => tag,
        None => descriptor.get_str("from").map_err(field_error)?,
    };
    let source = Source::parse(source_tag)
        .ok_or_else(|| malformed(format!("unrecognized source '{}'", source_tag)))?;

    let field = match group {
        Group::Hash => Some(descriptor.get_str("field").map_err(field_error)?.to_string()),
        _ => descriptor
            .get_opt_str("field")
            .map_err(field_error)?
            .map(str::to_string),
    };

    let literal = match descriptor.get_opt_str("literal").map_err(field_error)? {
        Some(literal) => Some(literal),
        None => descriptor.get_opt_str("value").map_err(field_error)?,
    }
    .map(str::to_string);
    if source == Source::Literal && literal.is_none() {
        return Err(malformed("literal source without a 'literal'".to_string()));
    }

    Ok(Command {
        group,
        key: key.to_string(),
        field,
        source,
        literal,
    })
}
