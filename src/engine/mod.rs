//! Command execution engine.
//!
//! Applies one message's command list to a `CommandStore`, strictly in order.
//! Each command's reply is kept so the next command can read it through
//! `Source::PreviousResult`. Nothing survives between calls.

use std::borrow::Cow;

use tracing::{debug, warn};

use crate::command::{Command, Group, Source};
use crate::storage::{CommandStore, Reply, StorageError};

/// Score delta applied by sorted-set commands.
pub const SCORE_INCREMENT: f64 = 1.0;

/// Counts for one executed command list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionSummary {
    pub executed: usize,
    pub skipped: usize,
}

/// A storage operation failed; later commands were not run.
#[derive(Debug, thiserror::Error)]
#[error("Command {index} ({group} '{key}') failed: {source}")]
pub struct ExecutionError {
    pub index: usize,
    pub group: Group,
    pub key: String,
    pub source: StorageError,
}

/// Execute `commands` against `store`.
///
/// `raw` is the message value exactly as read from the log; it is what
/// `Source::SelfValue` resolves to. A previous-result read on the first
/// command resolves to empty bytes. Unrecognized groups are logged and
/// skipped without touching the previous result.
pub async fn execute(
    commands: &[Command],
    raw: &[u8],
    store: &dyn CommandStore,
) -> Result<ExecutionSummary, ExecutionError> {
    let mut summary = ExecutionSummary::default();
    let mut previous: Option<Reply> = None;

    for (index, command) in commands.iter().enumerate() {
        let value = resolve(command, raw, previous.as_ref());

        let reply = match &command.group {
            Group::List => store.list_append(&command.key, &value).await,
            Group::Hash => {
                let field = command.field.as_deref().unwrap_or_default();
                store.hash_set(&command.key, field, &value).await
            }
            Group::Set => store.assign(&command.key, &value).await,
            Group::SortedSet => {
                store
                    .sorted_set_incr(&command.key, &value, SCORE_INCREMENT)
                    .await
            }
            Group::Unrecognized(tag) => {
                warn!(index, group = %tag, key = %command.key, "Skipping unrecognized command group");
                summary.skipped += 1;
                continue;
            }
        }
        .map_err(|source| ExecutionError {
            index,
            group: command.group.clone(),
            key: command.key.clone(),
            source,
        })?;

        debug!(index, group = %command.group, key = %command.key, reply = ?reply, "Executed command");
        previous = Some(reply);
        summary.executed += 1;
    }

    Ok(summary)
}

fn resolve<'a>(command: &'a Command, raw: &'a [u8], previous: Option<&Reply>) -> Cow<'a, [u8]> {
    match command.source {
        Source::SelfValue => Cow::Borrowed(raw),
        Source::PreviousResult => Cow::Owned(previous.map(Reply::to_bytes).unwrap_or_default()),
        Source::Literal => Cow::Borrowed(command.literal.as_deref().unwrap_or_default().as_bytes()),
    }
}

#[cfg(test)]
mod tests;
