// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Message-in-a-bottle tools backed by the bounded [`BottleStore`].

use async_trait::async_trait;
use driftwood_core::DriftwoodError;
use driftwood_storage::BottleStore;
use tracing::debug;

use crate::kind::{ThrowBottleInput, ToolInput, ToolKind};
use crate::tool::{Tool, ToolContext, ToolOutput};

/// Returned by `retrieve_bottle` when the store holds nothing.
pub const EMPTY_SEA: &str = "The sea is empty. No bottles have washed ashore yet.";

/// Drops a message into the sea.
pub struct ThrowBottleTool {
    store: BottleStore,
}

impl ThrowBottleTool {
    pub fn new(store: BottleStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for ThrowBottleTool {
    fn kind(&self) -> ToolKind {
        ToolKind::ThrowBottle
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: ToolInput,
    ) -> Result<ToolOutput, DriftwoodError> {
        let message = match input {
            ToolInput::ThrowBottle(ThrowBottleInput { message }) => message,
            other => return Err(unexpected(self.kind(), &other)),
        };
        if message.trim().is_empty() {
            return Err(DriftwoodError::Validation(
                "a bottle needs a non-empty message".to_string(),
            ));
        }

        let id = self.store.insert(&message).await?;
        debug!(conversation_id = %ctx.conversation_id, bottle_id = id, "bottle thrown");
        Ok(ToolOutput::ok(
            "The bottle has been thrown into the sea. Someone may find it one day.",
        ))
    }
}

/// Fishes a random message out of the sea, removing it.
pub struct RetrieveBottleTool {
    store: BottleStore,
}

impl RetrieveBottleTool {
    pub fn new(store: BottleStore) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Tool for RetrieveBottleTool {
    fn kind(&self) -> ToolKind {
        ToolKind::RetrieveBottle
    }

    async fn invoke(
        &self,
        ctx: &ToolContext,
        input: ToolInput,
    ) -> Result<ToolOutput, DriftwoodError> {
        if !matches!(input, ToolInput::RetrieveBottle) {
            return Err(unexpected(self.kind(), &input));
        }

        match self.store.pop_random().await? {
            Some(entry) => {
                debug!(conversation_id = %ctx.conversation_id, bottle_id = entry.id, "bottle retrieved");
                Ok(ToolOutput::ok(format!(
                    "You found a bottle. The message inside reads: \"{}\"",
                    entry.text
                )))
            }
            None => Ok(ToolOutput::ok(EMPTY_SEA)),
        }
    }
}

pub(crate) fn unexpected(kind: ToolKind, input: &ToolInput) -> DriftwoodError {
    DriftwoodError::Internal(format!(
        "`{kind}` received input for `{}`",
        input.kind()
    ))
}
