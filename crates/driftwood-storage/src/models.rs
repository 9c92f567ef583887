// SPDX-FileCopyrightText: 2026 Driftwood Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stored entity types, defined in `driftwood-core` and re-exported here.

pub use driftwood_core::types::{BottleEntry, Message, ScheduledTask};
