// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::signature::{self, Signature};
use crate::time::Timestamp;
use chrono::{TimeZone, Utc};

// ── Proptest strategies ─────────────────────────────────────────────────

/// Proptest strategies for statuses and termination messages.
pub mod strategies {
    use crate::container::ContainerStepStatus;
    use crate::status::StepStatus;
    use proptest::prelude::*;

    pub fn arb_step_status() -> impl Strategy<Value = StepStatus> {
        proptest::sample::select(StepStatus::ALL.to_vec())
    }

    pub fn arb_container_statuses() -> impl Strategy<Value = Vec<ContainerStepStatus>> {
        proptest::collection::vec(
            (arb_step_status(), 0i64..=255).prop_map(|(status, code)| ContainerStepStatus::new(status, code)),
            0..6,
        )
    }
}

// ── Fixtures ────────────────────────────────────────────────────────────

/// Timestamp `secs` seconds after a fixed epoch.
#[allow(clippy::unwrap_used)]
pub fn ts(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

/// Pre-order sequence of a flat signature with one leaf per ref.
pub fn linear_signature(refs: &[&str]) -> Vec<Signature> {
    let tree: Vec<Signature> = refs.iter().map(|r| Signature::step(*r, r.to_uppercase())).collect();
    signature::sequence(&tree)
}
