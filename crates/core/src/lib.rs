// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! twc-core: domain model for test workflow executions watched on Kubernetes

pub mod macros;

pub mod actions;
pub mod clock;
pub mod container;
pub mod instruction;
pub mod notification;
pub mod result;
pub mod signature;
pub mod status;
pub mod time;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use actions::{Action, ActionGroups, ContainerRefs, EndPosition};
pub use clock::{Clock, FakeClock, SystemClock};
pub use container::{ContainerResult, ContainerStepStatus};
pub use instruction::{ExecutionResult, HintName, Instruction, InstructionKind};
pub use notification::{LightweightNotification, Notification};
pub use result::{Pause, StepResult, TestWorkflowResult};
pub use signature::{Signature, INIT_REF, ROOT_REF};
pub use status::{StepStatus, WorkflowStatus};
pub use time::Timestamp;
