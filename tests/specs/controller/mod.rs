// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

mod backoff;
mod convergence;
mod log_reconnect;
mod pause;
mod termination;
mod watch_resume;
