// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serial_test::serial;

#[test]
#[serial]
fn log_dir_unset_or_empty_means_stderr() {
    std::env::remove_var(LOG_DIR_VAR);
    assert_eq!(log_dir(), None);

    std::env::set_var(LOG_DIR_VAR, "");
    assert_eq!(log_dir(), None);
}

#[test]
#[serial]
fn log_dir_is_read_from_env() {
    std::env::set_var(LOG_DIR_VAR, "/var/log/twc");
    assert_eq!(log_dir(), Some(PathBuf::from("/var/log/twc")));
    std::env::remove_var(LOG_DIR_VAR);
}

#[test]
#[serial]
fn filter_defaults_to_info() {
    std::env::remove_var(LOG_FILTER_VAR);
    assert_eq!(filter().to_string(), "info");
}

#[test]
#[serial]
fn filter_is_read_from_env() {
    std::env::set_var(LOG_FILTER_VAR, "twc_controller=debug");
    assert_eq!(filter().to_string(), "twc_controller=debug");
    std::env::remove_var(LOG_FILTER_VAR);
}
