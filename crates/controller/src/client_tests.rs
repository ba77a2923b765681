// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn selector_display_joins_parts() {
    assert_eq!(Selector::labels("a=b").to_string(), "a=b");
    assert_eq!(Selector::fields("metadata.name=x").to_string(), "metadata.name=x");
    let both = Selector { label: Some("a=b".into()), field: Some("c=d".into()) };
    assert_eq!(both.to_string(), "a=b,c=d");
    assert_eq!(Selector::default().to_string(), "<all>");
}

#[test]
fn list_params_carry_selectors_and_timeout() {
    let params = Selector::fields("metadata.name=x").list_params(Duration::from_secs(240));
    assert_eq!(params.field_selector.as_deref(), Some("metadata.name=x"));
    assert_eq!(params.label_selector, None);
    assert_eq!(params.timeout, Some(240));
}

#[test]
fn watch_params_stay_below_server_limit() {
    let params = Selector::labels("a=b").watch_params(Duration::from_secs(3600));
    assert_eq!(params.timeout, Some(294));
    assert!(params.bookmarks);
}

#[test]
fn sub_second_timeouts_round_up() {
    let params = Selector::default().list_params(Duration::from_millis(10));
    assert_eq!(params.timeout, Some(1));
}
