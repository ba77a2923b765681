// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn plan() -> ActionGroups {
    ActionGroups(vec![
        vec![Action::start("init"), Action::end("init"), Action::start("a"), Action::end("a")],
        vec![Action::start("b"), Action::start("c"), Action::end("c"), Action::end("b")],
    ])
}

#[test]
fn extracts_refs_per_container() {
    let refs = plan().container_refs();
    assert_eq!(refs.len(), 2);
    assert_eq!(refs[0].ended, vec!["init", "a"]);
    assert_eq!(refs[1].started, vec!["b", "c"]);
    assert_eq!(refs[1].last_ended(), Some("b"));
}

#[test]
fn empty_trailing_end_defers_to_previous_ref() {
    let refs = ContainerRefs { started: vec!["a".into()], ended: vec!["a".into(), String::new()] };
    assert_eq!(refs.last_ended(), Some("a"));
    assert_eq!(ContainerRefs::default().last_ended(), None);
}

#[test]
fn end_positions_index_termination_slots() {
    let positions = plan().end_positions();
    assert_eq!(positions["a"], EndPosition { container: 0, index: 1 });
    assert_eq!(positions["b"], EndPosition { container: 1, index: 1 });
    assert!(!positions.contains_key("missing"));
}

#[test]
fn parses_annotation_and_ignores_other_actions() {
    let json = r#"[[{"setup":{"copyInit":true}},{"start":"init"},{"end":"init"}],[{"start":"x"},{"execute":{"ref":"x"}},{"end":"x"}]]"#;
    let groups = ActionGroups::parse(json).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups.container_names(), vec!["1", "2"]);
    assert_eq!(groups.container_refs()[1].ended, vec!["x"]);
}
