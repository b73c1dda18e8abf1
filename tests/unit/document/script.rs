use super::*;

#[test]
fn json_round_trip() {
    let script = StackScript {
        actions: vec!["background".into(), "contrast".into(), "lut3d".into()],
    };
    let json = script.to_json().unwrap();
    assert_eq!(StackScript::from_json(&json).unwrap(), script);
}

#[test]
fn malformed_json_is_a_serde_error() {
    let err = StackScript::from_json("not json").unwrap_err();
    assert!(err.to_string().contains("serialization error:"));
}

#[test]
fn actions_are_visited_in_stack_order() {
    let script = StackScript {
        actions: vec!["a".into(), "b".into(), "c".into()],
    };
    let mut seen = Vec::new();
    script.for_each_action(|action| seen.push(action.to_owned()));
    assert_eq!(seen, vec!["a", "b", "c"]);
}
