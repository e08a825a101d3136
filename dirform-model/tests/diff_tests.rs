use dirform_model::{ChangeKind, ObjectDiff};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn empty_payload_is_empty_diff() {
    let diff: ObjectDiff = serde_json::from_value(json!({})).unwrap();
    assert!(diff.is_empty());
}

#[test]
fn parses_contract_field_names() {
    let diff: ObjectDiff = serde_json::from_value(json!({
        "attributes": {
            "changed": { "cn": ["bar"] },
            "added": { "mail": ["x@example.net"] },
            "removed": ["telephoneNumber"]
        },
        "extensions": { "add": ["MailAccount"], "removed": ["SambaUser"] },
        "blocked_by": { "loginShell": [{ "name": "type", "value": "X" }] }
    }))
    .unwrap();

    assert!(!diff.is_empty());
    assert_eq!(diff.extensions.add, vec!["MailAccount"]);
    assert_eq!(diff.extensions.removed, vec!["SambaUser"]);
    assert_eq!(diff.rules_for("loginShell").len(), 1);
    assert!(diff.rules_for("cn").is_empty());

    let changes = diff.attribute_changes();
    let kinds: Vec<(&str, ChangeKind)> = changes.iter().map(|c| (c.name.as_str(), c.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            ("cn", ChangeKind::Changed),
            ("mail", ChangeKind::Added),
            ("telephoneNumber", ChangeKind::Removed),
        ]
    );
    assert!(changes[2].remote.is_empty());
}

#[test]
fn extension_only_diff_is_not_empty() {
    let diff: ObjectDiff = serde_json::from_value(json!({ "extensions": { "add": ["A"] } })).unwrap();
    assert!(diff.attributes.is_empty());
    assert!(!diff.is_empty());
}
