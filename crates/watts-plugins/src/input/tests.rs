//! Unit tests for the input specification pipeline.

use std::fs;
use std::path::PathBuf;

use rstest::{fixture, rstest};
use serde_json::json;
use tempfile::TempDir;
use watts_schemes::ViolationReason;

use super::*;

const EXAMPLE_USER_ID: &str =
    "eyJpc3N1ZXIiOiJodHRwczpcL1wvaXNzdWVyLmV4YW1wbGUuY29tIiwic3ViamVjdCI6IjEyMzQ1Njc4OSJ9";

#[fixture]
fn registry() -> SchemaRegistry {
    SchemaRegistry::builtin()
}

#[fixture]
fn workspace() -> TempDir {
    TempDir::new().expect("create temp dir")
}

fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

fn inline(text: &str) -> Option<InlineJson> {
    Some(InlineJson::Text(text.to_owned()))
}

#[rstest]
fn default_document_specifies_as_parameter(registry: SchemaRegistry) {
    let input = specify(&registry, Document::default_input(), &InputOverrides::default())
        .expect("default input is valid");
    assert_eq!(input.action(), Action::Parameter);
    assert_eq!(input.watts_version(), Some("1.0.0"));
    assert_eq!(
        input.document().get("watts_userid"),
        Some(&json!(EXAMPLE_USER_ID))
    );
}

#[rstest]
fn later_sources_win_on_collision(registry: SchemaRegistry, workspace: TempDir) {
    let mut baseline = Document::default_input();
    baseline.insert("a", json!(1));
    baseline.insert("b", json!(2));
    let file = write(&workspace, "override.json", r#"{"b": 3, "c": 4}"#);
    let overrides = InputOverrides {
        json_file: Some(file),
        inline: inline(r#"{"c": 5}"#),
        ..InputOverrides::default()
    };

    let input = specify(&registry, baseline, &overrides).expect("specify");
    let document = input.document();
    assert_eq!(document.get("a"), Some(&json!(1)));
    assert_eq!(document.get("b"), Some(&json!(3)));
    assert_eq!(document.get("c"), Some(&json!(5)));
}

#[rstest]
fn nested_objects_are_replaced_not_merged(registry: SchemaRegistry) {
    let overrides = InputOverrides {
        inline: inline(r#"{"user_info": {"iss": "https://other.example.org", "sub": "1"}}"#),
        ..InputOverrides::default()
    };
    let input = specify(&registry, Document::default_input(), &overrides).expect("specify");
    assert_eq!(
        input.document().get("user_info"),
        Some(&json!({"iss": "https://other.example.org", "sub": "1"}))
    );
}

#[rstest]
fn supplied_user_id_is_always_overwritten(registry: SchemaRegistry) {
    let overrides = InputOverrides {
        inline: inline(r#"{"watts_userid": "forged"}"#),
        ..InputOverrides::default()
    };
    let input = specify(&registry, Document::default_input(), &overrides).expect("specify");
    assert_eq!(
        input.document().get("watts_userid"),
        Some(&json!(EXAMPLE_USER_ID))
    );
}

#[rstest]
fn user_id_follows_overridden_claims(registry: SchemaRegistry) {
    let overrides = InputOverrides {
        inline: inline(r#"{"user_info": {"iss": "https://a.example", "sub": "42"}}"#),
        ..InputOverrides::default()
    };
    let input = specify(&registry, Document::default_input(), &overrides).expect("specify");
    let expected =
        derive_user_id(&json!({"iss": "https://a.example", "sub": "42"})).expect("derive");
    assert_eq!(input.document().get("watts_userid"), Some(&json!(expected)));
}

#[rstest]
#[case("parameter", Action::Parameter)]
#[case("request", Action::Request)]
#[case("revoke", Action::Revoke)]
fn requested_action_is_applied(
    registry: SchemaRegistry,
    #[case] name: &str,
    #[case] expected: Action,
) {
    let overrides = InputOverrides {
        action: Some(name.to_owned()),
        ..InputOverrides::default()
    };
    let input = specify(&registry, Document::default_input(), &overrides).expect("specify");
    assert_eq!(input.action(), expected);
    assert_eq!(input.document().action(), Some(name));
}

#[rstest]
#[case(Document::default_input())]
#[case(Document::from_value(json!({"action": "request", "user_info": {}})).expect("object"))]
fn unknown_requested_action_is_rejected(registry: SchemaRegistry, #[case] baseline: Document) {
    let overrides = InputOverrides {
        action: Some("delete".to_owned()),
        ..InputOverrides::default()
    };
    let error = specify(&registry, baseline, &overrides).expect_err("must reject");
    assert!(matches!(error, InputError::UnknownAction(_)), "got {error}");
}

#[rstest]
fn document_action_is_checked_when_none_requested(registry: SchemaRegistry) {
    let overrides = InputOverrides {
        inline: inline(r#"{"action": "delete"}"#),
        ..InputOverrides::default()
    };
    let error = specify(&registry, Document::default_input(), &overrides).expect_err("must reject");
    assert!(matches!(error, InputError::UnknownAction(_)), "got {error}");
}

#[rstest]
fn non_string_action_is_rejected(registry: SchemaRegistry) {
    let overrides = InputOverrides {
        inline: inline(r#"{"action": 7}"#),
        ..InputOverrides::default()
    };
    let error = specify(&registry, Document::default_input(), &overrides).expect_err("must reject");
    assert!(matches!(error, InputError::UnknownAction(_)), "got {error}");
}

#[rstest]
fn missing_action_is_rejected(registry: SchemaRegistry) {
    let baseline = Document::from_value(json!({"watts_version": "1.0.0", "user_info": {}}))
        .expect("object");
    let error = specify(&registry, baseline, &InputOverrides::default()).expect_err("must reject");
    assert!(matches!(error, InputError::MissingAction));
}

#[rstest]
#[case("{not json")]
#[case("")]
fn malformed_inline_json_is_user_input_error(registry: SchemaRegistry, #[case] text: &str) {
    let overrides = InputOverrides {
        inline: inline(text),
        ..InputOverrides::default()
    };
    let error = specify(&registry, Document::default_input(), &overrides).expect_err("must reject");
    assert!(matches!(error, InputError::InvalidUserInput { .. }), "got {error}");
}

#[rstest]
fn non_object_inline_json_is_rejected(registry: SchemaRegistry) {
    let overrides = InputOverrides {
        inline: inline("[1, 2]"),
        ..InputOverrides::default()
    };
    let error = specify(&registry, Document::default_input(), &overrides).expect_err("must reject");
    assert!(matches!(error, InputError::NotAnObject { .. }));
}

#[rstest]
fn malformed_json_file_names_path(registry: SchemaRegistry, workspace: TempDir) {
    let file = write(&workspace, "broken.json", "{");
    let overrides = InputOverrides {
        json_file: Some(file.clone()),
        ..InputOverrides::default()
    };
    let error = specify(&registry, Document::default_input(), &overrides).expect_err("must reject");
    match error {
        InputError::InvalidUserInput { origin, .. } => {
            assert_eq!(origin, file.display().to_string());
        }
        other => panic!("expected invalid input, got {other}"),
    }
}

#[rstest]
fn missing_json_file_is_reported(registry: SchemaRegistry, workspace: TempDir) {
    let overrides = InputOverrides {
        json_file: Some(workspace.path().join("absent.json")),
        ..InputOverrides::default()
    };
    let error = specify(&registry, Document::default_input(), &overrides).expect_err("must reject");
    assert!(matches!(error, InputError::ReadFile { .. }));
}

#[rstest]
fn config_replaces_conf_params_wholesale(registry: SchemaRegistry, workspace: TempDir) {
    let config = write(
        &workspace,
        "watts.conf",
        "service.ssh.plugin.host_list = ssh.example.com\nservice.ssh.plugin.state_prefix = TTS_\n",
    );
    let mut baseline = Document::default_input();
    baseline.insert("conf_params", json!({"stale": "value"}));
    let overrides = InputOverrides {
        config: Some(ConfigSource {
            path: config,
            identifier: Some("ssh".to_owned()),
        }),
        ..InputOverrides::default()
    };
    let input = specify(&registry, baseline, &overrides).expect("specify");
    assert_eq!(
        input.document().get("conf_params"),
        Some(&json!({"host_list": "ssh.example.com", "state_prefix": "TTS_"}))
    );
}

#[rstest]
fn json_overrides_apply_after_config(registry: SchemaRegistry, workspace: TempDir) {
    let config = write(&workspace, "watts.conf", "service.ssh.plugin.host_list = a\n");
    let overrides = InputOverrides {
        config: Some(ConfigSource {
            path: config,
            identifier: Some("ssh".to_owned()),
        }),
        inline: inline(r#"{"conf_params": {"host_list": "b"}}"#),
        ..InputOverrides::default()
    };
    let input = specify(&registry, Document::default_input(), &overrides).expect("specify");
    assert_eq!(
        input.document().get("conf_params"),
        Some(&json!({"host_list": "b"}))
    );
}

#[rstest]
fn unmatched_config_identifier_is_fatal(registry: SchemaRegistry, workspace: TempDir) {
    let config = write(&workspace, "watts.conf", "service.ssh.plugin.host_list = a\n");
    let overrides = InputOverrides {
        config: Some(ConfigSource {
            path: config,
            identifier: Some("x509".to_owned()),
        }),
        ..InputOverrides::default()
    };
    let error = specify(&registry, Document::default_input(), &overrides).expect_err("must reject");
    assert!(
        matches!(error, InputError::ConfigNotFound { ref identifier, .. } if identifier == "x509"),
        "got {error}"
    );
}

#[rstest]
fn config_without_identifier_is_rejected(registry: SchemaRegistry, workspace: TempDir) {
    let config = write(&workspace, "watts.conf", "service.ssh.plugin.host_list = a\n");
    let overrides = InputOverrides {
        config: Some(ConfigSource {
            path: config,
            identifier: None,
        }),
        ..InputOverrides::default()
    };
    let error = specify(&registry, Document::default_input(), &overrides).expect_err("must reject");
    assert!(matches!(error, InputError::MissingConfigIdentifier { .. }));
}

#[rstest]
fn strict_schema_applies_to_request(registry: SchemaRegistry) {
    let overrides = InputOverrides {
        inline: inline(r#"{"params": {"Public Key": "ssh-rsa"}}"#),
        action: Some("request".to_owned()),
        ..InputOverrides::default()
    };
    let error = specify(&registry, Document::default_input(), &overrides).expect_err("must reject");
    match error {
        InputError::SchemaViolation { violation } => {
            assert_eq!(violation.path.to_string(), "$.params.Public Key");
            assert!(matches!(violation.reason, ViolationReason::KeyPattern { .. }));
        }
        other => panic!("expected schema violation, got {other}"),
    }
}

#[rstest]
fn loose_schema_tolerates_bad_params_for_parameter(registry: SchemaRegistry) {
    let overrides = InputOverrides {
        inline: inline(r#"{"params": {"Public Key": "ssh-rsa"}}"#),
        ..InputOverrides::default()
    };
    assert!(specify(&registry, Document::default_input(), &overrides).is_ok());
}

#[rstest]
fn missing_user_info_is_rejected(registry: SchemaRegistry) {
    let baseline = Document::from_value(json!({"action": "parameter", "watts_version": "1.0.0"}))
        .expect("object");
    let error = specify(&registry, baseline, &InputOverrides::default()).expect_err("must reject");
    assert!(matches!(error, InputError::InvalidUserInfo));
}

#[rstest]
fn fragment_behaves_like_inline_text(registry: SchemaRegistry) {
    let fragment = Document::from_value(json!({"cred_state": "TTS_7", "action": "revoke"}))
        .expect("object");
    let overrides = InputOverrides::default().with_fragment(fragment);
    let input = specify(&registry, Document::default_input(), &overrides).expect("specify");
    assert_eq!(input.action(), Action::Revoke);
    assert_eq!(input.document().get("cred_state"), Some(&json!("TTS_7")));
}
