use super::*;

fn parse_updates(json: &str) -> Vec<Update> {
    let envelope: ApiResponse<Vec<Update>> = serde_json::from_str(json).unwrap();
    envelope.result.unwrap()
}

#[test]
fn test_method_url() {
    let api = BotApi::new("https://api.telegram.org/", Duration::from_secs(5)).unwrap();
    assert_eq!(
        api.method_url("123:abc", "sendMessage"),
        "https://api.telegram.org/bot123:abc/sendMessage"
    );
}

#[test]
fn test_unwrap_ok_envelope() {
    let envelope: ApiResponse<User> = serde_json::from_str(
        r#"{"ok": true, "result": {"id": 42, "is_bot": true, "first_name": "Rates", "username": "rates_bot"}}"#,
    )
    .unwrap();
    let me = unwrap_envelope("getMe", StatusCode::OK, envelope).unwrap();
    assert_eq!(me.id, 42);
    assert_eq!(me.username.as_deref(), Some("rates_bot"));
}

#[test]
fn test_unwrap_unauthorized_envelope() {
    let envelope: ApiResponse<User> = serde_json::from_str(
        r#"{"ok": false, "error_code": 401, "description": "Unauthorized"}"#,
    )
    .unwrap();
    let err = unwrap_envelope("getMe", StatusCode::UNAUTHORIZED, envelope).unwrap_err();
    assert!(err.is_unauthorized());
}

#[test]
fn test_unwrap_rejected_envelope() {
    let envelope: ApiResponse<Value> = serde_json::from_str(
        r#"{"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}"#,
    )
    .unwrap();
    match unwrap_envelope("sendMessage", StatusCode::BAD_REQUEST, envelope) {
        Err(ApiError::Rejected { code, description }) => {
            assert_eq!(code, 400);
            assert!(description.contains("chat not found"));
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn test_groups_from_updates() {
    let updates = parse_updates(
        r#"{"ok": true, "result": [
            {"update_id": 1, "message": {"chat": {"id": -100123, "type": "supergroup", "title": "Family"}}},
            {"update_id": 2, "message": {"chat": {"id": 777, "type": "private"}}},
            {"update_id": 3, "my_chat_member": {
                "chat": {"id": -456, "type": "group", "title": "Work"},
                "new_chat_member": {"status": "member", "user": {"id": 42, "is_bot": true, "first_name": "Rates"}}
            }}
        ]}"#,
    );

    let mut known = BTreeMap::new();
    groups_from_updates(&mut known, &updates);

    let names: Vec<_> = known.values().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["Family", "Work"]);
    assert_eq!(known[&-100123].short_id, "-100123");
}

#[test]
fn test_groups_from_updates_tracks_renames_and_removal() {
    let mut known = BTreeMap::new();
    groups_from_updates(
        &mut known,
        &parse_updates(
            r#"{"ok": true, "result": [
                {"update_id": 1, "message": {"chat": {"id": -1, "type": "group", "title": "Old"}}},
                {"update_id": 2, "message": {"chat": {"id": -2, "type": "group", "title": "Gone"}}}
            ]}"#,
        ),
    );
    groups_from_updates(
        &mut known,
        &parse_updates(
            r#"{"ok": true, "result": [
                {"update_id": 3, "message": {"chat": {"id": -1, "type": "group", "title": "New"}}},
                {"update_id": 4, "my_chat_member": {
                    "chat": {"id": -2, "type": "group", "title": "Gone"},
                    "new_chat_member": {"status": "kicked", "user": {"id": 42, "first_name": "Rates"}}
                }}
            ]}"#,
        ),
    );

    assert_eq!(known.len(), 1);
    assert_eq!(known[&-1].name, "New");
}
