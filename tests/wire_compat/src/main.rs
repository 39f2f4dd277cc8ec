fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use serde_json::{Value, json};

    use chattray_protocol::constants::{LOGON_REQUEST, LOGON_RESPONSE, READY, response_name};
    use chattray_protocol::messages::{
        CallEvent, ConnectionStateChangedEvent, ConversationReadItemsEvent, ItemEvent,
        LogonRequest, PresenceChangedEvent, RequestPayload,
    };
    use chattray_protocol::types::{
        ConnectionState, Conversation, ConversationType, OAuthToken, Presence, PresenceState, User,
    };
    use chattray_protocol::{Envelope, EventKind, Method};
    use chattray_settings::{AppConfig, KEY_DOMAIN, KEY_TOKEN, KEY_TRAY, TrayPreferences};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        roundtrip_value(name, fixture)
    }

    fn roundtrip_value<T>(name: &str, fixture: Value) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  fixture: {fixture}\n  Rust:    {reserialized}"
        );
        parsed
    }

    fn load_envelope(name: &str) -> Envelope {
        roundtrip_test(name)
    }

    // --- Logon handshake ---

    #[test]
    fn fixture_logon_request() {
        let env = load_envelope("logon_request.json");
        assert_eq!(env.name, LOGON_REQUEST);

        let request = LogonRequest::from_args(&env.payload).unwrap();
        assert_eq!(request.oauth.domain, "circuitsandbox.net");
        assert_eq!(request.oauth.redirect_uri, "http://localhost:7100/oauth");
        assert_eq!(request.access_token, "ot-4f1c9a0e");
        assert_eq!(request.to_args().unwrap(), env.payload);
    }

    #[test]
    fn fixture_logon_response() {
        let env = load_envelope("logon_response.json");
        assert_eq!(env.name, LOGON_RESPONSE);

        let user: User = serde_json::from_value(Envelope::parse_response(env.payload).unwrap())
            .unwrap();
        assert_eq!(user.user_id, "u-me");
        assert_eq!(user.display_name, "Roger Rabbit");
    }

    #[test]
    fn fixture_logon_response_error() {
        let env = load_envelope("logon_response_error.json");
        let err = Envelope::parse_response(env.payload.clone()).unwrap_err();
        assert_eq!(err.code.as_deref(), Some("AUTHORIZATION_FAILED"));
        assert_eq!(err.message, "Invalid access token");
        assert_eq!(Envelope::response_payload(Err(err)), env.payload);
    }

    #[test]
    fn fixture_ready() {
        let env = load_envelope("ready.json");
        assert_eq!(env.name, READY);
        assert!(env.payload.is_empty());
    }

    // --- Forwarded calls ---

    #[test]
    fn fixture_method_request() {
        let env = load_envelope("method_request.json");
        let method: Method = env.name.parse().unwrap();
        assert_eq!(method, Method::GetConversationItems);

        let request = RequestPayload::from_args(&env.payload).unwrap();
        assert_eq!(request.id, 48213377);
        assert_eq!(request.args, vec![json!("c-1"), json!({"numberOfItems": 20})]);
        assert_eq!(serde_json::to_value(&request).unwrap(), env.payload[0]);
    }

    #[test]
    fn fixture_method_response() {
        let env = load_envelope("method_response.json");
        assert_eq!(env.name, response_name(Method::GetPresence, 48213377));

        let result = Envelope::parse_response(env.payload.clone()).unwrap();
        let presence: Vec<Presence> = serde_json::from_value(result.clone()).unwrap();
        assert_eq!(presence[0].state, PresenceState::Available);
        assert_eq!(presence[1].state, PresenceState::Dnd);
        assert_eq!(Envelope::response_payload(Ok(result)), env.payload);
    }

    #[test]
    fn fixture_method_response_bare_string_error() {
        let env = load_envelope("method_response_error.json");
        assert_eq!(env.name, response_name(Method::GetConversationById, 10_000_001));

        let err = Envelope::parse_response(env.payload).unwrap_err();
        assert_eq!(err.code, None);
        assert_eq!(err.message, "Conversation not found");
    }

    #[test]
    fn every_method_name_is_camel_case_wire_name() {
        for method in Method::ALL {
            let wire = serde_json::to_value(method).unwrap();
            assert_eq!(wire, Value::String(method.as_str().to_string()));
        }
    }

    // --- Domain types ---

    #[test]
    fn fixture_conversation() {
        let conv: Conversation = roundtrip_test("conversation.json");
        assert_eq!(conv.conv_type, ConversationType::Direct);
        assert_eq!(conv.user_data.unread_items, 3);
        assert_eq!(conv.peer_user_id("u-me"), Some("u-bob"));
    }

    // --- Events ---

    #[test]
    fn fixture_connection_state_changed() {
        let event: ConnectionStateChangedEvent =
            roundtrip_test("event_connection_state_changed.json");
        assert_eq!(event.state, ConnectionState::Reconnecting);
    }

    #[test]
    fn fixture_item_added() {
        let event: ItemEvent = roundtrip_test("event_item_added.json");
        assert_eq!(event.item.creator_id, "u-bob");
        assert_eq!(
            event.item.text.map(|t| t.content).as_deref(),
            Some("see you at noon")
        );
    }

    #[test]
    fn fixture_user_presence_changed() {
        let event: PresenceChangedEvent = roundtrip_test("event_user_presence_changed.json");
        assert_eq!(event.presence_state.user_id, "u-bob");
        assert_eq!(event.presence_state.state, PresenceState::Busy);
    }

    #[test]
    fn fixture_call_status() {
        let event: CallEvent = roundtrip_test("event_call_status.json");
        assert_eq!(event.call.conv_id, "c-1");
        assert_eq!(event.reason.as_deref(), Some("remoteStreamUpdated"));
    }

    #[test]
    fn fixture_conversation_read_items() {
        let event: ConversationReadItemsEvent =
            roundtrip_test("event_conversation_read_items.json");
        assert_eq!(event.data.conv_id, "c-1");
    }

    #[test]
    fn event_names_are_wire_names() {
        for kind in EventKind::ALL {
            let wire = serde_json::to_value(kind).unwrap();
            assert_eq!(wire, Value::String(kind.as_str().to_string()));
        }
    }

    // --- Settings store ---

    #[test]
    fn fixture_settings_keys() {
        let settings = load_fixture("settings.json");
        assert_eq!(settings[KEY_DOMAIN], "circuitsandbox.net");

        let tray: TrayPreferences =
            roundtrip_value("settings.json#tray", settings[KEY_TRAY].clone());
        assert_eq!(tray.custom_ids(), Some(vec!["c-1".into(), "c-2".into()]));

        let token: OAuthToken =
            roundtrip_value("settings.json#token", settings[KEY_TOKEN].clone());
        assert_eq!(token.refresh_token.as_deref(), Some("rt-77d0"));
        assert!(token.expiry.is_some());
    }

    #[test]
    fn fixture_app_config() {
        let config: AppConfig = roundtrip_test("app_config.json");
        assert_eq!(config.default_domain(), Some("circuitsandbox.net"));
        let eu = config.domain("eu.yourcircuit.com").unwrap();
        assert_eq!(eu.scope(), "READ_USER_PROFILE,READ_CONVERSATIONS");
        assert_eq!(config.domains[0].scope(), "ALL");
    }

    // --- Backward compatibility: sparse payloads ---

    #[test]
    fn sparse_tray_preferences_default_to_favorites() {
        let tray: TrayPreferences = serde_json::from_str("{}").unwrap();
        assert!(tray.favorites);
        assert!(tray.custom.is_empty());
    }

    #[test]
    fn unknown_presence_state_reads_as_offline() {
        let presence: Presence =
            serde_json::from_str(r#"{"userId": "u-bob", "state": "INVISIBLE"}"#).unwrap();
        assert_eq!(presence.state, PresenceState::Offline);
    }

    #[test]
    fn request_without_args_defaults_to_empty() {
        let request = RequestPayload::from_args(&[json!({"id": 10000000})]).unwrap();
        assert!(request.args.is_empty());
    }
}
