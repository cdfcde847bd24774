#[cfg(test)]
mod tests {
    use crate::{ChatError, Result};
    use crate::attachment::*;
    use crate::config::*;
    use crate::event::*;
    use crate::message::*;
    use crate::session::*;
    use crate::wire::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde_json::json;

    // ─── Attachment Tests ────────────────────────────────────

    #[test]
    fn test_raw_attachment_name_fallback_chain() {
        let raw: RawAttachment = serde_json::from_value(json!({
            "name": "",
            "original_name": "report.pdf",
            "filename": "upload_123.pdf"
        }))
        .unwrap();
        assert_eq!(raw.explicit_name(), Some("report.pdf"));

        let raw: RawAttachment = serde_json::from_value(json!({ "filename": "f.txt" })).unwrap();
        assert_eq!(raw.into_attachment().name, "f.txt");

        let raw: RawAttachment = serde_json::from_value(json!({ "url": "/u/1" })).unwrap();
        assert_eq!(raw.explicit_name(), None);
        assert_eq!(raw.into_attachment().name, FALLBACK_NAME);
    }

    #[test]
    fn test_raw_attachment_content_type_alias() {
        let raw: RawAttachment =
            serde_json::from_value(json!({ "name": "a.png", "content_type": "image/png" })).unwrap();
        assert_eq!(raw.mime(), Some("image/png"));
    }

    #[test]
    fn test_raw_attachment_into_attachment_uses_remote_locator() {
        let att = RawAttachment {
            name: Some("a.png".to_string()),
            mime: Some("image/png".to_string()),
            url: Some("http://x/a.png".to_string()),
            size: Some(42),
            ..Default::default()
        }
        .into_attachment();
        assert_eq!(att.url(), Some("http://x/a.png"));
        assert!(att.preview_handle().is_none());
        assert_eq!(att.size, Some(42));
    }

    #[test]
    fn test_normalize_structured_array() {
        let atts = normalize_attachments(&json!([
            { "name": "a.png", "type": "image/png", "url": "/a" },
            { "original_name": "b.txt" }
        ]));
        assert_eq!(atts.len(), 2);
        assert_eq!(atts[0].name, "a.png");
        assert_eq!(atts[1].name, "b.txt");
        assert!(atts[1].locator.is_none());
    }

    #[test]
    fn test_normalize_serialized_string() {
        let encoded = json!([{ "filename": "notes.md", "url": "/n" }]).to_string();
        let atts = normalize_attachments(&json!(encoded));
        assert_eq!(atts.len(), 1);
        assert_eq!(atts[0].name, "notes.md");
        assert_eq!(atts[0].url(), Some("/n"));
    }

    #[test]
    fn test_normalize_malformed_inputs_yield_empty() {
        assert!(normalize_attachments(&json!(null)).is_empty());
        assert!(normalize_attachments(&json!("")).is_empty());
        assert!(normalize_attachments(&json!("{not json")).is_empty());
        assert!(normalize_attachments(&json!("{\"a\":1}")).is_empty());
        assert!(normalize_attachments(&json!(17)).is_empty());
        assert!(normalize_attachments(&json!([1, 2, 3])).is_empty());
    }

    #[test]
    fn test_clear_preview_only_touches_local_handles() {
        let file = PendingFile::new("a.png", "image/png", vec![1u8, 2, 3]);
        let mut local = Attachment::from_pending(&file, Some("blob:1".to_string()));
        assert_eq!(local.size, Some(3));
        assert!(local.clear_preview());
        assert!(local.locator.is_none());
        assert!(!local.clear_preview());

        let mut remote = RawAttachment {
            url: Some("http://x".to_string()),
            ..Default::default()
        }
        .into_attachment();
        assert!(!remote.clear_preview());
        assert_eq!(remote.url(), Some("http://x"));
    }

    #[test]
    fn test_pending_file_is_image() {
        assert!(PendingFile::new("a.png", "image/png", Vec::new()).is_image());
        assert!(!PendingFile::new("a.pdf", "application/pdf", Vec::new()).is_image());
    }

    #[test]
    fn test_attachment_named_never_empty() {
        assert_eq!(Attachment::named("").name, FALLBACK_NAME);
    }

    // ─── Message Tests ───────────────────────────────────────

    #[test]
    fn test_message_user_is_pending() {
        let msg = Message::user("1", "hi");
        assert_eq!(msg.sender, Sender::User);
        assert_eq!(msg.state, DeliveryState::Pending);
        assert!(!msg.is_error());
    }

    #[test]
    fn test_message_placeholder_states() {
        assert!(Message::placeholder("1-response", true).is_streaming());
        let p = Message::placeholder("1-response", false);
        assert_eq!(p.state, DeliveryState::Pending);
        assert_eq!(p.sender, Sender::Assistant);
        assert!(p.text.is_empty());
    }

    #[test]
    fn test_message_error_reply() {
        let msg = Message::error_reply("1-response");
        assert!(msg.is_error());
        assert_eq!(msg.text, ERROR_REPLY);
        assert!(msg.is_settled());
    }

    #[test]
    fn test_terminal_states_never_revert() {
        let mut msg = Message::placeholder("x", true);
        assert!(msg.settle(DeliveryState::Stopped));
        assert!(!msg.settle(DeliveryState::Streaming));
        assert!(!msg.settle(DeliveryState::Delivered));
        assert!(msg.is_stopped());
        assert_eq!(msg.note(), Some(STOPPED_NOTE));
    }

    #[test]
    fn test_correlation_id_response_id() {
        let cid = CorrelationId::from("123");
        assert_eq!(cid.response_id(), "123-response");
        assert_ne!(CorrelationId::generate(), CorrelationId::generate());
    }

    #[test]
    fn test_message_serializes_camel_case() {
        let msg = Message::user("1", "hi").with_server_id(Some("9".to_string()));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["sender"], "user");
        assert_eq!(json["state"], "pending");
        assert_eq!(json["serverId"], "9");
    }

    // ─── Session Tests ───────────────────────────────────────

    #[test]
    fn test_session_deserializes_numeric_id_and_naive_timestamp() {
        let session: Session = serde_json::from_value(json!({
            "id": 7,
            "title": "Trip",
            "created_at": "2024-03-01T10:00:00",
            "updated_at": "2024-03-02T11:30:00.250000"
        }))
        .unwrap();
        assert_eq!(session.id, "7");
        assert_eq!(
            session.updated_at,
            Utc.with_ymd_and_hms(2024, 3, 2, 11, 30, 0).unwrap() + Duration::milliseconds(250)
        );
        assert!(session.created_at.is_some());
    }

    fn session_at(id: &str, at: DateTime<Utc>) -> Session {
        let mut session = Session::new(id, id.to_uppercase());
        session.updated_at = at;
        session
    }

    #[test]
    fn test_sort_by_recency_descending() {
        let base = Utc::now();
        let mut sessions = vec![
            session_at("a", base),
            session_at("b", base + Duration::seconds(10)),
            session_at("c", base + Duration::seconds(5)),
        ];
        sort_by_recency(&mut sessions);
        let ids: Vec<&str> = sessions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_touch_never_moves_backwards() {
        let now = Utc::now();
        let mut s = session_at("a", now);
        s.touch(now - Duration::seconds(30));
        assert_eq!(s.updated_at, now);
        s.touch(now + Duration::seconds(30));
        assert_eq!(s.updated_at, now + Duration::seconds(30));
    }

    #[test]
    fn test_clamp_title() {
        assert_eq!(clamp_title("   ", 50), None);
        assert_eq!(clamp_title("  Plans ", 50).as_deref(), Some("Plans"));
        let long = "é".repeat(80);
        assert_eq!(clamp_title(&long, 50).unwrap().chars().count(), 50);
    }

    // ─── Wire Tests ──────────────────────────────────────────

    #[test]
    fn test_parse_timestamp_variants() {
        assert!(parse_timestamp("2024-01-01T00:00:00Z").is_some());
        assert!(parse_timestamp("2024-01-01T00:00:00+02:00").is_some());
        assert!(parse_timestamp("2024-01-01 08:15:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_chat_reply_original_attachments() {
        let reply: ChatReply = serde_json::from_value(json!({
            "reply": "done",
            "chat_id": 55,
            "originalAttachments": [{ "name": "", "url": "http://x" }]
        }))
        .unwrap();
        assert_eq!(reply.reply.as_deref(), Some("done"));
        assert_eq!(reply.chat_id.as_deref(), Some("55"));
        assert!(reply.attachments.is_empty());
        assert_eq!(reply.original_attachments.unwrap()[0].remote_url(), Some("http://x"));
    }

    #[test]
    fn test_chat_reply_tolerates_missing_fields() {
        let reply: ChatReply = serde_json::from_value(json!({})).unwrap();
        assert_eq!(reply.reply, None);
        assert!(reply.original_attachments.is_none());
        assert!(reply.chat_id.is_none());
    }

    #[test]
    fn test_history_row_keeps_raw_attachment_value() {
        let row: HistoryRow = serde_json::from_value(json!({
            "id": 3,
            "message": "hello",
            "timestamp": "2024-01-01T00:00:00",
            "attachments": "[{\"name\":\"a.txt\"}]",
            "response": null
        }))
        .unwrap();
        assert_eq!(row.id, "3");
        assert!(row.response.is_none());
        assert!(row.attachments.is_string());
        assert!(row.assistant_attachments.is_null());
    }

    #[test]
    fn test_recent_files_body() {
        let recent: RecentFiles = serde_json::from_value(json!({
            "files": [
                { "file": { "original_name": "a.pdf" }, "chat_id": 3, "timestamp": "2024-01-01T00:00:00" },
                { "chat_id": "4" }
            ]
        }))
        .unwrap();
        assert_eq!(recent.files.len(), 2);
        assert_eq!(recent.files[0].chat_id.as_deref(), Some("3"));
        assert!(recent.files[0].timestamp.is_some());
        assert_eq!(recent.files[1].file.explicit_name(), None);
    }

    #[test]
    fn test_stream_preamble() {
        let preamble: StreamPreamble =
            serde_json::from_str(r#"{"attachments":[{"name":"a.png","url":"/a"}]}"#).unwrap();
        assert_eq!(preamble.attachments.len(), 1);
        let empty: StreamPreamble = serde_json::from_str("{}").unwrap();
        assert!(empty.attachments.is_empty());
    }

    // ─── Config / Error / Event Tests ────────────────────────

    #[test]
    fn test_config_defaults() {
        let config = ClientConfig::default();
        assert!(config.streaming);
        assert_eq!(config.default_session_title, DEFAULT_SESSION_TITLE);
        assert_eq!(config.max_title_len, 50);
    }

    #[test]
    fn test_config_partial_json() {
        let config = ClientConfig::from_json(r#"{"api_base":"https://chat.example/","streaming":false}"#)
            .unwrap();
        assert!(!config.streaming);
        assert_eq!(config.api_base(), "https://chat.example");
        assert_eq!(config.max_title_len, 50);
    }

    #[test]
    fn test_config_invalid() {
        assert!(matches!(ClientConfig::from_json("nope"), Err(ChatError::Config(_))));
        assert!(matches!(
            ClientConfig::from_json(r#"{"api_base":""}"#),
            Err(ChatError::Config(_))
        ));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(ChatError::Cancelled.to_string(), "Cancelled");
    }

    #[test]
    fn test_error_from_serde() {
        let err: ChatError = serde_json::from_str::<serde_json::Value>("{{").unwrap_err().into();
        assert!(matches!(err, ChatError::Serialization(_)));
    }

    #[test]
    fn test_store_event_tagged() {
        let json = serde_json::to_value(StoreEvent::MessageUpdated { id: "1".into() }).unwrap();
        assert_eq!(json["type"], "MessageUpdated");
        assert_eq!(json["id"], "1");
    }

    #[test]
    fn test_result_alias() {
        let ok: Result<u8> = Ok(1);
        assert_eq!(ok.unwrap(), 1);
    }
}
