use super::*;

fn channel_entry() -> Value {
    json!({
        "channel": {
            "id": "c-1",
            "type": "messaging",
            "cid": "messaging:c-1",
            "name": "general",
            "member_count": 3,
            "frozen": false,
            "data": {
                "serverId": "s-1",
                "server": "Acme",
                "category": "Text Channels",
                "image": "https://img.example/acme.png"
            }
        },
        "members": [
            { "user_id": "me", "role": "owner" },
            { "user_id": "bob" },
            { "user_id": "carol" }
        ],
        "messages": []
    })
}

#[test]
fn decodes_channel_query_response() {
    let channels = decode_channels(json!({ "channels": [channel_entry()], "duration": "3ms" })).unwrap();

    assert_eq!(channels.len(), 1);
    let channel = &channels[0];
    assert_eq!(channel.id, ChannelId("c-1".into()));
    assert_eq!(channel.kind, "messaging");
    assert_eq!(channel.name.as_deref(), Some("general"));
    assert_eq!(channel.member_count, 3);
    assert_eq!(
        channel.members,
        vec![UserId("me".into()), UserId("bob".into()), UserId("carol".into())]
    );
    assert_eq!(channel.data.server_id, Some(ServerId("s-1".into())));
    assert_eq!(channel.data.server.as_deref(), Some("Acme"));
    assert_eq!(channel.data.category.as_deref(), Some("Text Channels"));
    assert_eq!(channel.data.server_key(), Some("s-1"));
}

#[test]
fn channel_without_metadata_decodes_with_defaults() {
    let body = json!({
        "channel": { "id": "dm-1", "type": "messaging" },
        "members": [{ "user_id": "me" }, { "user_id": "bob" }]
    });

    let channel = decode_channel(body).unwrap();
    assert_eq!(channel.name, None);
    assert_eq!(channel.member_count, 2);
    assert_eq!(channel.data, ChannelData::default());
    assert_eq!(channel.data.server_key(), None);
}

#[test]
fn empty_query_response_has_no_channels() {
    assert!(decode_channels(json!({})).unwrap().is_empty());
    assert!(decode_channels(json!({ "channels": [] })).unwrap().is_empty());
}

#[test]
fn malformed_channel_is_an_error() {
    let err = decode_channel(json!({ "channel": { "type": "messaging" } })).unwrap_err();
    assert!(err.to_string().contains("\"id\""));

    let err = decode_channels(json!({ "channels": {} })).unwrap_err();
    assert!(err.to_string().contains("not an array"));

    assert!(decode_channel(json!({ "channel": { "id": 7, "type": "messaging" } })).is_err());
}

#[test]
fn legacy_channel_is_keyed_by_server_name() {
    let data = ChannelData {
        server: Some("Acme".into()),
        ..Default::default()
    };
    assert_eq!(data.server_key(), Some("Acme"));
}

#[test]
fn display_name_falls_back_to_other_members() {
    let mut channel = decode_channel(channel_entry()).unwrap();
    assert_eq!(channel.display_name(None), "general");

    channel.name = None;
    let me = UserId("me".into());
    assert_eq!(channel.display_name(Some(&me)), "bob, carol");
}

#[test]
fn channel_data_encodes_only_present_fields() {
    let server = Server {
        id: ServerId("s-1".into()),
        name: "Acme".into(),
        image: None,
    };
    let data = ChannelData::for_server(&server, "Voice");
    let encoded = data.encode();

    assert_eq!(encoded, json!({ "serverId": "s-1", "server": "Acme", "category": "Voice" }));
}

#[test]
fn filter_encodes_member_and_count() {
    let filter = ChannelFilter::for_member(UserId("me".into()));
    assert_eq!(
        filter.encode(),
        json!({ "type": "messaging", "members": { "$in": ["me"] } })
    );
    assert_eq!(
        filter.direct_messages().encode(),
        json!({ "type": "messaging", "members": { "$in": ["me"] }, "member_count": 2 })
    );
}

#[test]
fn filter_matches_membership_and_count() {
    let channel = decode_channel(channel_entry()).unwrap();
    let mine = ChannelFilter::for_member(UserId("me".into()));

    assert!(mine.matches(&channel));
    assert!(!mine.clone().direct_messages().matches(&channel));
    assert!(!ChannelFilter::for_member(UserId("dave".into())).matches(&channel));
}

#[test]
fn new_channel_nests_metadata_under_data() {
    let request = NewChannel::messaging(
        "Welcome",
        vec![UserId("me".into())],
        ChannelData {
            category: Some("Text Channels".into()),
            ..Default::default()
        },
    );

    assert_eq!(request.id, None);
    assert_eq!(
        request.encode(),
        json!({
            "data": {
                "name": "Welcome",
                "members": ["me"],
                "data": { "category": "Text Channels" }
            }
        })
    );
}

#[test]
fn new_call_tags_server_and_members() {
    let server = Server {
        id: ServerId("s-1".into()),
        name: "Acme".into(),
        image: None,
    };
    let call = NewCall::for_server(&server, "General Voice Channel", vec![UserId("me".into())]);

    assert_eq!(call.kind, CALL_TYPE);
    assert_eq!(
        call.encode(),
        json!({
            "data": {
                "custom": {
                    "serverId": "s-1",
                    "serverName": "Acme",
                    "callName": "General Voice Channel"
                },
                "members": [{ "user_id": "me" }]
            }
        })
    );
}

#[test]
fn generated_ids_are_unique() {
    assert_ne!(CallId::generate(), CallId::generate());
    assert_ne!(ServerId::generate(), ServerId::generate());
}

#[test]
fn decodes_created_call_id() {
    let id = decode_call_id(json!({ "call": { "id": "call-1", "type": "default" }, "members": [] })).unwrap();
    assert_eq!(id, CallId("call-1".into()));
    assert!(decode_call_id(json!({ "call": {} })).is_err());
}
