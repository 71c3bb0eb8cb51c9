use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn creator_joins_as_host() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@roles.test").await;
    let room_id = app.live_room(&host, 5).await;

    let json: Value = app.join(&host, &room_id).await.json().await.unwrap();
    assert_eq!(json["role"], "host");
    assert_eq!(json["reason"], "room_creator");
    assert_eq!(json["is_moderator"], true);
    assert_eq!(json["participant"]["role"], "host");
}

#[tokio::test]
async fn administrator_outranks_host_account() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@admin.test").await;
    let admin = app.seed_admin("admin@admin.test").await;
    let room_id = app.live_room(&host, 5).await;

    let json: Value = app.join(&admin, &room_id).await.json().await.unwrap();
    assert_eq!(json["role"], "cohost");
    assert_eq!(json["reason"], "system_administrator");
    assert_eq!(json["is_moderator"], true);
}

#[tokio::test]
async fn host_account_holder_moderates_other_rooms() {
    let app = TestApp::spawn().await;
    let owner = app.seed_host("owner@holder.test").await;
    let other = app.seed_host("other@holder.test").await;
    let room_id = app.live_room(&owner, 5).await;

    let json: Value = app.join(&other, &room_id).await.json().await.unwrap();
    assert_eq!(json["role"], "cohost");
    assert_eq!(json["reason"], "host_account_holder");
    assert_eq!(json["is_moderator"], true);
}

#[tokio::test]
async fn requested_host_role_is_capped_to_member() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@cap-role.test").await;
    let alice = app.seed_user("alice@cap-role.test").await;
    let guest = app.seed_user("guest@cap-role.test").await;
    let room_id = app.live_room(&host, 5).await;

    let json: Value = app
        .join_with(&alice, &room_id, serde_json::json!({ "requested_role": "host" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(json["role"], "member");
    assert_eq!(json["reason"], "regular_participant");
    assert_eq!(json["is_moderator"], false);

    let json: Value = app
        .join_with(&guest, &room_id, serde_json::json!({ "requested_role": "guest" }))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(json["role"], "guest");
    assert_eq!(json["participant"]["role"], "guest");
}
