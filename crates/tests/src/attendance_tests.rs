use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn sessions_are_recorded_per_user_and_room() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@attend.test").await;
    let alice = app.seed_user("alice@attend.test").await;
    let room_id = app.live_room(&host, 5).await;

    app.join(&host, &room_id).await;
    app.join(&alice, &room_id).await;
    app.leave(&alice, &room_id).await;
    app.join(&alice, &room_id).await;

    let json: Value = app
        .auth_get("/api/attendance/me", &alice.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = json["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    let closed = items.iter().find(|i| i["is_active"] == false).unwrap();
    assert!(closed["leave_time"].is_string());
    assert!(closed["duration"]["milliseconds"].as_i64().unwrap() >= 0);
    assert_eq!(json["stats"]["total_sessions"], 2);
    assert_eq!(json["stats"]["active_sessions"], 1);
    assert_eq!(json["stats"]["unique_rooms"], 1);

    let json: Value = app
        .auth_get(&format!("/api/room/{}/attendance", room_id), &host.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["items"].as_array().unwrap().len(), 3);
    assert_eq!(json["stats"]["unique_users"], 2);
    assert_eq!(json["stats"]["role_distribution"]["host"], 1);
    assert_eq!(json["stats"]["role_distribution"]["member"], 2);
}

#[tokio::test]
async fn room_attendance_is_for_moderators() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@attend-mod.test").await;
    let alice = app.seed_user("alice@attend-mod.test").await;
    let room_id = app.live_room(&host, 5).await;
    app.join(&alice, &room_id).await;

    let resp = app
        .auth_get(&format!("/api/room/{}/attendance", room_id), &alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn completing_a_room_closes_open_sessions() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@attend-close.test").await;
    let alice = app.seed_user("alice@attend-close.test").await;
    let room_id = app.live_room(&host, 5).await;
    app.join(&host, &room_id).await;
    app.join(&alice, &room_id).await;

    let json: Value = app
        .auth_patch(&format!("/api/room/{}/status", room_id), &host.access_token)
        .json(&serde_json::json!({ "status": "completed" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["sessions_closed"], 2);

    let json: Value = app
        .auth_get(&format!("/api/room/{}/attendance", room_id), &host.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["stats"]["active_sessions"], 0);
    assert!(json["items"]
        .as_array()
        .unwrap()
        .iter()
        .all(|i| i["leave_time"].is_string()));
}
