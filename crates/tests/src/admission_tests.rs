use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn full_room_rejects_until_someone_leaves() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@cap.test").await;
    let alice = app.seed_user("alice@cap.test").await;
    let bob = app.seed_user("bob@cap.test").await;
    let room_id = app.live_room(&host, 2).await;

    let resp = app.join(&host, &room_id).await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["admitted"], true);
    assert_eq!(json["occupancy"]["count"], 1);

    let resp = app.join(&alice, &room_id).await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["occupancy"]["count"], 2);
    assert_eq!(json["occupancy"]["remaining"], 0);

    // Third join is rejected with the current occupancy
    let resp = app.join(&bob, &room_id).await;
    assert_eq!(resp.status().as_u16(), 429);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "room_full");
    assert_eq!(json["occupancy"]["count"], 2);
    assert_eq!(json["occupancy"]["remaining"], 0);
    assert_eq!(json["occupancy"]["max"], 2);

    let resp = app.leave(&alice, &room_id).await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["released"], true);
    assert_eq!(json["occupancy"]["count"], 1);

    let resp = app.join(&bob, &room_id).await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["admitted"], true);
    assert_eq!(json["occupancy"]["count"], 2);
}

#[tokio::test]
async fn concurrent_joins_never_exceed_the_ceiling() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@burst.test").await;
    let room_id = app.live_room(&host, 3).await;

    let mut users = Vec::new();
    for i in 0..8 {
        users.push(app.seed_user(&format!("user{}@burst.test", i)).await);
    }

    let responses =
        futures::future::join_all(users.iter().map(|user| app.join(user, &room_id))).await;
    let statuses: Vec<u16> = responses.iter().map(|r| r.status().as_u16()).collect();

    assert_eq!(statuses.iter().filter(|s| **s == 200).count(), 3);
    assert_eq!(statuses.iter().filter(|s| **s == 429).count(), 5);

    let resp = app
        .auth_get(&format!("/api/room/{}/occupancy", room_id), &host.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["count"], 3);
    assert_eq!(json["remaining"], 0);
    assert_eq!(json["max"], 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn double_submitted_join_is_released_by_one_leave() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@double.test").await;
    let alice = app.seed_user("alice@double.test").await;

    for _ in 0..20 {
        let room_id = app.live_room(&host, 5).await;

        let (first, second) = tokio::join!(app.join(&alice, &room_id), app.join(&alice, &room_id));
        assert_eq!(first.status().as_u16(), 200);
        assert_eq!(second.status().as_u16(), 200);

        let left: Value = app.leave(&alice, &room_id).await.json().await.unwrap();
        assert_eq!(left["released"], true);
        assert_eq!(left["occupancy"]["count"], 0);
    }
}

#[tokio::test]
async fn leave_is_idempotent() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@leave.test").await;
    let alice = app.seed_user("alice@leave.test").await;
    let room_id = app.live_room(&host, 5).await;

    app.join(&alice, &room_id).await;

    let first: Value = app.leave(&alice, &room_id).await.json().await.unwrap();
    assert_eq!(first["released"], true);
    assert_eq!(first["participant"]["status"], "approved");
    assert!(first["session"]["leave_time"].is_string());
    assert_eq!(first["occupancy"]["count"], 0);

    let resp = app.leave(&alice, &room_id).await;
    assert_eq!(resp.status().as_u16(), 200);
    let second: Value = resp.json().await.unwrap();
    assert_eq!(second["released"], false);
    assert!(second["session"].is_null());
    assert_eq!(second["occupancy"]["count"], 0);
}

#[tokio::test]
async fn rejoin_while_inside_takes_no_extra_slot() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@rejoin.test").await;
    let alice = app.seed_user("alice@rejoin.test").await;
    let room_id = app.live_room(&host, 5).await;

    let first: Value = app.join(&alice, &room_id).await.json().await.unwrap();
    assert_eq!(first["is_new_participant"], true);
    assert_eq!(first["occupancy"]["count"], 1);

    let second: Value = app.join(&alice, &room_id).await.json().await.unwrap();
    assert_eq!(second["admitted"], true);
    assert_eq!(second["is_new_participant"], false);
    assert_eq!(second["occupancy"]["count"], 1);
}

#[tokio::test]
async fn admitted_join_carries_a_grant_and_connection_target() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@grant.test").await;
    let alice = app.seed_user("alice@grant.test").await;
    let room_id = app.live_room(&host, 5).await;

    let json: Value = app.join(&alice, &room_id).await.json().await.unwrap();
    let room_name = json["room"]["room_name"].as_str().unwrap();
    let grant = &json["grant"];

    assert_eq!(grant["domain"], "meet.test");
    assert_eq!(grant["room_name"], room_name);
    let token = grant["token"].as_str().unwrap();
    assert!(!token.is_empty());
    assert_eq!(
        grant["meeting_url"],
        format!("https://meet.test/{}?jwt={}", room_name, token)
    );
    assert!(grant["expires_at"].is_string());
    assert_eq!(json["is_moderator"], false);
}

#[tokio::test]
async fn unverified_identity_is_forbidden() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@verify.test").await;
    let ghost = app.seed_unverified("ghost@verify.test").await;
    let room_id = app.live_room(&host, 5).await;

    let resp = app.join(&ghost, &room_id).await;
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_get(&format!("/api/room/{}/occupancy", room_id), &host.access_token)
        .send()
        .await
        .unwrap();
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn requests_without_a_token_are_unauthorized() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@anon.test").await;
    let room_id = app.live_room(&host, 5).await;

    let resp = app
        .client
        .post(app.url(&format!("/api/room/{}/join", room_id)))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let resp = app
        .client
        .post(app.url(&format!("/api/room/{}/join", room_id)))
        .header("Authorization", "Bearer not-a-token")
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn access_token_cookie_is_accepted() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@cookie.test").await;
    let room_id = app.live_room(&host, 5).await;

    let resp = app
        .client
        .get(app.url(&format!("/api/room/{}/occupancy", room_id)))
        .header("Cookie", format!("theme=dark; access_token={}", host.access_token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn joining_a_closed_room_is_an_invalid_transition() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@closed.test").await;
    let alice = app.seed_user("alice@closed.test").await;
    let room_id = app.live_room(&host, 5).await;

    app.join(&host, &room_id).await;

    let resp = app
        .auth_patch(&format!("/api/room/{}/status", room_id), &host.access_token)
        .json(&serde_json::json!({ "status": "completed" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["room"]["status"], "completed");
    assert_eq!(json["sessions_closed"], 1);

    let resp = app.join(&alice, &room_id).await;
    assert_eq!(resp.status().as_u16(), 409);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invalid_transition");
}

#[tokio::test]
async fn unknown_room_is_not_found() {
    let app = TestApp::spawn().await;
    let alice = app.seed_user("alice@missing.test").await;

    let resp = app.join(&alice, &bson::oid::ObjectId::new().to_hex()).await;
    assert_eq!(resp.status().as_u16(), 404);

    let resp = app.join(&alice, "not-an-id").await;
    assert_eq!(resp.status().as_u16(), 400);
}
