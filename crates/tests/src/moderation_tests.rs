use crate::fixtures::test_app::TestApp;
use serde_json::Value;

async fn act(
    app: &TestApp,
    token: &str,
    room_id: &str,
    participant_id: &str,
    action: &str,
) -> reqwest::Response {
    app.auth_patch(
        &format!("/api/room/{}/participant/{}", room_id, participant_id),
        token,
    )
    .json(&serde_json::json!({ "action": action }))
    .send()
    .await
    .unwrap()
}

#[tokio::test]
async fn promote_and_demote_walk_the_role_ladder() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@ladder.test").await;
    let alice = app.seed_user("alice@ladder.test").await;
    let room_id = app.live_room(&host, 5).await;
    app.join(&alice, &room_id).await;
    let pid = app.participant_id(&host, &room_id, &alice).await;

    let resp = act(&app, &host.access_token, &room_id, &pid, "promote").await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["participant"]["role"], "cohost");
    assert_eq!(json["message"], "Participant promoted");

    let resp = act(&app, &host.access_token, &room_id, &pid, "promote").await;
    assert_eq!(resp.status().as_u16(), 409);

    for expected in ["member", "guest"] {
        let json: Value = act(&app, &host.access_token, &room_id, &pid, "demote")
            .await
            .json()
            .await
            .unwrap();
        assert_eq!(json["participant"]["role"], expected);
    }

    let resp = act(&app, &host.access_token, &room_id, &pid, "demote").await;
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn rejoin_after_demotion_reports_the_stored_role() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@demoted.test").await;
    let alice = app.seed_user("alice@demoted.test").await;
    let room_id = app.live_room(&host, 5).await;

    let json: Value = app.join(&alice, &room_id).await.json().await.unwrap();
    assert_eq!(json["role"], "member");
    assert_eq!(json["status"], "joined");

    let pid = app.participant_id(&host, &room_id, &alice).await;
    let resp = act(&app, &host.access_token, &room_id, &pid, "demote").await;
    assert_eq!(resp.status().as_u16(), 200);
    app.leave(&alice, &room_id).await;

    let json: Value = app.join(&alice, &room_id).await.json().await.unwrap();
    assert_eq!(json["admitted"], true);
    assert_eq!(json["role"], "guest");
    assert_eq!(json["participant"]["role"], "guest");
    assert_eq!(json["status"], "joined");
    assert_eq!(json["resolved_role"], "member");
}

#[tokio::test]
async fn host_cannot_be_changed_blocked_or_removed() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@immutable.test").await;
    let admin = app.seed_admin("admin@immutable.test").await;
    let room_id = app.live_room(&host, 5).await;
    app.join(&host, &room_id).await;
    let host_pid = app.participant_id(&host, &room_id, &host).await;

    for action in ["promote", "demote", "block"] {
        let resp = act(&app, &admin.access_token, &room_id, &host_pid, action).await;
        assert_eq!(resp.status().as_u16(), 409, "{action} succeeded on the host");
        let json: Value = resp.json().await.unwrap();
        assert_eq!(json["error"], "invalid_transition");
    }

    let resp = app
        .auth_delete(
            &format!("/api/room/{}/participant/{}", room_id, host_pid),
            &admin.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    let json: Value = app
        .auth_get(&format!("/api/room/{}/participant", room_id), &host.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["items"][0]["role"], "host");
    assert_eq!(json["items"][0]["status"], "joined");
}

#[tokio::test]
async fn blocking_ends_the_session_and_keeps_the_user_out() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@block.test").await;
    let alice = app.seed_user("alice@block.test").await;
    let room_id = app.live_room(&host, 5).await;
    app.join(&host, &room_id).await;
    app.join(&alice, &room_id).await;
    let pid = app.participant_id(&host, &room_id, &alice).await;

    let resp = act(&app, &host.access_token, &room_id, &pid, "block").await;
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["participant"]["status"], "blocked");
    assert_eq!(json["occupancy"]["count"], 1);

    let resp = app.join(&alice, &room_id).await;
    assert_eq!(resp.status().as_u16(), 403);

    // Nothing moves a blocked participant
    let resp = act(&app, &host.access_token, &room_id, &pid, "approve").await;
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn only_moderators_act_on_participants() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@nonmod.test").await;
    let alice = app.seed_user("alice@nonmod.test").await;
    let bob = app.seed_user("bob@nonmod.test").await;
    let room_id = app.live_room(&host, 5).await;
    app.join(&alice, &room_id).await;
    app.join(&bob, &room_id).await;
    let bob_pid = app.participant_id(&host, &room_id, &bob).await;

    let resp = act(&app, &alice.access_token, &room_id, &bob_pid, "block").await;
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_delete(
            &format!("/api/room/{}/participant/{}", room_id, bob_pid),
            &alice.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn moderator_leave_returns_the_slot() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@kick.test").await;
    let alice = app.seed_user("alice@kick.test").await;
    let room_id = app.live_room(&host, 5).await;
    app.join(&alice, &room_id).await;
    let pid = app.participant_id(&host, &room_id, &alice).await;

    let json: Value = act(&app, &host.access_token, &room_id, &pid, "leave")
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(json["participant"]["status"], "approved");
    assert_eq!(json["occupancy"]["count"], 0);

    let json: Value = app.join(&alice, &room_id).await.json().await.unwrap();
    assert_eq!(json["admitted"], true);
    assert_eq!(json["participant"]["status"], "joined");
}

#[tokio::test]
async fn adding_participants() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@add.test").await;
    let alice = app.seed_user("alice@add.test").await;
    let bob = app.seed_user("bob@add.test").await;
    let carol = app.seed_user("carol@add.test").await;
    let room_id = app.live_room(&host, 5).await;
    let path = format!("/api/room/{}/participant", room_id);

    let resp = app
        .auth_post(&path, &host.access_token)
        .json(&serde_json::json!({ "user_id": alice.id, "requested_role": "guest" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "joined");
    assert_eq!(json["role"], "guest");

    let resp = app
        .auth_post(&path, &host.access_token)
        .json(&serde_json::json!({ "user_id": alice.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    // Anyone may add themselves, but not somebody else
    let resp = app
        .auth_post(&path, &bob.access_token)
        .json(&serde_json::json!({ "user_id": bob.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);

    let resp = app
        .auth_post(&path, &bob.access_token)
        .json(&serde_json::json!({ "user_id": carol.id }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // Adding takes no slot
    let json: Value = app
        .auth_get(&format!("/api/room/{}/occupancy", room_id), &host.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn added_participant_waits_in_a_scheduled_room() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@addwait.test").await;
    let alice = app.seed_user("alice@addwait.test").await;
    let room_id = app.scheduled_room(&host, 5).await;

    let json: Value = app
        .auth_post(&format!("/api/room/{}/participant", room_id), &host.access_token)
        .json(&serde_json::json!({ "user_id": alice.id }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["status"], "waiting");
    assert!(json["joined_at"].is_null());
}

#[tokio::test]
async fn invited_participant_joins_through_the_waiting_room() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@invite.test").await;
    let alice = app.seed_user("alice@invite.test").await;
    let room_id = app.scheduled_room(&host, 5).await;
    let path = format!("/api/room/{}/participant", room_id);

    let resp = app
        .auth_post(&path, &host.access_token)
        .json(&serde_json::json!({ "user_id": alice.id, "invite": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 201);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "invited");

    let resp = app
        .auth_post(&path, &alice.access_token)
        .json(&serde_json::json!({ "user_id": alice.id, "invite": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let json: Value = app.join(&alice, &room_id).await.json().await.unwrap();
    assert_eq!(json["admitted"], false);
    assert_eq!(json["status"], "waiting");
    assert_eq!(json["waiting_reason"], "ROOM_NOT_STARTED");

    let json: Value = app.join(&host, &room_id).await.json().await.unwrap();
    assert_eq!(json["participants_auto_joined"], 1);

    let json: Value = app
        .auth_get(&format!("{}?status=joined", path), &host.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 2);
    assert_eq!(json["counts"]["invited"], 0);
}

#[tokio::test]
async fn removing_a_participant_frees_their_slot() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@remove.test").await;
    let alice = app.seed_user("alice@remove.test").await;
    let room_id = app.live_room(&host, 5).await;
    app.join(&alice, &room_id).await;
    let pid = app.participant_id(&host, &room_id, &alice).await;

    let resp = app
        .auth_delete(
            &format!("/api/room/{}/participant/{}", room_id, pid),
            &host.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["removed"], true);
    assert_eq!(json["occupancy"]["count"], 0);

    let resp = app
        .auth_delete(
            &format!("/api/room/{}/participant/{}", room_id, pid),
            &host.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn participant_from_another_room_is_not_found() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@crossroom.test").await;
    let alice = app.seed_user("alice@crossroom.test").await;
    let first = app.live_room(&host, 5).await;
    let second = app.live_room(&host, 5).await;
    app.join(&alice, &first).await;
    let pid = app.participant_id(&host, &first, &alice).await;

    let resp = act(&app, &host.access_token, &second, &pid, "promote").await;
    assert_eq!(resp.status().as_u16(), 404);
}
