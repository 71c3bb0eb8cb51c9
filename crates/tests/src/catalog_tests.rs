use crate::fixtures::test_app::TestApp;
use serde_json::Value;

#[tokio::test]
async fn room_list_filters_and_paginates() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@list.test").await;
    let other = app.seed_host("other@list.test").await;

    for _ in 0..3 {
        app.scheduled_room(&host, 5).await;
    }
    app.live_room(&host, 5).await;
    app.scheduled_room(&other, 5).await;

    let resp = app
        .auth_get("/api/room?status=scheduled&page=2&per_page=2", &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["total"], 4);
    assert_eq!(json["total_pages"], 2);
    assert_eq!(json["page"], 2);
    assert_eq!(json["items"].as_array().unwrap().len(), 2);

    let json: Value = app
        .auth_get(
            &format!("/api/room?created_by={}", other.id),
            &host.access_token,
        )
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["items"][0]["created_by"], other.id);

    let resp = app
        .auth_get("/api/room?created_by=nope", &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn search_and_per_user_listing() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@search.test").await;
    let other = app.seed_host("other@search.test").await;

    for (owner, title) in [
        (&host, "Quarterly Planning"),
        (&host, "Design critique"),
        (&other, "planning poker"),
    ] {
        app.create_room(
            owner,
            serde_json::json!({
                "title": title,
                "start_time": "09:00",
                "end_time": "10:00",
            }),
        )
        .await;
    }

    let json: Value = app
        .auth_get("/api/room/search?q=PLANNING", &host.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 2);

    let json: Value = app
        .auth_get(
            "/api/room/search?q=planning&to_date=2000-01-01T00:00:00Z",
            &host.access_token,
        )
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 0);

    let json: Value = app
        .auth_get(&format!("/api/room/user/{}", host.id), &other.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 2);
    assert!(
        json["items"]
            .as_array()
            .unwrap()
            .iter()
            .all(|r| r["created_by"] == host.id)
    );
}

#[tokio::test]
async fn timeline_lists_own_rooms_for_the_month() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@timeline.test").await;
    let other = app.seed_host("other@timeline.test").await;
    app.scheduled_room(&host, 5).await;
    app.live_room(&host, 5).await;
    app.scheduled_room(&other, 5).await;

    let json: Value = app
        .auth_get("/api/room/timeline", &host.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 2);
    // newest first
    assert_eq!(json["items"][0]["status"], "live");
    assert!(json["date_range"]["start"].is_string());

    let resp = app
        .auth_get(
            "/api/room/timeline?start=2000-01-01T00:00:00Z",
            &host.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let json: Value = app
        .auth_get(
            "/api/room/timeline?start=2000-01-01T00:00:00Z&end=2000-02-01T00:00:00Z",
            &host.access_token,
        )
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["total"], 0);
}

#[tokio::test]
async fn moderators_update_room_details() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@update.test").await;
    let alice = app.seed_user("alice@update.test").await;
    let room_id = app.scheduled_room(&host, 5).await;

    let resp = app
        .auth_patch(&format!("/api/room/{}", room_id), &host.access_token)
        .json(&serde_json::json!({ "title": "Renamed", "max_participants": 9 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["title"], "Renamed");
    assert_eq!(json["max_participants"], 9);
    assert_eq!(json["status"], "scheduled");

    let occupancy: Value = app
        .auth_get(&format!("/api/room/{}/occupancy", room_id), &host.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(occupancy["max"], 9);

    let resp = app
        .auth_patch(&format!("/api/room/{}", room_id), &alice.access_token)
        .json(&serde_json::json!({ "title": "Mine now" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_patch(&format!("/api/room/{}", room_id), &host.access_token)
        .json(&serde_json::json!({ "start_time": "4pm" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[tokio::test]
async fn live_room_ceiling_cannot_drop() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@ceiling.test").await;
    let room_id = app.live_room(&host, 5).await;

    let resp = app
        .auth_patch(&format!("/api/room/{}", room_id), &host.access_token)
        .json(&serde_json::json!({ "max_participants": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "conflict");

    app.auth_patch(&format!("/api/room/{}/status", room_id), &host.access_token)
        .json(&serde_json::json!({ "status": "completed" }))
        .send()
        .await
        .unwrap();
    let resp = app
        .auth_patch(&format!("/api/room/{}", room_id), &host.access_token)
        .json(&serde_json::json!({ "title": "Too late" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["error"], "invalid_transition");
}

#[tokio::test]
async fn delete_waits_for_the_room_to_end_and_keeps_history() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@delete.test").await;
    let alice = app.seed_user("alice@delete.test").await;
    let room_id = app.live_room(&host, 5).await;
    app.join(&alice, &room_id).await;

    let resp = app
        .auth_delete(&format!("/api/room/{}", room_id), &alice.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_delete(&format!("/api/room/{}", room_id), &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    app.auth_patch(&format!("/api/room/{}/status", room_id), &host.access_token)
        .json(&serde_json::json!({ "status": "completed" }))
        .send()
        .await
        .unwrap();

    let resp = app
        .auth_delete(&format!("/api/room/{}", room_id), &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["deleted"], true);
    assert_eq!(json["participants_removed"], 1);

    let resp = app
        .auth_get(&format!("/api/room/{}", room_id), &host.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);

    // alice's history outlives the room
    let json: Value = app
        .auth_get("/api/attendance/me", &alice.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(json["items"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn admin_deletes_an_empty_scheduled_room() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@admindel.test").await;
    let admin = app.seed_admin("admin@admindel.test").await;
    let room_id = app.scheduled_room(&host, 5).await;

    let resp = app
        .auth_delete(&format!("/api/room/{}", room_id), &admin.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["participants_removed"], 0);
}

#[tokio::test]
async fn attendance_record_read_and_correction() {
    let app = TestApp::spawn().await;
    let host = app.seed_host("host@record.test").await;
    let alice = app.seed_user("alice@record.test").await;
    let bob = app.seed_user("bob@record.test").await;
    let room_id = app.live_room(&host, 5).await;

    app.join(&alice, &room_id).await;
    let mine: Value = app
        .auth_get("/api/attendance/me", &alice.access_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let record_id = mine["items"][0]["id"].as_str().unwrap().to_string();
    let join_time = mine["items"][0]["join_time"].as_str().unwrap().to_string();
    let path = format!("/api/attendance/{}", record_id);

    let resp = app.auth_get(&path, &alice.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let resp = app.auth_get(&path, &host.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let resp = app.auth_get(&path, &bob.access_token).send().await.unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // open sessions are corrected only after they close
    let resp = app
        .auth_patch(&path, &host.access_token)
        .json(&serde_json::json!({ "role": "guest" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    app.leave(&alice, &room_id).await;

    let resp = app
        .auth_patch(&path, &alice.access_token)
        .json(&serde_json::json!({ "role": "host" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_patch(&path, &host.access_token)
        .json(&serde_json::json!({ "leave_time": "2000-01-01T00:00:00Z" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let resp = app
        .auth_patch(&path, &host.access_token)
        .json(&serde_json::json!({ "role": "guest" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["role"], "guest");
    assert_eq!(json["join_time"], join_time.as_str());
    assert_eq!(json["is_active"], false);

    let resp = app
        .auth_get(
            &format!("/api/attendance/{}", bson::oid::ObjectId::new().to_hex()),
            &host.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}
