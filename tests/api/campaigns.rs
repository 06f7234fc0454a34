use chrono::Utc;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{draft_body, member, spawn_app};

#[tokio::test]
async fn creating_a_draft_returns_201_with_a_draft_campaign() {
    let app = spawn_app().await;

    let response = app.post_campaign(&draft_body()).await;

    assert_eq!(response.status().as_u16(), 201);
    let campaign: serde_json::Value = response.json().await.unwrap();
    assert_eq!(campaign["status"], "draft");
    assert_eq!(campaign["opens"], 0);
    assert!(campaign["sent_at"].is_null());
}

#[tokio::test]
async fn a_blank_title_is_rejected_with_400() {
    let app = spawn_app().await;

    let mut body = draft_body();
    body["title"] = serde_json::json!("   ");
    let response = app.post_campaign(&body).await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn an_unbounded_date_range_audience_is_rejected_with_400() {
    let app = spawn_app().await;

    let mut body = draft_body();
    body["audience"] = serde_json::json!({"mode": "by_join_date_range"});
    let response = app.post_campaign(&body).await;

    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn scheduling_in_the_past_returns_400_and_keeps_the_draft() {
    let app = spawn_app().await;
    let campaign: serde_json::Value = app.post_campaign(&draft_body()).await.json().await.unwrap();
    let id = campaign["id"].as_str().unwrap().to_owned();

    let past = Utc::now() - chrono::Duration::hours(1);
    let response = app
        .post_action_json(&id, "schedule", &serde_json::json!({"scheduled_for": past}))
        .await;

    assert_eq!(response.status().as_u16(), 400);
    let stored: serde_json::Value = app.get_campaign(&id).await.json().await.unwrap();
    assert_eq!(stored["status"], "draft");
    assert!(stored["scheduled_for"].is_null());
}

#[tokio::test]
async fn sending_a_campaign_delivers_to_the_audience_and_reports_counts() {
    let app = spawn_app().await;
    app.directory
        .seed((1..=5).map(|id| member(id, "family")));

    Mock::given(path("/v1/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(5)
        .mount(&app.email_server)
        .await;

    let campaign: serde_json::Value = app.post_campaign(&draft_body()).await.json().await.unwrap();
    let id = campaign["id"].as_str().unwrap().to_owned();

    let response = app.post_action(&id, "send").await;

    assert_eq!(response.status().as_u16(), 200);
    let report: serde_json::Value = response.json().await.unwrap();
    assert_eq!(report["sent"], 5);
    assert_eq!(report["failed"], 0);
    assert_eq!(report["campaign"]["status"], "sent");
    assert!(!report["campaign"]["sent_at"].is_null());
}

#[tokio::test]
async fn a_send_with_zero_deliveries_returns_502_and_keeps_the_prior_state() {
    let app = spawn_app().await;
    app.directory.seed([member(1, "family")]);

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let campaign: serde_json::Value = app.post_campaign(&draft_body()).await.json().await.unwrap();
    let id = campaign["id"].as_str().unwrap().to_owned();

    let response = app.post_action(&id, "send").await;

    assert_eq!(response.status().as_u16(), 502);
    let stored: serde_json::Value = app.get_campaign(&id).await.json().await.unwrap();
    assert_eq!(stored["status"], "draft");
}

#[tokio::test]
async fn a_test_send_contacts_only_the_requesting_operator() {
    let app = spawn_app().await;
    app.directory
        .seed((1..=20).map(|id| member(id, "family")));

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let campaign: serde_json::Value = app.post_campaign(&draft_body()).await.json().await.unwrap();
    let id = campaign["id"].as_str().unwrap().to_owned();

    let response = app
        .post_action_json(
            &id,
            "test",
            &serde_json::json!({"requester_email": "operator@example.com"}),
        )
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let report: serde_json::Value = response.json().await.unwrap();
    assert_eq!(report["sent"], 1);
    // Still a draft: test sends never transition state.
    let stored: serde_json::Value = app.get_campaign(&id).await.json().await.unwrap();
    assert_eq!(stored["status"], "draft");

    let requests = app.email_server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["to"][0]["email"], "operator@example.com");
    assert!(body["subject"].as_str().unwrap().starts_with("[TEST] "));
}

#[tokio::test]
async fn cancelling_a_scheduled_campaign_works_once() {
    let app = spawn_app().await;
    let campaign: serde_json::Value = app.post_campaign(&draft_body()).await.json().await.unwrap();
    let id = campaign["id"].as_str().unwrap().to_owned();

    let future = Utc::now() + chrono::Duration::hours(3);
    let response = app
        .post_action_json(&id, "schedule", &serde_json::json!({"scheduled_for": future}))
        .await;
    assert_eq!(response.status().as_u16(), 200);

    let response = app.post_action(&id, "cancel").await;
    assert_eq!(response.status().as_u16(), 200);
    let cancelled: serde_json::Value = response.json().await.unwrap();
    assert_eq!(cancelled["status"], "cancelled");
    assert!(cancelled["scheduled_for"].is_null());

    // Cancelled is terminal.
    let response = app.post_action(&id, "cancel").await;
    assert_eq!(response.status().as_u16(), 409);
    let response = app.post_action(&id, "send").await;
    assert_eq!(response.status().as_u16(), 409);
}

#[tokio::test]
async fn an_unknown_campaign_id_returns_404() {
    let app = spawn_app().await;

    let response = app.post_action(&uuid::Uuid::new_v4().to_string(), "send").await;

    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn engagement_counters_round_trip_through_the_api() {
    let app = spawn_app().await;
    app.directory.seed([member(1, "family")]);

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&app.email_server)
        .await;

    let campaign: serde_json::Value = app.post_campaign(&draft_body()).await.json().await.unwrap();
    let id = campaign["id"].as_str().unwrap().to_owned();
    app.post_action(&id, "send").await;

    let response = app
        .post_action_json(&id, "engagement", &serde_json::json!({"opens": 12, "clicks": 3}))
        .await;

    assert_eq!(response.status().as_u16(), 200);
    let stored: serde_json::Value = app.get_campaign(&id).await.json().await.unwrap();
    assert_eq!(stored["opens"], 12);
    assert_eq!(stored["clicks"], 3);
}

#[tokio::test]
async fn listing_campaigns_can_filter_by_status() {
    let app = spawn_app().await;
    app.post_campaign(&draft_body()).await;
    app.post_campaign(&draft_body()).await;

    let response = app
        .api_client
        .get(format!("{}/campaigns?status=draft", app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    assert_eq!(response.status().as_u16(), 200);
    let campaigns: serde_json::Value = response.json().await.unwrap();
    assert_eq!(campaigns.as_array().unwrap().len(), 2);

    let response = app
        .api_client
        .get(format!("{}/campaigns?status=sent", app.address))
        .send()
        .await
        .expect("Failed to execute request.");
    let campaigns: serde_json::Value = response.json().await.unwrap();
    assert_eq!(campaigns.as_array().unwrap().len(), 0);
}
