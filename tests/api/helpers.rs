use std::collections::BTreeSet;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use secrecy::SecretString;
use uuid::Uuid;
use wiremock::MockServer;

use herald::{
    dispatch::{CancelHandle, Dispatcher},
    domain::{EmailAddress, MemberId, TierId},
    email_client::{EmailClient, SenderIdentity},
    lifecycle::LifecycleManager,
    startup::run,
    storage::{InMemoryCampaignStore, InMemoryMemberDirectory, MemberRecord, MemberStatus},
    telemetry::{get_subscriber, init_subscriber},
};

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".to_string();
    let subscriber_name = "test".to_string();

    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber);
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber);
    }
});

pub struct TestApp {
    pub address: String,
    pub email_server: MockServer,
    pub directory: Arc<InMemoryMemberDirectory>,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn post_campaign(&self, body: &serde_json::Value) -> reqwest::Response {
        self.api_client
            .post(format!("{}/campaigns", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_campaign(&self, id: &str) -> reqwest::Response {
        self.api_client
            .get(format!("{}/campaigns/{id}", self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_action(&self, id: &str, action: &str) -> reqwest::Response {
        self.api_client
            .post(format!("{}/campaigns/{id}/{action}", self.address))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post_action_json(
        &self,
        id: &str,
        action: &str,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        self.api_client
            .post(format!("{}/campaigns/{id}/{action}", self.address))
            .json(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }
}

pub fn member(id: i64, tier: &str) -> MemberRecord {
    MemberRecord {
        id: MemberId(id),
        email: EmailAddress::parse(format!("member{id}@example.com")).unwrap(),
        first_name: format!("First{id}"),
        last_name: format!("Last{id}"),
        tier_id: TierId::new(tier),
        join_date: "2023-01-01".parse().unwrap(),
        renewal_date: "2026-06-01".parse().unwrap(),
        status: MemberStatus::Active,
        archived: false,
        tags: BTreeSet::new(),
    }
}

pub fn draft_body() -> serde_json::Value {
    serde_json::json!({
        "title": "Spring Renewal Drive",
        "subject": "Hi {{first_name}}",
        "body": "<p>Your membership renews {{renewal_date}}</p>",
        "audience": {"mode": "all"},
        "sender_id": Uuid::new_v4(),
    })
}

pub async fn spawn_app() -> TestApp {
    Lazy::force(&TRACING);

    let email_server = MockServer::start().await;
    let email_client = EmailClient::new(
        email_server.uri(),
        SenderIdentity {
            email: EmailAddress::parse("noreply@example.com".into()).unwrap(),
            name: "Membership Desk".into(),
        },
        SecretString::from("test-token"),
        Duration::from_millis(500),
    );

    let directory = Arc::new(InMemoryMemberDirectory::new());
    let manager = LifecycleManager::new(
        Arc::new(InMemoryCampaignStore::new()),
        directory.clone(),
        Dispatcher::new(email_client, 4),
        CancelHandle::new(),
    );

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port.");
    let port = listener.local_addr().unwrap().port();
    let server = run(listener, manager).expect("Failed to bind address.");

    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{port}"),
        email_server,
        directory,
        api_client: reqwest::Client::new(),
    }
}
