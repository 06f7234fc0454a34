use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

use actix_web::dev::Server;
use actix_web::{App, HttpServer, web};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_actix_web::TracingLogger;

use crate::configuration::{DatabaseSettings, Settings};
use crate::dispatch::{CancelHandle, Dispatcher};
use crate::lifecycle::LifecycleManager;
use crate::routes::{
    cancel_campaign, create_campaign, get_campaign, health_check, list_campaigns,
    record_engagement, save_campaign, schedule_campaign, send_campaign, send_test_campaign,
};
use crate::storage::{PgCampaignStore, PgMemberDirectory};

pub struct Application {
    port: u16,
    server: Server,
    cancel: CancelHandle,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, anyhow::Error> {
        let max_in_flight = config.email_client.max_in_flight;
        let email_client = config.email_client.client();
        let connection_pool = get_connection_pool(&config.database);

        let cancel = CancelHandle::new();
        let manager = LifecycleManager::new(
            Arc::new(PgCampaignStore::new(connection_pool.clone())),
            Arc::new(PgMemberDirectory::new(connection_pool)),
            Dispatcher::new(email_client, max_in_flight),
            cancel.clone(),
        );

        let address = format!("{}:{}", config.app.host, config.app.port);
        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr()?.port();
        let server = run(listener, manager)?;

        Ok(Self {
            port,
            server,
            cancel,
        })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    /// Flipping this stops the dispatcher from issuing new sends; in-flight
    /// deliveries drain before the process exits.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub fn run(listener: TcpListener, manager: LifecycleManager) -> Result<Server, std::io::Error> {
    let manager = web::Data::new(manager);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/campaigns", web::post().to(create_campaign))
            .route("/campaigns", web::get().to(list_campaigns))
            .route("/campaigns/{id}", web::get().to(get_campaign))
            .route("/campaigns/{id}", web::put().to(save_campaign))
            .route("/campaigns/{id}/schedule", web::post().to(schedule_campaign))
            .route("/campaigns/{id}/send", web::post().to(send_campaign))
            .route("/campaigns/{id}/test", web::post().to(send_test_campaign))
            .route("/campaigns/{id}/cancel", web::post().to(cancel_campaign))
            .route(
                "/campaigns/{id}/engagement",
                web::post().to(record_engagement),
            )
            .app_data(manager.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_pool(db_config: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(2))
        .connect_lazy_with(db_config.with_db())
}
