use std::sync::Arc;

use actix_web::{App, HttpServer};
use anyhow::Context;
use paperclip::actix::{web, OpenApiExt};
use tracing_actix_web::TracingLogger;

use bookstore_service::api::{AuthorDetails, BookDetails, BuyDetails};
use bookstore_service::app_config::config_app;
use bookstore_service::bookstore::Bookstore;
use bookstore_service::repository::{PostgresConnection, PostgresRepository};
use bookstore_service::settings::{DatabaseSettings, Settings, StorageBackend};
use bookstore_service::telemetry::init_telemetry;

async fn postgres_bookstore(settings: &DatabaseSettings) -> anyhow::Result<Bookstore> {
    let connection = PostgresConnection::connect(settings).await?;
    Ok(Bookstore::new(
        Arc::new(
            PostgresRepository::<AuthorDetails>::init(connection.clone(), settings.create_schema)
                .await?,
        ),
        Arc::new(
            PostgresRepository::<BookDetails>::init(connection.clone(), settings.create_schema)
                .await?,
        ),
        Arc::new(
            PostgresRepository::<BuyDetails>::init(connection, settings.create_schema).await?,
        ),
    ))
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_telemetry(&settings.app.name, &settings.telemetry)?;
    tracing::info!(
        app = %settings.app.name,
        version = env!("CARGO_PKG_VERSION"),
        storage = ?settings.storage,
        "Starting application"
    );

    let bookstore = web::Data::new(match settings.storage {
        StorageBackend::InMemory => Bookstore::in_memory(),
        StorageBackend::Postgres => postgres_bookstore(&settings.database)
            .await
            .context("Failed to init postgres")?,
    });

    tracing::info!(
        "starting HTTP server at http://{}:{}",
        settings.server.host,
        settings.server.port
    );
    HttpServer::new(move || {
        App::new()
            .wrap_api()
            .app_data(bookstore.clone())
            .wrap(TracingLogger::default())
            .configure(config_app)
            .with_json_spec_at("/apispec/v2")
            .build()
    })
    .bind((settings.server.host.as_str(), settings.server.port))?
    .run()
    .await?;

    Ok(())
}
