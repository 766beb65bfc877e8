use crate::core::{AppConfig, BlobStore};
use crate::routes::carevault_routes;
use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{dev::Server, web::Data, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

pub struct CareVaultWebServer {
    port: u16,
    server: Server,
}

impl CareVaultWebServer {
    pub async fn build(configuration: AppConfig) -> Result<Self, anyhow::Error> {
        let address = format!(
            "{}:{}",
            configuration.carevault_server_config.host, configuration.carevault_server_config.port
        );

        crate::core::jwt_auth::init_jwt_auth(&configuration.jwt_auth_config);

        let postgres_pool = PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect_lazy_with(configuration.postgres.connect());

        let blob_store = BlobStore::new(configuration.blob_storage.clone());

        let listener = TcpListener::bind(address)?;
        let port = listener.local_addr().unwrap().port();

        let server = run(listener, postgres_pool, blob_store).await?;

        Ok(Self { port, server })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

pub async fn run(
    listener: TcpListener,
    postgres_pool: PgPool,
    blob_store: BlobStore,
) -> Result<Server, anyhow::Error> {
    let postgres_pool = Data::new(postgres_pool);
    let blob_store = Data::new(blob_store);

    let server = HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allowed_headers(vec![
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
            ])
            .supports_credentials();
        App::new()
            .configure(carevault_routes)
            .app_data(postgres_pool.clone())
            .app_data(blob_store.clone())
            .wrap(TracingLogger::default())
            .wrap(cors)
    })
    .listen(listener)?
    .run();

    Ok(server)
}
