use std::net::SocketAddr;

use anyhow::Context;
use db::DBService;
use tracing::instrument;

use crate::{AppState, config::ServerConfig, routes};

pub struct Server;

impl Server {
    #[instrument(
        name = "task_server",
        skip(config),
        fields(listen_addr = %config.listen_addr)
    )]
    pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
        let db = DBService::new(&config.database_url)
            .await
            .context("failed to open database and run migrations")?;

        let state = AppState::new(db.pool.clone(), &config);

        let router = routes::router(state);
        let addr: SocketAddr = config
            .listen_addr
            .parse()
            .context("listen address is invalid")?;
        let tcp_listener = tokio::net::TcpListener::bind(addr)
            .await
            .context("failed to bind tcp listener")?;

        tracing::info!(%addr, "task server listening");

        axum::serve(tcp_listener, router.into_make_service())
            .await
            .context("task server failure")?;

        Ok(())
    }
}
