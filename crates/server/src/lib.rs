pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod routes;

use std::sync::Arc;

use services::services::{directory::DbDirectory, tasks::TaskService};
use sqlx::SqlitePool;

use crate::{auth::JwtService, config::ServerConfig};

#[derive(Clone)]
pub struct AppState {
    pool: SqlitePool,
    tasks: TaskService,
    jwt: JwtService,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &ServerConfig) -> Self {
        let directory = Arc::new(DbDirectory::new(pool.clone()));
        let tasks = TaskService::new(pool.clone(), directory, config.max_series_occurrences);
        Self {
            pool,
            tasks,
            jwt: JwtService::new(&config.jwt_secret),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tasks(&self) -> &TaskService {
        &self.tasks
    }

    pub fn jwt(&self) -> &JwtService {
        &self.jwt
    }
}
