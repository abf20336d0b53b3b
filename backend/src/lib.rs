//! Server-rendered marketplace matching air-conditioner owners with service
//! providers who quote on their jobs.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

pub mod account;
pub mod auth;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod job;
pub mod models;
pub mod proposal;
pub mod provider;
pub mod schema;
pub mod views;

use crate::auth::SessionKeys;
use crate::config::AppConfig;
use crate::db::Database;
use crate::error::AppError;
use crate::views::Views;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub views: Arc<Views>,
    pub sessions: SessionKeys,
}

impl AppState {
    /// Opens the database and compiles the templates.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let db = Database::connect(&config.database_url, config.db_pool_size)?;
        let views = Arc::new(Views::new()?);
        let sessions = SessionKeys::new(
            &config.app_secret,
            config.session_ttl_hours,
            config.cookie_secure,
        );
        Ok(Self { db, views, sessions })
    }
}

pub fn build_router(state: AppState) -> Router {
    let account_routes = Router::new()
        .route("/", get(account::home))
        .route("/register", get(account::register_page).post(account::register))
        .route("/login", get(account::login_page).post(account::login))
        .route("/logout", get(account::logout))
        .route("/dashboard", get(dashboard::dashboard));

    let job_routes = Router::new()
        .route("/jobs", get(job::list_jobs))
        .route("/jobs/post", get(job::post_job_page).post(job::post_job))
        .route("/jobs/:job_id", get(job::job_detail))
        .route("/jobs/:job_id/close", post(job::close_job))
        .route("/jobs/:job_id/propose", post(proposal::propose));

    let provider_routes = Router::new()
        .route("/providers/:provider_id", get(provider::profile_page))
        .route(
            "/me/provider",
            get(provider::my_profile_page).post(provider::save_my_profile),
        )
        .route("/me/portfolio", get(provider::my_portfolio_page))
        .route("/me/portfolio/add", post(provider::add_portfolio_item))
        .route("/me/portfolio/:item_id/delete", post(provider::delete_portfolio_item));

    Router::new()
        .merge(account_routes)
        .merge(job_routes)
        .merge(provider_routes)
        .with_state(state)
}
