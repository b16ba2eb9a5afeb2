pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod socket;

use std::sync::Arc;

use config::Config;
use db::users::UserStore;
use socket::rooms::RoomRegistry;

/// Shared application state available to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<dyn UserStore>,
    pub rooms: Arc<RoomRegistry>,
}
