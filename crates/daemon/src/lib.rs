//! Custody daemon: the server side of the key-custody protocol over
//! sqlite and HTTP, plus the local state the `custody` CLI keeps.

// Service modules (daemon functionality)
pub mod blobs;
pub mod database;
pub mod http_server;
pub mod process;
pub mod service_config;
pub mod service_state;

// App state (configuration, paths, keys)
pub mod state;

pub use database::Database;
pub use process::{spawn_service, start_service, ShutdownHandle};
pub use service_config::Config as ServiceConfig;
pub use service_state::State as ServiceState;
pub use state::{AppConfig, AppState, StateError};
