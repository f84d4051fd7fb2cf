use std::net::SocketAddr;

use crate::service_config::DEFAULT_MAX_UPLOAD_SIZE;

#[derive(Debug, Clone)]
pub struct Config {
    // Listen address
    pub listen_addr: SocketAddr,
    // log level for http tracing
    pub log_level: tracing::Level,
    // Largest accepted request body, in bytes
    pub max_upload_size: usize,
}

impl Config {
    pub fn new(listen_addr: SocketAddr) -> Self {
        tracing::info!("Creating HTTP server Config: listen_addr={}", listen_addr);
        Self {
            listen_addr,
            log_level: tracing::Level::INFO,
            max_upload_size: DEFAULT_MAX_UPLOAD_SIZE,
        }
    }

    pub fn with_max_upload_size(mut self, max_upload_size: usize) -> Self {
        self.max_upload_size = max_upload_size;
        self
    }
}
