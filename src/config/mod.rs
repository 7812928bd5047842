pub mod schema;

pub use schema::{
    AuthConfig, CONFIG_DIR, Config, NotificationConfig, ObservabilityConfig, TransportConfig,
};
