mod settings;

pub use settings::{BackendKind, LoggingConfig, Settings, StorageConfig};
