use std::path::PathBuf;

/// Application-level constants
pub const APP_NAME: &str = "GroundCite";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory name of the optional sentence-embedding model.
pub const EMBEDDING_MODEL_NAME: &str = "all-MiniLM-L6-v2";

/// Debug builds log at debug level by default.
pub fn is_dev() -> bool {
    cfg!(debug_assertions)
}

/// Filter used when `RUST_LOG` is unset or invalid.
pub fn default_log_filter() -> &'static str {
    if is_dev() {
        "groundcite=debug,info"
    } else {
        "groundcite=info,warn"
    }
}

/// Get the application data directory (~/GroundCite/).
/// `None` when the home directory cannot be determined.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_NAME))
}

/// Get the models directory (for ONNX embeddings)
pub fn models_dir() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join("models"))
}

/// Get the embedding model directory (all-MiniLM-L6-v2)
pub fn embedding_model_dir() -> Option<PathBuf> {
    models_dir().map(|dir| dir.join(EMBEDDING_MODEL_NAME))
}
