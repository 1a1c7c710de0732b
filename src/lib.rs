pub mod config;
pub mod grounding_config; // Backend selection and ranking knobs
pub mod models;
pub mod pipeline;

pub use grounding_config::{GroundingConfig, IndexBackend, LexicalOrdering};
pub use models::{BoundingBox, Claim, DocumentId, Fragment, LocatedCitation, PageDimensions};
pub use pipeline::grounding::{resolve, GroundingError, GroundingReport, GroundingResolver};

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber. Output goes to stderr so stdout
/// stays free for command results. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
