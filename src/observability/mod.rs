//! Observability for the dispatch runtime
//!
//! Structured logging setup and per-dispatcher counters.

pub mod logging;
pub mod metrics;

// Re-export for convenience
pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};
pub use metrics::{DispatchSnapshot, DispatchStats};

// Span macros for structured logging
pub use logging::{connection_span, dispatch_span};
