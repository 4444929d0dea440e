// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod api;
pub mod app_dirs;
pub mod backup;
pub mod config;
pub mod error;
pub mod loader;
pub mod logging;
pub mod participant;
pub mod phase;
pub mod recorder;
pub mod runtime;
pub mod session;
pub mod stimulus;
pub mod submitter;
pub mod timer;
