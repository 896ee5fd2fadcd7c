//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared configuration and logging primitives."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
//! Shared primitives for the GridFault workspace.
//! This crate exposes configuration loading and tracing initialisation
//! consumed by the engine, the CLI and the integration tests.

pub mod config;
pub mod logging;

pub use config::{
    EngineConfig, LoadedEngineConfig, LoggingConfig, NetworkConfig, SolverConfig,
    TransformerFallbackConfig,
};
pub use logging::{init_console, init_tracing, LogFormat};
