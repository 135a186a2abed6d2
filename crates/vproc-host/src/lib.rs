//! Asynchronous process supervisor: starts programs, mediates their kernel API
//! calls behind capability checks, and tears them down in a fixed order.

pub mod adapters;
pub mod api;
pub mod config;
pub mod error;
pub mod program;
pub mod supervisor;

#[cfg(any(feature = "test-fixtures", test))]
pub mod fixtures;

pub use adapters::traits::{
    Allocation, AssetRegistry, CapabilityChecker, CapabilityDecision, MemoryAllocator,
    ProcessObserver, ProgramLoader, ResourceHost,
};
pub use api::{ApiOutput, ApiRegistry, KernelApi, api_fn};
pub use config::SupervisorConfig;
pub use error::SupervisorError;
pub use program::{ExitContext, Program, ProgramContext, ProgramInfo, ProgramRegistry};
pub use supervisor::{
    AutoStartReport, ProcessInfo, StartOptions, Supervisor, SupervisorBuilder, SupervisorHandle,
};
