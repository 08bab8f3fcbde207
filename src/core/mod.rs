//! Core functionality of the control plane
//!
//! The request path (limiter, scheduler, proxy, meter) and the fleet
//! control loop (registry, orchestrator, monitor, reconciler, retirement).

pub mod limiter;
pub mod meter;
pub mod models;
pub mod monitor;
pub mod orchestrator;
pub mod proxy;
pub mod reconciler;
pub mod registry;
pub mod retirement;
pub mod scheduler;
pub mod supervision;
