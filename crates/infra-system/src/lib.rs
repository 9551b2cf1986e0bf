// Atelier Infrastructure - System Adapters
// Implements core ports against the host and a simulated workload

pub mod simulated_executor;
pub mod system_probe_impl;

pub use simulated_executor::{SimulatedExecutor, SimulationProfile};
pub use system_probe_impl::SystemProbeImpl;
