//! Rate Governor - central admission controller for the pipeline.
//!
//! Everything that limits how hard the pipeline pulls on the outside world
//! lives here: the in-flight fetcher cap, the stage worker cap, per-source
//! pacing, the host-resource pause bit, and the per-source circuit
//! breaker. Admission is advisory-free: a job either gets an RAII permit
//! or a typed refusal.

mod breaker;
mod governor;
mod host;

pub use breaker::{BreakerState, CircuitBreaker};
pub use governor::{Admission, DeferReason, FetchPermit, GovernorStatus, RateGovernor};
pub use host::{FixedSampler, HostSample, HostSampler, SysinfoSampler};
