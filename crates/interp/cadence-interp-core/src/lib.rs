//! Cadence Interp Core (engine-agnostic)
//!
//! Bounded per-attribute sample histories, the policy that reconstructs values
//! between (and slightly past) samples, and a per-object registry that drives
//! both once per frame.

pub mod config;
pub mod error;
pub mod functions;
pub mod history;
pub mod policy;
pub mod registry;
pub mod value;

pub use config::InterpSettings;
pub use error::{InterpError, InterpResult};
pub use history::{Bracket, NoteOutcome, Sample, SampleHistory, MIN_SAMPLE_SPACING};
pub use policy::{interpolate, Interpolated, VarFlags};
pub use registry::{VarRegistry, VariableBinding};
pub use value::{Interpolant, LayerState, Value, ValueKind};
