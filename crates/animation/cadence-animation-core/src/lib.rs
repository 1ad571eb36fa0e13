//! Cadence Animation Core (engine-agnostic)
//!
//! Reconstructs smooth state for objects whose true state arrives as sparse
//! samples, blends overlay animation layers into a skeletal pose and fires
//! animation events exactly once per pass through their trigger cycle.
//!
//! One [`Engine::update`] call runs the whole frame on the calling thread:
//! interpolation scheduling (parent before child), pose setup, then events.

pub mod accumulate;
pub mod config;
pub mod counter;
pub mod cycle;
pub mod engine;
pub mod error;
pub mod events;
pub mod ids;
pub mod layers;
pub mod merge;
pub mod object;
pub mod outputs;
pub mod pose;
pub mod scheduler;
pub mod skeleton;
pub mod transition;

// Re-exports for consumers (adapters)
pub use accumulate::{
    accumulate_layers, DirectSink, DispatchCache, DispatchTarget, MergedSink, PoseSink,
};
pub use config::Config;
pub use counter::FrameCounter;
pub use engine::Engine;
pub use error::{CoreError, CoreResult};
pub use events::{dispatch_events, EventCursor, EventSink, NEW_SEQUENCE_MARKER};
pub use ids::{IdAllocator, ObjectId, SkeletonId};
pub use layers::{fix_sequence_change, layer_var_name, AnimationLayer, LayerSet, INACTIVE, N_MAX};
pub use merge::{BoneMerge, BoneMergeMap};
pub use object::{AnimatedObject, ParentLink};
pub use outputs::{FiredEvent, FrameDiagnostics, FrameOutputs};
pub use pose::{BoneTransform, PoseBuffer, PoseContext, PoseSource, SampledPoseSource};
pub use scheduler::{hierarchy_order, query_time, FrameTime, InterpolationScheduler};
pub use skeleton::{parse_skeleton_json, AnimEvent, BoneDesc, SequenceDesc, Skeleton};
pub use transition::{FadingSequence, SequenceTransitioner, TransitionEntry};

pub use cadence_interp_core::{LayerState, NoteOutcome, Value, ValueKind, VarFlags};
