//! sortlast is the image-compositing core of a distributed renderer.
//!
//! A group of cooperating processes each holds one partition of a scene. Every frame,
//! each process renders its partition into a partial image with depth; the partials are
//! merged across the group (sort-last compositing) into one spatially correct frame, which
//! may span a tiled display wall where each process drives one tile.
//!
//! - Describe the process group with a [`Communicator`] ([`LocalGroup`] runs ranks as
//!   threads of one process)
//! - Create [`SynchronizedView`]s and hand them to a [`ViewManager`]
//! - Call [`ViewManager::render`] on every rank, in the same order
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

pub(crate) mod comm;
pub(crate) mod composite;
pub(crate) mod image;
pub(crate) mod render;
pub(crate) mod session;

pub use crate::foundation::core::{Extent, PixelFormat, PixelRect, TileLayout, TileScale, Viewport};
pub use crate::foundation::error::{SortlastError, SortlastResult};

pub use crate::comm::devices::{DeviceAssignment, DevicePolicy, RankShare};
pub use crate::comm::local::{LocalComm, LocalGroup, LocalGroupOpts};
pub use crate::comm::topology::{HostIdentity, ProcessTopology};
pub use crate::comm::{Communicator, MessageTag};
pub use crate::composite::engine::{
    CompositeEngine, CompositeStats, EngineFlags, EngineOpts, LocalFrame, TilePlacement,
};
pub use crate::composite::merge::MergeRule;
pub use crate::composite::reduce::ReductionStrategy;
pub use crate::image::partial::{DepthBuffer, DepthPrecision, PartialImage};
pub use crate::image::raw::RawImage;
pub use crate::render::camera::{
    Camera, TargetState, TargetStateGuard, TiledRegion, compute_tiled_region,
    tiled_size_and_origin,
};
pub use crate::render::post::{BlurStage, FlattenStage, ImageProcessingStage};
pub use crate::render::stage::{BoxPrim, BoxScene, SceneStage, TileRequest};
pub use crate::render::target::{RenderTarget, SoftwareWindow};
pub use crate::session::manager::ViewManager;
pub use crate::session::orchestrator::{RenderPhase, SynchronizedView, ViewOpts};
pub use crate::session::registry::{OwnerId, TileDescriptor, TileRegistry};
