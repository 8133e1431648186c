use crate::comm::Communicator;
use crate::composite::engine::{CompositeEngine, EngineOpts};
use crate::foundation::core::{PixelRect, TileScale, Viewport};
use crate::foundation::error::SortlastResult;
use crate::image::raw::RawImage;
use crate::render::camera::{Camera, TargetStateGuard, compute_tiled_region};
use crate::render::post::ImageProcessingStage;
use crate::render::stage::SceneStage;
use crate::render::target::RenderTarget;
use crate::session::registry::{OwnerId, TileRegistry};

/// Steps of one render request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize)]
pub enum RenderPhase {
    /// Waiting for a request.
    Idle,
    /// Region computed, backend context prepared.
    RenderRequested,
    /// Scene stages drawing this rank's partition.
    LocalRendering,
    /// Collective merge of partial images.
    Compositing,
    /// Image-processing stage over the pasted composite.
    PostProcessing,
    /// Registry update and re-paste of every tile.
    WritingBack,
}

/// Per-view settings.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ViewOpts {
    /// Compositing engine configuration.
    pub engine: EngineOpts,
    /// Paste results into the window and keep them in the tile registry. Off when a
    /// higher-level compositor consumes [`SynchronizedView::last_image`] instead.
    pub write_back: bool,
    /// Renderer viewport the view occupies.
    pub viewport: Viewport,
    /// Camera of the view.
    pub camera: Camera,
}

impl Default for ViewOpts {
    fn default() -> Self {
        Self {
            engine: EngineOpts::default(),
            write_back: true,
            viewport: Viewport::FULL,
            camera: Camera::default(),
        }
    }
}

/// One logical view driven through the distributed render pass.
///
/// Renders run `Idle -> RenderRequested -> LocalRendering -> Compositing ->
/// [PostProcessing] -> [WritingBack] -> Idle`. The view applies its own viewport and camera
/// to the shared window for the duration of a render and puts the previous ones back
/// afterwards, so several views can take turns on one window.
pub struct SynchronizedView {
    engine: CompositeEngine,
    stages: Vec<Box<dyn SceneStage>>,
    post: Option<Box<dyn ImageProcessingStage>>,
    write_back: bool,
    viewport: Viewport,
    camera: Camera,
    phase: RenderPhase,
    phases: Vec<RenderPhase>,
    reduced_image: RawImage,
    full_image: RawImage,
}

impl std::fmt::Debug for SynchronizedView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynchronizedView")
            .field("engine", &self.engine)
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("post", &self.post.as_ref().map(|p| p.name()))
            .field("write_back", &self.write_back)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl SynchronizedView {
    /// Create a view with no stages.
    pub fn new(opts: ViewOpts) -> SortlastResult<Self> {
        Ok(Self {
            engine: CompositeEngine::new(opts.engine)?,
            stages: Vec::new(),
            post: None,
            write_back: opts.write_back,
            viewport: opts.viewport,
            camera: opts.camera,
            phase: RenderPhase::Idle,
            phases: Vec::new(),
            reduced_image: RawImage::invalid(),
            full_image: RawImage::invalid(),
        })
    }

    /// Append a scene stage; stages run in insertion order.
    pub fn push_stage(&mut self, stage: Box<dyn SceneStage>) {
        self.stages.push(stage);
    }

    /// Builder form of [`SynchronizedView::push_stage`].
    pub fn with_stage(mut self, stage: Box<dyn SceneStage>) -> Self {
        self.push_stage(stage);
        self
    }

    /// Names of the scene stages, in order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Install or remove the image-processing stage.
    pub fn set_post_processing(&mut self, stage: Option<Box<dyn ImageProcessingStage>>) {
        self.post = stage;
    }

    /// The view's compositing engine.
    pub fn engine(&self) -> &CompositeEngine {
        &self.engine
    }

    /// Mutable access to the view's compositing engine.
    pub fn engine_mut(&mut self) -> &mut CompositeEngine {
        &mut self.engine
    }

    /// Renderer viewport of the view.
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Move the view within the window.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Camera of the view.
    pub fn camera(&self) -> Camera {
        self.camera
    }

    /// Point the view's camera elsewhere.
    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    /// Whether results are written back to the window.
    pub fn write_back(&self) -> bool {
        self.write_back
    }

    /// Toggle write-back.
    pub fn set_write_back(&mut self, enabled: bool) {
        self.write_back = enabled;
    }

    /// Current phase; `Idle` outside of [`SynchronizedView::render`].
    pub fn phase(&self) -> RenderPhase {
        self.phase
    }

    /// Phases visited by the last render, ending with `Idle`.
    pub fn last_phases(&self) -> &[RenderPhase] {
        &self.phases
    }

    /// Last composited tile, at the reduced resolution it was composited at or scaled up
    /// to its physical size. Invalid when the last render produced no tile.
    pub fn last_image(&self, reduced: bool) -> &RawImage {
        if reduced {
            &self.reduced_image
        } else {
            &self.full_image
        }
    }

    /// Physical placement of the last composited tile.
    pub fn physical_viewport(&self) -> Option<Viewport> {
        self.engine.physical_viewport()
    }

    /// Render one frame of this view. Collective over `comm`.
    ///
    /// Returns this rank's composited tile, which is invalid when the rank displays no part
    /// of the view. The phase is back to `Idle` on return, also on error.
    pub fn render<T, C>(
        &mut self,
        owner: OwnerId,
        registry: &mut TileRegistry,
        target: &mut T,
        comm: &C,
    ) -> SortlastResult<RawImage>
    where
        T: RenderTarget,
        C: Communicator + ?Sized,
    {
        self.phases.clear();
        self.reduced_image.invalidate();
        self.full_image.invalidate();
        let result = self.run_phases(owner, registry, target, comm);
        self.enter(RenderPhase::Idle);
        result
    }

    fn enter(&mut self, phase: RenderPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "render phase");
        self.phase = phase;
        self.phases.push(phase);
    }

    fn run_phases<T, C>(
        &mut self,
        owner: OwnerId,
        registry: &mut TileRegistry,
        target: &mut T,
        comm: &C,
    ) -> SortlastResult<RawImage>
    where
        T: RenderTarget,
        C: Communicator + ?Sized,
    {
        let mut guard = TargetStateGuard::save(target);
        guard.set_culling(false);
        guard.set_viewport(self.viewport);
        guard.set_camera(self.camera);

        self.enter(RenderPhase::RenderRequested);
        let region = compute_tiled_region(&mut *guard, self.engine.tile_layout());
        tracing::debug!(?region, "view region");
        self.engine.setup_context(&mut *guard);

        self.enter(RenderPhase::LocalRendering);
        let frame = self.engine.render_region(&*guard, region, &self.stages, comm)?;

        self.enter(RenderPhase::Compositing);
        let mut image = self.engine.composite(&mut *guard, frame, comm)?;
        let placement = self
            .engine
            .physical_viewport()
            .zip(self.engine.global_viewport())
            .filter(|_| image.is_valid());

        match placement {
            Some((physical, _)) => {
                if self.post.is_some() {
                    self.enter(RenderPhase::PostProcessing);
                }
                if let Some(post) = self.post.as_deref() {
                    image = paste_and_process(&mut *guard, &image, &physical, post)?;
                }

                self.reduced_image = image.clone();
                let size = guard.actual_size();
                self.full_image = image.resized(physical.to_pixel_rect(size).extent());
                if !self.full_image.is_valid() {
                    self.full_image = image.clone();
                }
            }
            None => tracing::debug!(rank = comm.rank(), "no tile for this rank this frame"),
        }

        // setup_context cleared the window; other views are re-pasted even without a tile.
        if self.write_back {
            self.enter(RenderPhase::WritingBack);
            if let Some((physical, global)) = placement {
                registry.update(owner, image.clone(), physical, global);
            }
            registry.flush_all(&mut *guard)?;
        }
        Ok(image)
    }
}

/// Paste `image` at the origin of the frame buffer at its physical size, run `stage` over
/// it and read the processed pixels back. Target state is restored on return.
fn paste_and_process<T: RenderTarget>(
    target: &mut T,
    image: &RawImage,
    physical: &Viewport,
    stage: &dyn ImageProcessingStage,
) -> SortlastResult<RawImage> {
    let mut guard = TargetStateGuard::save(target);
    let local = physical.translated_to_origin();
    guard.set_tile_scale(TileScale::ONE);
    guard.set_tile_viewport(Viewport::FULL);
    guard.set_viewport(local);
    let size = guard.actual_size();
    let region = local.to_pixel_rect(size);
    guard.set_native_viewport(PixelRect::from_extent(size));
    guard.set_scissor(None);

    image.push_to_viewport(&mut *guard)?;
    stage.process(&mut *guard, region)?;
    Ok(RawImage::capture(&*guard, region))
}

#[cfg(test)]
#[path = "../../tests/unit/session/orchestrator.rs"]
mod tests;
