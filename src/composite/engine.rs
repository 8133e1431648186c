use crate::comm::{Communicator, MessageTag};
use crate::composite::merge::{MergeRule, flatten_over_background};
use crate::composite::reduce::{ReductionStrategy, reduce_to_owner};
use crate::foundation::core::{PixelFormat, PixelRect, TileLayout, Viewport};
use crate::foundation::error::{SortlastError, SortlastResult};
use crate::image::partial::{DepthPrecision, PartialImage};
use crate::image::raw::RawImage;
use crate::render::camera::{Camera, TargetStateGuard, TiledRegion, compute_tiled_region};
use crate::render::stage::{SceneStage, TileRequest};
use crate::render::target::RenderTarget;

/// Backend behaviors the orchestrator normally switches off because it places results
/// itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineFlags {
    /// Push the composited tile into the target's frame buffer at its physical viewport.
    pub display: bool,
    /// Scale reduced-resolution results back up to the tile's full pixel size.
    pub inflate: bool,
    /// Flatten the result over [`EngineOpts::background`].
    pub correct_background: bool,
}

/// Compositing engine configuration.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EngineOpts {
    /// Per-pixel merge rule.
    pub merge: MergeRule,
    /// Reduction pattern.
    pub strategy: ReductionStrategy,
    /// Linear resolution divisor for interactive frames; 1 is full resolution.
    pub reduction_factor: u32,
    /// Premultiplied RGBA8 background used by background correction.
    pub background: [u8; 4],
    /// Depth element kind of partial images.
    pub depth_precision: DepthPrecision,
    /// Backend behaviors.
    pub flags: EngineFlags,
}

impl Default for EngineOpts {
    fn default() -> Self {
        Self {
            merge: MergeRule::Depth,
            strategy: ReductionStrategy::Tree,
            reduction_factor: 1,
            background: [0, 0, 0, 255],
            depth_precision: DepthPrecision::Single,
            flags: EngineFlags::default(),
        }
    }
}

impl EngineOpts {
    /// Reject settings the engine cannot honor.
    pub fn validate(&self) -> SortlastResult<()> {
        if self.reduction_factor == 0 {
            return Err(SortlastError::configuration(
                "image reduction factor must be at least 1",
            ));
        }
        if self.merge == MergeRule::Blend && self.strategy == ReductionStrategy::Tree {
            return Err(SortlastError::configuration(
                "blend compositing needs the direct-send strategy",
            ));
        }
        Ok(())
    }
}

/// Where one tile's share of the view lands.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TilePlacement {
    /// Row-major tile index.
    pub tile: usize,
    /// Rank that displays the tile.
    pub owner: usize,
    /// Visible part of the tile, in full display pixels.
    pub display_rect: PixelRect,
    /// Same area, normalized to the owner's window.
    pub physical_viewport: Viewport,
    /// Same area, normalized to the whole display.
    pub global_viewport: Viewport,
    /// Camera restricted to this area.
    pub camera: Camera,
}

/// This rank's partial images for one frame, ready for [`CompositeEngine::composite`].
#[derive(Clone, Debug)]
pub struct LocalFrame {
    world_size: usize,
    tiles: Vec<(TilePlacement, PartialImage)>,
}

impl LocalFrame {
    /// Tiles that show part of the view, in row-major order.
    pub fn placements(&self) -> impl Iterator<Item = &TilePlacement> {
        self.tiles.iter().map(|(p, _)| p)
    }

    /// Partial image rendered for `tile`, if the tile shows part of the view.
    pub fn partial(&self, tile: usize) -> Option<&PartialImage> {
        self.tiles
            .iter()
            .find(|(p, _)| p.tile == tile)
            .map(|(_, img)| img)
    }
}

/// Counters for one composited frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct CompositeStats {
    /// Engine-local frame number.
    pub frame: u64,
    /// Tiles reduced this frame (on every rank).
    pub tiles_composited: usize,
    /// Tile this rank owns and received a result for.
    pub owned_tile: Option<usize>,
    /// Fragments this rank received while reducing its own tile.
    pub fragments_received: usize,
    /// Empty contributions seen while reducing its own tile.
    pub empty_contributions: usize,
}

/// Distributed sort-last compositor for one logical view.
///
/// Every rank of the group renders its data partition for each tile the view touches; the
/// partials are then merged onto the rank displaying that tile. All ranks must drive the
/// engine identically: same tile layout, same window size, same viewport and the same
/// number of [`CompositeEngine::composite`] calls.
#[derive(Debug)]
pub struct CompositeEngine {
    opts: EngineOpts,
    tiles: TileLayout,
    frame: u64,
    physical_viewport: Option<Viewport>,
    global_viewport: Option<Viewport>,
    stats: CompositeStats,
}

impl CompositeEngine {
    /// Create an engine for a single, non-tiled window.
    pub fn new(opts: EngineOpts) -> SortlastResult<Self> {
        opts.validate()?;
        Ok(Self {
            opts,
            tiles: TileLayout::SINGLE,
            frame: 0,
            physical_viewport: None,
            global_viewport: None,
            stats: CompositeStats::default(),
        })
    }

    /// Current configuration.
    pub fn opts(&self) -> &EngineOpts {
        &self.opts
    }

    /// Replace the configuration.
    pub fn set_opts(&mut self, opts: EngineOpts) -> SortlastResult<()> {
        opts.validate()?;
        self.opts = opts;
        Ok(())
    }

    /// Display tile grid.
    pub fn tile_layout(&self) -> TileLayout {
        self.tiles
    }

    /// Switch to a different display tile grid.
    pub fn set_tile_layout(&mut self, tiles: TileLayout) {
        self.tiles = tiles;
    }

    /// Linear resolution divisor.
    pub fn image_reduction_factor(&self) -> u32 {
        self.opts.reduction_factor
    }

    /// Render and composite at `1/factor` linear resolution. The view geometry is left
    /// alone; only the size of the partial images shrinks.
    pub fn set_image_reduction_factor(&mut self, factor: u32) -> SortlastResult<()> {
        if factor == 0 {
            return Err(SortlastError::configuration(
                "image reduction factor must be at least 1",
            ));
        }
        self.opts.reduction_factor = factor;
        Ok(())
    }

    /// Prepare the target and engine for a frame whose results the caller places itself.
    ///
    /// Turns off display, inflation and background correction, makes the native viewport
    /// span the whole window, disables the scissor test and clears to transparent black.
    pub fn setup_context<T: RenderTarget + ?Sized>(&mut self, target: &mut T) {
        self.opts.flags = EngineFlags::default();
        target.set_native_viewport(PixelRect::from_extent(target.actual_size()));
        target.set_scissor(None);
        target.clear([0, 0, 0, 0]);
    }

    /// Physical placement of this rank's last composited tile.
    pub fn physical_viewport(&self) -> Option<Viewport> {
        self.physical_viewport
    }

    /// Placement of this rank's last composited tile in the whole display.
    pub fn global_viewport(&self) -> Option<Viewport> {
        self.global_viewport
    }

    /// Counters of the last composited frame.
    pub fn last_stats(&self) -> &CompositeStats {
        &self.stats
    }

    /// Tiles the target's current view touches.
    ///
    /// Fails when the tile grid needs more ranks than the group has.
    pub fn plan_tiles<T: RenderTarget + ?Sized>(
        &self,
        target: &mut T,
        world_size: usize,
    ) -> SortlastResult<Vec<TilePlacement>> {
        let region = compute_tiled_region(target, self.tiles);
        self.plan_region(target, region, world_size)
    }

    fn plan_region<T: RenderTarget + ?Sized>(
        &self,
        target: &T,
        region: TiledRegion,
        world_size: usize,
    ) -> SortlastResult<Vec<TilePlacement>> {
        let count = self.tiles.tile_count();
        if count > world_size {
            return Err(SortlastError::configuration(format!(
                "a {}x{} tile grid needs {count} ranks, the group has {world_size}",
                self.tiles.rows(),
                self.tiles.cols()
            )));
        }
        let window = target.actual_size();
        if window.is_empty() {
            return Ok(Vec::new());
        }
        let display = self.tiles.display_extent(window);
        let view = region.rect();
        if view.is_degenerate() {
            return Ok(Vec::new());
        }
        let camera = target.camera();

        let mut placements = Vec::new();
        for tile in 0..count {
            let Some(tile_rect) = self.tiles.tile_rect(tile, window) else {
                continue;
            };
            let Some(visible) = view.intersect(tile_rect) else {
                continue;
            };
            let in_tile = PixelRect::new(
                visible.x - tile_rect.x,
                visible.y - tile_rect.y,
                visible.width,
                visible.height,
            );
            let in_view = PixelRect::new(
                visible.x - view.x,
                visible.y - view.y,
                visible.width,
                visible.height,
            );
            placements.push(TilePlacement {
                tile,
                owner: tile,
                display_rect: visible,
                physical_viewport: Viewport::from_pixel_rect(in_tile, window)?,
                global_viewport: Viewport::from_pixel_rect(visible, display)?,
                camera: camera.narrowed(&Viewport::from_pixel_rect(in_view, view.extent())?),
            });
        }
        Ok(placements)
    }

    /// Render this rank's partition for every tile the view touches.
    ///
    /// A rank whose stages draw nothing for a tile contributes a transparent, infinitely
    /// far placeholder.
    pub fn render_local<T, C>(
        &self,
        target: &mut T,
        stages: &[Box<dyn SceneStage>],
        comm: &C,
    ) -> SortlastResult<LocalFrame>
    where
        T: RenderTarget + ?Sized,
        C: Communicator + ?Sized,
    {
        let region = compute_tiled_region(target, self.tiles);
        self.render_region(target, region, stages, comm)
    }

    /// [`CompositeEngine::render_local`] for a view region the caller already computed
    /// with [`compute_tiled_region`] under this engine's tile layout.
    pub fn render_region<T, C>(
        &self,
        target: &T,
        region: TiledRegion,
        stages: &[Box<dyn SceneStage>],
        comm: &C,
    ) -> SortlastResult<LocalFrame>
    where
        T: RenderTarget + ?Sized,
        C: Communicator + ?Sized,
    {
        let placements = self.plan_region(target, region, comm.size())?;
        let display = self.tiles.display_extent(target.actual_size());
        let mut tiles = Vec::with_capacity(placements.len());
        for placement in placements {
            let request = TileRequest {
                tile: placement.tile,
                display,
                display_rect: placement.display_rect,
                output: placement
                    .display_rect
                    .extent()
                    .reduced(self.opts.reduction_factor),
                camera: placement.camera,
                precision: self.opts.depth_precision,
            };
            let mut partial = PartialImage::empty(request.output, request.precision);
            for stage in stages {
                stage
                    .render(&request, &mut partial)
                    .map_err(|e| match e {
                        SortlastError::Render(msg) => {
                            SortlastError::render(format!("stage '{}': {msg}", stage.name()))
                        }
                        other => other,
                    })?;
            }
            if partial.is_empty_contribution() {
                tracing::debug!(
                    tile = placement.tile,
                    "nothing to contribute, sending placeholder"
                );
            }
            tiles.push((placement, partial));
        }
        Ok(LocalFrame {
            world_size: comm.size(),
            tiles,
        })
    }

    /// Merge every rank's partials and return this rank's tile.
    ///
    /// Collective. The result is invalid when this rank displays no tile of the view.
    #[tracing::instrument(skip_all, fields(rank = comm.rank(), frame = self.frame))]
    pub fn composite<T, C>(
        &mut self,
        target: &mut T,
        frame: LocalFrame,
        comm: &C,
    ) -> SortlastResult<RawImage>
    where
        T: RenderTarget + ?Sized,
        C: Communicator + ?Sized,
    {
        if frame.world_size != comm.size() {
            return Err(SortlastError::configuration(format!(
                "frame was planned for {} ranks, the group has {}",
                frame.world_size,
                comm.size()
            )));
        }
        let frame_no = self.frame;
        self.frame += 1;
        self.physical_viewport = None;
        self.global_viewport = None;
        let mut stats = CompositeStats {
            frame: frame_no,
            ..CompositeStats::default()
        };

        let mut result = RawImage::invalid();
        for (placement, partial) in frame.tiles {
            let tag = MessageTag::new(
                MessageTag::COMPOSITE,
                (frame_no << 32) | placement.tile as u64,
            );
            let reduced = reduce_to_owner(
                comm,
                placement.owner,
                tag,
                partial,
                self.opts.merge,
                self.opts.strategy,
            )?;
            stats.tiles_composited += 1;
            if let Some(reduced) = reduced {
                stats.owned_tile = Some(placement.tile);
                stats.fragments_received = reduced.fragments_received;
                stats.empty_contributions = reduced.empty_contributions;
                result = self.finish_tile(reduced.image, &placement);
                self.physical_viewport = Some(placement.physical_viewport);
                self.global_viewport = Some(placement.global_viewport);
            }
        }

        if self.opts.flags.display
            && let Some(physical) = self.physical_viewport
        {
            let mut guard = TargetStateGuard::reset_tiles(target);
            guard.set_viewport(physical);
            result.push_to_viewport(&mut *guard)?;
        }

        tracing::debug!(?stats, valid = result.is_valid(), "frame composited");
        self.stats = stats;
        Ok(result)
    }

    /// [`CompositeEngine::render_local`] followed by [`CompositeEngine::composite`].
    pub fn render<T, C>(
        &mut self,
        target: &mut T,
        stages: &[Box<dyn SceneStage>],
        comm: &C,
    ) -> SortlastResult<RawImage>
    where
        T: RenderTarget + ?Sized,
        C: Communicator + ?Sized,
    {
        let frame = self.render_local(target, stages, comm)?;
        self.composite(target, frame, comm)
    }

    fn finish_tile(&self, image: PartialImage, placement: &TilePlacement) -> RawImage {
        let mut raw = image.into_raw_image();
        if !raw.is_valid() {
            return raw;
        }
        if self.opts.flags.correct_background {
            let extent = raw.extent();
            let mut pixels = raw.into_pixels();
            flatten_over_background(&mut pixels, self.opts.background);
            raw = match RawImage::from_pixels(extent, PixelFormat::Rgba8, pixels) {
                Ok(flat) => flat,
                Err(err) => {
                    tracing::warn!(%err, tile = placement.tile, "background correction failed");
                    RawImage::invalid()
                }
            };
        }
        let full = placement.display_rect.extent();
        if self.opts.flags.inflate && raw.extent() != full {
            raw = raw.resized(full);
        }
        raw
    }
}

#[cfg(test)]
#[path = "../../tests/unit/composite/engine.rs"]
mod tests;
