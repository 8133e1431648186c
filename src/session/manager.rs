use std::collections::BTreeMap;

use crate::comm::Communicator;
use crate::foundation::core::{TileLayout, Viewport};
use crate::foundation::error::{SortlastError, SortlastResult};
use crate::image::raw::RawImage;
use crate::render::target::RenderTarget;
use crate::session::orchestrator::SynchronizedView;
use crate::session::registry::{OwnerId, TileRegistry};

/// Every logical view of one process plus the tile registry they share.
///
/// This is the entry point the application layer talks to: views are created and
/// destroyed through it, and each render goes through it so that the registry sees every
/// view's latest tile.
#[derive(Debug, Default)]
pub struct ViewManager {
    registry: TileRegistry,
    views: BTreeMap<OwnerId, SynchronizedView>,
    tiles: TileLayout,
    next_id: u64,
}

impl ViewManager {
    /// Manager for a single, non-tiled window.
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `view`, give it the current tile layout and register an empty
    /// tile for it.
    pub fn on_view_created(&mut self, mut view: SynchronizedView) -> OwnerId {
        let id = OwnerId(self.next_id);
        self.next_id += 1;
        view.engine_mut().set_tile_layout(self.tiles);
        self.registry.register(id);
        self.views.insert(id, view);
        tracing::debug!(view = id.0, "view created");
        id
    }

    /// Drop `id` and its registered tile.
    pub fn on_view_destroyed(&mut self, id: OwnerId) -> Option<SynchronizedView> {
        self.registry.erase(id);
        let view = self.views.remove(&id);
        tracing::debug!(view = id.0, existed = view.is_some(), "view destroyed");
        view
    }

    /// View `id`.
    pub fn view(&self, id: OwnerId) -> Option<&SynchronizedView> {
        self.views.get(&id)
    }

    /// Mutable view `id`.
    pub fn view_mut(&mut self, id: OwnerId) -> Option<&mut SynchronizedView> {
        self.views.get_mut(&id)
    }

    /// Identities of all live views, ascending.
    pub fn view_ids(&self) -> impl Iterator<Item = OwnerId> + '_ {
        self.views.keys().copied()
    }

    /// Shared tile registry.
    pub fn registry(&self) -> &TileRegistry {
        &self.registry
    }

    /// Display tile grid.
    pub fn tile_dimensions(&self) -> TileLayout {
        self.tiles
    }

    /// Switch every view to a `rows x cols` display wall.
    pub fn set_tile_dimensions(&mut self, rows: u32, cols: u32) -> SortlastResult<()> {
        let tiles = TileLayout::new(rows, cols)?;
        self.tiles = tiles;
        for view in self.views.values_mut() {
            view.engine_mut().set_tile_layout(tiles);
        }
        Ok(())
    }

    /// Forward an interactive resolution divisor to view `id`'s engine.
    pub fn set_image_reduction_factor(&mut self, id: OwnerId, factor: u32) -> SortlastResult<()> {
        self.known_view(id)?
            .engine_mut()
            .set_image_reduction_factor(factor)
    }

    /// Render view `id`. Collective over `comm`.
    pub fn render<T, C>(
        &mut self,
        id: OwnerId,
        target: &mut T,
        comm: &C,
    ) -> SortlastResult<RawImage>
    where
        T: RenderTarget,
        C: Communicator + ?Sized,
    {
        let view = self
            .views
            .get_mut(&id)
            .ok_or_else(|| unknown_view(id))?;
        view.render(id, &mut self.registry, target, comm)
    }

    /// Physical placement of view `id`'s last composited tile.
    pub fn physical_viewport(&self, id: OwnerId) -> Option<Viewport> {
        self.views.get(&id).and_then(|v| v.physical_viewport())
    }

    /// Re-paste every view's last tile.
    pub fn flush_all<T: RenderTarget + ?Sized>(&self, target: &mut T) -> SortlastResult<usize> {
        self.registry.flush_all(target)
    }

    fn known_view(&mut self, id: OwnerId) -> SortlastResult<&mut SynchronizedView> {
        self.views.get_mut(&id).ok_or_else(|| unknown_view(id))
    }
}

fn unknown_view(id: OwnerId) -> SortlastError {
    SortlastError::configuration(format!("no view with id {}", id.0))
}

#[cfg(test)]
#[path = "../../tests/unit/session/manager.rs"]
mod tests;
