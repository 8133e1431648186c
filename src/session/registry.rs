use std::collections::BTreeMap;

use crate::foundation::core::Viewport;
use crate::foundation::error::SortlastResult;
use crate::image::raw::RawImage;
use crate::render::camera::TargetStateGuard;
use crate::render::target::RenderTarget;

/// Identity of a logical view sharing a physical window.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct OwnerId(pub u64);

/// Last composited image of one logical view and where it goes.
#[derive(Clone, Debug, PartialEq)]
pub struct TileDescriptor {
    /// View the tile belongs to.
    pub owner: OwnerId,
    /// Composited pixels; invalid until the view has produced a tile.
    pub image: RawImage,
    /// Placement inside this process's window.
    pub physical_viewport: Viewport,
    /// Placement inside the whole display.
    pub global_viewport: Viewport,
}

impl TileDescriptor {
    /// Descriptor with no image yet.
    pub fn empty(owner: OwnerId) -> Self {
        Self {
            owner,
            image: RawImage::invalid(),
            physical_viewport: Viewport::FULL,
            global_viewport: Viewport::FULL,
        }
    }
}

/// Per-process record of every logical view's last good tile, so that views not redrawn
/// this frame can be re-pasted after another view cleared the shared window.
#[derive(Clone, Debug, Default)]
pub struct TileRegistry {
    tiles: BTreeMap<OwnerId, TileDescriptor>,
}

impl TileRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an empty descriptor for `owner` unless one exists. Returns `true` if added.
    pub fn register(&mut self, owner: OwnerId) -> bool {
        if self.tiles.contains_key(&owner) {
            return false;
        }
        self.tiles.insert(owner, TileDescriptor::empty(owner));
        true
    }

    /// Insert or replace `owner`'s tile.
    pub fn update(
        &mut self,
        owner: OwnerId,
        image: RawImage,
        physical_viewport: Viewport,
        global_viewport: Viewport,
    ) {
        self.tiles.insert(
            owner,
            TileDescriptor {
                owner,
                image,
                physical_viewport,
                global_viewport,
            },
        );
    }

    /// `owner`'s tile, if registered.
    pub fn get(&self, owner: OwnerId) -> Option<&TileDescriptor> {
        self.tiles.get(&owner)
    }

    /// Forget `owner`'s tile.
    pub fn erase(&mut self, owner: OwnerId) -> Option<TileDescriptor> {
        self.tiles.remove(&owner)
    }

    /// Number of registered views.
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    /// `true` when no view is registered.
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Registered owners in ascending order.
    pub fn owners(&self) -> impl Iterator<Item = OwnerId> + '_ {
        self.tiles.keys().copied()
    }

    /// Re-paste every valid tile into its physical viewport.
    ///
    /// Each paste runs with tile-scale `(1,1)` and a full tile-viewport, and the target's
    /// state is restored after every entry. A failed paste does not stop the others; the
    /// first failure is returned once all entries were processed. Returns the number of
    /// tiles pasted.
    pub fn flush_all<T: RenderTarget + ?Sized>(&self, target: &mut T) -> SortlastResult<usize> {
        let mut pasted = 0;
        let mut first_err = None;
        for tile in self.tiles.values().filter(|t| t.image.is_valid()) {
            let mut guard = TargetStateGuard::reset_tiles(target);
            guard.set_viewport(tile.physical_viewport);
            match tile.image.push_to_viewport(&mut *guard) {
                Ok(()) => pasted += 1,
                Err(err) => {
                    tracing::warn!(owner = tile.owner.0, %err, "tile paste failed");
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(pasted),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/registry.rs"]
mod tests;
