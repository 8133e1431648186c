//! Collective reduction of one tile's partial images onto the rank that displays it.

use crate::comm::{Communicator, MessageTag, check_rank};
use crate::composite::merge::{MergeRule, blend_in_order, merge_depth_into, sort_for_blend};
use crate::foundation::error::{SortlastError, SortlastResult};
use crate::image::partial::PartialImage;

/// Communication pattern of the per-tile reduction.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ReductionStrategy {
    /// Binomial tree rooted at the tile owner: `log2(n)` rounds, each rank sends once.
    /// Depth merges only.
    #[default]
    Tree,
    /// Every rank sends its fragment straight to the owner, which merges them all.
    DirectSend,
}

/// What the owner of a tile ends up with.
#[derive(Debug)]
pub(crate) struct Reduced {
    pub(crate) image: PartialImage,
    pub(crate) fragments_received: usize,
    pub(crate) empty_contributions: usize,
}

/// Merge every rank's `partial` onto `owner`. Collective over `comm`.
///
/// Returns `Some` on the owner only.
pub(crate) fn reduce_to_owner<C: Communicator + ?Sized>(
    comm: &C,
    owner: usize,
    tag: MessageTag,
    partial: PartialImage,
    rule: MergeRule,
    strategy: ReductionStrategy,
) -> SortlastResult<Option<Reduced>> {
    check_rank(comm.size(), owner, "tile owner")?;
    match (rule, strategy) {
        (MergeRule::Depth, ReductionStrategy::Tree) => tree_depth(comm, owner, tag, partial),
        (_, ReductionStrategy::DirectSend) => direct_send(comm, owner, tag, partial, rule),
        (MergeRule::Blend, ReductionStrategy::Tree) => Err(SortlastError::configuration(
            "blend compositing needs every fragment at the owner; use the direct-send strategy",
        )),
    }
}

fn tree_depth<C: Communicator + ?Sized>(
    comm: &C,
    owner: usize,
    tag: MessageTag,
    partial: PartialImage,
) -> SortlastResult<Option<Reduced>> {
    let n = comm.size();
    let virtual_rank = (comm.rank() + n - owner) % n;
    let real = |v: usize| (v + owner) % n;

    let mut acc = partial;
    let mut received = 0;
    let mut empty = usize::from(acc.is_empty_contribution());
    let mut mask = 1;
    while mask < n {
        if virtual_rank & mask != 0 {
            comm.send(real(virtual_rank - mask), tag, acc.encode())?;
            return Ok(None);
        }
        let partner = virtual_rank | mask;
        if partner < n {
            let frag = PartialImage::decode(&comm.recv(real(partner), tag)?)?;
            received += 1;
            empty += usize::from(frag.is_empty_contribution());
            merge_depth_into(&mut acc, &frag)?;
        }
        mask <<= 1;
    }
    Ok(Some(Reduced {
        image: acc,
        fragments_received: received,
        empty_contributions: empty,
    }))
}

fn direct_send<C: Communicator + ?Sized>(
    comm: &C,
    owner: usize,
    tag: MessageTag,
    partial: PartialImage,
    rule: MergeRule,
) -> SortlastResult<Option<Reduced>> {
    let me = comm.rank();
    if me != owner {
        comm.send(owner, tag, partial.encode())?;
        return Ok(None);
    }

    let mut fragments = (0..comm.size())
        .filter(|&src| src != me)
        .map(|src| comm.recv(src, tag).and_then(|b| PartialImage::decode(&b)))
        .collect::<SortlastResult<Vec<_>>>()?;
    fragments.insert(me, partial);
    let fragments_received = fragments.len() - 1;
    let empty_contributions = fragments
        .iter()
        .filter(|f| f.is_empty_contribution())
        .count();

    let image = match rule {
        MergeRule::Depth => {
            let mut iter = fragments.into_iter();
            let mut acc = iter
                .next()
                .ok_or_else(|| SortlastError::collective("reduction over an empty group"))?;
            for frag in iter {
                merge_depth_into(&mut acc, &frag)?;
            }
            acc
        }
        MergeRule::Blend => {
            sort_for_blend(&mut fragments);
            blend_in_order(&fragments)?
                .ok_or_else(|| SortlastError::collective("reduction over an empty group"))?
        }
    };
    Ok(Some(Reduced {
        image,
        fragments_received,
        empty_contributions,
    }))
}

#[cfg(test)]
#[path = "../../tests/unit/composite/reduce.rs"]
mod tests;
