//! Data-parallel per-vertex transforms.
//!
//! Curve bending and terrain probing are pure functions of a vertex's
//! world position and its position in the source mesh's local space. They
//! run over flat buffers with rayon; results are identical to a sequential
//! map because each output depends only on its own input pair.

use glam::Vec3;
use rayon::prelude::*;

/// A stateless `(world, local) -> world` vertex transform.
pub trait VertexTransform: Sync {
    fn apply(&self, world: Vec3, local: Vec3) -> Vec3;
}

impl<F> VertexTransform for F
where
    F: Fn(Vec3, Vec3) -> Vec3 + Sync,
{
    fn apply(&self, world: Vec3, local: Vec3) -> Vec3 {
        self(world, local)
    }
}

/// Apply `transform` to every vertex pair.
///
/// `local` may be empty, in which case each vertex is its own local
/// position. Otherwise it must match `world` in length.
pub fn transform_vertices<T: VertexTransform + ?Sized>(
    transform: &T,
    world: &[Vec3],
    local: &[Vec3],
) -> Vec<Vec3> {
    if local.is_empty() {
        return world.par_iter().map(|&w| transform.apply(w, w)).collect();
    }
    debug_assert_eq!(world.len(), local.len());
    world
        .par_iter()
        .zip(local.par_iter())
        .map(|(&w, &l)| transform.apply(w, l))
        .collect()
}

/// In-place variant of [`transform_vertices`] for when the local buffer is
/// the pre-transform copy of `world`.
pub fn transform_in_place<T: VertexTransform + ?Sized>(transform: &T, world: &mut [Vec3]) {
    world.par_iter_mut().for_each(|w| *w = transform.apply(*w, *w));
}
