//! Bounding volume hierarchy over the scene's opaque triangles, answering shadow
//! queries.

use alloc::vec::Vec;
use core::fmt;

use arrayvec::ArrayVec;

use crate::light::shader::ShaderCache;
use crate::math::{Aab, FreeCoordinate, FreePoint, FreeVector};
use crate::raycast::Ray;
use crate::scene::{NodeId, SceneAccess};

/// A triangle in world coordinates.
pub type Triangle = [FreePoint; 3];

/// Maximum number of triangles in a leaf node.
pub const LEAF_SIZE: usize = 8;

/// Traversal stack capacity. Median splits over at most `u32::MAX` triangles give a
/// depth of at most 32, and traversal holds at most one entry per level plus one.
const STACK_CAPACITY: usize = 64;

/// Bounding volume hierarchy of triangles, built by recursive median splits along the
/// longest axis of the triangle centroids.
///
/// The hierarchy is immutable; when geometry changes, a new one is built.
#[derive(Clone, Default)]
pub struct Bvh {
    triangles: Vec<Triangle>,
    /// Permutation of triangle indices, such that each leaf covers a contiguous range.
    order: Vec<u32>,
    /// Nodes in depth-first order; the root is at index 0.
    nodes: Vec<Node>,
}

#[derive(Clone, Copy, Debug)]
struct Node {
    bounds: Aab,
    kind: NodeKind,
}

#[derive(Clone, Copy, Debug)]
enum NodeKind {
    Leaf { first: u32, count: u32 },
    Branch { left: u32, right: u32 },
}

impl Bvh {
    /// Builds a hierarchy containing `triangles`.
    ///
    /// Triangles with NaN coordinates are discarded.
    pub fn new(mut triangles: Vec<Triangle>) -> Self {
        triangles.retain(|t| triangle_bounds(t).is_some());
        let len = u32::try_from(triangles.len()).unwrap_or(u32::MAX);
        triangles.truncate(len as usize);

        let mut bvh = Bvh {
            order: (0..len).collect(),
            nodes: Vec::with_capacity(triangles.len() * 2 / LEAF_SIZE + 1),
            triangles,
        };
        if !bvh.triangles.is_empty() {
            bvh.build(0, len);
        }
        bvh
    }

    /// Appends the subtree over `order[begin..end]` and returns its node index.
    fn build(&mut self, begin: u32, end: u32) -> u32 {
        let range = begin as usize..end as usize;
        let mut bounds: Option<Aab> = None;
        let mut centroid_bounds: Option<Aab> = None;
        for &i in &self.order[range.clone()] {
            let triangle = &self.triangles[i as usize];
            if let Some(tb) = triangle_bounds(triangle) {
                bounds = Some(bounds.map_or(tb, |b| b.union(tb)));
            }
            let c = Aab::from_point(centroid(triangle));
            centroid_bounds = Some(centroid_bounds.map_or(c, |b| b.union(c)));
        }

        let index = self.nodes.len() as u32;
        let count = end - begin;
        self.nodes.push(Node {
            bounds: bounds.unwrap_or(Aab::ZERO),
            kind: NodeKind::Leaf { first: begin, count },
        });
        if count as usize <= LEAF_SIZE {
            return index;
        }

        let extent = centroid_bounds.map_or(FreeVector::zero(), |b| b.size().to_vector());
        let mut axis = 0;
        if extent.y > extent.x {
            axis = 1;
        }
        if extent.z > extent.to_array()[axis] {
            axis = 2;
        }

        let mid = begin + count / 2;
        let triangles = &self.triangles;
        self.order[range].select_nth_unstable_by((mid - begin) as usize, |&a, &b| {
            let ca = centroid(&triangles[a as usize]).to_array()[axis];
            let cb = centroid(&triangles[b as usize]).to_array()[axis];
            ca.total_cmp(&cb)
        });

        let left = self.build(begin, mid);
        let right = self.build(mid, end);
        self.nodes[index as usize].kind = NodeKind::Branch { left, right };
        index
    }

    /// Returns whether any triangle blocks the segment from `origin` along the unit
    /// vector `direction`, strictly before `max_distance`.
    pub fn occluded(
        &self,
        origin: FreePoint,
        direction: FreeVector,
        max_distance: FreeCoordinate,
    ) -> bool {
        if self.nodes.is_empty() {
            return false;
        }
        let ray = Ray::new(origin, direction);
        let mut stack: ArrayVec<u32, STACK_CAPACITY> = ArrayVec::new();
        stack.push(0);
        while let Some(index) = stack.pop() {
            let node = self.nodes[index as usize];
            if !ray.intersects_aab_within(node.bounds, max_distance) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf { first, count } => {
                    let leaf = &self.order[first as usize..(first + count) as usize];
                    if leaf.iter().any(|&i| {
                        ray.intersects_triangle_within(self.triangles[i as usize], max_distance)
                    }) {
                        return true;
                    }
                }
                NodeKind::Branch { left, right } => {
                    stack.push(left);
                    stack.push(right);
                }
            }
        }
        false
    }

    /// Number of triangles in the hierarchy.
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of nodes (branches and leaves) in the hierarchy.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Bounds of all triangles, or [`None`] if there are none.
    pub fn bounds(&self) -> Option<Aab> {
        self.nodes.first().map(|root| root.bounds)
    }
}

#[mutants::skip]
impl fmt::Debug for Bvh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bvh")
            .field("triangles", &self.triangles.len())
            .field("nodes", &self.nodes.len())
            .finish_non_exhaustive()
    }
}

fn triangle_bounds(triangle: &Triangle) -> Option<Aab> {
    let [a, b, c] = *triangle;
    Aab::checked_from_lower_upper(a.min(b).min(c), a.max(b).max(c))
}

fn centroid(triangle: &Triangle) -> FreePoint {
    let [a, b, c] = *triangle;
    ((a.to_vector() + b.to_vector() + c.to_vector()) / 3.0).to_point()
}

/// Collects the world-space triangles of every participating, non-sky surface among
/// the given brushes and patches. Nodes that no longer exist are skipped.
pub(crate) fn occluder_triangles(
    access: &SceneAccess<'_>,
    shaders: &mut ShaderCache,
    brushes: impl IntoIterator<Item = NodeId>,
    patches: impl IntoIterator<Item = NodeId>,
) -> Vec<Triangle> {
    let mut triangles = Vec::new();

    for node in brushes {
        let Some(brush) = access.graph.brush(node) else {
            continue;
        };
        let transform = &brush.local_to_world;
        for face in &brush.faces {
            if !brush.face_participates(face)
                || face.winding.len() < 3
                || shaders.is_sky(&face.shader, access)
            {
                continue;
            }
            let v0 = transform.transform_point(face.winding[0]);
            for pair in face.winding[1..].windows(2) {
                triangles.push([
                    v0,
                    transform.transform_point(pair[0]),
                    transform.transform_point(pair[1]),
                ]);
            }
        }
    }

    for node in patches {
        let Some(patch) = access.graph.patch(node) else {
            continue;
        };
        if !patch.participates() || shaders.is_sky(&patch.shader, access) {
            continue;
        }
        let transform = &patch.local_to_world;
        triangles.extend(patch.tessellation.triangles().map(|[a, b, c]| {
            [
                transform.transform_point(a.position),
                transform.transform_point(b.position),
                transform.transform_point(c.position),
            ]
        }));
    }

    triangles
}
