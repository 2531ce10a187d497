//! Quad-pair detection over triangle lists.
//!
//! Two triangles form a logical quad when they share exactly one edge (the
//! diagonal), span four distinct vertices, lie in the same plane, and make a
//! convex quad together. On regular grids a triangle can qualify with more
//! than one neighbour; the neighbour across its longest edge then wins, and
//! a triangle left with several candidates stays unpaired.

use std::collections::{HashMap, HashSet};

use bevy::log::error;
use bevy::math::Vec3;

use crate::{AREA_EPSILON, EPSILON, EdgeKey, triangle_normal};

/// `1 - cos(angle)` allowed between the normals of a coplanar pair.
const COPLANAR_TOLERANCE: f32 = 1e-3;

/// Whether triangles `a` and `b` (indices into `positions`) pair into a quad.
///
/// Inconsistent topology (three shared vertices, or a repeated index making
/// the union something other than four vertices) is reported with `error!`
/// and treated as "no pair".
pub fn quad_pair_qualifies(a: [u32; 3], b: [u32; 3], positions: &[Vec3]) -> bool {
    let a_set: HashSet<u32> = a.into_iter().collect();
    let b_set: HashSet<u32> = b.into_iter().collect();
    let shared = a_set.intersection(&b_set).count();
    let union = a_set.union(&b_set).count();

    match (shared, union) {
        (2, 4) => {}
        (2, _) => {
            error!("Quad pair {a:?}/{b:?} shares an edge but spans {union} vertices; treating as unpaired");
            return false;
        }
        (3, _) => {
            error!("Triangles {a:?} and {b:?} share all three vertices; treating as unpaired");
            return false;
        }
        _ => return false,
    }

    let (Some(pa), Some(pb)) = (resolve(a, positions), resolve(b, positions)) else {
        return false;
    };

    let na = triangle_normal(pa[0], pa[1], pa[2]);
    let nb = triangle_normal(pb[0], pb[1], pb[2]);
    if na == Vec3::ZERO || nb == Vec3::ZERO || na.dot(nb) < 1.0 - COPLANAR_TOLERANCE {
        return false;
    }

    let Some(apex_a) = a.into_iter().find(|i| !b_set.contains(i)) else {
        return false;
    };
    let Some(apex_b) = b.into_iter().find(|i| !a_set.contains(i)) else {
        return false;
    };
    let [d0, d1] = shared_edge(a, &b_set);
    let at = |i: u32| positions[i as usize];
    is_convex_across(at(d0), at(d1), at(apex_a), at(apex_b), (na + nb).normalize())
}

/// For each triangle, its quad partner.
///
/// Pairing is mutual and unique: `pairs[i] == Some(j)` exactly when
/// `pairs[j] == Some(i)`. A triangle with several qualifying neighbours
/// keeps the one across its longest edge, provided that edge is also the
/// neighbour's longest.
pub fn pair_quads(triangles: &[[u32; 3]], positions: &[Vec3]) -> Vec<Option<usize>> {
    let mut by_edge: HashMap<EdgeKey<u32>, Vec<usize>> = HashMap::new();
    for (i, tri) in triangles.iter().enumerate() {
        for edge in triangle_edges(tri) {
            by_edge.entry(edge).or_default().push(i);
        }
    }

    let preferred: Vec<Option<usize>> = triangles
        .iter()
        .enumerate()
        .map(|(i, tri)| {
            let mut candidates: Vec<usize> = triangle_edges(tri)
                .iter()
                .flat_map(|edge| by_edge[edge].iter().copied())
                .filter(|&j| j != i && quad_pair_qualifies(*tri, triangles[j], positions))
                .collect();
            candidates.sort_unstable();
            candidates.dedup();
            break_tie(*tri, &candidates, triangles, positions)
        })
        .collect();

    preferred
        .iter()
        .enumerate()
        .map(|(i, partner)| partner.filter(|&j| preferred[j] == Some(i)))
        .collect()
}

/// The single candidate, or among several the one whose shared edge is the
/// longest edge of both triangles.
fn break_tie(tri: [u32; 3], candidates: &[usize], triangles: &[[u32; 3]], positions: &[Vec3]) -> Option<usize> {
    match candidates {
        [] => None,
        [only] => Some(*only),
        _ => {
            let across_longest: Vec<usize> = candidates
                .iter()
                .copied()
                .filter(|&j| shares_longest_edge(tri, triangles[j], positions))
                .collect();
            match across_longest[..] {
                [only] => Some(only),
                _ => None,
            }
        }
    }
}

/// The four boundary edges of the quad formed by `a` and `b`, excluding the
/// shared diagonal. `None` unless the triangles share exactly one edge.
pub fn quad_exterior_edges<K: Clone + Ord>(a: &[K; 3], b: &[K; 3]) -> Option<[EdgeKey<K>; 4]> {
    let edges_a = triangle_edges(a);
    let edges_b = triangle_edges(b);

    let shared: Vec<&EdgeKey<K>> = edges_a.iter().filter(|edge| edges_b.contains(edge)).collect();
    let [diagonal] = shared[..] else {
        return None;
    };
    let diagonal = diagonal.clone();

    let exterior: Vec<EdgeKey<K>> = edges_a
        .into_iter()
        .chain(edges_b)
        .filter(|edge| *edge != diagonal)
        .collect();
    exterior.try_into().ok()
}

fn triangle_edges<K: Clone + Ord>(tri: &[K; 3]) -> [EdgeKey<K>; 3] {
    [
        EdgeKey::new(tri[0].clone(), tri[1].clone()),
        EdgeKey::new(tri[1].clone(), tri[2].clone()),
        EdgeKey::new(tri[2].clone(), tri[0].clone()),
    ]
}

fn resolve(tri: [u32; 3], positions: &[Vec3]) -> Option<[Vec3; 3]> {
    Some([
        *positions.get(tri[0] as usize)?,
        *positions.get(tri[1] as usize)?,
        *positions.get(tri[2] as usize)?,
    ])
}

fn longest_edge([a, b, c]: [Vec3; 3]) -> f32 {
    a.distance(b).max(b.distance(c)).max(c.distance(a))
}

/// The two vertices of `a` that also belong to `b`.
fn shared_edge(a: [u32; 3], b: &HashSet<u32>) -> [u32; 2] {
    let mut shared = a.into_iter().filter(|i| b.contains(i));
    let first = shared.next().unwrap_or(a[0]);
    [first, shared.next().unwrap_or(first)]
}

fn shares_longest_edge(a: [u32; 3], b: [u32; 3], positions: &[Vec3]) -> bool {
    let (Some(pa), Some(pb)) = (resolve(a, positions), resolve(b, positions)) else {
        return false;
    };
    let [d0, d1] = shared_edge(a, &b.into_iter().collect());
    let diagonal = positions[d0 as usize].distance(positions[d1 as usize]);
    diagonal + EPSILON >= longest_edge(pa) && diagonal + EPSILON >= longest_edge(pb)
}

/// Whether the quad with diagonal `d0`-`d1` and opposite corners `apex_a`,
/// `apex_b` is strictly convex: each diagonal separates the other's ends.
fn is_convex_across(d0: Vec3, d1: Vec3, apex_a: Vec3, apex_b: Vec3, normal: Vec3) -> bool {
    let size_sq = d0.distance_squared(d1).max(apex_a.distance_squared(apex_b));
    let tolerance = AREA_EPSILON * size_sq;
    let side = |from: Vec3, to: Vec3, point: Vec3| normal.dot((to - from).cross(point - from));
    let separates = |s: f32, t: f32| (s > tolerance && t < -tolerance) || (s < -tolerance && t > tolerance);
    separates(side(d0, d1, apex_a), side(d0, d1, apex_b))
        && separates(side(apex_a, apex_b, d0), side(apex_a, apex_b, d1))
}
