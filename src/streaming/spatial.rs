//! Desired chunk set around the player, ordered nearest first.
//!
//! Distance is Chebyshev (square rings), so the set for buffer radius `r` is
//! exactly the `(2r+1)²` cells of the square centred on the player. Within a
//! ring, cells are ordered by squared Euclidean distance and then by angle,
//! counter-clockwise from +x. All comparisons are integer, so the order is
//! identical on every platform.

use std::cmp::Ordering;

use crate::streaming::coord::ChunkCoord;
use crate::streaming::lod::{tier_from_distance, LodTier};
use crate::streaming::profile::PerformanceProfile;

/// A coordinate the player wants resident, tagged with its LOD band
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DesiredChunk {
    pub coord: ChunkCoord,
    pub lod: LodTier,
}

/// Grid offset with its precomputed band
#[derive(Clone, Copy, Debug)]
struct RingOffset {
    dx: i32,
    dz: i32,
    lod: LodTier,
}

/// Precomputed, ordered offsets for one profile.
///
/// Rebuilt when the profile changes; `desired_chunks` only translates the
/// table, so every call is O(buffer²) and independent of earlier calls.
#[derive(Clone, Debug)]
pub struct SpatialIndex {
    offsets: Vec<RingOffset>,
    buffer_distance: u32,
}

impl SpatialIndex {
    /// Build the offset table for a profile
    pub fn new(profile: &PerformanceProfile) -> Self {
        let radius = profile.buffer_distance as i32;
        let side = (2 * radius + 1) as usize;
        let mut offsets = Vec::with_capacity(side * side);

        for dx in -radius..=radius {
            for dz in -radius..=radius {
                let distance = dx.unsigned_abs().max(dz.unsigned_abs());
                let lod = tier_from_distance(distance, profile);
                offsets.push(RingOffset { dx, dz, lod });
            }
        }

        offsets.sort_by(|a, b| ring_order((a.dx, a.dz), (b.dx, b.dz)));

        Self {
            offsets,
            buffer_distance: profile.buffer_distance,
        }
    }

    /// Every coordinate within the buffer radius of `center`, nearest first
    pub fn desired_chunks(&self, center: ChunkCoord) -> Vec<DesiredChunk> {
        self.offsets
            .iter()
            .map(|o| DesiredChunk {
                coord: center.offset(o.dx, o.dz),
                lod: o.lod,
            })
            .collect()
    }

    /// Whether `coord` lies within the buffer radius of `center`
    pub fn contains(&self, center: ChunkCoord, coord: ChunkCoord) -> bool {
        center.chebyshev_distance(coord) <= self.buffer_distance
    }

    pub fn buffer_distance(&self) -> u32 {
        self.buffer_distance
    }

    /// Number of coordinates in every desired set
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Desired chunks for a one-off query
pub fn desired_chunks(center: ChunkCoord, profile: &PerformanceProfile) -> Vec<DesiredChunk> {
    SpatialIndex::new(profile).desired_chunks(center)
}

/// Nearest-first ordering of grid offsets: Chebyshev ring, then squared
/// Euclidean distance, then counter-clockwise angle from +x.
pub fn ring_order(a: (i32, i32), b: (i32, i32)) -> Ordering {
    let ring = |(x, z): (i32, i32)| x.unsigned_abs().max(z.unsigned_abs());
    let dist2 = |(x, z): (i32, i32)| {
        let (x, z) = (x as i64, z as i64);
        x * x + z * z
    };

    ring(a)
        .cmp(&ring(b))
        .then_with(|| dist2(a).cmp(&dist2(b)))
        .then_with(|| angle_order(a, b))
}

/// Exact angular comparison: upper half-plane (including +x) first, then
/// cross product within a half.
fn angle_order(a: (i32, i32), b: (i32, i32)) -> Ordering {
    let half = |(x, z): (i32, i32)| if z > 0 || (z == 0 && x > 0) { 0u8 } else { 1u8 };

    half(a).cmp(&half(b)).then_with(|| {
        let cross = a.0 as i64 * b.1 as i64 - a.1 as i64 * b.0 as i64;
        // cross > 0: b is counter-clockwise of a, so a comes first
        0.cmp(&cross)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::streaming::profile::{resolve, PerformanceMode};
    use std::collections::HashSet;

    #[test]
    fn test_desired_count_matches_square() {
        for mode in [PerformanceMode::Normal, PerformanceMode::Minimal] {
            let profile = resolve(mode);
            let side = (2 * profile.buffer_distance + 1) as usize;

            for center in [ChunkCoord::new(0, 0), ChunkCoord::new(-17, 42), ChunkCoord::new(1000, -1000)] {
                let desired = desired_chunks(center, &profile);
                assert_eq!(desired.len(), side * side);

                let unique: HashSet<_> = desired.iter().map(|d| d.coord).collect();
                assert_eq!(unique.len(), desired.len(), "duplicate coordinates");

                for d in &desired {
                    assert!(center.chebyshev_distance(d.coord) <= profile.buffer_distance);
                }
            }
        }
    }

    #[test]
    fn test_center_first_then_ring_one() {
        let profile = resolve(PerformanceMode::Minimal);
        let desired = desired_chunks(ChunkCoord::new(0, 0), &profile);
        let coords: Vec<_> = desired.iter().take(9).map(|d| (d.coord.x, d.coord.z)).collect();

        assert_eq!(
            coords,
            vec![
                (0, 0),
                (1, 0), (0, 1), (-1, 0), (0, -1),
                (1, 1), (-1, 1), (-1, -1), (1, -1),
            ]
        );
    }

    #[test]
    fn test_order_is_nearest_first() {
        let profile = resolve(PerformanceMode::Normal);
        let center = ChunkCoord::new(3, -2);
        let desired = desired_chunks(center, &profile);

        for pair in desired.windows(2) {
            let a = center.chebyshev_distance(pair[0].coord);
            let b = center.chebyshev_distance(pair[1].coord);
            assert!(a <= b);
            assert!(pair[0].lod <= pair[1].lod);
        }
    }

    #[test]
    fn test_order_is_translation_invariant() {
        let profile = resolve(PerformanceMode::Normal);
        let index = SpatialIndex::new(&profile);

        let at_origin = index.desired_chunks(ChunkCoord::new(0, 0));
        let shifted = index.desired_chunks(ChunkCoord::new(10, 20));

        for (a, b) in at_origin.iter().zip(&shifted) {
            assert_eq!(a.coord.offset(10, 20), b.coord);
            assert_eq!(a.lod, b.lod);
        }
    }

    #[test]
    fn test_restartable() {
        let profile = resolve(PerformanceMode::Normal);
        let index = SpatialIndex::new(&profile);
        let center = ChunkCoord::new(5, 5);

        assert_eq!(index.desired_chunks(center), index.desired_chunks(center));
        assert_eq!(index.desired_chunks(center), desired_chunks(center, &profile));
    }

    #[test]
    fn test_lod_tags_follow_bands() {
        let profile = resolve(PerformanceMode::Normal);
        let desired = desired_chunks(ChunkCoord::new(0, 0), &profile);

        let find = |x, z| desired.iter().find(|d| d.coord == ChunkCoord::new(x, z)).unwrap().lod;
        assert_eq!(find(0, 0), LodTier::Near);
        assert_eq!(find(2, -2), LodTier::Near);
        assert_eq!(find(-3, 0), LodTier::Mid);
        assert_eq!(find(5, 1), LodTier::Far);
        assert_eq!(find(8, 8), LodTier::Buffer);
        assert!(!desired.iter().any(|d| d.lod == LodTier::Unloaded));
    }

    #[test]
    fn test_contains_matches_buffer() {
        let profile = resolve(PerformanceMode::Minimal);
        let index = SpatialIndex::new(&profile);
        let center = ChunkCoord::new(0, 0);

        assert!(index.contains(center, ChunkCoord::new(3, -3)));
        assert!(!index.contains(center, ChunkCoord::new(4, 0)));
        assert_eq!(index.len(), 49);
        assert!(!index.is_empty());
    }

    #[test]
    fn test_ring_order_total() {
        // every distinct pair inside a ring compares unequal
        let mut offsets = Vec::new();
        for x in -3..=3 {
            for z in -3..=3 {
                offsets.push((x, z));
            }
        }
        for &a in &offsets {
            for &b in &offsets {
                assert_eq!(ring_order(a, b) == Ordering::Equal, a == b);
                assert_eq!(ring_order(a, b), ring_order(b, a).reverse());
            }
        }
    }
}
