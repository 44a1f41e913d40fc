//! Splits a spatial region into the cuboid-index ranges it spans at a given
//! resolution. This is the one piece of the cutout math the coordination
//! layer needs directly: it drives which `(t, morton)` cuboids `cutout` must
//! page in (spec.md §4.9 step 1).
//!
//! Grounded on `examples/original_source/spatialdb/test/test_region.py`'s
//! `Region.get_cuboid_aligned_sub_region`. Only the interior, fully-aligned
//! cuboid range is computed here (half-open, possibly empty); the partial
//! near/far-side slabs belong to the numeric cutout math this crate treats as
//! opaque and out of scope (spec.md §1).

use std::ops::Range;

/// Cuboid dimensions in voxels at one resolution level. Defaults to
/// 512x512x16, matching spec.md §3's example and the original's test fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CuboidSize {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Default for CuboidSize {
    fn default() -> Self {
        Self { x: 512, y: 512, z: 16 }
    }
}

/// A 3D voxel-space corner or extent, in `(x, y, z)` order.
pub type Coord3 = (i64, i64, i64);

/// The half-open cuboid-index ranges a region spans along each axis. Any
/// axis's range may be empty when the requested region doesn't reach a full
/// interior cuboid on that axis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cuboids {
    pub x_cuboids: Range<i64>,
    pub y_cuboids: Range<i64>,
    pub z_cuboids: Range<i64>,
}

fn div_ceil(n: i64, d: i64) -> i64 {
    (n + d - 1).div_euclid(d)
}

fn axis_range(corner: i64, extent: i64, cuboid: i64) -> Range<i64> {
    let start = div_ceil(corner, cuboid);
    let stop = (corner + extent).div_euclid(cuboid);
    start..stop
}

/// Compute the interior, cuboid-aligned sub-region spanned by `corner`..`corner+extent`.
pub fn get_cuboid_aligned_sub_region(cuboid_size: CuboidSize, corner: Coord3, extent: Coord3) -> Cuboids {
    Cuboids {
        x_cuboids: axis_range(corner.0, extent.0, cuboid_size.x),
        y_cuboids: axis_range(corner.1, extent.1, cuboid_size.y),
        z_cuboids: axis_range(corner.2, extent.2, cuboid_size.z),
    }
}

/// True if every axis range is non-empty: the region touches at least one
/// fully-interior cuboid.
pub fn is_non_empty(cuboids: &Cuboids) -> bool {
    !cuboids.x_cuboids.is_empty() && !cuboids.y_cuboids.is_empty() && !cuboids.z_cuboids.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_aligned_region_matches() {
        let cuboids = get_cuboid_aligned_sub_region(
            CuboidSize { x: 512, y: 512, z: 16 },
            (512, 1024, 16),
            (1024, 512, 16),
        );
        assert_eq!(cuboids.x_cuboids, 1..3);
        assert_eq!(cuboids.y_cuboids, 2..3);
        assert_eq!(cuboids.z_cuboids, 1..2);
    }

    #[test]
    fn x_not_aligned_still_yields_interior_range() {
        let cuboids = get_cuboid_aligned_sub_region(
            CuboidSize::default(),
            (511, 1024, 32),
            (1026, 512, 32),
        );
        assert_eq!(cuboids.x_cuboids, 1..3);
        assert_eq!(cuboids.y_cuboids, 2..3);
        assert_eq!(cuboids.z_cuboids, 2..4);
    }

    #[test]
    fn region_smaller_than_a_cuboid_is_empty_on_every_axis() {
        let cuboids = get_cuboid_aligned_sub_region(
            CuboidSize::default(),
            (512, 1024, 16),
            (100, 50, 12),
        );
        assert!(cuboids.x_cuboids.is_empty());
        assert!(cuboids.y_cuboids.is_empty());
        assert!(cuboids.z_cuboids.is_empty());
        assert!(!is_non_empty(&cuboids));
    }

    #[test]
    fn default_cuboid_size_is_512x512x16() {
        assert_eq!(CuboidSize::default(), CuboidSize { x: 512, y: 512, z: 16 });
    }
}
