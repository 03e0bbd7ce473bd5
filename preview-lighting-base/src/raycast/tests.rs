use super::*;
use crate::math::Aab;
use euclid::{point3, vec3};
use rstest::rstest;

fn unit_box() -> Aab {
    Aab::new(0., 1., 0., 1., 0., 1.)
}

#[rstest]
#[case::straight_through(Ray::new([0.5, 0.5, -1.0], [0., 0., 1.]), 10.0, true)]
#[case::too_short(Ray::new([0.5, 0.5, -1.0], [0., 0., 1.]), 0.5, false)]
#[case::just_reaching(Ray::new([0.5, 0.5, -1.0], [0., 0., 1.]), 1.0, true)]
#[case::pointing_away(Ray::new([0.5, 0.5, -1.0], [0., 0., -1.]), 10.0, false)]
#[case::origin_inside(Ray::new([0.5, 0.5, 0.5], [1., 0., 0.]), 0.1, true)]
#[case::parallel_outside(Ray::new([2.0, 0.5, -1.0], [0., 0., 1.]), 10.0, false)]
#[case::parallel_on_boundary(Ray::new([1.0, 0.5, -1.0], [0., 0., 1.]), 10.0, true)]
#[case::diagonal_miss(Ray::new([-1.0, 3.5, 0.5], [1., -1., 0.]), 10.0, false)]
fn aab_slab_test(#[case] ray: Ray, #[case] max_distance: f64, #[case] expected: bool) {
    assert_eq!(
        ray.intersects_aab_within(unit_box(), max_distance),
        expected,
        "{ray:?} within {max_distance}"
    );
}

#[test]
fn slab_test_rejects_box_behind_origin() {
    let ray = Ray::new([0.5, 0.5, 3.0], [0., 0., 1.]);
    assert!(!ray.intersects_aab_within(unit_box(), 100.0));
}

const TRIANGLE: [crate::math::FreePoint; 3] = [
    euclid::Point3D::new(0., 0., 0.),
    euclid::Point3D::new(4., 0., 0.),
    euclid::Point3D::new(0., 4., 0.),
];

#[test]
fn triangle_hit_from_either_side() {
    let down = Ray::new([1., 1., 5.], [0., 0., -1.]);
    let up = Ray::new([1., 1., -5.], [0., 0., 1.]);
    assert_eq!(down.triangle_hit(TRIANGLE), Some(5.0));
    assert_eq!(up.triangle_hit(TRIANGLE), Some(5.0));
}

#[test]
fn triangle_miss_outside_edges() {
    let ray = Ray::new([3., 3., 5.], [0., 0., -1.]);
    assert_eq!(ray.triangle_hit(TRIANGLE), None);
}

#[test]
fn triangle_edge_on_is_rejected() {
    let ray = Ray::new([-1., 1., 0.], [1., 0., 0.]);
    assert_eq!(ray.triangle_hit(TRIANGLE), None);
}

#[test]
fn triangle_hit_must_be_ahead_and_within_distance() {
    let ray = Ray::new([1., 1., 5.], [0., 0., -1.]);
    assert!(ray.intersects_triangle_within(TRIANGLE, 5.5));
    assert!(!ray.intersects_triangle_within(TRIANGLE, 5.0));
    assert!(!ray.intersects_triangle_within(TRIANGLE, 4.0));

    let behind = Ray::new([1., 1., 5.], [0., 0., 1.]);
    assert!(!behind.intersects_triangle_within(TRIANGLE, 100.0));

    // Starting on the surface itself does not count as a hit.
    let on_surface = Ray::new([1., 1., 0.], [0., 0., 1.]);
    assert_eq!(on_surface.triangle_hit(TRIANGLE), None);
}

#[test]
fn at() {
    let ray = Ray::new(point3(1., 2., 3.), vec3(0., 0., 2.));
    assert_eq!(ray.at(1.5), point3(1., 2., 6.));
}
