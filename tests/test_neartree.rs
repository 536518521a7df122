
use shared::*;
use spart::errors::NearTreeError;
use spart::geometry::{ElementKind, MetricKind, Point, StringPoint};
use spart::neartree::{NearTree, NearTreeConfig, Sink};

// S1 — linear ints.
#[test]
fn scenario_s1_linear_ints() {
    let mut tree = linear_tree(9);

    let (nearest, _) = tree.nearest_neighbor(f64::MAX, &Point::new([18.0])).unwrap().unwrap();
    assert_eq!(nearest.coords[0], 9.0);

    let (farthest, _) = tree.farthest_neighbor(&Point::new([18.0])).unwrap().unwrap();
    assert_eq!(farthest.coords[0], 1.0);

    let mut sink = Sink::new_flat();
    tree.find_in_sphere(100.0, &Point::new([0.0]), &mut sink).unwrap();
    assert_eq!(sink.into_flat().len(), 9);

    let mut sink = Sink::new_flat();
    tree.find_in_sphere(-100.0, &Point::new([1.0]), &mut sink).unwrap();
    assert!(sink.into_flat().is_empty());
}

// S2 — halving doubles: insert 1.0, 0.5, 0.25, ... until the value underflows to 0.
#[test]
fn scenario_s2_halving_doubles() {
    let mut tree = NearTree::new(1, euclidean_config()).unwrap();
    let mut v = 1.0_f64;
    let smallest_inserted;
    loop {
        tree.immediate_insert(Point::new([v]), None).unwrap();
        if v * v == 0.0 {
            smallest_inserted = v;
            break;
        }
        v /= 2.0;
    }

    let (nearest, _) = tree.nearest_neighbor(f64::MAX, &Point::new([0.0])).unwrap().unwrap();
    assert_eq!(nearest.coords[0], smallest_inserted);

    let (farthest, _) = tree.farthest_neighbor(&Point::new([100.0])).unwrap().unwrap();
    assert_eq!(farthest.coords[0], smallest_inserted);
}

// S3 — sphere-from-top: find_in_sphere(radius = i + 0.05, probe = 100.1) returns exactly i points.
#[test]
fn scenario_s3_sphere_from_top() {
    let mut tree = NearTree::new(1, euclidean_config()).unwrap();
    for i in 1..=100 {
        tree.insert(Point::new([i as f64]), None).unwrap();
    }
    tree.complete_delayed_insert().unwrap();

    for i in 1..=100 {
        let mut sink = Sink::new_flat();
        tree.find_in_sphere(i as f64 + 0.05, &Point::new([100.1]), &mut sink)
            .unwrap();
        assert_eq!(sink.into_flat().len(), i, "radius index {i}");
    }
}

// S4 — annulus.
#[test]
fn scenario_s4_annulus() {
    let mut tree = NearTree::new(1, euclidean_config()).unwrap();
    for i in 1..=1000 {
        tree.insert(Point::new([i as f64]), None).unwrap();
    }

    let mut sink = Sink::new_flat();
    tree.find_in_annulus(100.1, 299.9, &Point::new([0.0]), &mut sink)
        .unwrap();
    let results = sink.into_flat();
    assert_eq!(results.len(), 199);
    let min = results.iter().map(|(p, _)| p.coords[0] as i64).min().unwrap();
    assert_eq!(min, 101);
}

// S5 — k-nearest / k-farthest.
#[test]
fn scenario_s5_k_nearest_and_farthest() {
    let mut tree = linear_tree(100);

    let mut sink = Sink::new_flat();
    tree.find_k_nearest(13, 3.5, &Point::new([50.0]), &mut sink).unwrap();
    let mut got: Vec<i64> = sink
        .into_flat()
        .into_iter()
        .map(|(p, _)| p.coords[0] as i64)
        .collect();
    got.sort();
    assert_eq!(got, vec![47, 48, 49, 50, 51, 52, 53]);

    let mut sink = Sink::new_flat();
    tree.find_k_farthest(7, 95.0, &Point::new([2.0]), &mut sink).unwrap();
    assert_eq!(sink.into_flat().len(), 4);
}

// S6 — 4-D spherical metric: direction, not magnitude, determines the match.
// Mirrors `test4Sphere` in the original CNearTree harness: an explicit origin
// insert followed by ten points along each axis (including a duplicate
// origin at j=0 per axis, exactly as the original loops).
#[test]
fn scenario_s6_four_sphere_metric() {
    let config = NearTreeConfig::new(ElementKind::Float, MetricKind::Spherical);
    let mut tree: NearTree<Point<4>, ()> = NearTree::new(4, config).unwrap();
    tree.immediate_insert(Point::new([0.0, 0.0, 0.0, 0.0]), None)
        .unwrap();
    for axis in 0..4 {
        for j in 0..=9 {
            let mut coords = [0.0; 4];
            coords[axis] = j as f64;
            tree.immediate_insert(Point::new(coords), None).unwrap();
        }
    }

    // Equidistant (after normalization) from every axis direction and from
    // the origin itself, this probe resolves to the origin: it was inserted
    // first, so it is the first candidate the traversal finds at the tied
    // minimum distance, and ties never dislodge an existing best.
    let probe1 = Point::new([0.49999, 0.49999, 0.49999, 0.49999]);
    let (nearest1, _) = tree.nearest_neighbor(1.999, &probe1).unwrap().unwrap();
    assert_eq!(nearest1.coords, [0.0, 0.0, 0.0, 0.0]);

    // A tiny component on one axis is overwhelmed by a larger component on
    // another once both are projected onto the unit sphere.
    let probe2 = Point::new([0.0, 0.0, 0.7, 0.71]);
    let (nearest2, _) = tree.nearest_neighbor(6.0, &probe2).unwrap().unwrap();
    assert_eq!(nearest2.coords, [0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn spherical_metric_gives_the_degenerate_origin_a_finite_distance() {
    let config = NearTreeConfig::new(ElementKind::Float, MetricKind::Spherical);
    let mut tree: NearTree<Point<4>, ()> = NearTree::new(4, config).unwrap();
    tree.immediate_insert(Point::new([0.0, 0.0, 0.0, 0.0]), None)
        .unwrap();
    let (found, _) = tree
        .nearest_neighbor(f64::MAX, &Point::new([1.0, 0.0, 0.0, 0.0]))
        .unwrap()
        .unwrap();
    assert_eq!(found.coords, [0.0, 0.0, 0.0, 0.0]);
}

#[test]
fn dimension_mismatch_is_reported_for_dyn_points() {
    use spart::geometry::DynPoint;

    let mut tree: NearTree<DynPoint, ()> = NearTree::new(2, euclidean_config()).unwrap();
    tree.immediate_insert(DynPoint::Floats(vec![0.0, 0.0]), None)
        .unwrap();
    let err = tree
        .insert(DynPoint::Floats(vec![0.0, 0.0, 0.0]), None)
        .unwrap_err();
    assert!(is_dimension_mismatch(&err));
}

#[test]
fn rejects_incompatible_metric_element_combination() {
    let config = NearTreeConfig::new(ElementKind::Float, MetricKind::Hamming);
    let err = NearTree::<Point<3>, ()>::new(3, config).unwrap_err();
    assert!(matches!(err, NearTreeError::InvalidConfig { .. }));
}

#[test]
fn string_points_use_hamming_by_default_configuration() {
    let config = NearTreeConfig::new(ElementKind::Str, MetricKind::Hamming);
    let mut tree: NearTree<StringPoint<4>, ()> = NearTree::new(4, config).unwrap();
    tree.immediate_insert(StringPoint::from_str("abcd"), None).unwrap();
    tree.immediate_insert(StringPoint::from_str("abXd"), None).unwrap();
    tree.immediate_insert(StringPoint::from_str("wxyz"), None).unwrap();

    let (nearest, _) = tree
        .nearest_neighbor(f64::MAX, &StringPoint::from_str("abcX"))
        .unwrap()
        .unwrap();
    assert_eq!(nearest, StringPoint::from_str("abcd"));
}

#[test]
fn empty_tree_queries_report_empty_tree_or_empty_set() {
    let mut tree: NearTree<Point<1>, ()> = NearTree::new(1, euclidean_config()).unwrap();
    assert!(matches!(
        tree.nearest_neighbor(1e12, &Point::new([0.0])),
        Err(NearTreeError::EmptyTree)
    ));
    assert!(matches!(
        tree.farthest_neighbor(&Point::new([0.0])),
        Err(NearTreeError::EmptyTree)
    ));
    let mut sink = Sink::new_flat();
    tree.find_in_sphere(1e12, &Point::new([0.0]), &mut sink).unwrap();
    assert!(sink.into_flat().is_empty());
}

#[test]
fn flip_mode_reduces_depth_on_monotone_doublings() {
    let mut plain = NearTree::new(1, euclidean_config()).unwrap();
    let mut flipped = NearTree::new(1, euclidean_config().with_flip(true)).unwrap();
    let mut v: i64 = 1;
    for _ in 0..14 {
        plain.immediate_insert(Point::new([v as f64]), None).unwrap();
        flipped.immediate_insert(Point::new([v as f64]), None).unwrap();
        v *= 2;
    }
    assert!(flipped.depth() < plain.depth());
}

#[test]
fn sink_tree_supports_further_queries() {
    let mut tree = linear_tree(20);

    let mut sink = Sink::new_tree(1, euclidean_config()).unwrap();
    tree.find_in_sphere(5.5, &Point::new([10.0]), &mut sink).unwrap();
    let mut subtree = sink.into_tree().unwrap();

    let (nearest, _) = subtree
        .nearest_neighbor(1000.0, &Point::new([10.0]))
        .unwrap()
        .unwrap();
    assert_eq!(nearest.coords[0], 10.0);
    assert_eq!(subtree.len(), 11);
}

#[test]
fn degenerate_single_dimension_tree_behaves_like_a_sorted_list() {
    let mut tree: NearTree<Point<1>, ()> = NearTree::new(1, euclidean_config()).unwrap();
    for i in [5, 1, 9, 3, 7] {
        tree.immediate_insert(Point::new([i as f64]), None).unwrap();
    }
    assert_eq!(tree.len(), 5);
    let (nearest, _) = tree.nearest_neighbor(f64::MAX, &Point::new([4.0])).unwrap().unwrap();
    assert_eq!(nearest.coords[0], 5.0);
}

#[test]
fn frozen_view_runs_queries_without_mutation() {
    let mut tree = deferred_linear_tree(30);
    tree.complete_delayed_insert().unwrap();
    let frozen = tree.as_frozen().expect("queue already flushed");
    let (nearest, _) = frozen.nearest_neighbor(f64::MAX, &Point::new([15.5])).unwrap().unwrap();
    assert!((15.0..=16.0).contains(&nearest.coords[0]));
}
