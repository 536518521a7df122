use spart::errors::NearTreeError;
use spart::geometry::{ElementKind, MetricKind, Point};
use spart::neartree::{NearTree, NearTreeConfig, Sink};

fn main() -> Result<(), NearTreeError> {
    // --- 2D NearTree Example (Euclidean) ---
    println!("--- 2D NearTree Example ---");
    let config = NearTreeConfig::new(ElementKind::Float, MetricKind::L2);
    let mut tree: NearTree<Point<2>, u32> = NearTree::new(2, config)?;

    tree.immediate_insert(Point::new([10.0, 20.0]), Some(1))?;
    tree.immediate_insert(Point::new([80.0, 30.0]), Some(2))?;
    tree.immediate_insert(Point::new([45.0, 70.0]), Some(3))?;

    let probe = Point::new([12.0, 22.0]);
    let (nearest, payload) = tree.nearest_neighbor(f64::MAX, &probe)?.unwrap();
    println!("nearest to {:?}: {:?} (payload {:?})", probe, nearest, payload);

    let mut sink = Sink::new_flat();
    tree.find_k_nearest(2, f64::MAX, &probe, &mut sink)?;
    println!("2 nearest to {:?}: {:?}", probe, sink.into_flat());

    // --- Deferred insertion and flush ---
    println!("\n--- Deferred insertion ---");
    let mut deferred: NearTree<Point<1>, ()> =
        NearTree::new(1, NearTreeConfig::new(ElementKind::Float, MetricKind::L2))?;
    for i in 1..=9 {
        deferred.insert(Point::new([i as f64]), None)?;
    }
    deferred.complete_delayed_insert()?;
    let (nearest, _) = deferred.nearest_neighbor(f64::MAX, &Point::new([18.0]))?.unwrap();
    println!("nearest to 18.0 among 1..=9: {:?}", nearest);

    // --- Range search with a tree sink, then query the subset further ---
    println!("\n--- find_in_sphere into a tree sink ---");
    let mut range_sink = Sink::new_tree(1, NearTreeConfig::new(ElementKind::Float, MetricKind::L2))?;
    deferred.find_in_sphere(3.0, &Point::new([5.0]), &mut range_sink)?;
    let mut subtree = range_sink.into_tree().unwrap();
    let (closest, _) = subtree.nearest_neighbor(f64::MAX, &Point::new([5.0]))?.unwrap();
    println!("closest within radius 3 of 5.0: {:?}", closest);

    // --- Serialize the 2D tree (requires the `serde` feature) ---
    #[cfg(feature = "serde")]
    {
        let encoded: Vec<u8> = bincode::serialize(&tree).unwrap();
        let decoded: NearTree<Point<2>, u32> = bincode::deserialize(&encoded[..]).unwrap();
        let (nearest, _) = decoded
            .as_frozen()
            .unwrap()
            .nearest_neighbor(f64::MAX, &probe)?
            .unwrap();
        println!("nearest to {:?} (decoded): {:?}", probe, nearest);
    }

    Ok(())
}
