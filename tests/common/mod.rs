#![allow(dead_code)]

use otalign::cloud::{PointCloud, WeightedPoint};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Exact transport cost for small integer masses by expanding every vertex
/// into unit copies and trying every assignment. Totals must match.
///
/// `costs` is `[a * n + b]`.
pub fn brute_force_cost(supplies: &[u32], demands: &[u32], costs: &[f64]) -> f64 {
    let n = supplies.len();
    let supply_units: Vec<usize> = (0..n)
        .flat_map(|b| std::iter::repeat(b).take(supplies[b] as usize))
        .collect();
    let mut demand_units: Vec<usize> = (0..n)
        .flat_map(|a| std::iter::repeat(a).take(demands[a] as usize))
        .collect();
    assert_eq!(supply_units.len(), demand_units.len(), "unbalanced brute force instance");

    let mut best = f64::INFINITY;
    permute(&mut demand_units, 0, &mut |perm| {
        let cost: f64 = supply_units
            .iter()
            .zip(perm)
            .map(|(&b, &a)| costs[a * n + b])
            .sum();
        if cost < best {
            best = cost;
        }
    });
    if best.is_infinite() {
        0.0
    } else {
        best
    }
}

fn permute(items: &mut Vec<usize>, k: usize, visit: &mut dyn FnMut(&[usize])) {
    if k == items.len() {
        visit(items);
        return;
    }
    for i in k..items.len() {
        items.swap(k, i);
        permute(items, k + 1, visit);
        items.swap(k, i);
    }
}

/// Unit-mass points on a small asymmetric "L" shape.
pub fn l_shape() -> PointCloud {
    PointCloud::new(vec![
        WeightedPoint::new(0.0, 0.0, 1.0),
        WeightedPoint::new(0.0, 1.0, 1.0),
        WeightedPoint::new(0.0, 2.0, 1.0),
        WeightedPoint::new(1.0, 0.0, 1.0),
        WeightedPoint::new(2.0, 0.0, 2.0),
    ])
    .unwrap()
}

pub fn write_cloud_csv(dir: &Path, name: &str, cloud: &PointCloud) -> PathBuf {
    let path = dir.join(name);
    let mut file = File::create(&path).unwrap();
    writeln!(file, "x,y,mass").unwrap();
    for p in cloud.points() {
        writeln!(file, "{},{},{}", p.x, p.y, p.mass).unwrap();
    }
    path
}
