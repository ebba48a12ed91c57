//! Seeded k-means partitioning of matching spheres.
//!
//! Centroids are initialised with k-means++ and relocated with Lloyd iterations
//! until the total centroid shift drops below the configured tolerance or the
//! iteration cap is reached. The best of `n_init` restarts (lowest inertia) wins.
//! All randomness comes from a `StdRng` seeded by the caller, so the same sphere
//! set, k and seed always give the same assignment.

use crate::core::io::sphere::{self, SphereError};
use crate::core::models::sphere::SphereSet;
use crate::engine::config::KMeansConfig;
use nalgebra::{Point3, Vector3};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;
use thiserror::Error;
use tracing::{debug, trace};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ClusterError {
    #[error("Cluster count must be between 1 and the number of spheres ({records}), got {k}")]
    InvalidClusterCount { k: usize, records: usize },
}

/// Cluster id of every sphere record, in record order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterAssignment {
    k: usize,
    labels: Vec<usize>,
}

impl ClusterAssignment {
    pub fn k(&self) -> usize {
        self.k
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.k];
        for &label in &self.labels {
            sizes[label] += 1;
        }
        sizes
    }

    /// Record indices of every cluster, each list in original record order.
    pub fn members(&self) -> Vec<Vec<usize>> {
        let mut members = vec![Vec::new(); self.k];
        for (idx, &label) in self.labels.iter().enumerate() {
            members[label].push(idx);
        }
        members
    }
}

/// Partitions `points` into `k` groups.
pub fn kmeans(
    points: &[Point3<f64>],
    k: usize,
    seed: u64,
    config: &KMeansConfig,
) -> Result<ClusterAssignment, ClusterError> {
    if k == 0 || k > points.len() {
        return Err(ClusterError::InvalidClusterCount {
            k,
            records: points.len(),
        });
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let tolerance = config.tolerance * mean_variance(points);

    let mut best: Option<(Vec<usize>, f64)> = None;
    for run in 0..config.n_init.max(1) {
        let centers = kmeans_plus_plus(points, k, &mut rng);
        let (labels, inertia, iterations) = lloyd(points, centers, config.max_iterations, tolerance);
        trace!(run, inertia, iterations, "k-means restart finished");
        if best.as_ref().is_none_or(|(_, b)| inertia < *b) {
            best = Some((labels, inertia));
        }
    }

    let (labels, inertia) = best.unwrap_or_default();
    debug!(k, seed, inertia, "Clustered {} points.", points.len());
    Ok(ClusterAssignment { k, labels })
}

/// Clusters the sphere centres of a sphere set.
pub fn cluster_spheres(
    set: &SphereSet,
    k: usize,
    seed: u64,
    config: &KMeansConfig,
) -> Result<ClusterAssignment, ClusterError> {
    let points: Vec<Point3<f64>> = set.positions().copied().collect();
    kmeans(&points, k, seed, config)
}

fn mean_variance(points: &[Point3<f64>]) -> f64 {
    let n = points.len() as f64;
    let mean = centroid(points.iter());
    let var: Vector3<f64> = points
        .iter()
        .map(|p| (p - mean).component_mul(&(p - mean)))
        .sum::<Vector3<f64>>()
        / n;
    var.mean()
}

fn centroid<'a>(points: impl Iterator<Item = &'a Point3<f64>>) -> Point3<f64> {
    let (sum, count) = points.fold((Vector3::<f64>::zeros(), 0usize), |(s, c), p| (s + p.coords, c + 1));
    Point3::from(sum / count.max(1) as f64)
}

fn nearest(point: &Point3<f64>, centers: &[Point3<f64>]) -> (usize, f64) {
    let mut best = (0, f64::INFINITY);
    for (idx, center) in centers.iter().enumerate() {
        let d2 = (point - center).norm_squared();
        if d2 < best.1 {
            best = (idx, d2);
        }
    }
    best
}

fn kmeans_plus_plus(points: &[Point3<f64>], k: usize, rng: &mut StdRng) -> Vec<Point3<f64>> {
    let mut centers = Vec::with_capacity(k);
    centers.push(points[rng.gen_range(0..points.len())]);

    let mut d2: Vec<f64> = points
        .iter()
        .map(|p| (p - centers[0]).norm_squared())
        .collect();

    while centers.len() < k {
        // All-zero weights mean every point already coincides with a centre.
        let chosen = match WeightedIndex::new(&d2) {
            Ok(dist) => dist.sample(rng),
            Err(_) => rng.gen_range(0..points.len()),
        };

        let center = points[chosen];
        for (dist, p) in d2.iter_mut().zip(points) {
            *dist = dist.min((p - center).norm_squared());
        }
        centers.push(center);
    }
    centers
}

fn lloyd(
    points: &[Point3<f64>],
    mut centers: Vec<Point3<f64>>,
    max_iterations: usize,
    tolerance: f64,
) -> (Vec<usize>, f64, usize) {
    let k = centers.len();
    let mut labels = vec![0; points.len()];
    let mut iterations = 0;

    while iterations < max_iterations {
        iterations += 1;
        for (label, p) in labels.iter_mut().zip(points) {
            *label = nearest(p, &centers).0;
        }

        let mut shift = 0.0;
        for (cluster, center) in centers.iter_mut().enumerate() {
            let members = points
                .iter()
                .zip(&labels)
                .filter(|(_, l)| **l == cluster)
                .map(|(p, _)| p);
            let mut members = members.peekable();
            // Empty clusters keep their previous centroid.
            if members.peek().is_none() {
                continue;
            }
            let updated = centroid(members);
            shift += (updated - *center).norm_squared();
            *center = updated;
        }
        debug_assert_eq!(centers.len(), k);

        if shift <= tolerance {
            break;
        }
    }

    let mut inertia = 0.0;
    for (label, p) in labels.iter_mut().zip(points) {
        let (idx, d2) = nearest(p, &centers);
        *label = idx;
        inertia += d2;
    }
    (labels, inertia, iterations)
}

/// A sphere set together with its cluster assignment, ready to be written.
#[derive(Debug, Clone)]
pub struct ClusteredSpheres<'a> {
    set: &'a SphereSet,
    assignment: ClusterAssignment,
    members: Vec<Vec<usize>>,
}

impl<'a> ClusteredSpheres<'a> {
    pub fn new(set: &'a SphereSet, assignment: ClusterAssignment) -> Self {
        let members = assignment.members();
        Self {
            set,
            assignment,
            members,
        }
    }

    pub fn assignment(&self) -> &ClusterAssignment {
        &self.assignment
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        self.members.iter().map(Vec::len).collect()
    }

    /// Writes one cluster as a standalone sphere file (split mode).
    pub fn write_cluster_to(&self, cluster: usize, writer: &mut impl Write) -> Result<(), SphereError> {
        let members = self.members.get(cluster).map(Vec::as_slice).unwrap_or_default();
        sphere::write_subset(self.set, members, writer)
    }

    /// Writes every cluster as consecutive blocks of one sphere file (merged mode).
    pub fn write_merged_to(&self, writer: &mut impl Write) -> Result<(), SphereError> {
        sphere::write_blocks(self.set, &self.members, writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::traits::TextFile;
    use std::io::Cursor;

    fn blob(center: [f64; 3], n: usize) -> Vec<Point3<f64>> {
        (0..n)
            .map(|i| {
                let d = (i as f64) * 0.1;
                Point3::new(center[0] + d, center[1] - d, center[2] + d * 0.5)
            })
            .collect()
    }

    fn sphere_file(points: &[Point3<f64>]) -> SphereSet {
        let mut text = String::from("DOCK spheres\ncluster     1   number of spheres in cluster    ");
        text.push_str(&points.len().to_string());
        text.push('\n');
        for (i, p) in points.iter().enumerate() {
            text.push_str(&format!(
                "{:>5}{:>10.5}{:>10.5}{:>10.5}   1.400 {:>5} 0  0\n",
                i + 1,
                p.x,
                p.y,
                p.z,
                i + 70
            ));
        }
        SphereSet::read_from(&mut Cursor::new(text)).unwrap()
    }

    mod assignment_tests {
        use super::*;

        #[test]
        fn same_seed_gives_same_assignment() {
            let mut points = blob([0.0, 0.0, 0.0], 8);
            points.extend(blob([10.0, 10.0, 10.0], 7));
            points.extend(blob([-10.0, 5.0, 0.0], 5));
            let config = KMeansConfig::default();

            let a = kmeans(&points, 3, 42, &config).unwrap();
            let b = kmeans(&points, 3, 42, &config).unwrap();
            assert_eq!(a, b);
            assert_eq!(a.cluster_sizes().iter().sum::<usize>(), points.len());
        }

        #[test]
        fn separated_blobs_are_recovered() {
            let mut points = blob([0.0, 0.0, 0.0], 6);
            points.extend(blob([50.0, 50.0, 50.0], 4));
            let assignment = kmeans(&points, 2, 7, &KMeansConfig::default()).unwrap();

            let mut sizes = assignment.cluster_sizes();
            sizes.sort_unstable();
            assert_eq!(sizes, vec![4, 6]);
            let first = assignment.labels()[0];
            assert!(assignment.labels()[..6].iter().all(|&l| l == first));
        }

        #[test]
        fn k_equal_to_point_count_is_allowed() {
            let points = blob([1.0, 2.0, 3.0], 4);
            let assignment = kmeans(&points, 4, 0, &KMeansConfig::default()).unwrap();
            assert_eq!(assignment.cluster_sizes().iter().sum::<usize>(), 4);
            assert!(assignment.labels().iter().all(|&l| l < 4));
        }

        #[test]
        fn seeding_never_picks_a_point_twice_while_others_remain() {
            let a = Point3::new(0.0, 0.0, 0.0);
            let b = Point3::new(3.0, 4.0, 0.0);
            let points = vec![a, a, a, b];
            for seed in 0..32 {
                let mut rng = StdRng::seed_from_u64(seed);
                let centers = kmeans_plus_plus(&points, 2, &mut rng);
                assert_eq!(centers.len(), 2);
                assert_ne!(centers[0], centers[1], "seed {seed}");
            }
        }

        #[test]
        fn seeding_falls_back_to_uniform_draws_for_zero_weights() {
            let points = vec![Point3::new(2.0, 2.0, 2.0); 3];
            let mut rng = StdRng::seed_from_u64(5);
            let centers = kmeans_plus_plus(&points, 3, &mut rng);
            assert_eq!(centers, points);
        }

        #[test]
        fn duplicate_points_may_leave_empty_clusters() {
            let points = vec![Point3::new(1.0, 1.0, 1.0); 5];
            let assignment = kmeans(&points, 3, 11, &KMeansConfig::default()).unwrap();
            let sizes = assignment.cluster_sizes();
            assert_eq!(sizes.len(), 3);
            assert_eq!(sizes.iter().sum::<usize>(), 5);
        }

        #[test]
        fn k_out_of_range_is_rejected() {
            let points = blob([0.0, 0.0, 0.0], 3);
            let config = KMeansConfig::default();
            assert_eq!(
                kmeans(&points, 4, 0, &config),
                Err(ClusterError::InvalidClusterCount { k: 4, records: 3 })
            );
            assert!(kmeans(&points, 0, 0, &config).is_err());
        }

        #[test]
        fn members_preserve_record_order() {
            let assignment = ClusterAssignment {
                k: 2,
                labels: vec![1, 0, 1, 1, 0],
            };
            assert_eq!(assignment.members(), vec![vec![1, 4], vec![0, 2, 3]]);
            assert_eq!(assignment.cluster_sizes(), vec![2, 3]);
        }
    }

    mod writer_tests {
        use super::*;

        #[test]
        fn merged_mode_writes_one_block_per_cluster() {
            let mut points = blob([0.0, 0.0, 0.0], 6);
            points.extend(blob([30.0, 0.0, 0.0], 4));
            let set = sphere_file(&points);
            let assignment = cluster_spheres(&set, 2, 0, &KMeansConfig::default()).unwrap();
            let clustered = ClusteredSpheres::new(&set, assignment);

            let mut out = Vec::new();
            clustered.write_merged_to(&mut out).unwrap();
            let text = String::from_utf8(out).unwrap();

            let headers: Vec<&str> = text.lines().filter(|l| sphere::is_header_line(l)).collect();
            assert_eq!(headers.len(), 3);
            assert_eq!(headers[0], "DOCK spheres");

            let counts: Vec<usize> = headers[1..]
                .iter()
                .map(|h| h.split_whitespace().last().unwrap().parse().unwrap())
                .collect();
            assert_eq!(counts.iter().sum::<usize>(), 10);
            assert_eq!(headers[1].split_whitespace().nth(1), Some("1"));
            assert_eq!(headers[2].split_whitespace().nth(1), Some("2"));

            let data_lines = text.lines().filter(|l| !sphere::is_header_line(l)).count();
            assert_eq!(data_lines, 10);
        }

        #[test]
        fn split_mode_files_cover_every_record() {
            let mut points = blob([0.0, 0.0, 0.0], 5);
            points.extend(blob([20.0, 20.0, 0.0], 5));
            points.extend(blob([0.0, 20.0, 20.0], 3));
            let set = sphere_file(&points);
            let assignment = cluster_spheres(&set, 3, 5, &KMeansConfig::default()).unwrap();
            let clustered = ClusteredSpheres::new(&set, assignment);

            let mut total = 0;
            for cluster in 0..3 {
                let mut out = Vec::new();
                clustered.write_cluster_to(cluster, &mut out).unwrap();
                let parsed = SphereSet::read_from(&mut Cursor::new(out)).unwrap();
                let declared: usize = parsed
                    .last_header()
                    .and_then(|h| h.split_whitespace().last())
                    .and_then(|t| t.parse().ok())
                    .unwrap();
                assert_eq!(declared, parsed.len());
                assert_eq!(parsed.headers().len(), 2);
                total += parsed.len();
            }
            assert_eq!(total, set.len());
        }
    }
}
