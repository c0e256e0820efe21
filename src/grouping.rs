//! Merging of overlapping detections.
//!
//! Windows that fire on the same object at neighbouring positions and scales
//! are clustered by a relative similarity test and each sufficiently
//! supported cluster is replaced by its mean rectangle.

use crate::primitives::Rect;
use crate::scanner::Candidate;

/// True if every edge of `a` is within `eps` of the matching edge of `b`,
/// relative to the smaller of the two rectangles
pub fn similar(a: &Rect, b: &Rect, eps: f64) -> bool {
    let delta = eps
        * f64::from(a.width.min(b.width) + a.height.min(b.height))
        * 0.5;
    f64::from((a.x - b.x).abs()) <= delta
        && f64::from((a.y - b.y).abs()) <= delta
        && f64::from((a.right() - b.right()).abs()) <= delta
        && f64::from((a.bottom() - b.bottom()).abs()) <= delta
}

/// Disjoint-set forest with union by rank and path halving
struct Forest {
    parent: Vec<usize>,
    rank: Vec<u8>,
}
impl Forest {
    fn new(n: usize) -> Self { Self { parent: (0..n).collect(), rank: vec![0; n] } }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Labels the connected components of the `eq` relation. Labels are
/// numbered in order of each component's first element.
pub fn partition<T>(items: &[T], eq: impl Fn(&T, &T) -> bool) -> (Vec<usize>, usize) {
    let n = items.len();
    let mut forest = Forest::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if eq(&items[i], &items[j]) {
                forest.union(i, j);
            }
        }
    }

    let mut class_of_root = vec![usize::MAX; n];
    let mut labels = Vec::with_capacity(n);
    let mut classes = 0;
    for i in 0..n {
        let root = forest.find(i);
        if class_of_root[root] == usize::MAX {
            class_of_root[root] = classes;
            classes += 1;
        }
        labels.push(class_of_root[root]);
    }
    (labels, classes)
}

#[derive(Debug, Clone, Copy)]
struct Cluster {
    sum: [i64; 4],
    members: usize,
    reject_level: i32,
    level_weight: f64,
}

/// Groups candidates into clusters and returns one candidate per kept
/// cluster.
///
/// With `min_neighbors == 0` the candidates are returned as they are.
/// Otherwise a cluster is kept when it has at least `min_neighbors`
/// members and is not swallowed by a better supported cluster around it.
/// The kept candidate carries the cluster's mean rectangle and the best
/// reject level (ties broken by weight) of its members.
pub fn group_rectangles(
    candidates: Vec<Candidate>,
    min_neighbors: u32,
    eps: f64,
) -> Vec<Candidate> {
    if min_neighbors == 0 || candidates.is_empty() {
        return candidates;
    }
    let min_neighbors = min_neighbors as usize;

    let (labels, classes) = partition(&candidates, |a, b| similar(&a.rect, &b.rect, eps));

    let empty = Cluster {
        sum: [0; 4],
        members: 0,
        reject_level: 0,
        level_weight: f64::MIN_POSITIVE,
    };
    let mut clusters = vec![empty; classes];
    for (c, &label) in candidates.iter().zip(labels.iter()) {
        let cl = &mut clusters[label];
        cl.sum[0] += i64::from(c.rect.x);
        cl.sum[1] += i64::from(c.rect.y);
        cl.sum[2] += i64::from(c.rect.width);
        cl.sum[3] += i64::from(c.rect.height);
        cl.members += 1;
        if c.reject_level > cl.reject_level {
            cl.reject_level = c.reject_level;
            cl.level_weight = c.level_weight;
        } else if c.reject_level == cl.reject_level && c.level_weight > cl.level_weight {
            cl.level_weight = c.level_weight;
        }
    }

    let means: Vec<Rect> = clusters
        .iter()
        .map(|cl| {
            let s = 1.0 / cl.members as f32;
            let avg = |v: i64| (v as f32 * s).round_ties_even() as i32;
            Rect::new(avg(cl.sum[0]), avg(cl.sum[1]), avg(cl.sum[2]), avg(cl.sum[3]))
        })
        .collect();

    let mut out = Vec::new();
    for (i, (cl, r1)) in clusters.iter().zip(means.iter()).enumerate() {
        let n1 = cl.members;
        if n1 < min_neighbors {
            continue;
        }
        // Drop small clusters sitting inside larger, better supported ones
        let swallowed =
            clusters.iter().zip(means.iter()).enumerate().any(|(j, (other, r2))| {
                let n2 = other.members;
                if j == i || n2 < min_neighbors {
                    return false;
                }
                let dx = (f64::from(r2.width) * eps).round_ties_even() as i32;
                let dy = (f64::from(r2.height) * eps).round_ties_even() as i32;
                r1.inside(r2, dx, dy) && (n2 > n1.max(3) || n1 < 3)
            });
        if !swallowed {
            out.push(Candidate::new(*r1, cl.reject_level, cl.level_weight));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cand(x: i32, y: i32, side: i32, weight: f64) -> Candidate {
        Candidate::new(Rect::new(x, y, side, side), 1, weight)
    }

    #[test]
    fn similarity_is_relative_to_size() {
        let a = Rect::new(0, 0, 40, 40);
        assert!(similar(&a, &Rect::new(4, 4, 40, 40), 0.2));
        assert!(!similar(&a, &Rect::new(9, 0, 40, 40), 0.2));
        assert!(!similar(&a, &Rect::new(0, 0, 20, 20), 0.2));
    }

    #[test]
    fn partition_labels_in_first_seen_order() {
        let items = [0, 100, 1, 101, 50];
        let (labels, classes) = partition(&items, |a: &i32, b: &i32| (a - b).abs() <= 2);
        assert_eq!(classes, 3);
        assert_eq!(labels, vec![0, 1, 0, 1, 2]);
    }

    #[test]
    fn partition_is_transitive() {
        let items = [0, 2, 4, 6];
        let (labels, classes) = partition(&items, |a: &i32, b: &i32| (a - b).abs() <= 2);
        assert_eq!(classes, 1);
        assert_eq!(labels, vec![0; 4]);
    }

    #[test]
    fn merges_cluster_into_mean_with_best_weight() {
        let found =
            vec![cand(10, 10, 40, 0.3), cand(12, 12, 40, 0.9), cand(14, 10, 42, 0.5)];
        let grouped = group_rectangles(found, 3, 0.2);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].rect, Rect::new(12, 11, 41, 41));
        assert_eq!(grouped[0].level_weight, 0.9);
        assert_eq!(grouped[0].confidence(), 0.9);
    }

    #[test]
    fn higher_reject_level_wins_over_weight() {
        let found = vec![
            Candidate::new(Rect::new(0, 0, 30, 30), 2, 0.1),
            Candidate::new(Rect::new(1, 1, 30, 30), 1, 5.0),
        ];
        let grouped = group_rectangles(found, 1, 0.2);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].reject_level, 2);
        assert!((grouped[0].confidence() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn drops_clusters_below_min_neighbors() {
        let mut found = vec![cand(0, 0, 20, 1.0); 3];
        found.push(cand(200, 200, 20, 1.0));
        let grouped = group_rectangles(found, 2, 0.2);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].rect, Rect::new(0, 0, 20, 20));
    }

    #[test]
    fn zero_min_neighbors_keeps_everything() {
        let found = vec![cand(0, 0, 20, 1.0), cand(1, 1, 20, 2.0), cand(300, 0, 20, 3.0)];
        let grouped = group_rectangles(found.clone(), 0, 0.2);
        assert_eq!(grouped, found);
    }

    #[test]
    fn regrouping_separated_rectangles_is_identity() {
        let found =
            vec![cand(0, 0, 20, 1.0), cand(100, 0, 30, 2.0), cand(0, 100, 25, 0.5)];
        let once = group_rectangles(found.clone(), 1, 0.2);
        assert_eq!(once, found);
        let twice = group_rectangles(once.clone(), 1, 0.2);
        assert_eq!(twice, once);
    }

    #[test]
    fn inner_cluster_is_swallowed_by_stronger_outer() {
        let mut found = vec![cand(0, 0, 100, 1.0); 5];
        found.push(cand(30, 30, 20, 1.0));
        let grouped = group_rectangles(found, 1, 0.2);
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].rect, Rect::new(0, 0, 100, 100));
    }
}
