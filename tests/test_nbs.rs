use approx::assert_abs_diff_eq;
use ndarray::{Array2, Array3};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use nbs::{
    compute_nbs, edge_statistic, EdgeSamples, EdgeStatistic, Group, NbsConfig, NbsDriver, NbsError,
    PermutationEngine, SampleMoments, SizeMetric, Tail, TestStatistic,
};

/// A group of symmetric matrices with unit diagonal and uniform noise in [-0.5, 0.5) on every edge.
/// `boost` lists edges that get a constant added in every subject.
fn noisy_group(rng: &mut Xoshiro256PlusPlus, subjects: usize, n: usize, boost: &[((usize, usize), f64)]) -> Group {
    let mut data = Array3::<f64>::zeros((subjects, n, n));
    for s in 0..subjects {
        for i in 0..n {
            data[[s, i, i]] = 1.0;
            for j in (i + 1)..n {
                let mut v: f64 = rng.gen_range(-0.5..0.5);
                for &((bi, bj), amount) in boost {
                    if (bi, bj) == (i, j) {
                        v += amount;
                    }
                }
                data[[s, i, j]] = v;
                data[[s, j, i]] = v;
            }
        }
    }
    Group::from_stack(data).unwrap()
}

fn inflated_edge_groups(seed: u64) -> (Group, Group) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let x = noisy_group(&mut rng, 12, 5, &[((0, 1), 5.0)]);
    let y = noisy_group(&mut rng, 12, 5, &[]);
    (x, y)
}

fn noise_groups(seed: u64, n: usize) -> (Group, Group) {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let x = noisy_group(&mut rng, 10, n, &[]);
    let y = noisy_group(&mut rng, 9, n, &[]);
    (x, y)
}


#[test]
fn an_inflated_edge_is_found_as_a_significant_component() {
    let (x, y) = inflated_edge_groups(2024);
    let config = NbsConfig::new(6.0, 1000, Tail::Right).with_seed(11);
    let result = NbsDriver::new(&x, &y, config).unwrap().run().unwrap();

    assert_eq!(1, result.components.len());
    let found = &result.components[0];
    assert!(found.component.contains_edge(0, 1));
    assert_eq!(1, found.component.size);
    assert!(found.pvalue < 0.2);
    assert_eq!(1000, result.null.len());
    assert!(result.adjacency.contains(1, 0));
    assert_eq!(1, result.adjacency.num_edges());
}

#[test]
fn p_values_lie_in_the_unit_interval_and_sizes_do_not_increase() {
    let (x, y) = noise_groups(7, 10);
    let config = NbsConfig::new(1.0, 200, Tail::Both).with_seed(3);
    let result = NbsDriver::new(&x, &y, config).unwrap().run().unwrap();

    assert!(!result.components.is_empty());
    for c in &result.components {
        assert!(c.pvalue > 0.0 && c.pvalue <= 1.0);
    }
    for pair in result.components.windows(2) {
        assert!(pair[0].component.size >= pair[1].component.size);
        assert!(pair[0].pvalue <= pair[1].pvalue);
    }
}

#[test]
fn an_unreachable_threshold_gives_an_empty_result() {
    let (x, y) = noise_groups(8, 6);
    let (pvalues, adjacency, null) = compute_nbs(&x, &y, 1e9, 50, "both").unwrap();
    assert!(pvalues.is_empty());
    assert!(adjacency.iter().all(|&v| !v));
    assert_eq!(50, null.len());
    assert!(null.iter().all(|&v| v == 0.0));
}

#[test]
fn seeded_runs_are_reproducible() {
    let (x, y) = noise_groups(9, 8);
    let config = NbsConfig::new(1.5, 150, Tail::Both).with_seed(12345);
    let a = NbsDriver::new(&x, &y, config.clone()).unwrap().run().unwrap();
    let b = NbsDriver::new(&x, &y, config).unwrap().run().unwrap();

    assert_eq!(a.pvalues(), b.pvalues());
    assert_eq!(a.null, b.null);
    assert_eq!(a.adjacency, b.adjacency);
    assert_eq!(a.component_labels, b.component_labels);
}

#[test]
fn swapping_groups_and_flipping_the_tail_gives_the_same_components() {
    let (x, y) = noise_groups(10, 9);
    let xy = NbsDriver::new(&x, &y, NbsConfig::new(1.2, 20, Tail::Right).with_seed(1)).unwrap().run().unwrap();
    let yx = NbsDriver::new(&y, &x, NbsConfig::new(1.2, 20, Tail::Left).with_seed(1)).unwrap().run().unwrap();

    assert_eq!(xy.adjacency, yx.adjacency);
    let sizes = |r: &nbs::NbsResult| r.components.iter().map(|c| c.component.size).collect::<Vec<usize>>();
    assert_eq!(sizes(&xy), sizes(&yx));
    assert_abs_diff_eq!(xy.statistic, -yx.statistic, epsilon = 1e-9);
}

#[test]
fn zero_permutations_are_rejected() {
    let (x, y) = noise_groups(11, 5);
    let res = compute_nbs(&x, &y, 2.0, 0, "right");
    assert!(matches!(res, Err(NbsError::InvalidParameter { name: "permutations", .. })));
}

#[test]
fn groups_with_different_node_counts_are_rejected() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(12);
    let x = noisy_group(&mut rng, 4, 5, &[]);
    let y = noisy_group(&mut rng, 4, 6, &[]);
    let res = NbsDriver::new(&x, &y, NbsConfig::new(2.0, 10, Tail::Both));
    match res {
        Err(NbsError::ShapeMismatch { expected, actual, .. }) => {
            assert_eq!((5, 5), expected);
            assert_eq!((6, 6), actual);
        }
        _ => panic!("expected a shape mismatch"),
    }
}

#[test]
fn groups_with_a_single_subject_are_rejected() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(13);
    let x = noisy_group(&mut rng, 1, 5, &[]);
    let y = noisy_group(&mut rng, 4, 5, &[]);
    let res = NbsDriver::new(&x, &y, NbsConfig::new(2.0, 10, Tail::Both));
    assert!(matches!(res, Err(NbsError::InsufficientSamples { group: "X", found: 1 })));
}

#[test]
fn non_finite_thresholds_are_rejected() {
    let (x, y) = noise_groups(14, 5);
    assert!(matches!(compute_nbs(&x, &y, f64::NAN, 10, "left"), Err(NbsError::InvalidParameter { .. })));
    assert!(matches!(compute_nbs(&x, &y, f64::INFINITY, 10, "left"), Err(NbsError::InvalidParameter { .. })));
}

#[test]
fn the_node_metric_counts_component_nodes() {
    let (x, y) = noise_groups(15, 10);
    let config = NbsConfig::new(1.0, 30, Tail::Both).with_seed(2).with_size_metric(SizeMetric::Nodes);
    let result = NbsDriver::new(&x, &y, config).unwrap().run().unwrap();
    for c in &result.components {
        assert_eq!(c.component.nodes.len(), c.component.size);
    }
}

#[test]
fn matrices_in_nodes_last_layout_give_the_same_statistic() {
    let (x, y) = noise_groups(16, 5);
    let relayout = |g: &Group| {
        let stack = g.data().permuted_axes([1, 2, 0]).to_owned();
        Group::from_nodes_last(stack).unwrap()
    };
    let direct = edge_statistic(&x, &y, &TestStatistic::WelchT).unwrap();
    let relaid = edge_statistic(&relayout(&x), &relayout(&y), &TestStatistic::WelchT).unwrap();
    assert_abs_diff_eq!(direct, relaid, epsilon = 1e-12);
}


/// Mean difference scaled by a constant, to exercise custom statistics.
struct ScaledDifference(f64);

impl EdgeStatistic for ScaledDifference {
    fn edge_statistic(&self, x: &SampleMoments, y: &SampleMoments) -> f64 {
        self.0 * (x.mean - y.mean)
    }
}

#[test]
fn custom_statistics_can_be_plugged_in() {
    let (x, y) = inflated_edge_groups(17);
    let scaled = ScaledDifference(2.0);
    let stat: Array2<f64> = edge_statistic(&x, &y, &scaled).unwrap();
    assert!(stat[[0, 1]] > 8.0);

    let samples = EdgeSamples::new(&x, &y).unwrap();
    let engine = PermutationEngine::new(&samples, &scaled, 8.0, Tail::Right, SizeMetric::Edges);
    let null = engine.run(100, 4);
    assert_eq!(100, null.len());
    assert!(null.max().unwrap() <= 1);
}
