//! Integration tests for [`ruvector_trpo::gaussian`].
//!
//! Reference values are the closed-form univariate results, summed per
//! dimension.

use approx::assert_abs_diff_eq;
use ndarray::{array, Array2};
use ruvector_trpo::gaussian::{
    entropy, kl_divergence, kl_from_reference, log_probability, mean_entropy, mean_kl,
    DiagGaussian, LN_2PI,
};

#[test]
fn log_probability_matches_closed_form() {
    // N(1, e^{2·0.5}) at a = 2: -(1)²/(2e) - ½ln2π - 0.5
    let lp = log_probability(array![[1.0]].view(), array![[0.5]].view(), array![[2.0]].view())
        .unwrap();
    let expected = -1.0 / (2.0 * 1.0_f64.exp()) - 0.5 * LN_2PI - 0.5;
    assert_abs_diff_eq!(lp[0], expected, epsilon = 1e-12);
}

#[test]
fn log_probability_reduces_over_actions_only() {
    let mean = Array2::<f64>::zeros((5, 2));
    let log_std = Array2::<f64>::zeros((5, 2));
    let actions = Array2::from_shape_fn((5, 2), |(i, _)| i as f64);
    let lp = log_probability(mean.view(), log_std.view(), actions.view()).unwrap();

    assert_eq!(lp.len(), 5);
    for (i, &v) in lp.iter().enumerate() {
        let x = i as f64;
        assert_abs_diff_eq!(v, 2.0 * (-0.5 * x * x - 0.5 * LN_2PI), epsilon = 1e-12);
    }
}

#[test]
fn kl_scale_change_matches_closed_form() {
    // KL(N(0,1) ‖ N(0,e²)) = 1 + 1/(2e²) - ½
    let kl = kl_divergence(
        array![[0.0]].view(),
        array![[0.0]].view(),
        array![[0.0]].view(),
        array![[1.0]].view(),
    )
    .unwrap();
    let expected = 1.0 + 1.0 / (2.0 * (2.0_f64).exp()) - 0.5;
    assert_abs_diff_eq!(kl[0], expected, epsilon = 1e-12);
}

#[test]
fn kl_sums_dimensions_per_sample() {
    let mean1 = array![[0.0, 0.0], [0.0, 0.0]];
    let mean2 = array![[1.0, 1.0], [0.0, 0.0]];
    let log_std = Array2::<f64>::zeros((2, 2));
    let kl = kl_divergence(mean1.view(), log_std.view(), mean2.view(), log_std.view()).unwrap();
    assert_abs_diff_eq!(kl[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(kl[1], 0.0, epsilon = 1e-12);

    let mean = mean_kl(mean1.view(), log_std.view(), mean2.view(), log_std.view()).unwrap();
    assert_abs_diff_eq!(mean, 0.5, epsilon = 1e-12);
}

#[test]
fn entropy_ignores_mean() {
    let log_std = array![[0.3, -0.7]];
    let h1 = entropy(array![[0.0, 0.0]].view(), log_std.view()).unwrap();
    let h2 = entropy(array![[5.0, -9.0]].view(), log_std.view()).unwrap();
    assert_abs_diff_eq!(h1[0], h2[0], epsilon = 1e-12);
    assert_abs_diff_eq!(h1[0], 1.0 + LN_2PI + 0.3 - 0.7, epsilon = 1e-12);
}

#[test]
fn mean_entropy_averages_batch() {
    let mean = Array2::<f64>::zeros((2, 1));
    let log_std = array![[0.0], [1.0]];
    let h = mean_entropy(mean.view(), log_std.view()).unwrap();
    assert_abs_diff_eq!(h, 0.5 * (1.0 + LN_2PI) + 0.5, epsilon = 1e-12);
}

#[test]
fn inputs_are_not_mutated() {
    let mean = array![[0.5, -0.5]];
    let log_std = array![[0.1, 0.2]];
    let action = array![[1.0, 1.0]];
    let (m, s, a) = (mean.clone(), log_std.clone(), action.clone());

    let _ = log_probability(mean.view(), log_std.view(), action.view()).unwrap();
    let _ = entropy(mean.view(), log_std.view()).unwrap();
    let _ = kl_divergence(mean.view(), log_std.view(), action.view(), log_std.view()).unwrap();

    assert_eq!(mean, m);
    assert_eq!(log_std, s);
    assert_eq!(action, a);
}

#[test]
fn frozen_reference_ignores_policy_updates() {
    let mut policy = DiagGaussian::new(array![[0.0], [1.0]], array![[0.0], [0.0]]).unwrap();
    let reference = policy.snapshot();

    policy
        .update(array![[1.0], [1.0]], array![[0.0], [0.0]])
        .unwrap();

    let kl = kl_from_reference(&reference, &policy).unwrap();
    assert_abs_diff_eq!(kl[0], 0.5, epsilon = 1e-12);
    assert_abs_diff_eq!(kl[1], 0.0, epsilon = 1e-12);
    assert_eq!(policy.batch_size(), 2);
    assert_eq!(policy.action_dim(), 1);
}
