//! End-to-end trust-region steps on a linear Gaussian policy.
//!
//! Policy: `a ~ N(w·s, exp(log_std)²)` with parameters `w ∈ R²` and a shared
//! scalar `log_std`. The surrogate is the importance-weighted advantage
//! `mean(exp(log π_θ(a|s) - log π_old(a|s))·A)`, whose gradient and Fisher
//! matrix are known in closed form.

use approx::{assert_abs_diff_eq, assert_relative_eq};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_distr::StandardNormal;
use ruvector_trpo::{
    flatten, kl_from_reference, likelihood_ratio, DiagGaussian, FisherVectorProduct,
    GradientOracle, Parameter, ParameterSet, TrpoConfig, TrustRegionOptimizer,
};

const N: usize = 256;
const MAX_KL: f64 = 0.01;
const W0: [f64; 2] = [0.5, -0.3];
const LOG_STD0: f64 = -0.5;

fn policy_at(obs: &Array2<f64>, w: &[f64], log_std: f64) -> DiagGaussian {
    let mean = obs.dot(&ArrayView1::from(w)).insert_axis(Axis(1));
    let log_std = Array2::from_elem((obs.nrows(), 1), log_std);
    DiagGaussian::new(mean, log_std).unwrap()
}

fn initial_params() -> ParameterSet {
    ParameterSet::new()
        .with(Parameter::from_vec("w", &[2], W0.to_vec()).unwrap())
        .with(Parameter::from_vec("log_std", &[1], vec![LOG_STD0]).unwrap())
}

/// Fixed batch collected under the initial policy
struct Rollout {
    obs: Array2<f64>,
    actions: Array2<f64>,
    advantages: Array1<f64>,
    logp_old: Array1<f64>,
}

impl Rollout {
    fn sample(seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let obs = Array2::from_shape_fn((N, 2), |_| rng.sample::<f64, _>(StandardNormal));
        let noise: Array1<f64> = (0..N).map(|_| rng.sample::<f64, _>(StandardNormal)).collect();

        let old = policy_at(&obs, &W0, LOG_STD0);
        let sigma = LOG_STD0.exp();
        let mean = old.mean();
        let actions = Array2::from_shape_fn((N, 1), |(i, _)| mean[[i, 0]] + sigma * noise[i]);
        // rewards actions above the mean when the first observation is large
        let advantages = Array1::from_shape_fn(N, |i| noise[i] * (1.0 + obs[[i, 0]]));
        let logp_old = old.log_probability(actions.view()).unwrap();

        Self {
            obs,
            actions,
            advantages,
            logp_old,
        }
    }

    fn surrogate(&self, theta: &[f64]) -> f64 {
        let policy = policy_at(&self.obs, &theta[..2], theta[2]);
        let logp = policy.log_probability(self.actions.view()).unwrap();
        let ratio = likelihood_ratio(logp.view(), self.logp_old.view()).unwrap();
        (ratio * &self.advantages).mean().unwrap()
    }

    fn gradient_at(&self, theta: &[f64]) -> Vec<f64> {
        let policy = policy_at(&self.obs, &theta[..2], theta[2]);
        let variance = (2.0 * theta[2]).exp();
        let logp = policy.log_probability(self.actions.view()).unwrap();
        let ratio = likelihood_ratio(logp.view(), self.logp_old.view()).unwrap();
        let mean = policy.mean();

        let mut g = vec![0.0; 3];
        for i in 0..N {
            let diff = self.actions[[i, 0]] - mean[[i, 0]];
            let weight = ratio[i] * self.advantages[i] / N as f64;
            g[0] += weight * diff / variance * self.obs[[i, 0]];
            g[1] += weight * diff / variance * self.obs[[i, 1]];
            g[2] += weight * (diff * diff / variance - 1.0);
        }
        g
    }
}

struct RolloutOracle<'a>(&'a Rollout);

impl GradientOracle for RolloutOracle<'_> {
    fn gradient(&mut self, params: &ParameterSet) -> ruvector_trpo::Result<Vec<f64>> {
        let theta = flatten(params)?;
        Ok(self.0.gradient_at(&theta))
    }
}

/// `F = [[E[s sᵀ]/σ², 0], [0, 2]]`
struct LinearGaussianFisher {
    obs_second_moment: Array2<f64>,
    variance: f64,
}

impl LinearGaussianFisher {
    fn at(obs: &Array2<f64>, log_std: f64) -> Self {
        Self {
            obs_second_moment: obs.t().dot(obs) / obs.nrows() as f64,
            variance: (2.0 * log_std).exp(),
        }
    }
}

impl FisherVectorProduct for LinearGaussianFisher {
    fn apply(&self, v: &[f64]) -> Vec<f64> {
        let fw = self.obs_second_moment.dot(&ArrayView1::from(&v[..2])) / self.variance;
        vec![fw[0], fw[1], 2.0 * v[2]]
    }
}

#[test]
fn analytic_gradient_matches_finite_differences() {
    let rollout = Rollout::sample(11);
    let h = 1e-5;
    for theta in [vec![W0[0], W0[1], LOG_STD0], vec![0.6, -0.2, -0.4]] {
        let g = rollout.gradient_at(&theta);
        for k in 0..3 {
            let mut plus = theta.clone();
            let mut minus = theta.clone();
            plus[k] += h;
            minus[k] -= h;
            let fd = (rollout.surrogate(&plus) - rollout.surrogate(&minus)) / (2.0 * h);
            assert_abs_diff_eq!(g[k], fd, epsilon = 1e-6);
        }
    }
}

#[test]
fn fisher_matches_kl_curvature() {
    let rollout = Rollout::sample(5);
    let reference = policy_at(&rollout.obs, &W0, LOG_STD0).snapshot();
    let fisher = LinearGaussianFisher::at(&rollout.obs, LOG_STD0);

    let v = [0.3, -0.2, 0.5];
    let eps = 1e-3;
    let moved = policy_at(
        &rollout.obs,
        &[W0[0] + eps * v[0], W0[1] + eps * v[1]],
        LOG_STD0 + eps * v[2],
    );
    let kl = kl_from_reference(&reference, &moved)
        .unwrap()
        .mean()
        .unwrap();

    let fv = fisher.apply(&v);
    let quadratic: f64 = 0.5 * eps * eps * v.iter().zip(&fv).map(|(a, b)| a * b).sum::<f64>();
    assert_relative_eq!(kl, quadratic, max_relative = 1e-2);
}

#[test]
fn single_step_improves_within_trust_region() {
    let rollout = Rollout::sample(7);
    let reference = policy_at(&rollout.obs, &W0, LOG_STD0).snapshot();
    let fisher = LinearGaussianFisher::at(&rollout.obs, LOG_STD0);

    let mut params = initial_params();
    let before = rollout.surrogate(&flatten(&params).unwrap());

    let mut optimizer =
        TrustRegionOptimizer::new(TrpoConfig::default().with_max_kl(MAX_KL)).unwrap();
    let mut surrogate = |theta: &[f64]| rollout.surrogate(theta);
    let report = optimizer
        .step_with_oracle(
            &mut params,
            &mut RolloutOracle(&rollout),
            &fisher,
            &mut surrogate,
        )
        .unwrap();

    assert!(report.accepted());
    assert!(report.expected_improvement > 0.0);

    let theta = flatten(&params).unwrap();
    assert_eq!(theta, report.theta);
    assert!(rollout.surrogate(&theta) > before);

    let current = policy_at(&rollout.obs, &theta[..2], theta[2]);
    let kl = kl_from_reference(&reference, &current)
        .unwrap()
        .mean()
        .unwrap();
    assert!(kl > 0.0);
    assert!(kl < 1.5 * MAX_KL, "kl = {kl}");
}

#[test]
fn repeated_steps_never_decrease_surrogate() {
    let rollout = Rollout::sample(23);
    let mut params = initial_params();
    let mut optimizer =
        TrustRegionOptimizer::new(TrpoConfig::default().with_max_kl(MAX_KL)).unwrap();
    let mut surrogate = |theta: &[f64]| rollout.surrogate(theta);
    let mut last = rollout.surrogate(&flatten(&params).unwrap());

    for expected in 1..=3 {
        let log_std = params.get("log_std").unwrap().value()[[0]];
        let fisher = LinearGaussianFisher::at(&rollout.obs, log_std);
        let report = optimizer
            .step_with_oracle(
                &mut params,
                &mut RolloutOracle(&rollout),
                &fisher,
                &mut surrogate,
            )
            .unwrap();
        assert_eq!(report.iteration, expected);

        let value = rollout.surrogate(&report.theta);
        assert!(value >= last);
        last = value;
    }

    assert_eq!(optimizer.iteration(), 3);
    assert_eq!(optimizer.layout().unwrap().total_len(), 3);
}

#[test]
fn zero_advantages_give_null_step() {
    let mut rollout = Rollout::sample(3);
    rollout.advantages.fill(0.0);
    let fisher = LinearGaussianFisher::at(&rollout.obs, LOG_STD0);

    let mut params = initial_params();
    let before = params.clone();
    let mut optimizer = TrustRegionOptimizer::new(TrpoConfig::default()).unwrap();
    let mut surrogate = |theta: &[f64]| rollout.surrogate(theta);
    let report = optimizer
        .step_with_oracle(
            &mut params,
            &mut RolloutOracle(&rollout),
            &fisher,
            &mut surrogate,
        )
        .unwrap();

    assert!(!report.accepted());
    assert_eq!(report.step_norm, 0.0);
    assert_eq!(params, before);
}
