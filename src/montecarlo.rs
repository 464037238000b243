//! Monte Carlo equity-curve simulation
//!
//! Each run compounds a fixed fraction of capital per trade: a win adds
//! `risk * avg_win`, a loss removes `risk * avg_loss` (both in R). Runs are
//! independent and execute in parallel; a seed makes the whole batch
//! reproducible.

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, Distribution};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::market::quotes::round_to;

/// Curves returned for charting
pub const MAX_CURVES: usize = 20;
pub const DEFAULT_SIMULATIONS: usize = 1000;
pub const MAX_SIMULATIONS: usize = 100_000;
pub const MAX_TRADES: usize = 100_000;
/// Upper bound on simulations * trades per request
pub const MAX_WORK: usize = 50_000_000;

fn default_num_trades() -> usize {
    10_000
}

fn default_initial_capital() -> f64 {
    10_000.0
}

fn default_risk_per_trade() -> f64 {
    0.01
}

/// Strategy parameters for a simulation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonteCarloParams {
    /// Fraction in [0, 1]; values above 1 are read as percent
    pub win_rate: f64,
    /// Average win in R
    pub avg_win: f64,
    /// Average loss in R (positive)
    pub avg_loss: f64,
    #[serde(default = "default_num_trades")]
    pub num_trades: usize,
    #[serde(default = "default_initial_capital")]
    pub initial_capital: f64,
    /// Fraction of capital risked per trade; values above 1 are read as percent
    #[serde(default = "default_risk_per_trade")]
    pub risk_per_trade: f64,
    #[serde(default)]
    pub simulations: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl MonteCarloParams {
    pub fn new(win_rate: f64, avg_win: f64, avg_loss: f64) -> Self {
        Self {
            win_rate,
            avg_win,
            avg_loss,
            num_trades: default_num_trades(),
            initial_capital: default_initial_capital(),
            risk_per_trade: default_risk_per_trade(),
            simulations: None,
            seed: None,
        }
    }

    /// Convert percent inputs to fractions and validate ranges
    pub fn normalized(mut self) -> Result<Self> {
        if self.win_rate > 1.0 {
            self.win_rate /= 100.0;
        }
        if self.risk_per_trade > 1.0 {
            self.risk_per_trade /= 100.0;
        }

        let finite = [self.win_rate, self.avg_win, self.avg_loss, self.initial_capital, self.risk_per_trade];
        if finite.iter().any(|v| !v.is_finite()) {
            bail!("parameters must be finite numbers");
        }
        if !(0.0..=1.0).contains(&self.win_rate) {
            bail!("win_rate must be between 0 and 100%");
        }
        if self.avg_win < 0.0 || self.avg_loss < 0.0 {
            bail!("avg_win and avg_loss must be non-negative");
        }
        if self.initial_capital <= 0.0 {
            bail!("initial_capital must be positive");
        }
        if self.risk_per_trade <= 0.0 || self.risk_per_trade > 1.0 {
            bail!("risk_per_trade must be in (0, 100%]");
        }
        if self.num_trades == 0 || self.num_trades > MAX_TRADES {
            bail!("num_trades must be between 1 and {}", MAX_TRADES);
        }
        if let Some(sims) = self.simulations {
            if sims == 0 || sims > MAX_SIMULATIONS {
                bail!("simulations must be between 1 and {}", MAX_SIMULATIONS);
            }
        }

        Ok(self)
    }
}

/// Closed-form metrics from win rate and R payoffs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Expected R per trade
    pub expectancy: f64,
    /// `None` when there are no losses to divide by
    pub profit_factor: Option<f64>,
    /// Never negative
    pub kelly_fraction: f64,
    pub half_kelly: f64,
    pub payoff_ratio: Option<f64>,
    pub breakeven_win_rate: Option<f64>,
}

/// expectancy = wr * W - (1 - wr) * L
pub fn expectancy(win_rate: f64, avg_win: f64, avg_loss: f64) -> f64 {
    win_rate * avg_win - (1.0 - win_rate) * avg_loss
}

/// (wr * W) / ((1 - wr) * L)
pub fn profit_factor(win_rate: f64, avg_win: f64, avg_loss: f64) -> Option<f64> {
    let gross_loss = (1.0 - win_rate) * avg_loss;
    if gross_loss <= 0.0 {
        return None;
    }
    Some(win_rate * avg_win / gross_loss)
}

/// max(0, (wr * W - (1 - wr)) / W)
pub fn kelly_fraction(win_rate: f64, avg_win: f64) -> f64 {
    if avg_win <= 0.0 || !avg_win.is_finite() {
        return 0.0;
    }
    let k = (win_rate * avg_win - (1.0 - win_rate)) / avg_win;
    if k.is_nan() {
        0.0
    } else {
        k.max(0.0)
    }
}

impl DerivedMetrics {
    pub fn compute(win_rate: f64, avg_win: f64, avg_loss: f64) -> Self {
        let kelly = kelly_fraction(win_rate, avg_win);
        let payoff_ratio = if avg_loss > 0.0 { Some(avg_win / avg_loss) } else { None };
        let breakeven_win_rate = if avg_win + avg_loss > 0.0 {
            Some(avg_loss / (avg_win + avg_loss))
        } else {
            None
        };

        Self {
            expectancy: expectancy(win_rate, avg_win, avg_loss),
            profit_factor: profit_factor(win_rate, avg_win, avg_loss),
            kelly_fraction: kelly,
            half_kelly: kelly / 2.0,
            payoff_ratio,
            breakeven_win_rate,
        }
    }
}

/// Outcome of one simulated account
#[derive(Debug, Clone)]
pub struct SimulationRun {
    pub final_capital: f64,
    pub max_drawdown_pct: f64,
    pub bankrupt: bool,
    pub curve: Option<Vec<f64>>,
}

/// Simulate a single account; stops early on bankruptcy
pub fn simulate_run<R: Rng + ?Sized>(
    params: &MonteCarloParams,
    wins: &Bernoulli,
    rng: &mut R,
    keep_curve: bool,
) -> SimulationRun {
    let mut capital = params.initial_capital;
    let mut peak = capital;
    let mut max_dd = 0.0f64;
    let mut bankrupt = false;
    let mut curve = if keep_curve {
        let mut c = Vec::with_capacity(params.num_trades + 1);
        c.push(capital);
        Some(c)
    } else {
        None
    };

    for _ in 0..params.num_trades {
        let risk_amount = capital * params.risk_per_trade;
        if wins.sample(rng) {
            capital += risk_amount * params.avg_win;
        } else {
            capital -= risk_amount * params.avg_loss;
        }

        if let Some(c) = curve.as_mut() {
            c.push(capital);
        }

        peak = peak.max(capital);
        if peak > 0.0 {
            max_dd = max_dd.max(((peak - capital) / peak * 100.0).min(100.0));
        }

        if capital <= 0.0 {
            bankrupt = true;
            break;
        }
    }

    SimulationRun {
        final_capital: capital,
        max_drawdown_pct: max_dd,
        bankrupt,
        curve,
    }
}

/// Aggregated batch outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonteCarloResult {
    pub equity_curves: Vec<Vec<f64>>,
    pub avg_final_capital: f64,
    pub max_final_capital: f64,
    pub min_final_capital: f64,
    pub median_final_capital: f64,
    pub p5_final_capital: f64,
    pub p95_final_capital: f64,
    /// Percent of runs that hit zero
    pub bankruptcy_rate: f64,
    /// Percent of runs finishing above the initial capital
    pub profitable_rate: f64,
    pub avg_max_drawdown_pct: f64,
    pub simulations: usize,
    pub seed: u64,
    pub metrics: DerivedMetrics,
    pub params: MonteCarloParams,
}

/// Nearest-rank percentile of an ascending slice, `p` in [0, 1]
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() - 1) as f64 * p.clamp(0.0, 1.0)).round() as usize;
    sorted[idx]
}

/// Run the batch. `default_simulations` applies when the params omit a count.
pub fn simulate(params: &MonteCarloParams, default_simulations: usize) -> Result<MonteCarloResult> {
    let params = params.clone().normalized()?;
    let simulations = params.simulations.unwrap_or(default_simulations).clamp(1, MAX_SIMULATIONS);

    if simulations.saturating_mul(params.num_trades) > MAX_WORK {
        bail!(
            "simulation too large: {} runs x {} trades exceeds {}",
            simulations,
            params.num_trades,
            MAX_WORK
        );
    }

    let wins = Bernoulli::new(params.win_rate).context("invalid win rate")?;
    let seed = params.seed.unwrap_or_else(|| rand::thread_rng().gen());

    let runs: Vec<SimulationRun> = (0..simulations)
        .into_par_iter()
        .map(|i| {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
            simulate_run(&params, &wins, &mut rng, i < MAX_CURVES)
        })
        .collect();

    let n = runs.len() as f64;
    let mut finals: Vec<f64> = runs.iter().map(|r| r.final_capital).collect();
    finals.sort_by(|a, b| a.total_cmp(b));

    let bankruptcies = runs.iter().filter(|r| r.bankrupt).count();
    let profitable = runs
        .iter()
        .filter(|r| r.final_capital > params.initial_capital)
        .count();
    let avg_final = finals.iter().sum::<f64>() / n;
    let avg_dd = runs.iter().map(|r| r.max_drawdown_pct).sum::<f64>() / n;

    let equity_curves = runs
        .into_iter()
        .filter_map(|r| r.curve)
        .take(MAX_CURVES)
        .collect();

    Ok(MonteCarloResult {
        equity_curves,
        avg_final_capital: round_to(avg_final, 2),
        max_final_capital: round_to(finals[finals.len() - 1], 2),
        min_final_capital: round_to(finals[0], 2),
        median_final_capital: round_to(percentile(&finals, 0.5), 2),
        p5_final_capital: round_to(percentile(&finals, 0.05), 2),
        p95_final_capital: round_to(percentile(&finals, 0.95), 2),
        bankruptcy_rate: round_to(bankruptcies as f64 / n * 100.0, 2),
        profitable_rate: round_to(profitable as f64 / n * 100.0, 2),
        avg_max_drawdown_pct: round_to(avg_dd, 2),
        simulations,
        seed,
        metrics: DerivedMetrics::compute(params.win_rate, params.avg_win, params.avg_loss),
        params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_metrics() {
        let m = DerivedMetrics::compute(0.55, 2.0, 1.0);
        assert!((m.expectancy - 0.65).abs() < 1e-12);
        let pf = m.profit_factor.unwrap();
        assert!((pf - 1.1 / 0.45).abs() < 1e-12);
        assert!((pf - 2.44).abs() < 0.01);
        // (1.1 - 0.45) / 2
        assert!((m.kelly_fraction - 0.325).abs() < 1e-12);
        assert_eq!(m.payoff_ratio, Some(2.0));
    }

    #[test]
    fn test_expectancy_formula_exact() {
        for wr in [0.1, 0.33, 0.5, 0.9] {
            for (w, l) in [(1.0, 1.0), (2.5, 0.7), (0.4, 3.0)] {
                assert_eq!(expectancy(wr, w, l), wr * w - (1.0 - wr) * l);
            }
        }
    }

    #[test]
    fn test_kelly_never_negative() {
        for wr in [-0.5, 0.0, 0.1, 0.3, 0.6, 1.0] {
            for w in [-2.0, 0.0, 0.5, 1.0, 3.0, f64::INFINITY] {
                assert!(kelly_fraction(wr, w) >= 0.0);
            }
        }
        assert_eq!(kelly_fraction(0.2, 1.0), 0.0);
    }

    #[test]
    fn test_profit_factor_without_losses() {
        assert_eq!(profit_factor(1.0, 2.0, 1.0), None);
        assert_eq!(profit_factor(0.5, 2.0, 0.0), None);
    }

    #[test]
    fn test_percent_inputs_normalized() {
        let mut params = MonteCarloParams::new(55.0, 2.0, 1.0);
        params.risk_per_trade = 2.0;
        let params = params.normalized().unwrap();
        assert!((params.win_rate - 0.55).abs() < 1e-12);
        assert!((params.risk_per_trade - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(MonteCarloParams::new(150.0, 2.0, 1.0).normalized().is_err());
        assert!(MonteCarloParams::new(0.5, -1.0, 1.0).normalized().is_err());

        let mut zero_trades = MonteCarloParams::new(0.5, 1.0, 1.0);
        zero_trades.num_trades = 0;
        assert!(zero_trades.normalized().is_err());

        let mut broke = MonteCarloParams::new(0.5, 1.0, 1.0);
        broke.initial_capital = 0.0;
        assert!(broke.normalized().is_err());
    }

    #[test]
    fn test_all_wins_compound_deterministically() {
        let mut params = MonteCarloParams::new(1.0, 2.0, 1.0);
        params.num_trades = 10;
        params.simulations = Some(50);

        let result = simulate(&params, DEFAULT_SIMULATIONS).unwrap();
        let expected = 10_000.0 * 1.02f64.powi(10);
        assert!((result.avg_final_capital - expected).abs() < 0.01);
        assert_eq!(result.min_final_capital, result.max_final_capital);
        assert_eq!(result.bankruptcy_rate, 0.0);
        assert_eq!(result.profitable_rate, 100.0);
        assert_eq!(result.equity_curves.len(), MAX_CURVES);
        assert_eq!(result.equity_curves[0].len(), 11);
    }

    #[test]
    fn test_ruinous_losses_go_bankrupt() {
        let mut params = MonteCarloParams::new(0.0, 1.0, 200.0);
        params.num_trades = 100;
        params.simulations = Some(10);

        let result = simulate(&params, DEFAULT_SIMULATIONS).unwrap();
        assert_eq!(result.bankruptcy_rate, 100.0);
        // Stops after the first trade
        assert!(result.equity_curves.iter().all(|c| c.len() == 2));
        assert_eq!(result.avg_max_drawdown_pct, 100.0);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let mut params = MonteCarloParams::new(0.5, 1.5, 1.0);
        params.num_trades = 200;
        params.simulations = Some(100);
        params.seed = Some(42);

        let a = simulate(&params, DEFAULT_SIMULATIONS).unwrap();
        let b = simulate(&params, DEFAULT_SIMULATIONS).unwrap();
        assert_eq!(a.avg_final_capital, b.avg_final_capital);
        assert_eq!(a.equity_curves, b.equity_curves);
        assert!(a.p5_final_capital <= a.median_final_capital);
        assert!(a.median_final_capital <= a.p95_final_capital);
    }

    #[test]
    fn test_oversized_batch_rejected() {
        let mut params = MonteCarloParams::new(0.5, 1.0, 1.0);
        params.num_trades = MAX_TRADES;
        params.simulations = Some(MAX_SIMULATIONS);
        assert!(simulate(&params, DEFAULT_SIMULATIONS).is_err());
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let v = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(&v, 0.0), 1.0);
        assert_eq!(percentile(&v, 0.5), 3.0);
        assert_eq!(percentile(&v, 1.0), 5.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }
}
