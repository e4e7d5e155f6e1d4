//! Pluggable position evaluators.
//!
//! The search asks an evaluator for a value in `[-1, 1]` from the point of
//! view of the side to move, and for a policy vector of [`POLICY_SIZE`]
//! slots indexed by [`Step::policy_index`]. Each search worker owns its
//! own evaluator, so implementations need `Send` but not `Sync`.

use std::fmt;
use std::str::FromStr;

use crate::constants::POLICY_SIZE;
use crate::error::ParseError;
use crate::eval::{self, CAPTURE_SCORE, WIN};
use crate::movegen::legal_steps;
use crate::position::Position;
use crate::step::Step;

/// Scale that maps evaluation scores into the `tanh` range.
const VALUE_SCALE: f32 = 1_000.0;

/// Bound on heuristic policy logits before normalisation.
const LOGIT_CLAMP: f32 = 3.0;

pub trait PositionEvaluator: Send {
    /// Stage `pos` for [`value`](Self::value) and [`policy`](Self::policy).
    fn evaluate_position(&mut self, pos: &Position);

    /// Value of the last staged position for its side to move.
    fn value(&self) -> f32;

    /// Copy the policy of the last staged position into `out`.
    fn policy(&self, out: &mut [f32]);
}

/// Zero value and a uniform policy. Stateless.
#[derive(Clone, Copy, Debug, Default)]
pub struct DummyEvaluator;

impl PositionEvaluator for DummyEvaluator {
    fn evaluate_position(&mut self, _pos: &Position) {}

    fn value(&self) -> f32 {
        0.0
    }

    fn policy(&self, out: &mut [f32]) {
        out.fill(1.0 / POLICY_SIZE as f32);
    }
}

/// Seeded noise: values are `tanh(0.5 * N(0, 1))` and policy logits are
/// negated exponential draws.
pub struct RandomEvaluator {
    rng: fastrand::Rng,
    value: f32,
    policy: Vec<f32>,
}

impl RandomEvaluator {
    pub fn new(seed: u64) -> Self {
        RandomEvaluator {
            rng: fastrand::Rng::with_seed(seed),
            value: 0.0,
            policy: vec![0.0; POLICY_SIZE],
        }
    }

    /// Standard normal draw (Box-Muller).
    fn normal(&mut self) -> f64 {
        let u = 1.0 - self.rng.f64();
        let v = self.rng.f64();
        (-2.0 * u.ln()).sqrt() * (std::f64::consts::TAU * v).cos()
    }

    /// Unit exponential draw.
    fn exponential(&mut self) -> f64 {
        -(1.0 - self.rng.f64()).ln()
    }
}

impl PositionEvaluator for RandomEvaluator {
    fn evaluate_position(&mut self, _pos: &Position) {
        self.value = (0.5 * self.normal()).tanh() as f32;
        for i in 0..POLICY_SIZE {
            self.policy[i] = -self.exponential() as f32;
        }
    }

    fn value(&self) -> f32 {
        self.value
    }

    fn policy(&self, out: &mut [f32]) {
        let n = out.len().min(self.policy.len());
        out[..n].copy_from_slice(&self.policy[..n]);
    }
}

/// Wraps the static evaluation: the value is the squashed score and the
/// policy a softmax over step scores of the legal steps.
pub struct HeuristicEvaluator {
    value: f32,
    policy: Vec<f32>,
}

impl Default for HeuristicEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl HeuristicEvaluator {
    pub fn new() -> Self {
        HeuristicEvaluator {
            value: 0.0,
            policy: vec![0.0; POLICY_SIZE],
        }
    }
}

impl PositionEvaluator for HeuristicEvaluator {
    fn evaluate_position(&mut self, pos: &Position) {
        let score = eval::score(pos);
        self.value = if score.abs() >= WIN {
            score.signum() as f32
        } else {
            (score as f32 / VALUE_SCALE).tanh()
        };

        let mut logits = [f32::NEG_INFINITY; POLICY_SIZE];
        for step in legal_steps(pos) {
            let logit = match step {
                Step::Pass => 0.0,
                _ => eval::step_score(pos, &step) as f32 / CAPTURE_SCORE as f32,
            };
            let slot = &mut logits[step.policy_index()];
            *slot = slot.max(logit.clamp(-LOGIT_CLAMP, LOGIT_CLAMP));
        }
        let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        if max == f32::NEG_INFINITY {
            self.policy.fill(0.0);
            return;
        }
        let mut total = 0.0;
        for (p, &l) in self.policy.iter_mut().zip(logits.iter()) {
            *p = (l - max).exp();
            total += *p;
        }
        for p in &mut self.policy {
            *p /= total;
        }
    }

    fn value(&self) -> f32 {
        self.value
    }

    fn policy(&self, out: &mut [f32]) {
        let n = out.len().min(self.policy.len());
        out[..n].copy_from_slice(&self.policy[..n]);
    }
}

/// The evaluator a search worker builds for itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvaluatorKind {
    Dummy,
    Random,
    #[default]
    Heuristic,
}

impl EvaluatorKind {
    /// Build a fresh evaluator. `seed` only matters for [`RandomEvaluator`].
    pub fn build(self, seed: u64) -> Box<dyn PositionEvaluator> {
        match self {
            EvaluatorKind::Dummy => Box::new(DummyEvaluator),
            EvaluatorKind::Random => Box::new(RandomEvaluator::new(seed)),
            EvaluatorKind::Heuristic => Box::new(HeuristicEvaluator::new()),
        }
    }
}

impl FromStr for EvaluatorKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dummy" => Ok(EvaluatorKind::Dummy),
            "random" => Ok(EvaluatorKind::Random),
            "heuristic" => Ok(EvaluatorKind::Heuristic),
            _ => Err(ParseError::OptionValue {
                name: "evaluator".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvaluatorKind::Dummy => "dummy",
            EvaluatorKind::Random => "random",
            EvaluatorKind::Heuristic => "heuristic",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PASS_INDEX;

    fn pos(short: &str) -> Position {
        Position::from_short(short).unwrap()
    }

    #[test]
    fn test_dummy_is_uniform() {
        let mut e = DummyEvaluator;
        e.evaluate_position(&Position::standard());
        assert_eq!(e.value(), 0.0);
        let mut policy = vec![0.0; POLICY_SIZE];
        e.policy(&mut policy);
        assert!(policy.iter().all(|&p| p == policy[0]));
        assert!((policy.iter().sum::<f32>() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_random_is_seeded() {
        let p = Position::standard();
        let mut a = RandomEvaluator::new(7);
        let mut b = RandomEvaluator::new(7);
        a.evaluate_position(&p);
        b.evaluate_position(&p);
        assert_eq!(a.value(), b.value());
        assert!(a.value().abs() < 1.0);
        let mut pa = vec![0.0; POLICY_SIZE];
        a.policy(&mut pa);
        assert!(pa.iter().all(|&x| x <= 0.0));
    }

    #[test]
    fn test_heuristic_policy_is_distribution() {
        let p = Position::standard();
        let mut e = HeuristicEvaluator::new();
        e.evaluate_position(&p);
        assert_eq!(e.value(), 0.0);
        let mut policy = vec![0.0; POLICY_SIZE];
        e.policy(&mut policy);
        assert!((policy.iter().sum::<f32>() - 1.0).abs() < 1e-4);
        assert_eq!(policy.iter().filter(|&&x| x > 0.0).count(), 8);
        assert_eq!(policy[PASS_INDEX], 0.0);
    }

    #[test]
    fn test_heuristic_prefers_goal() {
        let mut cells = [' '; 64];
        cells[8 + 6] = 'R'; // g7
        cells[8] = 'r'; // a7
        let p = pos(&format!("g [{}]", cells.iter().collect::<String>()));
        let mut e = HeuristicEvaluator::new();
        e.evaluate_position(&p);
        assert!(e.value() > 0.0);
        let mut policy = vec![0.0; POLICY_SIZE];
        e.policy(&mut policy);
        let goal: Step = Step::parse("Rg7n").unwrap().unwrap();
        let best = policy
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(best, Some(goal.policy_index()));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!("random".parse::<EvaluatorKind>().unwrap(), EvaluatorKind::Random);
        assert!("neural".parse::<EvaluatorKind>().is_err());
        assert_eq!(EvaluatorKind::Dummy.to_string(), "dummy");
    }
}
