//! Z3 backend for [`LpSolver`].
//!
//! Variables are Z3 reals constrained to be non-negative. Feasibility and
//! unboundedness are decided with plain solver checks, the latter through the
//! recession cone: a feasible program is unbounded iff some `d >= 0` keeps
//! every constraint's left side in its relation to zero while raising the
//! objective. Only bounded programs reach `z3::Optimize`.

use thiserror::Error;
use tracing::debug;
use z3::ast::Real;
use z3::SatResult as Z3SatResult;

use num::rational::BigRational;
use num::BigInt;

use crate::program::{LinearProgram, Relation};
use crate::simplex::{LpError, LpOutcome, LpSolver};

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Z3 returned unknown for {0}")]
    Unknown(&'static str),
    #[error("Coefficient {0} is not representable as a Z3 real")]
    Coefficient(String),
    #[error("Model value for x{0} does not fit in a 64-bit fraction")]
    ModelValue(usize),
    #[error(transparent)]
    Program(#[from] LpError),
}

pub struct Z3Lp {
    params: Option<z3::Params>,
}

impl Z3Lp {
    pub fn new() -> Self {
        Self { params: None }
    }

    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        if timeout_secs == 0 {
            return Self::new();
        }
        let mut params = z3::Params::new();
        let timeout_ms = u32::try_from(timeout_secs.saturating_mul(1000)).unwrap_or(u32::MAX);
        params.set_u32("timeout", timeout_ms);
        Self {
            params: Some(params),
        }
    }

    fn solver(&self) -> z3::Solver {
        let solver = z3::Solver::new();
        if let Some(params) = &self.params {
            solver.set_params(params);
        }
        solver
    }
}

impl Default for Z3Lp {
    fn default() -> Self {
        Self::new()
    }
}

fn real(value: &BigRational) -> Result<Real, Z3Error> {
    Real::from_rational_str(&value.numer().to_string(), &value.denom().to_string())
        .ok_or_else(|| Z3Error::Coefficient(value.to_string()))
}

fn declare(prefix: &str, count: usize) -> Vec<Real> {
    (0..count)
        .map(|i| Real::new_const(format!("{prefix}{i}")))
        .collect()
}

fn linear(coeffs: &[BigRational], vars: &[Real]) -> Result<Real, Z3Error> {
    let mut sum = Real::from_rational(0, 1);
    for (coeff, var) in coeffs.iter().zip(vars) {
        let term = &real(coeff)? * var;
        sum = &sum + &term;
    }
    Ok(sum)
}

/// Assert `x >= 0` and every constraint of `lp`, with right-hand sides
/// replaced by zero when `homogeneous`.
fn assert_program(
    lp: &LinearProgram,
    vars: &[Real],
    homogeneous: bool,
    assert: impl Fn(&z3::ast::Bool),
) -> Result<(), Z3Error> {
    let zero = Real::from_rational(0, 1);
    for var in vars {
        assert(&var.ge(&zero));
    }
    for constraint in lp.constraints() {
        let lhs = linear(&constraint.coeffs, vars)?;
        let rhs = if homogeneous {
            zero.clone()
        } else {
            real(&constraint.rhs)?
        };
        assert(&match constraint.relation {
            Relation::Le => lhs.le(&rhs),
            Relation::Ge => lhs.ge(&rhs),
            Relation::Eq => lhs.eq(&rhs),
        });
    }
    Ok(())
}

fn model_value(model: &z3::Model, var: &Real, index: usize) -> Result<BigRational, Z3Error> {
    let value = model
        .eval::<Real>(var, true)
        .ok_or_else(|| Z3Error::Internal(format!("no model value for x{index}")))?;
    let (numer, denom) = value.as_rational().ok_or(Z3Error::ModelValue(index))?;
    Ok(BigRational::new(BigInt::from(numer), BigInt::from(denom)))
}

impl LpSolver for Z3Lp {
    type Error = Z3Error;

    fn solve(&mut self, lp: &LinearProgram) -> Result<LpOutcome, Z3Error> {
        let n = lp.num_vars();
        for (index, constraint) in lp.constraints().iter().enumerate() {
            if constraint.coeffs.len() != n {
                return Err(LpError::DimensionMismatch {
                    constraint: index,
                    expected: n,
                    found: constraint.coeffs.len(),
                }
                .into());
            }
        }
        let x = declare("x", n);

        let feasibility = self.solver();
        assert_program(lp, &x, false, |b| feasibility.assert(b))?;
        match feasibility.check() {
            Z3SatResult::Unsat => return Ok(LpOutcome::Infeasible),
            Z3SatResult::Unknown => return Err(Z3Error::Unknown("feasibility")),
            Z3SatResult::Sat => {}
        }

        let d = declare("d", n);
        let recession = self.solver();
        assert_program(lp, &d, true, |b| recession.assert(b))?;
        recession.assert(&linear(lp.objective(), &d)?.ge(&Real::from_rational(1, 1)));
        match recession.check() {
            Z3SatResult::Sat => return Ok(LpOutcome::Unbounded),
            Z3SatResult::Unknown => return Err(Z3Error::Unknown("unboundedness")),
            Z3SatResult::Unsat => {}
        }

        let optimize = z3::Optimize::new();
        if let Some(params) = &self.params {
            optimize.set_params(params);
        }
        assert_program(lp, &x, false, |b| optimize.assert(b))?;
        optimize.maximize(&linear(lp.objective(), &x)?);
        match optimize.check(&[]) {
            Z3SatResult::Sat => {}
            Z3SatResult::Unsat => {
                return Err(Z3Error::Internal("optimizer lost a feasible program".into()))
            }
            Z3SatResult::Unknown => return Err(Z3Error::Unknown("optimization")),
        }
        let model = optimize
            .get_model()
            .ok_or_else(|| Z3Error::Internal("optimal but no model available".into()))?;
        let values = x
            .iter()
            .enumerate()
            .map(|(i, var)| model_value(&model, var, i))
            .collect::<Result<Vec<_>, _>>()?;
        let objective = lp
            .evaluate(&values)
            .ok_or_else(|| Z3Error::Internal("model has the wrong width".into()))?;
        debug!(vars = n, %objective, "Z3 found an optimum");
        Ok(LpOutcome::Optimal { values, objective })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simplex::ExactSimplex;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn int(v: i64) -> BigRational {
        BigRational::from_integer(v.into())
    }

    fn frac(n: i64, d: i64) -> BigRational {
        BigRational::new(n.into(), d.into())
    }

    #[test]
    fn z3_matches_simplex_on_a_bounded_program() -> TestResult {
        let mut lp = LinearProgram::maximize(vec![int(1), int(1)]);
        lp.add_constraint(vec![int(1), int(2)], Relation::Le, int(4));
        lp.add_constraint(vec![int(3), int(1)], Relation::Le, int(6));

        let z3 = Z3Lp::new().solve(&lp)?;
        let exact = ExactSimplex::default().solve(&lp)?;
        match (z3, exact) {
            (
                LpOutcome::Optimal { values, objective },
                LpOutcome::Optimal {
                    objective: expected,
                    ..
                },
            ) => {
                assert_eq!(objective, expected);
                assert_eq!(objective, frac(14, 5));
                assert!(lp.is_feasible(&values));
            }
            other => panic!("expected two optima, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn z3_reports_infeasible_and_unbounded() -> TestResult {
        let mut infeasible = LinearProgram::feasibility(1);
        infeasible.add_constraint(vec![int(1)], Relation::Le, int(1));
        infeasible.add_constraint(vec![int(1)], Relation::Ge, int(2));
        assert_eq!(Z3Lp::new().solve(&infeasible)?, LpOutcome::Infeasible);

        let mut unbounded = LinearProgram::maximize(vec![int(1), int(0)]);
        unbounded.add_constraint(vec![int(1), int(-1)], Relation::Le, int(1));
        assert_eq!(Z3Lp::with_timeout_secs(5).solve(&unbounded)?, LpOutcome::Unbounded);
        Ok(())
    }

    #[test]
    fn z3_keeps_exact_fractions() -> TestResult {
        let mut lp = LinearProgram::feasibility(2);
        lp.add_constraint(vec![int(1), int(1)], Relation::Eq, int(1));
        lp.add_constraint(vec![int(0), int(1)], Relation::Eq, frac(1, 3));
        match Z3Lp::new().solve(&lp)? {
            LpOutcome::Optimal { values, .. } => {
                assert_eq!(values, vec![frac(2, 3), frac(1, 3)]);
            }
            other => panic!("expected a solution, got {other:?}"),
        }
        Ok(())
    }
}
