use num::rational::BigRational;
use num::traits::Zero;
use std::fmt;

/// Direction of a linear constraint `a . x (rel) b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Le,
    Eq,
    Ge,
}

impl Relation {
    /// The relation obtained by multiplying both sides by `-1`.
    pub fn flipped(self) -> Self {
        match self {
            Relation::Le => Relation::Ge,
            Relation::Eq => Relation::Eq,
            Relation::Ge => Relation::Le,
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::Le => "<=",
            Relation::Eq => "=",
            Relation::Ge => ">=",
        };
        f.write_str(s)
    }
}

/// A single constraint `coeffs . x (relation) rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub coeffs: Vec<BigRational>,
    pub relation: Relation,
    pub rhs: BigRational,
}

/// `maximize objective . x` subject to the constraints and `x >= 0`.
///
/// Minimization is expressed by negating the objective.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearProgram {
    objective: Vec<BigRational>,
    constraints: Vec<Constraint>,
}

impl LinearProgram {
    pub fn maximize(objective: Vec<BigRational>) -> Self {
        Self {
            objective,
            constraints: Vec::new(),
        }
    }

    /// A program with a zero objective, used for pure feasibility questions.
    pub fn feasibility(num_vars: usize) -> Self {
        Self::maximize(vec![BigRational::zero(); num_vars])
    }

    pub fn add_constraint(&mut self, coeffs: Vec<BigRational>, relation: Relation, rhs: BigRational) {
        self.constraints.push(Constraint {
            coeffs,
            relation,
            rhs,
        });
    }

    pub fn num_vars(&self) -> usize {
        self.objective.len()
    }

    pub fn objective(&self) -> &[BigRational] {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// `objective . values`, or `None` on a length mismatch.
    pub fn evaluate(&self, values: &[BigRational]) -> Option<BigRational> {
        if values.len() != self.num_vars() {
            return None;
        }
        Some(
            self.objective
                .iter()
                .zip(values)
                .fold(BigRational::zero(), |acc, (c, x)| acc + c * x),
        )
    }

    /// True if `values` is non-negative and satisfies every constraint exactly.
    pub fn is_feasible(&self, values: &[BigRational]) -> bool {
        if values.len() != self.num_vars() || values.iter().any(|x| x < &BigRational::zero()) {
            return false;
        }
        self.constraints.iter().all(|c| {
            let lhs = c
                .coeffs
                .iter()
                .zip(values)
                .fold(BigRational::zero(), |acc, (a, x)| acc + a * x);
            match c.relation {
                Relation::Le => lhs <= c.rhs,
                Relation::Eq => lhs == c.rhs,
                Relation::Ge => lhs >= c.rhs,
            }
        })
    }
}
