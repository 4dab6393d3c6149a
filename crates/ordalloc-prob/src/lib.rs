#![doc = include_str!("../README.md")]

pub mod birkhoff;
pub mod rational;

pub use birkhoff::{
    reconstruction_bound, term_bound, BirkhoffDecomposer, Decomposition, DecompositionError,
    DecompositionTerm,
};
pub use rational::{rational_matrix_to_f64, to_f64, RationalError};
