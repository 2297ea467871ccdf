//! Minimal interpreters driven by the benchmark adapters.

pub mod basic;
pub mod evalfilter;
pub mod forth;
pub mod lisp;
pub mod monkey;
pub mod tcl;
