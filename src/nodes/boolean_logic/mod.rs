//! # Boolean Logic Nodes
//!
//! Gates that combine several upstream ON/OFF signals into one output.

pub mod common;
pub mod logic_gate;

#[cfg(test)]
mod logic_gate_test;

pub use common::{GateKind, input_label};
pub use logic_gate::{LogicGate, LogicGateFactory, LogicGateSettings};
