//! # Time Nodes
//!
//! Nodes whose output follows their input after a delay.

pub mod delay_node;

pub use delay_node::{DelayFactory, DelayNode, DelaySettings};
