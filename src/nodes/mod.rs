//! # Node Handler Library
//!
//! Built-in node implementations and the catalog that installs them for a
//! graph.
//!
//! ## Node Roles
//!
//! - **Source Nodes**: start waves on their own (trigger, voice keyword)
//! - **Condition Nodes**: gate their input on a predicate (volume, custom
//!   [`condition::Condition`] implementations)
//! - **Logic Nodes**: combine several inputs (logic gate)
//! - **Time Nodes**: follow their input late (delay)
//! - **Action Nodes**: apply their state to a device (flashlight, vibration,
//!   notification, color screen)
//!
//! Nodes without a handler are plain wires: the engine merges and forwards
//! their signals itself.

pub mod boolean_logic;
pub mod catalog;
pub mod common;
pub mod condition;
pub mod hardware;
pub mod time;
pub mod trigger;

#[cfg(test)]
mod catalog_test;
#[cfg(test)]
mod common_test;
#[cfg(test)]
mod trigger_test;

pub use catalog::{NodeCatalog, NodeFactory, NodeSetup, PassThroughFactory};
