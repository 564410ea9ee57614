//! Reusable UI components.

pub mod memory_graph;
