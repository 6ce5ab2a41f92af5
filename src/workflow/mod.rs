pub mod discover;
pub mod graph;

pub use graph::{GraphFormat, Node, Workflow};
