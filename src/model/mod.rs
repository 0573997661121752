pub mod document;
pub mod severity;
pub mod vulnerability;

pub use document::{Document, Format, Node, NodeValue};
pub use severity::Severity;
pub use vulnerability::Vulnerability;
