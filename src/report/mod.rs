pub mod summary;

pub use summary::{render, SessionSummary};
