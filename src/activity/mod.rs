pub mod classifier;

pub use classifier::{classify, ActivityState, PEN_GRACE_SECONDS, PHONE_GRACE_SECONDS};
