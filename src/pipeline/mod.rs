pub mod authority;
pub mod draft;
pub mod submission;
pub mod text;

pub use draft::Location;
pub use submission::{Submission, analyze_submission};
