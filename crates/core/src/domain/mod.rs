pub mod submission;

pub use submission::{FormField, Submission, SubmissionDraft, UserId};
