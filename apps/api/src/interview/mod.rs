//! Interview domain: resume profiling, prompt construction, answer
//! classification, question extraction, and the session controller that ties
//! them together.

pub mod classifier;
pub mod evaluation;
pub mod handlers;
pub mod onboarding;
pub mod profile;
pub mod prompts;
pub mod question;
pub mod session;
pub mod store;
