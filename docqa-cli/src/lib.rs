//! Interactive document question answering.
//!
//! The `docqa` binary loads a text file or PDF, indexes it into a persistent
//! collection and then answers questions about it in a console loop.

pub mod chat;

pub use chat::{prompt_line, run_chat};
