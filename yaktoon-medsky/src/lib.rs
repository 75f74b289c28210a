//! # Medsky: student record analysis
//!
//! Turns an uploaded school record PDF into structured data and reviewer feedback:
//!
//! 1. PDF → text through LlamaCloud ([`pdf`])
//! 2. text → numbered record sections ([`text_parser`])
//! 3. sections → structured tables and five kinds of feedback, in parallel ([`llm`])
//! 4. derived statistics for dashboards ([`analysis`])
//!
//! [`service::MedskyService`] runs the stages as a background pipeline and keeps a
//! pollable status per session.

pub mod analysis;
pub mod error;
pub mod llm;
pub mod pdf;
pub mod prompts;
pub mod service;
pub mod text_parser;
pub mod types;

pub use error::{ErrorCode, MedskyError};
pub use service::{MedskyService, UserInfo};
pub use types::*;
