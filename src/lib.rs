//! LLM-guided web vulnerability scanning.
//!
//! A [`pipeline::ScanOrchestrator`] asks an [`llm::LLMProvider`] for the next
//! step, runs the chosen [`tools`] against a whitelisted target through a
//! [`transport::GuardedTransport`], and keeps per-session tasks, findings and
//! strategy in a [`session::SessionStore`].

pub mod cli;
pub mod config;
pub mod errors;
pub mod findings;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod prompts;
pub mod protocol;
pub mod session;
pub mod strategy;
pub mod tasks;
pub mod tools;
pub mod transport;
pub mod utils;
