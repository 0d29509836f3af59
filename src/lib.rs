//! # newsletter-research
//!
//! Automated research newsletters: a query goes in, a web-researched report
//! comes out, optionally delivered as an HTML email.
//!
//! ## Pipeline
//!
//! ```text
//!   query ──► PlannerAgent ──► SearchPlan
//!                                 │ fan-out (join_all)
//!                 ┌───────────────┼───────────────┐
//!                 ▼               ▼               ▼
//!           Search agent    Search agent    Search agent   (web search tool)
//!                 └───────────────┼───────────────┘
//!                                 ▼
//!                           WriterAgent ──► Report
//!                                 │ optional
//!                                 ▼
//!                           Email agent ──► SendGrid
//! ```
//!
//! ## Modules
//! - `agents`: LLM-backed agents and the per-run context
//! - `runner`: executes an agent with tracing
//! - `pipeline`: the staged research workflow
//! - `tools`: web search and email delivery
//! - `llm`: OpenAI-compatible chat client
//! - `api`: HTTP hosting surface
//! - `cli`: command-line interface

pub mod agents;
pub mod api;
pub mod cli;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod runner;
pub mod schema;
pub mod tools;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use pipeline::{ResearchOutcome, ResearchPipeline};
