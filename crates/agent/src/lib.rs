//! Model-backed helpers.
//!
//! The model is a translator only. [`mapper`] turns free text into one of the five
//! slash commands and [`insights`] asks for a chart plan for an uploaded dataset.
//! Neither decides anything the deterministic code cannot check: mapped commands are
//! validated against the vocabulary and chart plans fall back to a built-in plan.

pub mod insights;
pub mod llm;
pub mod mapper;
pub mod python_literal;

pub use insights::{fallback_plan, recover_plan_value, InsightGenerator, InsightPlan, PlanSource};
pub use llm::{ChatCompletionsClient, ChatMessage, CompletionRequest, LlmClient, LlmError};
pub use mapper::CommandMapper;
