//! Prompt templates for grounded filing analysis

use crate::providers::llm::ChatMessage;
use crate::types::{Passage, Role, Scope, Turn};

/// Sentence the model must use when the passages cannot answer the question
pub const INSUFFICIENT_CONTEXT: &str =
    "Based on the available SEC filings, I don't have sufficient information to answer this question.";

/// Prompt builder for filing queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build context block from passages, keeping retrieval order
    pub fn build_context(passages: &[Passage]) -> String {
        passages
            .iter()
            .map(|p| {
                format!(
                    "[Source: {} | Year: {}]\n{}",
                    p.section_label, p.period, p.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Build the system instruction with strict grounding
    pub fn build_system_prompt(passages: &[Passage], scope: &Scope) -> String {
        format!(
            r#"You are a senior financial analyst specializing in SEC 10-K filings analysis for {ticker}.

Your task is to provide accurate, insightful analysis based ONLY on the provided context from official SEC filings.

## CRITICAL RULES:
1. Answer based ONLY on the context provided below. Do not use external knowledge.
2. You MUST cite the 'section_header' (e.g., "Risk Factors", "Business Overview") for EVERY claim you make.
3. Use citation format: [Section: Risk Factors, 2023]
4. If the context doesn't contain enough information to answer, say "{fallback}"
5. Be precise with financial figures and dates.
6. Maintain a professional, analytical tone appropriate for institutional investors.

## CONTEXT FROM SEC 10-K FILINGS:
{context}

## RESPONSE FORMAT:
- Start with a direct answer to the question
- Support each point with citations from the context
- If relevant, highlight key risks or opportunities
- Keep responses concise but comprehensive"#,
            ticker = scope,
            fallback = INSUFFICIENT_CONTEXT,
            context = Self::build_context(passages),
        )
    }

    /// Map conversation turns to chat messages
    ///
    /// Turns with an unrecognized role are dropped.
    pub fn format_history(history: &[Turn]) -> Vec<ChatMessage> {
        history
            .iter()
            .filter_map(|turn| match turn.role {
                Role::User => Some(ChatMessage::user(turn.content.clone())),
                Role::Assistant => Some(ChatMessage::assistant(turn.content.clone())),
                Role::Unknown => None,
            })
            .collect()
    }

    /// Full message sequence: system instruction, history, then the question
    pub fn build_messages(
        passages: &[Passage],
        scope: &Scope,
        history: &[Turn],
        question: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(Self::build_system_prompt(passages, scope)));
        messages.extend(Self::format_history(history));
        messages.push(ChatMessage::user(question));
        messages
    }
}
