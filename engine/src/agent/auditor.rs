//! Second-pass auditor
//!
//! One deterministic model call per turn classifies the candidate answer.
//! The reply must be exactly `PASS` or start with `FAIL:`. Anything else is
//! accepted through [`fail_open`], so a confused auditor can never keep an
//! answer from the user.

use super::prompts::{audit_request, AUDITOR_SYSTEM_PROMPT};
use crate::config::SamplingConfig;
use crate::llm::{generate_within, GenerationRequest, LLMProvider, Message};
use anyhow::Result;
use async_trait::async_trait;
use sdk::types::Verdict;
use std::sync::Arc;
use std::time::Duration;

/// Classifies a candidate answer
#[async_trait]
pub trait Auditor: Send + Sync {
    async fn audit(&self, candidate: &str) -> Result<Verdict>;
}

/// Auditor backed by a model call
pub struct LlmAuditor {
    provider: Arc<dyn LLMProvider>,
    sampling: SamplingConfig,
    timeout: Duration,
}

impl LlmAuditor {
    pub fn new(provider: Arc<dyn LLMProvider>, sampling: SamplingConfig, timeout: Duration) -> Self {
        Self {
            provider,
            sampling,
            timeout,
        }
    }
}

#[async_trait]
impl Auditor for LlmAuditor {
    async fn audit(&self, candidate: &str) -> Result<Verdict> {
        let messages = [Message::user(audit_request(candidate))];
        let request = GenerationRequest {
            system_instruction: AUDITOR_SYSTEM_PROMPT,
            sampling: self.sampling,
            messages: &messages,
        };

        let raw = generate_within(self.provider.as_ref(), &request, self.timeout).await?;
        Ok(parse_verdict(&raw))
    }
}

/// Parse the auditor's reply
pub fn parse_verdict(raw: &str) -> Verdict {
    match raw.trim() {
        "PASS" => Verdict::Accepted,
        reply if reply.starts_with("FAIL:") => {
            let reason = reply["FAIL:".len()..].trim();
            if reason.is_empty() {
                Verdict::Rejected("no reason given".to_string())
            } else {
                Verdict::Rejected(reason.to_string())
            }
        }
        other => fail_open(other),
    }
}

/// Accept a reply that is neither `PASS` nor `FAIL: ...`
pub fn fail_open(reply: &str) -> Verdict {
    let preview: String = reply.chars().take(80).collect();
    tracing::warn!("Malformed audit verdict, accepting answer: {:?}", preview);
    Verdict::Accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pass() {
        assert_eq!(parse_verdict("PASS"), Verdict::Accepted);
        assert_eq!(parse_verdict("  PASS\n"), Verdict::Accepted);
    }

    #[test]
    fn test_fail_with_reason() {
        assert_eq!(
            parse_verdict("FAIL: no causal mechanism in section 4"),
            Verdict::Rejected("no causal mechanism in section 4".to_string())
        );
    }

    #[test]
    fn test_fail_without_reason() {
        assert_eq!(
            parse_verdict("FAIL:"),
            Verdict::Rejected("no reason given".to_string())
        );
    }

    #[test]
    fn test_malformed_replies_fail_open() {
        for reply in ["", "pass", "PASS.", "Looks good to me", "FAIL no colon", "fail: lower"] {
            assert_eq!(parse_verdict(reply), Verdict::Accepted, "reply {:?}", reply);
        }
    }

    proptest! {
        #[test]
        fn prop_only_fail_prefix_rejects(reply in ".*") {
            let verdict = parse_verdict(&reply);
            if reply.trim().starts_with("FAIL:") {
                prop_assert!(!verdict.is_accepted());
            } else {
                prop_assert_eq!(verdict, Verdict::Accepted);
            }
        }
    }
}
