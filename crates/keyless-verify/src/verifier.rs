//! Top-level verification orchestrator.
//!
//! The [`Verifier`] runs a policy against a context and, while the outcome
//! is inconclusive, walks the policy's fallback chain. Every attempted
//! policy is recorded in the [`VerificationResult`].

use serde::Serialize;

use crate::code::ErrorCode;
use crate::context::VerificationContext;
use crate::error::VerificationError;
use crate::policy::{Policy, PolicyOutcome, PolicyState};
use crate::rules::RuleResult;

/// Outcome of a full verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    state: PolicyState,
    policies: Vec<PolicyOutcome>,
}

impl VerificationResult {
    /// Final state: the state of the last attempted policy.
    pub const fn state(&self) -> PolicyState {
        self.state
    }

    /// Whether the signature verified.
    pub fn is_ok(&self) -> bool {
        self.state == PolicyState::Ok
    }

    /// Outcomes of the attempted policies, in order.
    pub fn policy_outcomes(&self) -> &[PolicyOutcome] {
        &self.policies
    }

    /// The rule result that decided the final state, if any.
    pub fn decisive_result(&self) -> Option<&RuleResult> {
        self.policies.last().and_then(PolicyOutcome::decisive_result)
    }

    /// Code of the decisive result: the failing rule's code, or `GEN-02`
    /// when inconclusive.
    pub fn error_code(&self) -> Option<ErrorCode> {
        self.decisive_result().and_then(|r| r.code)
    }

    /// One line naming the final state, the deciding rule and its code.
    pub fn summary(&self) -> String {
        let mut summary = self.state.to_string();
        if let Some(last) = self.policies.last() {
            summary.push_str(&format!(" ({})", last.policy));
        }
        if let Some(result) = self.decisive_result() {
            summary.push_str(&format!(": {}", result.rule));
            if let Some(code) = result.code {
                summary.push_str(&format!(" {code} {}", code.message()));
            }
        }
        summary
    }
}

/// Runs a policy, with fallbacks, against verification contexts.
#[derive(Debug, Clone)]
pub struct Verifier {
    policy: Policy,
}

impl Verifier {
    /// A verifier applying `policy`.
    pub const fn new(policy: Policy) -> Self {
        Self { policy }
    }

    /// The policy this verifier starts with.
    pub const fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Verify the signature held by `ctx`.
    ///
    /// Returns `Err` only for fatal conditions (cancellation, extension
    /// inconsistency, unrecoverable chain arithmetic); FAILED and
    /// INCONCLUSIVE verdicts are carried in the result.
    pub async fn verify(
        &self,
        ctx: &VerificationContext<'_>,
    ) -> Result<VerificationResult, VerificationError> {
        let mut policies = Vec::new();
        let mut next = Some(&self.policy);

        while let Some(policy) = next {
            let outcome = policy.run(ctx).await?;
            let state = outcome.state;
            policies.push(outcome);
            if state != PolicyState::Inconclusive {
                break;
            }
            next = policy.fallback();
            if let Some(fallback) = next {
                tracing::info!(
                    policy = policy.name(),
                    fallback = fallback.name(),
                    "policy inconclusive, trying fallback"
                );
            }
        }

        let state = policies
            .last()
            .map_or(PolicyState::Pending, |outcome| outcome.state);
        let result = VerificationResult { state, policies };
        tracing::info!(
            aggregation_time = %ctx.signature().aggregation_time(),
            result = %result.summary(),
            "verification finished"
        );
        Ok(result)
    }
}
