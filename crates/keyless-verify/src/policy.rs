//! Verification policies.
//!
//! A [`Policy`] is a named, ordered list of [`Rule`]s with an optional
//! fallback. Running a policy moves it from `Pending` through `Running` to
//! one of `Ok`, `Failed` or `Inconclusive`:
//!
//! - the first FAIL ends the run as `Failed`
//! - NA does not end the run, unless the policy stops on inconclusive and
//!   the NA came from a missing trust anchor
//! - without a FAIL, the run is `Inconclusive` iff some trust-anchor NA was
//!   seen, otherwise `Ok`

use std::fmt;

use serde::Serialize;

use crate::context::VerificationContext;
use crate::error::VerificationError;
use crate::rules::{Rule, RuleResult, RuleStatus};

/// Lifecycle state of a policy run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyState {
    /// Not started.
    Pending,
    /// Rules are being evaluated.
    Running,
    /// All rules passed or were not applicable.
    Ok,
    /// A rule failed.
    Failed,
    /// A trust anchor was missing or unreachable.
    Inconclusive,
}

impl fmt::Display for PolicyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Ok => "OK",
            Self::Failed => "FAILED",
            Self::Inconclusive => "INCONCLUSIVE",
        })
    }
}

/// Record of one policy run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyOutcome {
    /// Name of the policy.
    pub policy: String,
    /// Final state.
    pub state: PolicyState,
    /// Whether every rule of the policy was evaluated.
    pub completed: bool,
    /// Results in evaluation order.
    pub rule_results: Vec<RuleResult>,
}

impl PolicyOutcome {
    /// The result that decided the state: the failing rule for `Failed`,
    /// the first trust-anchor NA for `Inconclusive`, nothing for `Ok`.
    pub fn decisive_result(&self) -> Option<&RuleResult> {
        match self.state {
            PolicyState::Failed => self
                .rule_results
                .iter()
                .find(|r| r.status == RuleStatus::Fail),
            PolicyState::Inconclusive => self.rule_results.iter().find(|r| r.is_inconclusive()),
            PolicyState::Pending | PolicyState::Running | PolicyState::Ok => None,
        }
    }
}

/// A named, ordered set of rules plus an optional fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policy {
    name: String,
    rules: Vec<Rule>,
    fallback: Option<Box<Policy>>,
    stop_on_inconclusive: bool,
}

impl Policy {
    /// A policy running `rules` in order.
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            rules,
            fallback: None,
            stop_on_inconclusive: false,
        }
    }

    /// Run `fallback` when this policy ends inconclusive.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Self) -> Self {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// End the run at the first trust-anchor NA.
    #[must_use]
    pub const fn stop_on_inconclusive(mut self, stop: bool) -> Self {
        self.stop_on_inconclusive = stop;
        self
    }

    /// Name of the policy.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// The fallback policy, if any.
    pub fn fallback(&self) -> Option<&Self> {
        self.fallback.as_deref()
    }

    /// Evaluate the rules against `ctx`. Fallbacks are not run here.
    pub async fn run(
        &self,
        ctx: &VerificationContext<'_>,
    ) -> Result<PolicyOutcome, VerificationError> {
        let mut state = PolicyState::Pending;
        tracing::trace!(policy = %self.name, %state, "policy created");
        state = PolicyState::Running;
        tracing::debug!(policy = %self.name, %state, rules = self.rules.len(), "running policy");

        let mut rule_results = Vec::with_capacity(self.rules.len());
        let mut inconclusive = false;

        for rule in &self.rules {
            if ctx.cancellation_token().is_cancelled() {
                return Err(VerificationError::Cancelled);
            }
            let result = rule.verify(ctx).await?;
            tracing::debug!(
                policy = %self.name,
                %rule,
                status = %result.status,
                code = ?result.code.map(|c| c.as_str()),
                "rule evaluated"
            );
            let status = result.status;
            let anchor_missing = result.is_inconclusive();
            rule_results.push(result);

            if status == RuleStatus::Fail {
                state = PolicyState::Failed;
                break;
            }
            if anchor_missing {
                inconclusive = true;
                if self.stop_on_inconclusive {
                    break;
                }
            }
        }
        let completed = rule_results.len() == self.rules.len();

        if state == PolicyState::Running {
            state = if inconclusive {
                PolicyState::Inconclusive
            } else {
                PolicyState::Ok
            };
        }
        tracing::info!(policy = %self.name, %state, "policy finished");

        Ok(PolicyOutcome {
            policy: self.name.clone(),
            state,
            completed,
            rule_results,
        })
    }

    // ── Built-in policies ────────────────────────────────────────────

    fn internal_rules() -> Vec<Rule> {
        vec![
            Rule::DocumentHashAlgorithm,
            Rule::DocumentHash,
            Rule::InputHashLevel,
            Rule::InputHashAlgorithmDeprecated,
            Rule::Rfc3161InternalAlgorithmsDeprecated,
            Rule::Rfc3161OutputAlgorithmDeprecated,
            Rule::AggregationChainInputHash,
            Rule::Rfc3161RecordIndex,
            Rule::Rfc3161RecordTime,
            Rule::AggregationChainIndexSuccessor,
            Rule::AggregationChainMetadata,
            Rule::AggregationAlgorithmDeprecated,
            Rule::AggregationChainConsistency,
            Rule::AggregationChainTime,
            Rule::AggregationChainIndex,
            Rule::CalendarInputHash,
            Rule::CalendarAggregationTime,
            Rule::CalendarRegistrationTime,
            Rule::CalendarAlgorithmObsolete,
            Rule::PublicationRecordTime,
            Rule::PublicationRecordHash,
            Rule::AuthenticationRecordTime,
            Rule::AuthenticationRecordHash,
        ]
    }

    fn internal_plus(name: &str, extra: &[Rule]) -> Self {
        let mut rules = Self::internal_rules();
        rules.extend_from_slice(extra);
        Self::new(name, rules)
    }

    /// Internal consistency only; needs no trust anchor.
    pub fn internal() -> Self {
        Self::new("internal", Self::internal_rules())
    }

    /// Internal consistency plus the PKI-signed calendar authentication
    /// record.
    pub fn key_based() -> Self {
        Self::internal_plus(
            "key-based",
            &[
                Rule::CalendarChainExists,
                Rule::AuthenticationRecordExists,
                Rule::CertificateExists,
                Rule::CertificateValidity,
                Rule::AuthenticationRecordSignature,
            ],
        )
    }

    /// Internal consistency plus the signature's publication found in the
    /// publications lookup, falling back to extending to a newer lookup
    /// publication.
    pub fn publications_file() -> Self {
        Self::internal_plus(
            "publications-file",
            &[
                Rule::PublicationRecordExists,
                Rule::LookupContainsSignaturePublication,
                Rule::LookupSignaturePublicationHash,
            ],
        )
        .with_fallback(Self::publications_file_extending())
    }

    /// Extend to the first lookup publication after signing.
    pub fn publications_file_extending() -> Self {
        Self::internal_plus(
            "publications-file-extending",
            &[
                Rule::LookupContainsNewerPublication,
                Rule::ExtendingPermitted,
                Rule::ExtendedToLookupRootHash,
                Rule::ExtendedToLookupTime,
                Rule::ExtendedToLookupInputHash,
            ],
        )
    }

    /// Internal consistency plus a publication supplied by the user,
    /// falling back to extending to it.
    pub fn user_publication() -> Self {
        Self::internal_plus(
            "user-publication",
            &[
                Rule::UserPublicationExists,
                Rule::UserPublicationTimeMatches,
                Rule::UserPublicationHash,
            ],
        )
        .with_fallback(Self::user_publication_extending())
    }

    /// Extend to the publication supplied by the user.
    pub fn user_publication_extending() -> Self {
        Self::internal_plus(
            "user-publication-extending",
            &[
                Rule::UserPublicationExists,
                Rule::UserPublicationNewer,
                Rule::ExtendingPermitted,
                Rule::ExtendedToUserRootHash,
                Rule::ExtendedToUserTime,
                Rule::ExtendedToUserInputHash,
            ],
        )
    }

    /// Internal consistency plus agreement with the calendar database.
    pub fn calendar_based() -> Self {
        Self::internal_plus(
            "calendar-based",
            &[
                Rule::ExtendingPermitted,
                Rule::CalendarExtendedRootHash,
                Rule::CalendarExtendedInputHash,
                Rule::CalendarExtendedAggregationTime,
            ],
        )
    }

    /// Key-based, falling back to the publications file chain.
    pub fn default_policy() -> Self {
        Self::key_based().with_fallback(Self::publications_file())
    }
}
