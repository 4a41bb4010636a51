use std::collections::BTreeSet;
use std::fmt;

use crate::domain::{
    failure::HandlerFailure,
    handler_map::HandlerMap,
    handler_result::HandlerResult,
    principal::{Attributes, Principal},
};

// ============================================================================
// Decision
// ============================================================================

/// Outcome of evaluating a policy over the aggregated handler results.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Accept(Principal),
    Reject,
}

impl Decision {
    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept(_))
    }
}

// ============================================================================
// Core Policy Trait
// ============================================================================

/// Decision rule over per-handler outcomes.
///
/// Implementations must be pure: the same two maps always yield the same
/// decision, with no I/O.
pub trait AuthenticationPolicy: Send + Sync + fmt::Debug {
    fn resolve(
        &self,
        successes: &HandlerMap<HandlerResult>,
        failures: &HandlerMap<HandlerFailure>,
    ) -> Decision;

    /// True when no outcome of the `pending` attempts can change the decision
    /// made on the current maps. Used to stop dispatching early.
    fn is_settled(
        &self,
        _successes: &HandlerMap<HandlerResult>,
        _failures: &HandlerMap<HandlerFailure>,
        _pending: &BTreeSet<String>,
    ) -> bool {
        false
    }

    /// Handler names this policy refers to by name, checked against the
    /// registry when a manager is built.
    fn referenced_handlers(&self) -> BTreeSet<&str> {
        BTreeSet::new()
    }
}

// ============================================================================
// Principal Merging
// ============================================================================

/// Builds the single principal of an accepted attempt.
///
/// Identity comes from the authoritative handler when it succeeded, otherwise
/// from the first success. Attributes of all successes are unioned in map
/// order, so a later handler wins on a key collision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrincipalMerger {
    authoritative_handler: Option<String>,
}

impl PrincipalMerger {
    pub fn new(authoritative_handler: Option<String>) -> Self {
        Self {
            authoritative_handler,
        }
    }

    pub fn authoritative_handler(&self) -> Option<&str> {
        self.authoritative_handler.as_deref()
    }

    pub fn merge(&self, successes: &HandlerMap<HandlerResult>) -> Option<Principal> {
        let identity = self
            .authoritative_handler
            .as_deref()
            .and_then(|name| successes.get(name))
            .or_else(|| successes.values().next())?;

        let mut attributes = Attributes::new();
        for result in successes.values() {
            attributes.extend(
                result
                    .principal()
                    .attributes()
                    .iter()
                    .map(|(name, values)| (name.clone(), values.clone())),
            );
        }

        Some(Principal::with_attributes(
            identity.principal().id(),
            attributes,
        ))
    }

    /// False while the authoritative handler may still report.
    fn identity_settled(&self, pending: &BTreeSet<String>) -> bool {
        self.authoritative_handler
            .as_deref()
            .is_none_or(|name| !pending.contains(name))
    }

    fn accept_or_reject(&self, successes: &HandlerMap<HandlerResult>) -> Decision {
        self.merge(successes)
            .map_or(Decision::Reject, Decision::Accept)
    }
}

// ============================================================================
// Any Succeeded
// ============================================================================

/// Accepts as soon as one handler succeeded, whatever the others did.
#[derive(Debug, Clone, Default)]
pub struct AnySucceeded {
    merger: PrincipalMerger,
}

impl AnySucceeded {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_authoritative_handler(mut self, name: impl Into<String>) -> Self {
        self.merger = PrincipalMerger::new(Some(name.into()));
        self
    }
}

impl AuthenticationPolicy for AnySucceeded {
    fn resolve(
        &self,
        successes: &HandlerMap<HandlerResult>,
        _failures: &HandlerMap<HandlerFailure>,
    ) -> Decision {
        self.merger.accept_or_reject(successes)
    }

    fn is_settled(
        &self,
        successes: &HandlerMap<HandlerResult>,
        _failures: &HandlerMap<HandlerFailure>,
        pending: &BTreeSet<String>,
    ) -> bool {
        // A pending retry of the same handler could still turn its success
        // into a failure.
        successes.keys().any(|name| !pending.contains(name))
            && self.merger.identity_settled(pending)
    }

    fn referenced_handlers(&self) -> BTreeSet<&str> {
        self.merger.authoritative_handler().into_iter().collect()
    }
}

// ============================================================================
// All Must Succeed
// ============================================================================

/// Accepts only when every attempted handler succeeded.
#[derive(Debug, Clone, Default)]
pub struct AllMustSucceed {
    merger: PrincipalMerger,
}

impl AllMustSucceed {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_authoritative_handler(mut self, name: impl Into<String>) -> Self {
        self.merger = PrincipalMerger::new(Some(name.into()));
        self
    }
}

impl AuthenticationPolicy for AllMustSucceed {
    fn resolve(
        &self,
        successes: &HandlerMap<HandlerResult>,
        failures: &HandlerMap<HandlerFailure>,
    ) -> Decision {
        if !failures.is_empty() {
            return Decision::Reject;
        }
        self.merger.accept_or_reject(successes)
    }

    fn is_settled(
        &self,
        _successes: &HandlerMap<HandlerResult>,
        failures: &HandlerMap<HandlerFailure>,
        pending: &BTreeSet<String>,
    ) -> bool {
        failures.keys().any(|name| !pending.contains(name))
    }

    fn referenced_handlers(&self) -> BTreeSet<&str> {
        self.merger.authoritative_handler().into_iter().collect()
    }
}

// ============================================================================
// Required Handlers
// ============================================================================

/// Accepts when every named handler succeeded; failures of other handlers are
/// ignored. An empty set still needs one success to produce a principal.
#[derive(Debug, Clone)]
pub struct RequiredHandlers {
    required: BTreeSet<String>,
    merger: PrincipalMerger,
}

impl RequiredHandlers {
    pub fn new<I, S>(required: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required: required.into_iter().map(Into::into).collect(),
            merger: PrincipalMerger::default(),
        }
    }

    #[must_use]
    pub fn with_authoritative_handler(mut self, name: impl Into<String>) -> Self {
        self.merger = PrincipalMerger::new(Some(name.into()));
        self
    }

    pub fn required(&self) -> &BTreeSet<String> {
        &self.required
    }
}

impl AuthenticationPolicy for RequiredHandlers {
    fn resolve(
        &self,
        successes: &HandlerMap<HandlerResult>,
        _failures: &HandlerMap<HandlerFailure>,
    ) -> Decision {
        if !self.required.iter().all(|name| successes.contains_key(name)) {
            return Decision::Reject;
        }
        self.merger.accept_or_reject(successes)
    }

    fn is_settled(
        &self,
        successes: &HandlerMap<HandlerResult>,
        failures: &HandlerMap<HandlerFailure>,
        pending: &BTreeSet<String>,
    ) -> bool {
        let required_failed = self
            .required
            .iter()
            .any(|name| failures.contains_key(name) && !pending.contains(name));
        if required_failed {
            return true;
        }

        // Accepting early needs a principal that no pending attempt can take away.
        let required_done = self
            .required
            .iter()
            .all(|name| successes.contains_key(name) && !pending.contains(name));
        let has_stable_success = successes.keys().any(|name| !pending.contains(name));
        required_done && has_stable_success && self.merger.identity_settled(pending)
    }

    fn referenced_handlers(&self) -> BTreeSet<&str> {
        self.required
            .iter()
            .map(String::as_str)
            .chain(self.merger.authoritative_handler())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{credential::CredentialKind, failure::FailureCategory};
    use quickcheck::{Arbitrary, Gen};
    use quickcheck_macros::quickcheck;
    use std::collections::BTreeMap;

    fn success(name: &str, id: &str) -> HandlerResult {
        HandlerResult::new(name, CredentialKind::UsernamePassword, Principal::new(id))
    }

    fn successes(names: &[&str]) -> HandlerMap<HandlerResult> {
        names
            .iter()
            .map(|name| ((*name).to_string(), success(name, "alice")))
            .collect()
    }

    fn failures(names: &[&str]) -> HandlerMap<HandlerFailure> {
        names
            .iter()
            .map(|name| {
                (
                    (*name).to_string(),
                    HandlerFailure::new(*name, FailureCategory::BadCredentials),
                )
            })
            .collect()
    }

    const NAMES: [&str; 6] = ["h0", "h1", "h2", "h3", "h4", "h5"];

    #[test]
    fn exhaustive_zero_to_three_successes_and_failures() {
        for succeeded in 0..=3 {
            for failed in 0..=3 {
                let s = successes(&NAMES[..succeeded]);
                let f = failures(&NAMES[3..3 + failed]);

                assert_eq!(
                    AnySucceeded::new().resolve(&s, &f).is_accept(),
                    succeeded > 0,
                    "any: {succeeded} successes, {failed} failures"
                );
                assert_eq!(
                    AllMustSucceed::new().resolve(&s, &f).is_accept(),
                    succeeded > 0 && failed == 0,
                    "all: {succeeded} successes, {failed} failures"
                );
                assert_eq!(
                    RequiredHandlers::new(["h0"]).resolve(&s, &f).is_accept(),
                    succeeded > 0,
                    "required h0: {succeeded} successes, {failed} failures"
                );
            }
        }
    }

    #[test]
    fn required_handlers_ignores_other_failures() {
        let policy = RequiredHandlers::new(["ldap", "otp"]);

        assert!(
            policy
                .resolve(&successes(&["ldap", "otp"]), &failures(&["x509"]))
                .is_accept()
        );
        assert_eq!(
            policy.resolve(&successes(&["ldap"]), &failures(&["otp"])),
            Decision::Reject
        );
        assert_eq!(
            RequiredHandlers::new(Vec::<String>::new())
                .resolve(&HandlerMap::new(), &failures(&["x509"])),
            Decision::Reject
        );
    }

    #[test]
    fn merge_takes_identity_from_first_success_and_later_attributes_win() {
        let first = HandlerResult::new(
            "ldap",
            CredentialKind::UsernamePassword,
            Principal::new("alice")
                .with_attribute("mail", "alice@example.com")
                .with_attribute("department", "sales"),
        );
        let second = HandlerResult::new(
            "token",
            CredentialKind::Token,
            Principal::new("alice@idp").with_attribute("department", "engineering"),
        );
        let map: HandlerMap<HandlerResult> = [
            ("ldap".to_string(), first),
            ("token".to_string(), second),
        ]
        .into_iter()
        .collect();

        let principal = PrincipalMerger::default().merge(&map).unwrap();
        assert_eq!(principal.id(), "alice");
        assert_eq!(
            principal.attribute("department"),
            Some(&serde_json::json!("engineering"))
        );
        assert_eq!(
            principal.attribute("mail"),
            Some(&serde_json::json!("alice@example.com"))
        );

        let principal = PrincipalMerger::new(Some("token".into())).merge(&map).unwrap();
        assert_eq!(principal.id(), "alice@idp");

        let principal = PrincipalMerger::new(Some("absent".into())).merge(&map).unwrap();
        assert_eq!(principal.id(), "alice");
    }

    #[test]
    fn referenced_handlers_lists_required_and_authoritative() {
        let policy = RequiredHandlers::new(["ldap"]).with_authoritative_handler("otp");
        assert_eq!(
            policy.referenced_handlers(),
            BTreeSet::from(["ldap", "otp"])
        );
        assert!(AnySucceeded::new().referenced_handlers().is_empty());
    }

    #[test]
    fn early_accept_waits_for_pending_authority() {
        let pending = BTreeSet::from(["ldap".to_string()]);
        let done = successes(&["db"]);
        let none = failures(&[]);

        assert!(AnySucceeded::new().is_settled(&done, &none, &pending));
        assert!(
            !AnySucceeded::new()
                .with_authoritative_handler("ldap")
                .is_settled(&done, &none, &pending)
        );
        assert!(
            !RequiredHandlers::new(["db"])
                .with_authoritative_handler("ldap")
                .is_settled(&done, &none, &pending)
        );
        assert!(
            RequiredHandlers::new(["db"])
                .with_authoritative_handler("ldap")
                .is_settled(&done, &none, &BTreeSet::new())
        );
    }

    #[derive(Debug, Clone)]
    struct Scenario {
        completed: Vec<(u8, bool)>,
        pending: BTreeSet<u8>,
    }

    impl Arbitrary for Scenario {
        fn arbitrary(g: &mut Gen) -> Self {
            let completed = Vec::<(u8, bool)>::arbitrary(g)
                .into_iter()
                .take(6)
                .map(|(handler, ok)| (handler % 4, ok))
                .collect();
            let pending = Vec::<u8>::arbitrary(g)
                .into_iter()
                .take(3)
                .map(|handler| handler % 4)
                .collect();
            Self { completed, pending }
        }
    }

    fn maps(outcomes: &[(u8, bool)]) -> (HandlerMap<HandlerResult>, HandlerMap<HandlerFailure>) {
        let mut latest = BTreeMap::new();
        for (handler, ok) in outcomes {
            latest.insert(format!("h{handler}"), *ok);
        }
        let s = latest
            .iter()
            .filter(|(_, ok)| **ok)
            .map(|(name, _)| (name.clone(), success(name, "alice")))
            .collect();
        let f = latest
            .iter()
            .filter(|(_, ok)| !**ok)
            .map(|(name, _)| {
                (
                    name.clone(),
                    HandlerFailure::new(name, FailureCategory::Unknown),
                )
            })
            .collect();
        (s, f)
    }

    fn settled_decisions_are_final(policy: &dyn AuthenticationPolicy, scenario: &Scenario) -> bool {
        let (s, f) = maps(&scenario.completed);
        let pending_names: BTreeSet<String> =
            scenario.pending.iter().map(|h| format!("h{h}")).collect();
        if !policy.is_settled(&s, &f, &pending_names) {
            return true;
        }

        let current = policy.resolve(&s, &f).is_accept();
        let pending: Vec<u8> = scenario.pending.iter().copied().collect();
        (0..1u32 << pending.len()).all(|mask| {
            let mut outcomes = scenario.completed.clone();
            outcomes.extend(
                pending
                    .iter()
                    .enumerate()
                    .map(|(bit, handler)| (*handler, mask & (1 << bit) != 0)),
            );
            let (s, f) = maps(&outcomes);
            policy.resolve(&s, &f).is_accept() == current
        })
    }

    #[quickcheck]
    fn any_succeeded_settles_only_on_final_decisions(scenario: Scenario) -> bool {
        settled_decisions_are_final(&AnySucceeded::new(), &scenario)
    }

    #[quickcheck]
    fn all_must_succeed_settles_only_on_final_decisions(scenario: Scenario) -> bool {
        settled_decisions_are_final(&AllMustSucceed::new(), &scenario)
    }

    #[quickcheck]
    fn required_handlers_settles_only_on_final_decisions(scenario: Scenario) -> bool {
        settled_decisions_are_final(&RequiredHandlers::new(["h0", "h1"]), &scenario)
    }
}
