//! Reconciles declared auth requirements against the auth sources a caller
//! registered token getters for.

use std::collections::{BTreeMap, BTreeSet};

/// Outcome of [`identify_auth_requirements`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthRequirements {
    /// Authn parameters no available source can supply.
    pub authn_params: BTreeMap<String, Vec<String>>,
    /// Authorization services still required; empty once any one is available.
    pub authz_tokens: Vec<String>,
    /// Available sources that satisfied at least one requirement.
    pub used_services: BTreeSet<String>,
}

impl AuthRequirements {
    pub fn is_satisfied(&self) -> bool {
        self.authn_params.is_empty() && self.authz_tokens.is_empty()
    }
}

/// Determines which requirements remain after applying `available` sources.
///
/// A parameter is satisfied when any of its alternatives is available. The
/// authorization list is satisfied as a whole when any of its entries is
/// available; otherwise it is carried forward unchanged.
pub fn identify_auth_requirements<'a, I>(
    req_authn_params: &BTreeMap<String, Vec<String>>,
    req_authz_tokens: &[String],
    available: I,
) -> AuthRequirements
where
    I: IntoIterator<Item = &'a str>,
{
    let available: BTreeSet<&str> = available.into_iter().collect();
    let mut result = AuthRequirements::default();

    for (param, services) in req_authn_params {
        let matched: Vec<&String> = services
            .iter()
            .filter(|s| available.contains(s.as_str()))
            .collect();

        if matched.is_empty() {
            result
                .authn_params
                .insert(param.clone(), services.clone());
        } else {
            result.used_services.extend(matched.into_iter().cloned());
        }
    }

    let matched_authz: Vec<&String> = req_authz_tokens
        .iter()
        .filter(|s| available.contains(s.as_str()))
        .collect();

    if matched_authz.is_empty() {
        result.authz_tokens = req_authz_tokens.to_vec();
    } else {
        result.used_services.extend(matched_authz.into_iter().cloned());
    }

    result
}

/// Names in `supplied` that are missing from `used`, sorted.
pub fn unused_names<'a, S, U>(supplied: S, used: &BTreeSet<U>) -> Vec<String>
where
    S: IntoIterator<Item = &'a String>,
    U: std::borrow::Borrow<str> + Ord,
{
    let mut unused: Vec<String> = supplied
        .into_iter()
        .filter(|name| !used.contains(name.as_str()))
        .cloned()
        .collect();
    unused.sort();
    unused.dedup();
    unused
}
