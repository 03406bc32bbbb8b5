//! The GAMMA route-precedence ordering: a tie-break chain across competing
//! route objects bound to the same port, and a specificity chain across the
//! rules of the winning route. Both chains are applied with stable sorts so
//! that ties preserve the order established by the prior chain.

use mesh_routes_controller_core::{
    computed::ComputedHttpRouteRule,
    xroute::{HttpRouteMatch, PathMatch},
    Meta,
};
use std::cmp::Ordering;

fn namespace_of(meta: &Meta) -> &str {
    let ns = meta.id.tenancy.namespace.as_str();
    if ns.is_empty() {
        "default"
    } else {
        ns
    }
}

/// Which of two real (non-synthetic) routes wins a port: the older
/// generation stamp, then the lexicographically smaller namespace, then the
/// smaller name.
pub fn route_precedence(a: &Meta, b: &Meta) -> Ordering {
    a.generation
        .cmp(&b.generation)
        .then_with(|| namespace_of(a).cmp(namespace_of(b)))
        .then_with(|| a.id.name.cmp(&b.id.name))
}

fn has_exact_path(m: &HttpRouteMatch) -> bool {
    matches!(m.path, Some(PathMatch::Exact(_)))
}

fn prefix_path_len(m: &HttpRouteMatch) -> Option<usize> {
    match &m.path {
        Some(PathMatch::Prefix(prefix)) => Some(prefix.len()),
        _ => None,
    }
}

/// Most-specific-first ordering over merged HTTP rules. Each tier asks "does
/// any match clause within the rule satisfy the predicate"; a rule with zero
/// matches ranks last in every tier.
pub fn http_rule_specificity(a: &ComputedHttpRouteRule, b: &ComputedHttpRouteRule) -> Ordering {
    let a_exact = a.matches.iter().any(has_exact_path);
    let b_exact = b.matches.iter().any(has_exact_path);
    match (a_exact, b_exact) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    let a_prefix = a.matches.iter().filter_map(prefix_path_len).max();
    let b_prefix = b.matches.iter().filter_map(prefix_path_len).max();
    match (a_prefix, b_prefix) {
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (Some(a_len), Some(b_len)) if a_len != b_len => {
            // longer prefix is more specific
            return b_len.cmp(&a_len);
        }
        _ => {}
    }

    let a_method = a.matches.iter().any(|m| m.method.is_some());
    let b_method = b.matches.iter().any(|m| m.method.is_some());
    match (a_method, b_method) {
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }

    let a_headers = a.matches.iter().map(|m| m.headers.len()).max().unwrap_or(0);
    let b_headers = b.matches.iter().map(|m| m.headers.len()).max().unwrap_or(0);
    if a_headers != b_headers {
        return b_headers.cmp(&a_headers);
    }

    let a_query = a
        .matches
        .iter()
        .map(|m| m.query_params.len())
        .max()
        .unwrap_or(0);
    let b_query = b
        .matches
        .iter()
        .map(|m| m.query_params.len())
        .max()
        .unwrap_or(0);
    b_query.cmp(&a_query)
}
