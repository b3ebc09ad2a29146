//! Indexability decisions over normalized query parameters.
//!
//! Rules run in order and the first one that fires wins:
//! pagination, parameter count, "alone" key sets, then the configured
//! allowlist or denylist strategy.

use std::collections::BTreeSet;

use pagemeta_core::config::{CanonicalStrategy, IndexingPolicyConfig, IndexingStrategy};
use serde::{Deserialize, Serialize};

use crate::key::NormalizedQuery;

/// One token of a query pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternToken {
    /// `key`: the parameter must be present.
    Present(String),
    /// `key=value`: the parameter must have exactly this value.
    Equals(String, String),
}

impl PatternToken {
    pub fn parse(token: &str) -> Self {
        match token.split_once('=') {
            Some((key, value)) => PatternToken::Equals(key.to_string(), value.to_string()),
            None => PatternToken::Present(token.to_string()),
        }
    }

    fn matches(&self, query: &NormalizedQuery) -> bool {
        match self {
            PatternToken::Present(key) => query.contains_key(key),
            PatternToken::Equals(key, value) => query.get(key) == Some(value),
        }
    }
}

/// A list of tokens that must all match.
///
/// An empty pattern matches every query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryPattern {
    tokens: Vec<PatternToken>,
}

impl QueryPattern {
    pub fn parse<S: AsRef<str>>(tokens: &[S]) -> Self {
        Self { tokens: tokens.iter().map(|t| PatternToken::parse(t.as_ref())).collect() }
    }

    pub fn matches(&self, query: &NormalizedQuery) -> bool {
        self.tokens.iter().all(|token| token.matches(query))
    }
}

/// Which rule produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IndexReason {
    Paginated,
    TooManyParams,
    NonIndexableAlone,
    NoAllowMatch,
    DenyMatch,
    Allowed,
}

/// Outcome of evaluating the policy for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct IndexDecision {
    pub indexable: bool,
    pub reason: IndexReason,
    /// Query the canonical URL should carry.
    pub canonical_query: NormalizedQuery,
}

/// Compiled indexing policy.
#[derive(Debug, Clone)]
pub struct IndexingPolicy {
    strategy: IndexingStrategy,
    allowlist: Vec<QueryPattern>,
    denylist: Vec<QueryPattern>,
    pagination_param: String,
    pagination_indexable: bool,
    canonical_strategy: CanonicalStrategy,
    max_params: Option<usize>,
    alone_non_indexable: BTreeSet<String>,
    noindex_robots: String,
}

impl IndexingPolicy {
    pub fn new(config: &IndexingPolicyConfig) -> Self {
        Self {
            strategy: config.strategy,
            allowlist: config.allowlist.iter().map(|p| QueryPattern::parse(p)).collect(),
            denylist: config.denylist.iter().map(|p| QueryPattern::parse(p)).collect(),
            pagination_param: config.pagination.param.clone(),
            pagination_indexable: config.pagination.indexable,
            canonical_strategy: config.pagination.canonical_strategy,
            max_params: config.max_params,
            alone_non_indexable: config.alone_non_indexable.iter().cloned().collect(),
            noindex_robots: config.noindex_robots.clone(),
        }
    }

    /// Robots directive for pages the policy rejects.
    pub fn noindex_robots(&self) -> &str {
        &self.noindex_robots
    }

    pub fn evaluate(&self, query: &NormalizedQuery) -> IndexDecision {
        let reason = self.reason(query);
        IndexDecision {
            indexable: reason == IndexReason::Allowed,
            reason,
            canonical_query: self.canonical_query(query),
        }
    }

    pub fn is_indexable(&self, query: &NormalizedQuery) -> bool {
        self.reason(query) == IndexReason::Allowed
    }

    fn reason(&self, query: &NormalizedQuery) -> IndexReason {
        if !self.pagination_indexable && query.contains_key(&self.pagination_param) {
            return IndexReason::Paginated;
        }

        if let Some(max) = self.max_params
            && query.len() > max
        {
            return IndexReason::TooManyParams;
        }

        if !self.alone_non_indexable.is_empty() && query.keys().eq(self.alone_non_indexable.iter()) {
            return IndexReason::NonIndexableAlone;
        }

        match self.strategy {
            IndexingStrategy::Allowlist => {
                if self.allowlist.iter().any(|p| p.matches(query)) {
                    IndexReason::Allowed
                } else {
                    IndexReason::NoAllowMatch
                }
            }
            IndexingStrategy::Denylist => {
                if self.denylist.iter().any(|p| p.matches(query)) {
                    IndexReason::DenyMatch
                } else {
                    IndexReason::Allowed
                }
            }
        }
    }

    fn canonical_query(&self, query: &NormalizedQuery) -> NormalizedQuery {
        let mut canonical = query.clone();
        if self.canonical_strategy == CanonicalStrategy::Base {
            canonical.remove(&self.pagination_param);
        }
        canonical
    }
}
