//! Subject grammar: `domain.Kind.scope….id.Event`.
//!
//! In a subscription pattern `*` matches exactly one segment and a trailing
//! `>` matches one or more remaining segments.

use crate::entities::ResourceKind;
use crate::events::EventKind;

/// One position of a subscription pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Id(&'a str),
    Any,
}

impl Token<'_> {
    fn as_segment(&self) -> &str {
        match self {
            Token::Id(id) => id,
            Token::Any => "*",
        }
    }
}

/// Whether `value` can be used as one subject segment.
pub fn is_valid_token(value: &str) -> bool {
    !value.is_empty()
        && !value
            .chars()
            .any(|c| c == '.' || c == '*' || c == '>' || c.is_whitespace())
}

/// Builds subjects and patterns under one domain prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectRouter {
    domain: String,
}

impl SubjectRouter {
    /// `domain` may itself be dotted; every part must be a valid token.
    pub fn new(domain: impl Into<String>) -> Option<Self> {
        let domain = domain.into();
        domain
            .split('.')
            .all(is_valid_token)
            .then_some(Self { domain })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Concrete subject of one event about one resource.
    pub fn subject(
        &self,
        kind: ResourceKind,
        scope: &[&str],
        id: &str,
        event: EventKind,
    ) -> String {
        let mut subject = self.prefix(kind);
        for segment in scope.iter().copied().chain([id, event.segment()]) {
            subject.push('.');
            subject.push_str(segment);
        }
        subject
    }

    /// Every event kind of one resource. Unknown scope ids are `Token::Any`.
    pub fn resource_pattern(&self, kind: ResourceKind, scope: &[Token<'_>], id: &str) -> String {
        let mut pattern = self.scoped(kind, scope);
        pattern.push('.');
        pattern.push_str(id);
        pattern.push_str(".*");
        pattern
    }

    /// Every event of every resource of `kind` under `scope`.
    pub fn scoped_wildcard(&self, kind: ResourceKind, scope: &[Token<'_>]) -> String {
        let mut pattern = self.scoped(kind, scope);
        pattern.push_str(".>");
        pattern
    }

    fn prefix(&self, kind: ResourceKind) -> String {
        format!("{}.{}", self.domain, kind.segment())
    }

    fn scoped(&self, kind: ResourceKind, scope: &[Token<'_>]) -> String {
        let mut pattern = self.prefix(kind);
        for token in scope {
            pattern.push('.');
            pattern.push_str(token.as_segment());
        }
        pattern
    }
}

/// Match a concrete subject against a subscription pattern.
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut subject_segments = subject.split('.');
    for expected in pattern.split('.') {
        if expected == ">" {
            return subject_segments.next().is_some();
        }
        match subject_segments.next() {
            Some(actual) if expected == "*" || expected == actual => {}
            _ => return false,
        }
    }
    subject_segments.next().is_none()
}
