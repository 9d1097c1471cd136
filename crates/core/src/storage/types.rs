use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::TimeWindowError;

/// A partial update: attribute name to new value, merged into an existing
/// item by exact primary key. Attribute-level, not field-of-struct-level,
/// because that is the unit DynamoDB updates.
pub type FieldPatch = HashMap<String, Value>;

/// A timestamp range with inclusive start and end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new window, validating that start <= end.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeWindowError> {
        if start > end {
            return Err(TimeWindowError::Inverted);
        }
        Ok(Self { start, end })
    }

    /// True when `t` falls within the window, bounds included.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t <= self.end
    }
}

/// The normalized form of an optional (start, end) pair.
///
/// Every query operation takes one of these instead of two raw optional
/// timestamps, so the three outcomes stay distinguishable to callers:
/// no filter at all, a validated range, or input that can never match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowFilter {
    /// Both bounds absent: key-only query, no time filtering.
    #[default]
    Unbounded,
    /// Both bounds present, parseable, and in order.
    Between(TimeWindow),
    /// Inverted, unparseable, or half-open input. Matches nothing; query
    /// operations short-circuit to an empty result without touching the
    /// store.
    Empty,
}

impl WindowFilter {
    /// Normalizes a pair of optional bounds.
    ///
    /// Exactly one bound present is treated as invalid rather than as "no
    /// filter": a caller that supplied half a window almost certainly did
    /// not mean an unbounded scan.
    pub fn from_bounds(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        match (start, end) {
            (None, None) => WindowFilter::Unbounded,
            (Some(start), Some(end)) => match TimeWindow::new(start, end) {
                Ok(window) => WindowFilter::Between(window),
                Err(_) => {
                    tracing::warn!(%start, %end, "inverted time window, matching nothing");
                    WindowFilter::Empty
                }
            },
            (start, end) => {
                tracing::warn!(?start, ?end, "half-open time window, matching nothing");
                WindowFilter::Empty
            }
        }
    }

    /// Normalizes a pair of optional RFC 3339 strings. Unparseable input
    /// yields [`WindowFilter::Empty`].
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Self {
        let parse_bound = |s: &str| {
            DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .ok()
        };

        match (start, end) {
            (None, None) => WindowFilter::Unbounded,
            (Some(start), Some(end)) => match (parse_bound(start), parse_bound(end)) {
                (Some(start), Some(end)) => Self::from_bounds(Some(start), Some(end)),
                _ => {
                    tracing::warn!(start, end, "unparseable time window, matching nothing");
                    WindowFilter::Empty
                }
            },
            (start, end) => {
                tracing::warn!(?start, ?end, "half-open time window, matching nothing");
                WindowFilter::Empty
            }
        }
    }

    /// The validated range, when one applies.
    pub fn range(&self) -> Option<&TimeWindow> {
        match self {
            WindowFilter::Between(window) => Some(window),
            _ => None,
        }
    }

    /// True when the filter can never match any item.
    pub fn matches_nothing(&self) -> bool {
        matches!(self, WindowFilter::Empty)
    }

    /// True when `t` passes the filter.
    pub fn matches(&self, t: DateTime<Utc>) -> bool {
        match self {
            WindowFilter::Unbounded => true,
            WindowFilter::Between(window) => window.contains(t),
            WindowFilter::Empty => false,
        }
    }
}
