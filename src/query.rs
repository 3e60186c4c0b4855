use anyhow::{Result, bail};
use chrono::TimeDelta;

use crate::registry::{HostObject, ServiceObject};
use crate::state::{LogPeriod, ObjectState};

/// Columns the replay can evaluate against a partially constructed object:
/// the two name columns plus the joined live host/service projections.
pub fn is_object_column(name: &str) -> bool {
    name.starts_with("current_host_")
        || name.starts_with("current_service_")
        || name == "host_name"
        || name == "service_description"
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOp {
    Equal,
    NotEqual,
}

#[derive(Debug, Clone)]
pub struct ColumnMatch {
    pub column: String,
    pub op: MatchOp,
    pub value: String,
}

/// Conjunction of column matches.
#[derive(Debug, Clone, Default)]
pub struct QueryFilter {
    clauses: Vec<ColumnMatch>,
}

impl QueryFilter {
    pub fn new(clauses: Vec<ColumnMatch>) -> Self {
        Self { clauses }
    }

    /// Parse CLI clause specs (`column=value`, `column!=value`). Columns
    /// outside the object subset are rejected here, before the replay runs.
    pub fn parse(specs: &[String]) -> Result<Self> {
        let mut clauses = Vec::with_capacity(specs.len());
        for spec in specs {
            let (column, op, value) = if let Some((column, value)) = spec.split_once("!=") {
                (column, MatchOp::NotEqual, value)
            } else if let Some((column, value)) = spec.split_once('=') {
                (column, MatchOp::Equal, value)
            } else {
                bail!("invalid filter {spec:?}: expected column=value or column!=value");
            };
            if !is_object_column(column) && !is_object_column(&format!("current_{column}")) {
                bail!("filter column {column:?} is not an object column");
            }
            clauses.push(ColumnMatch {
                column: column.to_string(),
                op,
                value: value.to_string(),
            });
        }
        Ok(Self { clauses })
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The sub-filter containing only clauses whose column satisfies the
    /// predicate.
    pub fn partial<F: Fn(&str) -> bool>(&self, predicate: F) -> QueryFilter {
        QueryFilter {
            clauses: self
                .clauses
                .iter()
                .filter(|clause| predicate(&clause.column))
                .cloned()
                .collect(),
        }
    }

    pub fn accepts(&self, view: &IdentityView<'_>) -> bool {
        self.clauses.iter().all(|clause| {
            let actual = view.column(&clause.column).unwrap_or_default();
            match clause.op {
                MatchOp::Equal => actual == clause.value,
                MatchOp::NotEqual => actual != clause.value,
            }
        })
    }
}

/// The identity-only projection a nascent object exposes to the filter gate:
/// its names and the joined live objects. Nothing else is populated at that
/// point, so nothing else may be read.
pub struct IdentityView<'a> {
    pub host_name: &'a str,
    pub service_description: &'a str,
    pub host: Option<&'a HostObject>,
    pub service: Option<&'a ServiceObject>,
}

impl IdentityView<'_> {
    /// Column lookup with the transparent `current_` fallback. A missing
    /// joined object projects empty values.
    pub fn column(&self, name: &str) -> Option<String> {
        self.direct(name)
            .or_else(|| self.direct(&format!("current_{name}")))
    }

    fn direct(&self, name: &str) -> Option<String> {
        if name == "host_name" {
            return Some(self.host_name.to_string());
        }
        if name == "service_description" {
            return Some(self.service_description.to_string());
        }
        if let Some(column) = name.strip_prefix("current_host_") {
            return Some(
                self.host
                    .and_then(|host| host.column(column))
                    .unwrap_or_default(),
            );
        }
        if let Some(column) = name.strip_prefix("current_service_") {
            return Some(
                self.service
                    .and_then(|service| service.column(column))
                    .unwrap_or_default(),
            );
        }
        None
    }
}

/// One state-history query: the window, the (already parsed) filter, and the
/// client's timezone offset applied to emitted time columns downstream.
#[derive(Debug, Clone)]
pub struct ReplayQuery {
    pub period: LogPeriod,
    pub filter: QueryFilter,
    pub timezone_offset: TimeDelta,
}

impl ReplayQuery {
    pub fn new(period: LogPeriod) -> Self {
        Self {
            period,
            filter: QueryFilter::default(),
            timezone_offset: TimeDelta::zero(),
        }
    }

    /// The filter restricted to what the gate may evaluate during insertion.
    pub fn object_filter(&self) -> QueryFilter {
        self.filter.partial(is_object_column)
    }
}

/// Receiver of closed intervals. Returning `false` aborts the replay;
/// finalization is then skipped.
pub trait IntervalSink {
    fn accept(&mut self, interval: &ObjectState) -> bool;
}

/// Authorization check consulted before every emission.
pub trait QueryUser {
    fn is_authorized_for(
        &self,
        host: Option<&HostObject>,
        service: Option<&ServiceObject>,
        service_auth_only: bool,
    ) -> bool;
}

/// User that sees every object; the CLI runs with it.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllUser;

impl QueryUser for AllowAllUser {
    fn is_authorized_for(
        &self,
        _host: Option<&HostObject>,
        _service: Option<&ServiceObject>,
        _service_auth_only: bool,
    ) -> bool {
        true
    }
}
