//! Caveat checkers
//!
//! A [`CheckerRegistry`] maps condition names to pure checker functions and
//! carries the context of the one request it was built for. The set of
//! names is fixed by [`CheckerRegistry::standard`]; a caveat whose name is
//! not registered always fails.
//!
//! | Condition | Passes when |
//! |-----------|-------------|
//! | `time-before <RFC 3339>` | now is strictly before the timestamp |
//! | `object <id>` | the request addresses exactly `<id>` |
//! | `operation <op>,..` | the request operation is listed |
//! | `method <METHOD>,..` | the request HTTP method is listed |
//! | `client-ip-addr <ip>` | the peer address equals `<ip>` |
//! | `client-origin <origin>` | the `Origin` header equals `<origin>` |
//! | `declared <key> <value>` | the token declares `<key>` as `<value>` |
//! | `error <message>` | never |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::declared::{parse_declaration, Declared, DECLARED_CONDITION};
use crate::token::split_condition;

/// `time-before` condition name
pub const TIME_BEFORE: &str = "time-before";
/// `object` condition name
pub const OBJECT: &str = "object";
/// `operation` condition name
pub const OPERATION: &str = "operation";
/// `method` condition name
pub const METHOD: &str = "method";
/// `client-ip-addr` condition name
pub const CLIENT_IP_ADDR: &str = "client-ip-addr";
/// `client-origin` condition name
pub const CLIENT_ORIGIN: &str = "client-origin";
/// `error` condition name
pub const ERROR: &str = "error";

/// The binding caveat minted into every new token
pub fn object_caveat(object: impl fmt::Display) -> String {
    format!("{OBJECT} {object}")
}

/// What a request wants to do with an object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Read the object contents
    Fetch,
    /// Remove the object
    Delete,
}

impl Operation {
    /// Name used in `operation` caveats
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which caveat kind restricts the allowed action.
///
/// A deployment registers exactly one of `operation` and `method`; a token
/// using the other one fails as an unknown condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionScheme {
    /// `operation fetch,delete`
    #[default]
    Operation,
    /// `method POST,DELETE`
    Method,
}

impl FromStr for ActionScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "operation" => Ok(Self::Operation),
            "method" => Ok(Self::Method),
            other => Err(format!(
                "unknown action scheme {other:?}, expected \"operation\" or \"method\""
            )),
        }
    }
}

/// Live facts about one request
#[derive(Debug, Clone)]
pub struct CheckContext {
    /// Time the request is evaluated at
    pub now: DateTime<Utc>,
    /// Object identifier from the request path
    pub object: String,
    /// Operation derived from the route
    pub operation: Operation,
    /// HTTP method of the request
    pub method: String,
    /// Observed peer address, if the transport exposes it
    pub client_addr: Option<IpAddr>,
    /// `Origin` header, if present
    pub origin: Option<String>,
}

/// Why a caveat did not pass
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CheckFailure {
    /// No checker is registered under this name
    #[error("caveat not recognized: {name:?}")]
    UnknownCondition {
        /// Condition name as carried
        name: String,
    },
    /// The caveat argument or the request fact it needs could not be parsed
    #[error("malformed argument: {reason}")]
    MalformedArgument {
        /// What could not be parsed
        reason: String,
    },
    /// The condition is well formed but false for this request
    #[error("{reason}")]
    NotSatisfied {
        /// Why the condition is false
        reason: String,
    },
}

impl CheckFailure {
    fn not_satisfied(reason: impl Into<String>) -> Self {
        Self::NotSatisfied {
            reason: reason.into(),
        }
    }

    fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedArgument {
            reason: reason.into(),
        }
    }
}

/// Signature of every checker: declared values, caveat argument, context
pub type CheckerFn = fn(&Declared, &str, &CheckContext) -> Result<(), CheckFailure>;

/// Condition checkers bound to one request
#[derive(Clone)]
pub struct CheckerRegistry {
    checkers: BTreeMap<&'static str, CheckerFn>,
    context: CheckContext,
    declared: Declared,
}

impl CheckerRegistry {
    /// Registry with no checkers; every caveat fails
    pub fn empty(context: CheckContext, declared: Declared) -> Self {
        Self {
            checkers: BTreeMap::new(),
            context,
            declared,
        }
    }

    /// The fixed checker set of this service
    pub fn standard(scheme: ActionScheme, context: CheckContext, declared: Declared) -> Self {
        let registry = Self::empty(context, declared)
            .with_checker(TIME_BEFORE, check_time_before)
            .with_checker(OBJECT, check_object)
            .with_checker(CLIENT_IP_ADDR, check_client_ip_addr)
            .with_checker(CLIENT_ORIGIN, check_client_origin)
            .with_checker(DECLARED_CONDITION, check_declared)
            .with_checker(ERROR, check_error);
        match scheme {
            ActionScheme::Operation => registry.with_checker(OPERATION, check_operation),
            ActionScheme::Method => registry.with_checker(METHOD, check_method),
        }
    }

    /// Register `checker` under `name`, replacing any previous one
    pub fn with_checker(mut self, name: &'static str, checker: CheckerFn) -> Self {
        self.checkers.insert(name, checker);
        self
    }

    /// Whether `name` has a checker
    pub fn contains(&self, name: &str) -> bool {
        self.checkers.contains_key(name)
    }

    /// Registered condition names
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.checkers.keys().copied()
    }

    /// Request context the checkers run against
    pub fn context(&self) -> &CheckContext {
        &self.context
    }

    /// Declared values the checkers see
    pub fn declared(&self) -> &Declared {
        &self.declared
    }

    /// Evaluate one caveat condition
    pub fn check(&self, condition: &str) -> Result<(), CheckFailure> {
        let (name, argument) = split_condition(condition);
        let checker = self
            .checkers
            .get(name)
            .ok_or_else(|| CheckFailure::UnknownCondition {
                name: name.to_string(),
            })?;
        checker(&self.declared, argument, &self.context)
    }
}

impl fmt::Debug for CheckerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckerRegistry")
            .field("conditions", &self.checkers.keys().collect::<Vec<_>>())
            .field("context", &self.context)
            .field("declared", &self.declared)
            .finish()
    }
}

fn check_time_before(_: &Declared, arg: &str, ctx: &CheckContext) -> Result<(), CheckFailure> {
    let deadline = DateTime::parse_from_rfc3339(arg)
        .map_err(|e| CheckFailure::malformed(format!("invalid timestamp {arg:?}: {e}")))?;
    if ctx.now < deadline {
        Ok(())
    } else {
        Err(CheckFailure::not_satisfied("token has expired"))
    }
}

fn check_object(_: &Declared, arg: &str, ctx: &CheckContext) -> Result<(), CheckFailure> {
    if arg == ctx.object {
        Ok(())
    } else {
        Err(CheckFailure::not_satisfied("request does not match"))
    }
}

fn listed(allowed: &str, wanted: &str) -> bool {
    allowed
        .split(',')
        .any(|entry| entry.trim().eq_ignore_ascii_case(wanted.trim()))
}

fn check_operation(_: &Declared, arg: &str, ctx: &CheckContext) -> Result<(), CheckFailure> {
    if listed(arg, ctx.operation.as_str()) {
        Ok(())
    } else {
        Err(CheckFailure::not_satisfied(format!(
            "operation {:?} not allowed",
            ctx.operation.as_str()
        )))
    }
}

fn check_method(_: &Declared, arg: &str, ctx: &CheckContext) -> Result<(), CheckFailure> {
    if listed(arg, &ctx.method) {
        Ok(())
    } else {
        Err(CheckFailure::not_satisfied(format!(
            "method {:?} not allowed",
            ctx.method
        )))
    }
}

fn check_client_ip_addr(_: &Declared, arg: &str, ctx: &CheckContext) -> Result<(), CheckFailure> {
    let allowed: IpAddr = arg
        .parse()
        .map_err(|_| CheckFailure::malformed(format!("cannot parse IP address {arg:?}")))?;
    let observed = ctx
        .client_addr
        .ok_or_else(|| CheckFailure::malformed("client address unknown"))?;
    if allowed.to_canonical() == observed.to_canonical() {
        Ok(())
    } else {
        Err(CheckFailure::not_satisfied(format!(
            "client IP address mismatch, got {observed}"
        )))
    }
}

fn check_client_origin(_: &Declared, arg: &str, ctx: &CheckContext) -> Result<(), CheckFailure> {
    let origin = ctx.origin.as_deref().unwrap_or_default();
    if origin == arg {
        Ok(())
    } else {
        Err(CheckFailure::not_satisfied(format!(
            "request has invalid Origin header; got {origin:?}"
        )))
    }
}

fn check_declared(declared: &Declared, arg: &str, _: &CheckContext) -> Result<(), CheckFailure> {
    let (key, value) = parse_declaration(arg)
        .ok_or_else(|| CheckFailure::malformed(format!("invalid declaration {arg:?}")))?;
    match declared.get(key) {
        Some(actual) if actual == value => Ok(()),
        Some(actual) => Err(CheckFailure::not_satisfied(format!(
            "got {key}={actual:?}, expected {value:?}"
        ))),
        None => Err(CheckFailure::not_satisfied(format!(
            "got {key}=null, expected {value:?}"
        ))),
    }
}

fn check_error(_: &Declared, arg: &str, _: &CheckContext) -> Result<(), CheckFailure> {
    Err(CheckFailure::not_satisfied(format!("bad caveat: {arg}")))
}
