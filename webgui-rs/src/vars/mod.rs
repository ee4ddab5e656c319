//! Typed variables
//!
//! A [`TypedVariable`] binds a stable alias to a value living somewhere in a
//! context object `C` (normally [`DeviceState`](crate::DeviceState)). The
//! binding is a set of accessor closures, so the registry never holds raw
//! addresses and never owns the storage it exposes.
//!
//! Variables are collected in a [`VariableRegistry`]: one built-in table plus
//! a single application table. GET/SET with per-type parsing, validation and
//! secret masking live in [`rest`].

use std::borrow::Cow;
use std::fmt;
use std::net::Ipv4Addr;

use serde::Serialize;

use crate::error::{Overflow, VarError};

mod builtin;
mod registry;
pub mod rest;

pub use builtin::builtin_variables;
pub use registry::VariableRegistry;
pub use rest::RestReply;

/// Placeholder returned instead of any secret.
///
/// Also recognised on input: a value starting with `*` leaves the secret
/// unchanged, so re-submitting a form that shows the mask is harmless.
pub const MASK: &str = "********";

/// Variable type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VarType {
    Bool,
    Int,
    String,
    Password,
    IpAddr,
    Function,
    /// Reported for failed lookups; never bound to storage
    Error,
}

impl VarType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VarType::Bool => "bool",
            VarType::Int => "int",
            VarType::String => "string",
            VarType::Password => "password",
            VarType::IpAddr => "ipaddr",
            VarType::Function => "function",
            VarType::Error => "error",
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Call made into a FUNCTION variable.
pub enum Invocation<'a, C> {
    /// Render the current value
    Read(&'a C),
    /// Apply a new value
    Write(&'a mut C, &'a str),
}

type Getter<C, T> = Box<dyn Fn(&C) -> T + Send + Sync>;
type Setter<C, T> = Box<dyn Fn(&mut C, T) + Send + Sync>;
type TextSetter<C> = Box<dyn Fn(&mut C, &str) -> Result<(), Overflow> + Send + Sync>;
type Function<C> = Box<dyn Fn(Invocation<'_, C>) -> Result<String, VarError> + Send + Sync>;

pub(crate) enum Binding<C> {
    Bool { get: Getter<C, bool>, set: Setter<C, bool> },
    Int { get: Getter<C, i64>, set: Setter<C, i64> },
    /// STRING and PASSWORD
    Text { get: Getter<C, String>, set: TextSetter<C> },
    IpAddr { get: Getter<C, Ipv4Addr>, set: Setter<C, Ipv4Addr> },
    Function(Function<C>),
}

/// A named, typed, access-controlled binding.
pub struct TypedVariable<C> {
    alias: Cow<'static, str>,
    vartype: VarType,
    access: Access,
    min: i64,
    max: i64,
    pub(crate) binding: Binding<C>,
}

impl<C> TypedVariable<C> {
    fn new(alias: impl Into<Cow<'static, str>>, vartype: VarType, min: i64, max: i64, binding: Binding<C>) -> Self {
        Self {
            alias: alias.into(),
            vartype,
            access: Access::ReadWrite,
            min,
            max,
            binding,
        }
    }

    /// Boolean variable, serialised as `true`/`false`.
    pub fn boolean<G, S>(alias: impl Into<Cow<'static, str>>, get: G, set: S) -> Self
    where
        G: Fn(&C) -> bool + Send + Sync + 'static,
        S: Fn(&mut C, bool) + Send + Sync + 'static,
    {
        Self::new(alias, VarType::Bool, 0, 1, Binding::Bool { get: Box::new(get), set: Box::new(set) })
    }

    /// Integer variable accepting `min..=max`.
    pub fn int<G, S>(alias: impl Into<Cow<'static, str>>, min: i64, max: i64, get: G, set: S) -> Self
    where
        G: Fn(&C) -> i64 + Send + Sync + 'static,
        S: Fn(&mut C, i64) + Send + Sync + 'static,
    {
        Self::new(alias, VarType::Int, min, max, Binding::Int { get: Box::new(get), set: Box::new(set) })
    }

    /// String variable whose length in bytes must be within `min..=max`.
    pub fn string<G, S>(alias: impl Into<Cow<'static, str>>, min: i64, max: i64, get: G, set: S) -> Self
    where
        G: Fn(&C) -> String + Send + Sync + 'static,
        S: Fn(&mut C, &str) -> Result<(), Overflow> + Send + Sync + 'static,
    {
        Self::new(alias, VarType::String, min, max, Binding::Text { get: Box::new(get), set: Box::new(set) })
    }

    /// Secret string: validated like a string, always read back as [`MASK`].
    pub fn password<G, S>(alias: impl Into<Cow<'static, str>>, min: i64, max: i64, get: G, set: S) -> Self
    where
        G: Fn(&C) -> String + Send + Sync + 'static,
        S: Fn(&mut C, &str) -> Result<(), Overflow> + Send + Sync + 'static,
    {
        Self::new(alias, VarType::Password, min, max, Binding::Text { get: Box::new(get), set: Box::new(set) })
    }

    /// IPv4 address in dotted-decimal form.
    pub fn ip_addr<G, S>(alias: impl Into<Cow<'static, str>>, get: G, set: S) -> Self
    where
        G: Fn(&C) -> Ipv4Addr + Send + Sync + 'static,
        S: Fn(&mut C, Ipv4Addr) + Send + Sync + 'static,
    {
        Self::new(alias, VarType::IpAddr, 0, 0, Binding::IpAddr { get: Box::new(get), set: Box::new(set) })
    }

    /// Variable fully implemented by a function.
    ///
    /// The function receives [`Invocation::Read`] on GET and
    /// [`Invocation::Write`] on SET; the returned string is the GET value and
    /// is ignored for SET.
    pub fn function<F>(alias: impl Into<Cow<'static, str>>, f: F) -> Self
    where
        F: Fn(Invocation<'_, C>) -> Result<String, VarError> + Send + Sync + 'static,
    {
        Self::new(alias, VarType::Function, 0, 0, Binding::Function(Box::new(f)))
    }

    /// Mark the variable read-only: SET succeeds without touching storage.
    pub fn read_only(mut self) -> Self {
        self.access = Access::ReadOnly;
        self
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn vartype(&self) -> VarType {
        self.vartype
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn is_read_only(&self) -> bool {
        self.access == Access::ReadOnly
    }

    /// Lower bound: value for INT, length for STRING/PASSWORD
    pub fn min(&self) -> i64 {
        self.min
    }

    /// Upper bound: value for INT, length for STRING/PASSWORD
    pub fn max(&self) -> i64 {
        self.max
    }
}

impl<C> fmt::Debug for TypedVariable<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedVariable")
            .field("alias", &self.alias)
            .field("vartype", &self.vartype)
            .field("access", &self.access)
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}
