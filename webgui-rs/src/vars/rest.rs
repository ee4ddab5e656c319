//! REST access to typed variables
//!
//! GET serialises a variable to its canonical string, SET parses a string
//! into the variable's storage after validation.
//!
//! | type     | SET accepts                         | GET returns        |
//! |----------|-------------------------------------|--------------------|
//! | bool     | `true`/`1`, `false`/`0`             | `true`/`false`     |
//! | int      | decimal within `min..=max`          | decimal            |
//! | string   | length within `min..=max`           | value              |
//! | password | as string; `*...` leaves it alone   | [`MASK`]           |
//! | ipaddr   | dotted quad                         | dotted quad        |
//! | function | whatever the function accepts       | function output    |
//!
//! A failed SET never modifies storage. SET on a read-only variable is
//! accepted and ignored.

use std::net::Ipv4Addr;

use log::debug;
use serde::Serialize;

use super::{Binding, Invocation, TypedVariable, VarType, VariableRegistry, MASK};
use crate::error::VarError;

impl<C> VariableRegistry<C> {
    /// Read a variable as `(value, type)`
    pub fn get(&self, ctx: &C, name: &str) -> Result<(String, VarType), VarError> {
        let var = self.find(name).ok_or_else(|| VarError::NotFound(name.to_string()))?;
        Ok((serialize(var, ctx)?, var.vartype()))
    }

    /// Write a variable from its string form, returning its type
    pub fn set(&self, ctx: &mut C, name: &str, value: &str) -> Result<VarType, VarError> {
        let var = self.find(name).ok_or_else(|| VarError::NotFound(name.to_string()))?;
        if var.is_read_only() {
            debug!("Ignoring write to read-only variable '{}'", name);
            return Ok(var.vartype());
        }
        parse_into(var, ctx, value)?;
        Ok(var.vartype())
    }

    /// GET wrapped as a REST reply
    pub fn rest_get(&self, ctx: &C, name: &str) -> RestReply {
        match self.get(ctx, name) {
            Ok((value, vartype)) => RestReply::value(name, value, vartype),
            Err(e) => RestReply::error(name, &e),
        }
    }

    /// SET wrapped as a REST reply
    pub fn rest_set(&self, ctx: &mut C, name: &str, value: &str) -> RestReply {
        match self.set(ctx, name, value) {
            Ok(vartype) => RestReply::accepted(name, vartype),
            Err(e) => RestReply::error(name, &e),
        }
    }
}

fn serialize<C>(var: &TypedVariable<C>, ctx: &C) -> Result<String, VarError> {
    let value = match &var.binding {
        Binding::Bool { get, .. } => (if get(ctx) { "true" } else { "false" }).to_string(),
        Binding::Int { get, .. } => get(ctx).to_string(),
        Binding::Text { .. } if var.vartype() == VarType::Password => MASK.to_string(),
        Binding::Text { get, .. } => get(ctx),
        Binding::IpAddr { get, .. } => get(ctx).to_string(),
        Binding::Function(f) => f(Invocation::Read(ctx))?,
    };
    Ok(value)
}

fn parse_into<C>(var: &TypedVariable<C>, ctx: &mut C, value: &str) -> Result<(), VarError> {
    let alias = var.alias();
    match &var.binding {
        Binding::Bool { set, .. } => {
            let v = match value {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(VarError::invalid(alias, "expected true/false or 1/0")),
            };
            set(ctx, v);
        }
        Binding::Int { set, .. } => {
            let v: i64 = value
                .trim()
                .parse()
                .map_err(|_| VarError::invalid(alias, "not a decimal integer"))?;
            if v < var.min() || v > var.max() {
                return Err(VarError::invalid(
                    alias,
                    format!("{} is outside {}..={}", v, var.min(), var.max()),
                ));
            }
            set(ctx, v);
        }
        Binding::Text { set, .. } => {
            if var.vartype() == VarType::Password && value.starts_with('*') {
                debug!("Masked value for '{}', keeping stored secret", alias);
                return Ok(());
            }
            let len = value.len() as i64;
            if len < var.min() || len > var.max() {
                return Err(VarError::invalid(
                    alias,
                    format!("length {} is outside {}..={}", len, var.min(), var.max()),
                ));
            }
            set(ctx, value).map_err(|e| VarError::Overflow {
                alias: alias.to_string(),
                capacity: e.capacity,
            })?;
        }
        Binding::IpAddr { set, .. } => {
            let addr: Ipv4Addr = value
                .trim()
                .parse()
                .map_err(|_| VarError::invalid(alias, "not a dotted-decimal IPv4 address"))?;
            set(ctx, addr);
        }
        Binding::Function(f) => {
            f(Invocation::Write(ctx, value))?;
        }
    }
    Ok(())
}

/// JSON reply of the variable REST API.
///
/// `{"name":"otaint","value":"600","type":"int"}` for a GET,
/// `{"name":"otaint","type":"int"}` for an accepted SET and
/// `{"name":"nope","type":"error","error":"NOT_FOUND","error_descr":"..."}` on
/// failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestReply {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "type")]
    pub vartype: VarType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_descr: Option<String>,
    #[serde(skip)]
    status: u16,
}

impl RestReply {
    fn value(name: &str, value: String, vartype: VarType) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value),
            vartype,
            error: None,
            error_descr: None,
            status: 200,
        }
    }

    fn accepted(name: &str, vartype: VarType) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            vartype,
            error: None,
            error_descr: None,
            status: 200,
        }
    }

    fn error(name: &str, err: &VarError) -> Self {
        Self {
            name: name.to_string(),
            value: None,
            vartype: VarType::Error,
            error: Some(err.code()),
            error_descr: Some(err.to_string()),
            status: err.http_status(),
        }
    }

    /// HTTP status for this reply
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn to_json(&self) -> String {
        // Only plain strings and enums inside, serialisation cannot fail
        serde_json::to_string(self).unwrap_or_default()
    }
}
