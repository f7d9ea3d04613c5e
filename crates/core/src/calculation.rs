//! Arithmetic operations, value computation, and node input validation.
//!
//! A node's `calculated_value` is derived from its parent's value by applying
//! the node's [`Operation`] with the node's own `input_value`. Root nodes use
//! [`Operation::Start`] and simply carry their input through.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Every operation symbol accepted on the wire, in display order.
pub const VALID_OPERATIONS: &[&str] = &["START", "ADD", "SUB", "MUL", "DIV"];

pub const MSG_INVALID_OPERATION: &str =
    "Invalid operation. Must be one of: START, ADD, SUB, MUL, DIV";
pub const MSG_INPUT_REQUIRED: &str = "Input value is required and must be a number";
pub const MSG_INPUT_NOT_FINITE: &str = "Input value must be a finite number";
pub const MSG_DIVIDE_BY_ZERO: &str = "Cannot divide by zero";
pub const MSG_START_NOT_ALLOWED: &str = "START is only permitted for root nodes";

// ---------------------------------------------------------------------------
// Operation
// ---------------------------------------------------------------------------

/// The arithmetic step a node applies to its parent's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Start,
    Add,
    Sub,
    Mul,
    Div,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Start => "START",
            Operation::Add => "ADD",
            Operation::Sub => "SUB",
            Operation::Mul => "MUL",
            Operation::Div => "DIV",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "START" => Ok(Operation::Start),
            "ADD" => Ok(Operation::Add),
            "SUB" => Ok(Operation::Sub),
            "MUL" => Ok(Operation::Mul),
            "DIV" => Ok(Operation::Div),
            other => Err(CoreError::InvalidOperation(format!(
                "Unknown operation '{other}'. Must be one of: {}",
                VALID_OPERATIONS.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Computation
// ---------------------------------------------------------------------------

/// Apply `operation` to `current_value` with `input_value`.
///
/// `Start` ignores `current_value` and returns `input_value` unchanged.
/// Division by zero is rejected before any arithmetic happens, so the result
/// is never an infinity or NaN produced by the divisor.
pub fn compute(current_value: f64, operation: Operation, input_value: f64) -> Result<f64, CoreError> {
    match operation {
        Operation::Start => Ok(input_value),
        Operation::Add => Ok(current_value + input_value),
        Operation::Sub => Ok(current_value - input_value),
        Operation::Mul => Ok(current_value * input_value),
        Operation::Div => {
            if input_value == 0.0 {
                return Err(CoreError::InvalidOperation(MSG_DIVIDE_BY_ZERO.to_string()));
            }
            Ok(current_value / input_value)
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Collect every violation for a raw `(operation, input_value)` pair.
///
/// `input_value` is `None` when the caller supplied nothing or something that
/// is not a number. An empty result means the input is acceptable.
pub fn validate(operation: &str, input_value: Option<f64>) -> Vec<String> {
    let mut errors = Vec::new();

    let parsed = operation.parse::<Operation>().ok();
    if parsed.is_none() {
        errors.push(MSG_INVALID_OPERATION.to_string());
    }

    match input_value {
        None => errors.push(MSG_INPUT_REQUIRED.to_string()),
        Some(v) if !v.is_finite() => errors.push(MSG_INPUT_NOT_FINITE.to_string()),
        Some(v) => {
            if parsed == Some(Operation::Div) && v == 0.0 {
                errors.push(MSG_DIVIDE_BY_ZERO.to_string());
            }
        }
    }

    errors
}

/// Validate the input of a reply (a node appended under an existing parent).
///
/// Same rules as [`validate`], and `START` is additionally refused because it
/// is reserved for parentless root nodes.
pub fn validate_reply(operation: &str, input_value: Option<f64>) -> Vec<String> {
    let mut errors = validate(operation, input_value);
    if operation == Operation::Start.as_str() {
        errors.push(MSG_START_NOT_ALLOWED.to_string());
    }
    errors
}

/// Turn a violation list into a `Result`, parsing the operation on success.
pub fn into_checked(
    errors: Vec<String>,
    operation: &str,
    input_value: Option<f64>,
) -> Result<(Operation, f64), CoreError> {
    if !errors.is_empty() {
        return Err(CoreError::Validation(errors));
    }
    let op = operation.parse::<Operation>()?;
    let value = input_value.ok_or_else(|| CoreError::validation(MSG_INPUT_REQUIRED))?;
    Ok((op, value))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
