//! InfluxDB line protocol encoding
//!
//! ```text
//! measurement,tag1=a,tag2=b field1=1i,field2=2.5,field3="text",field4=true
//! ```
//!
//! No timestamp is written: the server stamps points on receipt.

use netpulse_core::point::{FieldValue, MetricPoint};
use netpulse_core::{Error, Result};
use std::fmt::Write;

/// Encode one point as a single line (no trailing newline)
///
/// Fails with `InvalidInput` when no field survives filtering, since the
/// protocol requires at least one field.
pub fn encode(point: &MetricPoint) -> Result<String> {
    if point.measurement().is_empty() {
        return Err(Error::invalid_input("measurement name cannot be empty"));
    }
    if !point.has_fields() {
        return Err(Error::invalid_input(format!(
            "point '{}' has no fields to write",
            point.measurement()
        )));
    }

    let mut line = escape(point.measurement(), &[',', ' ']);

    for (key, value) in point.tags() {
        line.push(',');
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        line.push_str(&escape(value, &[',', '=', ' ']));
    }

    for (i, (key, value)) in point.fields().enumerate() {
        line.push(if i == 0 { ' ' } else { ',' });
        line.push_str(&escape(key, &[',', '=', ' ']));
        line.push('=');
        write_field_value(&mut line, value);
    }

    Ok(line)
}

fn write_field_value(out: &mut String, value: &FieldValue) {
    // Writing into a String cannot fail
    let _ = match value {
        FieldValue::Float(f) => write!(out, "{}", f),
        FieldValue::Integer(i) => write!(out, "{}i", i),
        FieldValue::Boolean(b) => write!(out, "{}", b),
        FieldValue::String(s) => write!(out, "\"{}\"", escape(s, &['"', '\\'])),
    };
}

/// Escape `special` characters, folding line breaks into spaces
///
/// The protocol is newline-delimited and has no escape for line breaks, so
/// a raw one would split the point.
fn escape(raw: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        let c = if matches!(c, '\n' | '\r') { ' ' } else { c };
        if special.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
