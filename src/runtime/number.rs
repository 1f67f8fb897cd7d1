//! Scalar writers: booleans, integers, floats and timestamps.
use std::io::Write as _;

use chrono::{DateTime, TimeZone};

pub fn write_bool(buf: &mut Vec<u8>, v: bool) {
    buf.extend_from_slice(if v { b"true" } else { b"false" });
}

pub fn write_i64(buf: &mut Vec<u8>, v: i64) {
    // writing into a Vec<u8> cannot fail
    let _ = write!(buf, "{v}");
}

pub fn write_u64(buf: &mut Vec<u8>, v: u64) {
    let _ = write!(buf, "{v}");
}

pub fn write_i128(buf: &mut Vec<u8>, v: i128) {
    let _ = write!(buf, "{v}");
}

pub fn write_u128(buf: &mut Vec<u8>, v: u128) {
    let _ = write!(buf, "{v}");
}

/// Shortest round-trip text at 64-bit precision; `null` when not finite.
pub fn write_f64(buf: &mut Vec<u8>, v: f64) {
    if !v.is_finite() {
        buf.extend_from_slice(super::NULL);
        return;
    }
    let abs = v.abs();
    let _ = if abs == 0.0 || (1e-6..1e21).contains(&abs) {
        write!(buf, "{v}")
    } else {
        write!(buf, "{v:e}")
    };
}

/// Shortest round-trip text at 32-bit precision; `null` when not finite.
pub fn write_f32(buf: &mut Vec<u8>, v: f32) {
    if !v.is_finite() {
        buf.extend_from_slice(super::NULL);
        return;
    }
    let abs = v.abs();
    let _ = if abs == 0.0 || (1e-6..1e21).contains(&abs) {
        write!(buf, "{v}")
    } else {
        write!(buf, "{v:e}")
    };
}

/// Unix seconds in UTC. Sub-second precision and the offset are dropped.
pub fn write_timestamp<Tz: TimeZone>(buf: &mut Vec<u8>, v: &DateTime<Tz>) {
    write_i64(buf, v.timestamp());
}
