//! Small validators used by configuration checks.
//!
//! Each returns a static message on failure; callers add the field name.

use std::net::IpAddr;
use std::ops::RangeInclusive;
use std::path::Path;

/// Port 0 is reserved and cannot address a controller.
pub fn is_valid_port(port: u16) -> Result<(), &'static str> {
    if port > 0 {
        Ok(())
    } else {
        Err("Port number must be greater than 0")
    }
}

/// Accepts IPv4 and IPv6 literals. Host names are rejected.
pub fn is_valid_ip(ip: &str) -> Result<(), &'static str> {
    ip.parse::<IpAddr>()
        .map(|_| ())
        .map_err(|_| "Invalid IP address")
}

/// Checks that a configured path is usable as a directory name.
///
/// Existence is not checked here; that is a startup concern.
pub fn is_valid_path(path: &Path) -> Result<(), &'static str> {
    let raw = path.as_os_str();
    if raw.is_empty() {
        return Err("Path cannot be empty");
    }
    if raw.to_string_lossy().contains('\0') {
        return Err("Path cannot contain null bytes");
    }
    Ok(())
}

/// Check that `value` lies within `range`.
pub fn is_in_range<T: PartialOrd>(value: T, range: RangeInclusive<T>) -> Result<(), &'static str> {
    if range.contains(&value) {
        Ok(())
    } else {
        Err("Value is outside the allowed range")
    }
}

/// Finite and strictly greater than zero.
pub fn is_positive(value: f64) -> Result<(), &'static str> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err("Value must be a positive number")
    }
}

/// Finite and zero or greater.
pub fn is_non_negative(value: f64) -> Result<(), &'static str> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err("Value must be zero or a positive number")
    }
}
