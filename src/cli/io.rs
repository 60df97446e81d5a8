//! JSON output for CLI commands
//!
//! One JSON object per command on stdout; logs go to stderr.

use std::io::{self, Write};

use serde::Serialize;

use super::errors::CliResult;

/// Write `{"status": ..., "data": ...}` followed by a newline
pub fn write_response_to<W: Write, T: Serialize>(out: &mut W, status: &str, data: &T) -> CliResult<()> {
    let response = serde_json::json!({
        "status": status,
        "data": data,
    });

    serde_json::to_writer(&mut *out, &response)?;
    writeln!(out)?;
    out.flush()?;

    Ok(())
}

/// Write a response to stdout
pub fn write_response<T: Serialize>(status: &str, data: &T) -> CliResult<()> {
    let stdout = io::stdout();
    let mut lock = stdout.lock();
    write_response_to(&mut lock, status, data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_shape() {
        let mut out = Vec::new();
        write_response_to(&mut out, "ok", &serde_json::json!({"created": ["t"]})).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "{\"data\":{\"created\":[\"t\"]},\"status\":\"ok\"}\n");
    }
}
