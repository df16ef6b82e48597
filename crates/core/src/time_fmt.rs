// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Elapsed-time formatting for log lines.

/// Format a millisecond duration as a compact human string.
///
/// `850` → `"850ms"`, `65_000` → `"1m5s"`, `7_200_000` → `"2h0m"`.
pub fn format_elapsed_ms(ms: u64) -> String {
    if ms < 1_000 {
        return format!("{}ms", ms);
    }
    let secs = ms / 1_000;
    if secs < 60 {
        return format!("{}s", secs);
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{}m{}s", mins, secs % 60);
    }
    format!("{}h{}m", mins / 60, mins % 60)
}
