const SUMMARY_MAX_CHARS: usize = 200;

/// One-line cause for a failed run (non-zero exit).
///
/// Prefers the last stderr line since the tool reports errors there, then
/// stdout, then `"exit code {N}"`.
pub fn failure_summary(stdout: &str, stderr: &str, exit_code: i32) -> String {
    let stderr_line = last_non_empty_line(stderr);
    if !stderr_line.is_empty() {
        return format!(
            "exit code {exit_code}: {}",
            truncate_line(stderr_line, SUMMARY_MAX_CHARS)
        );
    }

    let stdout_line = last_non_empty_line(stdout);
    if !stdout_line.is_empty() {
        return format!(
            "exit code {exit_code}: {}",
            truncate_line(stdout_line, SUMMARY_MAX_CHARS)
        );
    }

    format!("exit code {exit_code}")
}

fn last_non_empty_line(text: &str) -> &str {
    text.lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("")
}

fn truncate_line(line: &str, max_chars: usize) -> String {
    if line.chars().nth(max_chars).is_none() {
        line.to_string()
    } else {
        let truncated: String = line.chars().take(max_chars - 3).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_summary_multibyte_truncation() {
        let mut long_line = "a".repeat(196);
        for _ in 0..10 {
            long_line.push('🔥');
        }
        let summary = failure_summary("", &long_line, 1);
        let body = summary.strip_prefix("exit code 1: ").unwrap();
        assert_eq!(body.chars().count(), 200);
        assert!(body.strip_suffix("...").unwrap().ends_with('🔥'));
    }

    #[test]
    fn test_failure_summary_priority() {
        assert_eq!(
            failure_summary("partial", "auth error\n", 2),
            "exit code 2: auth error"
        );
        assert_eq!(failure_summary("only stdout\n", "", 1), "exit code 1: only stdout");
        assert_eq!(failure_summary("", "  \n", 137), "exit code 137");
    }
}
