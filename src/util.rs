//! Small utility helpers used across modules.

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}… ({} bytes total)", &s[..cut], s.len())
    }
}

/// Normalize a diagnosis label for comparison: surrounding whitespace only,
/// case preserved (options are delivered verbatim to the UI).
pub fn normalize_label(s: &str) -> &str {
    s.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trunc_keeps_short_strings() {
        assert_eq!(trunc_for_log("short", 16), "short");
    }

    #[test]
    fn trunc_respects_char_boundaries() {
        let s = "àààà";
        let t = trunc_for_log(s, 3);
        assert!(t.starts_with('à'));
    }

    #[test]
    fn normalize_trims_only() {
        assert_eq!(normalize_label("  Influenza "), "Influenza");
        assert_eq!(normalize_label("Flu"), "Flu");
    }
}
