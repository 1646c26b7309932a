use regex::Regex;
use std::sync::LazyLock;

struct Rewrite {
    pattern: Regex,
    replacement: &'static str,
}

// Order matters: later rules assume the earlier ones already ran.
static REWRITES: LazyLock<Vec<Rewrite>> = LazyLock::new(|| {
    let rule = |pattern: &str, replacement: &'static str| Rewrite {
        pattern: Regex::new(pattern).expect("markdown rewrite pattern"),
        replacement,
    };
    vec![
        rule(r"\*\*(.*?)\*\*", "$1"),
        rule(r"\*(.*?)\*", "$1"),
        rule(r"`([^`\n]+)`", "$1"),
        rule(r"(?s)```.*?```", "[Code Block]"),
        rule(r"(?m)^(?:#{1,6}[ \t]+)+", ""),
        rule(r"\[([^\]]+)\]\([^)]*\)", "$1"),
        rule(r"(?m)^[ \t]*[-*+][ \t]+", "• "),
        rule(r"(?m)^[ \t]*(?:\d+\.[ \t]+)+", ""),
    ]
});

/// Converts message markdown into plain text suitable for painting.
///
/// The rewrite list is applied until the text stops changing, so stripping
/// already-stripped text is a no-op.
pub fn strip_markdown(text: &str) -> String {
    // Every firing rule consumes markup characters (`*`, `` ` ``, `#`, `[`,
    // `-`, `+`, digits before `.`) that no replacement produces, so this ends.
    let mut current = text.to_string();
    loop {
        let next = apply_rewrites(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn apply_rewrites(text: &str) -> String {
    let mut out = text.to_string();
    for rewrite in REWRITES.iter() {
        out = rewrite
            .pattern
            .replace_all(&out, rewrite.replacement)
            .into_owned();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_emphasis_and_inline_code() {
        assert_eq!(strip_markdown("Hello **world**"), "Hello world");
        assert_eq!(strip_markdown("an *italic* word"), "an italic word");
        assert_eq!(strip_markdown("run `cargo fmt` now"), "run cargo fmt now");
    }

    #[test]
    fn replaces_fenced_blocks() {
        let input = "Before\n```rust\nfn main() {}\n```\nAfter";
        assert_eq!(strip_markdown(input), "Before\n[Code Block]\nAfter");
    }

    #[test]
    fn strips_headers_links_and_lists() {
        let input = "## Title\nSee [the docs](https://example.com).\n- one\n* two\n1. first\n2. second";
        assert_eq!(
            strip_markdown(input),
            "Title\nSee the docs.\n• one\n• two\nfirst\nsecond"
        );
    }

    #[test]
    fn stripping_is_idempotent() {
        let samples = [
            "Hello **world**",
            "***bold italic***",
            "# # nested header",
            "1. - mixed list",
            "[[inner](a)](b)",
            "```\ncode\n``` and `tick`",
            "**a*",
            "plain text stays plain",
            "  * indented bullet\n  2. indented number",
        ];
        for sample in samples {
            let once = strip_markdown(sample);
            assert_eq!(strip_markdown(&once), once, "sample: {sample:?}");
        }
    }

    #[test]
    fn deeply_nested_links_are_fully_unwrapped() {
        let mut text = "a".to_string();
        for depth in 0..10 {
            text = format!("[{text}](u{depth})");
        }
        let once = strip_markdown(&text);
        assert_eq!(once, "a");
        assert_eq!(strip_markdown(&once), once);
    }

    #[test]
    fn long_marker_runs_are_stable() {
        for n in 1..=40 {
            for marker in ["*", "`"] {
                let text = format!("{run}x{run} y", run = marker.repeat(n));
                let once = strip_markdown(&text);
                assert_eq!(strip_markdown(&once), once, "{marker} x {n}");
            }
        }
    }
}
