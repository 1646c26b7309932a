/// Wraps `text` into lines no wider than `max_width` as reported by `measure`.
///
/// Paragraphs (`\n`) always start a new line and blank paragraphs keep an
/// empty line. A word wider than `max_width` is placed whole on its own line.
pub fn wrap_text<F>(text: &str, max_width: f32, measure: F) -> Vec<String>
where
    F: Fn(&str) -> f32,
{
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        wrap_paragraph(paragraph, max_width, &measure, &mut lines);
    }
    lines
}

fn wrap_paragraph<F>(paragraph: &str, max_width: f32, measure: &F, lines: &mut Vec<String>)
where
    F: Fn(&str) -> f32,
{
    let mut current = String::new();
    for word in paragraph.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if measure(&candidate) > max_width {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        } else {
            current = candidate;
        }
    }
    lines.push(current);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn char_width(text: &str) -> f32 {
        text.chars().count() as f32 * 10.0
    }

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn wraps_at_word_boundaries() {
        let lines = wrap_text("the quick brown fox jumps", 100.0, char_width);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
    }

    #[test]
    fn keeps_oversized_word_whole() {
        let lines = wrap_text("a supercalifragilistic b", 50.0, char_width);
        assert_eq!(lines, vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn lines_respect_width_unless_single_word() {
        let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do \
                    eiusmod tempor incididunt ut labore et dolore magna aliqua";
        for max_width in [30.0, 80.0, 120.0, 400.0] {
            let lines = wrap_text(text, max_width, char_width);
            for line in &lines {
                let single_word = line.split_whitespace().count() == 1;
                assert!(char_width(line) <= max_width || single_word, "{line:?}");
            }
            assert_eq!(words(&lines.join(" ")), words(text));
        }
    }

    #[test]
    fn preserves_paragraph_breaks() {
        let lines = wrap_text("first\n\nsecond", 1000.0, char_width);
        assert_eq!(lines, vec!["first", "", "second"]);
    }

    #[test]
    fn collapses_runs_of_spaces() {
        let lines = wrap_text("  spaced    out  ", 1000.0, char_width);
        assert_eq!(lines, vec!["spaced out"]);
    }
}
