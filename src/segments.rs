use unicode_segmentation::UnicodeSegmentation;

/// First sentence of an oracle answer, always ending in a period.
pub fn first_sentence(text: &str) -> String {
    let first = text
        .unicode_sentences()
        .map(str::trim)
        .find(|s| !s.is_empty())
        .unwrap_or("");
    let body = first.trim_end_matches(['.', '!', '?', '。', '！', '？']).trim_end();
    format!("{body}.")
}

/// Cuts the program body out of a generation response: everything after
/// `start_marker` (when present) up to and including the first `end_marker`.
pub fn slice_program<'a>(response: &'a str, start_marker: &str, end_marker: &str) -> &'a str {
    let body = match response.find(start_marker) {
        Some(i) => &response[i + start_marker.len()..],
        None => response,
    };
    let body = body.trim();
    match body.find(end_marker) {
        Some(j) => body[..j + end_marker.len()].trim(),
        None => body,
    }
}

/// Whitespace-separated word count, used to size token budgets.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_only_first_sentence() {
        assert_eq!(first_sentence("Toyota Camry. It was released in 2006."), "Toyota Camry.");
        assert_eq!(first_sentence("  Paris"), "Paris.");
        assert_eq!(first_sentence("Is it? Maybe."), "Is it.");
    }

    #[test]
    fn decimal_points_do_not_split_answers() {
        assert_eq!(first_sentence("About 3.5 million people. Source: census."), "About 3.5 million people.");
    }

    #[test]
    fn empty_answer_is_a_bare_period() {
        assert_eq!(first_sentence("   "), ".");
    }

    #[test]
    fn slices_program_between_markers() {
        let resp = "prompt text ... with #end.\ndef program():\n    fact_1 = Verify(\"a\")\n#end\ntrailing chatter";
        assert_eq!(slice_program(resp, "with #end.", "#end"), "def program():\n    fact_1 = Verify(\"a\")\n#end");
        assert_eq!(slice_program("def program():\n  x = 1", "absent", "#end"), "def program():\n  x = 1");
    }

    #[test]
    fn counts_words() {
        assert_eq!(word_count(" Who  is\tthe rookie? "), 4);
    }
}
