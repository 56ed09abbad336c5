//! Word reversal transform

/// Reverse every whitespace-delimited word of `text`
///
/// Words keep their order; each word's characters are reversed and the
/// result is joined with single spaces.
///
/// ```
/// use mirror_bot::transform::reverse_words;
///
/// assert_eq!(reverse_words("hello world"), "olleh dlrow");
/// ```
#[must_use]
pub fn reverse_words(text: &str) -> String {
    split_words(text).join(" ")
}

/// Split `text` on whitespace and reverse each word, keeping order
#[must_use]
pub fn split_words(text: &str) -> Vec<String> {
    text.split_whitespace().map(reverse_word).collect()
}

fn reverse_word(word: &str) -> String {
    word.chars().rev().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reverse_words() {
        assert_eq!(reverse_words("hello world"), "olleh dlrow");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(reverse_words(""), "");
        assert_eq!(reverse_words("   \t\n "), "");
        assert!(split_words("  ").is_empty());
    }

    #[test]
    fn test_single_word_round_trip() {
        for word in ["a", "abc", "привет", "racecar", "🇷🇺x"] {
            assert_eq!(reverse_words(&reverse_words(word)), word);
        }
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(reverse_words("  ab\tcd\n\nef  "), "ba dc fe");
    }

    #[test]
    fn test_cyrillic() {
        assert_eq!(reverse_words("привет мир"), "тевирп рим");
    }

    #[test]
    fn test_punctuation_is_part_of_word() {
        assert_eq!(reverse_words("hi, there!"), ",ih !ereht");
    }

    #[test]
    fn test_split_words_order() {
        assert_eq!(split_words("one two three"), vec!["eno", "owt", "eerht"]);
    }
}
