use super::CatalogError;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Category names the bot looks up in the catalog
pub mod category {
    pub const QUESTIONS: &str = "questions";
    pub const START: &str = "start";
    pub const HELP: &str = "help";
    pub const UNKNOWN: &str = "unknown";
    pub const BLACKLISTED: &str = "blacklisted";
    pub const COOLDOWN: &str = "cooldown";
    pub const INVALID_ANSWER: &str = "invalid_answer";
    pub const INVALID_CHARACTERS: &str = "invalid_characters";
    pub const INVALID_SUBMISSION: &str = "invalid_submission";
    pub const THANKS: &str = "thanks";
    pub const FAILURE: &str = "failure";
    pub const NO_RECENT: &str = "no_recent";
}

/// Built-in text for categories the catalog file leaves out
fn fallback_text(name: &str) -> &'static str {
    match name {
        category::START => "Hi! Send /report to report a sighting or /recent to see the latest ones.",
        category::HELP => "Send /report to report a sighting or /recent to see the latest ones.",
        category::BLACKLISTED => "Sorry, you are not allowed to submit reports.",
        category::COOLDOWN => "You have reported recently. Please wait a while before reporting again.",
        category::INVALID_ANSWER => "That answer must be between {min} and {max} characters long.",
        category::INVALID_CHARACTERS => "Please use plain English letters, digits and punctuation only.",
        category::INVALID_SUBMISSION => "Your report could not be accepted. Please send /report to start over.",
        category::THANKS => "Thank you! Your report has been recorded.",
        category::FAILURE => "Something went wrong while saving your report. Please try /report again later.",
        category::NO_RECENT => "No sightings have been reported in the past week.",
        _ => "Sorry, I don't understand that. Send /help to see what I can do.",
    }
}

/// Reply templates keyed by category, in file order
#[derive(Debug, Clone, Default)]
pub struct ReplyCatalog {
    categories: HashMap<String, Vec<String>>,
}

impl ReplyCatalog {
    /// Read and parse a catalog file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reply catalog {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid reply catalog {}", path.display()))
    }

    /// Parse blocks of `<count> <category>` followed by `count` literal lines.
    ///
    /// Blank lines between blocks are ignored; lines inside a block are kept
    /// verbatim. A later block with the same name replaces the earlier one.
    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        let mut categories = HashMap::new();
        let mut lines = text.lines().enumerate();

        while let Some((idx, raw)) = lines.next() {
            let header = raw.trim();
            if header.is_empty() {
                continue;
            }

            let bad_header = || CatalogError::BadHeader {
                line: idx + 1,
                found: header.to_string(),
            };
            let (count, name) = header.split_once(char::is_whitespace).ok_or_else(bad_header)?;
            let count: usize = count.parse().map_err(|_| bad_header())?;
            let name = name.trim();
            if name.is_empty() {
                return Err(bad_header());
            }

            let mut templates = Vec::with_capacity(count);
            for _ in 0..count {
                match lines.next() {
                    Some((_, line)) => templates.push(line.to_string()),
                    None => {
                        return Err(CatalogError::Truncated {
                            category: name.to_string(),
                            expected: count,
                            found: templates.len(),
                        })
                    }
                }
            }

            categories.insert(name.to_string(), templates);
        }

        let catalog = Self { categories };
        if catalog.questions().is_empty() {
            return Err(CatalogError::MissingCategory(category::QUESTIONS.to_string()));
        }
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.categories.get(name).map(Vec::as_slice)
    }

    /// The ordered questionnaire
    pub fn questions(&self) -> &[String] {
        self.get(category::QUESTIONS).unwrap_or_default()
    }

    /// All templates of a category joined into one message, or the built-in text
    pub fn reply(&self, name: &str) -> String {
        match self.get(name) {
            Some(templates) if !templates.is_empty() => templates.join("\n"),
            _ => fallback_text(name).to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = "\
3 questions
What is your name?
Where did you see it?
What did it look like?

2 start
Hello!
Send /report to begin.
1 thanks
Thanks for the report.
";

    #[test]
    fn test_parse_blocks_in_order() {
        let catalog = ReplyCatalog::parse(SAMPLE).unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(
            catalog.questions(),
            &[
                "What is your name?".to_string(),
                "Where did you see it?".to_string(),
                "What did it look like?".to_string(),
            ]
        );
        assert_eq!(catalog.reply(category::START), "Hello!\nSend /report to begin.");
    }

    #[test]
    fn test_missing_category_uses_fallback() {
        let catalog = ReplyCatalog::parse(SAMPLE).unwrap();
        assert!(catalog.get(category::COOLDOWN).is_none());
        assert_eq!(
            catalog.reply(category::COOLDOWN),
            fallback_text(category::COOLDOWN)
        );
    }

    #[test]
    fn test_lines_kept_verbatim() {
        let catalog = ReplyCatalog::parse("1 questions\n  2 spaced  \n").unwrap();
        assert_eq!(catalog.questions(), &["  2 spaced  ".to_string()]);
    }

    #[test]
    fn test_truncated_block() {
        let err = ReplyCatalog::parse("3 questions\nOne?\nTwo?\n").unwrap_err();
        assert_eq!(
            err,
            CatalogError::Truncated {
                category: "questions".to_string(),
                expected: 3,
                found: 2,
            }
        );
    }

    #[test]
    fn test_bad_header() {
        let err = ReplyCatalog::parse("questions\nOne?\n").unwrap_err();
        assert!(matches!(err, CatalogError::BadHeader { line: 1, .. }));

        let err = ReplyCatalog::parse("1 questions\nOne?\nx thanks\n").unwrap_err();
        assert!(matches!(err, CatalogError::BadHeader { line: 3, .. }));
    }

    #[test]
    fn test_questions_required() {
        let err = ReplyCatalog::parse("1 start\nHello\n").unwrap_err();
        assert_eq!(err, CatalogError::MissingCategory("questions".to_string()));

        let err = ReplyCatalog::parse("0 questions\n").unwrap_err();
        assert_eq!(err, CatalogError::MissingCategory("questions".to_string()));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let catalog = ReplyCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.questions().len(), 3);
    }

    #[test]
    fn test_load_missing_file() {
        assert!(ReplyCatalog::load("/nonexistent/replies.txt").is_err());
    }
}
