use crate::config::ReportConfig;

/// Result of checking one questionnaire answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerVerdict {
    Accepted,
    TooShort,
    TooLong,
    /// Only produced when the ASCII-only policy is enabled
    NonAscii,
}

#[cfg(test)]
impl AnswerVerdict {
    pub fn is_accepted(self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// A persisted field whose length falls outside the configured bounds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: String,
    pub length: usize,
}

/// Length bounds shared by answer and record validation.
///
/// Lengths are counted in Unicode scalar values, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerPolicy {
    pub min_length: usize,
    pub max_length: usize,
    pub ascii_only: bool,
}

impl AnswerPolicy {
    #[cfg(test)]
    pub fn new(min_length: usize, max_length: usize) -> Self {
        Self {
            min_length,
            max_length,
            ascii_only: false,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self {
            min_length: config.min_length,
            max_length: config.max_length,
            ascii_only: config.ascii_only,
        }
    }

    #[cfg(test)]
    pub fn with_ascii_only(mut self, ascii_only: bool) -> Self {
        self.ascii_only = ascii_only;
        self
    }

    fn within_bounds(&self, length: usize) -> bool {
        (self.min_length..=self.max_length).contains(&length)
    }

    /// Check an answer against the length bounds and, if enabled, the ASCII rule
    pub fn check(&self, text: &str) -> AnswerVerdict {
        if self.ascii_only && !text.is_ascii() {
            return AnswerVerdict::NonAscii;
        }

        let length = text.chars().count();
        if length < self.min_length {
            AnswerVerdict::TooShort
        } else if length > self.max_length {
            AnswerVerdict::TooLong
        } else {
            AnswerVerdict::Accepted
        }
    }

    #[cfg(test)]
    pub fn accepts(&self, text: &str) -> bool {
        self.check(text).is_accepted()
    }

    /// Re-check a complete record before it is written.
    ///
    /// `names` labels the expected fields in order. A missing value counts as
    /// length 0; values beyond `names` are reported as `field_<n>`.
    pub fn validate_record(&self, names: &[String], fields: &[String]) -> Vec<FieldViolation> {
        let expected = names.len().max(fields.len());

        (0..expected)
            .filter_map(|idx| {
                let length = fields.get(idx).map_or(0, |value| value.chars().count());
                let in_schema = idx < names.len();
                if in_schema && self.within_bounds(length) {
                    return None;
                }
                let field = names
                    .get(idx)
                    .cloned()
                    .unwrap_or_else(|| format!("field_{}", idx + 1));
                Some(FieldViolation { field, length })
            })
            .collect()
    }
}
