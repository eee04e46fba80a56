use super::*;

/// Maps messy column and label strings onto canonical metric keys.
///
/// Cleaning strips newlines, unit parentheticals and trailing punctuation,
/// repairs mis-decoded micro/degree sequences, lowercases and joins words
/// with underscores. The cleaned form is looked up in the synonym table; an
/// unknown label comes back as its cleaned form so new columns still land in
/// the store under a stable key.
#[derive(Debug, Clone)]
pub(crate) struct ColumnNormalizer {
    synonyms: HashMap<String, String>,
    metric_keys: HashSet<String>,
    field_keys: HashSet<String>,
    parenthetical_regex: Regex,
}

/// Byte sequences produced when UTF-8 `µ`/`°` is decoded as Latin-1 or
/// when a Greek mu stands in for the micro sign.
const ENCODING_REPAIRS: &[(&str, &str)] = &[
    ("Ã‚Âµ", "µ"),
    ("Ã‚Â°", "°"),
    ("Âµ", "µ"),
    ("Î¼", "µ"),
    ("μ", "µ"),
    ("Â°", "°"),
    ("Âº", "°"),
    ("º", "°"),
];

impl ColumnNormalizer {
    pub(crate) fn new(vocabulary: &Vocabulary) -> Result<Self> {
        let parenthetical_regex = Regex::new(r"\([^)]*\)|\[[^\]]*\]")
            .context("failed to compile unit parenthetical regex")?;

        let mut normalizer = Self {
            synonyms: HashMap::new(),
            metric_keys: vocabulary.metric_keys.iter().cloned().collect(),
            field_keys: [INDEX_KEY, SYSTEM_TYPE_KEY, SYSTEM_NAME_KEY, COMMENT_KEY]
                .iter()
                .map(|key| key.to_string())
                .collect(),
            parenthetical_regex,
        };

        for (raw, canonical) in &vocabulary.synonyms {
            let cleaned = normalizer.clean(raw);
            if cleaned.is_empty() {
                continue;
            }
            normalizer.synonyms.insert(cleaned, canonical.clone());
        }

        Ok(normalizer)
    }

    /// Canonical key for a raw label. Never fails; unknown labels return
    /// their cleaned form.
    pub(crate) fn normalize(&self, raw: &str) -> String {
        let cleaned = self.clean(raw);
        match self.synonyms.get(&cleaned) {
            Some(canonical) => canonical.clone(),
            None => cleaned,
        }
    }

    /// Like `normalize`, but reports whether the label was recognized as a
    /// metric or a record field.
    pub(crate) fn resolve(&self, raw: &str) -> ResolvedLabel {
        let key = self.normalize(raw);
        let known = self.metric_keys.contains(&key) || self.field_keys.contains(&key);
        ResolvedLabel { key, known }
    }

    pub(crate) fn is_metric_key(&self, key: &str) -> bool {
        self.metric_keys.contains(key)
    }

    pub(crate) fn is_field_key(&self, key: &str) -> bool {
        self.field_keys.contains(key)
    }

    /// True when the label is a recognized metric, used by the vertical
    /// label-run detector.
    pub(crate) fn is_metric_label(&self, raw: &str) -> bool {
        self.metric_keys.contains(&self.normalize(raw))
    }

    pub(crate) fn clean(&self, raw: &str) -> String {
        let mut value = raw.replace(['\r', '\n'], " ");
        for (broken, repaired) in ENCODING_REPAIRS {
            if value.contains(broken) {
                value = value.replace(broken, repaired);
            }
        }

        let value = self.parenthetical_regex.replace_all(&value, " ");
        let value = value
            .trim()
            .trim_end_matches(['.', ':', ';', ',', '*'])
            .trim();

        value
            .split_whitespace()
            .collect::<Vec<&str>>()
            .join("_")
            .to_lowercase()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResolvedLabel {
    pub(crate) key: String,
    pub(crate) known: bool,
}
