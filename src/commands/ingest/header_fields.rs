use super::*;

/// Document-level fields read from the report's first page (PDF) or body
/// (DOCX). A field that no pattern found stays `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct HeaderFields {
    pub(crate) facility: Option<String>,
    pub(crate) report_date: Option<NaiveDate>,
    pub(crate) date_raw: Option<String>,
    pub(crate) technician: Option<String>,
    pub(crate) technician_is_placeholder: bool,
}

impl HeaderFields {
    /// Names of fields that were not extracted. A placeholder technician
    /// counts as missing.
    pub(crate) fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.facility.is_none() {
            missing.push("facility".to_string());
        }
        if self.report_date.is_none() {
            missing.push("date".to_string());
        }
        if self.technician.is_none() || self.technician_is_placeholder {
            missing.push("technician".to_string());
        }
        missing
    }
}

const FOUR_DIGIT_YEAR_FORMATS: &[&str] = &[
    "%m/%d/%Y", "%m-%d-%Y", "%Y-%m-%d", "%m.%d.%Y", "%m_%d_%Y", "%B %d, %Y", "%b %d, %Y",
];

const TWO_DIGIT_YEAR_FORMATS: &[&str] = &["%m/%d/%y", "%m-%d-%y", "%m.%d.%y", "%m_%d_%y"];

const SITE_REPORT_MARKER: &str = "SITE VISITATION REPORT";

pub(crate) struct HeaderFieldExtractor {
    settings: HeaderFieldSettings,
    date_label: Regex,
    date_label_loose: Regex,
    filename_date: Regex,
    facility_label: Regex,
    facility_stop: Regex,
    representative_label: Regex,
    chemist_suffix: Regex,
}

impl HeaderFieldExtractor {
    pub(crate) fn new(settings: &HeaderFieldSettings) -> Result<Self> {
        Ok(Self {
            settings: settings.clone(),
            date_label: Regex::new(
                r"(?i)\bDate:\s*(\d{1,2}[-/.]\d{1,2}[-/.]\d{2,4}|\d{4}-\d{1,2}-\d{1,2}|[A-Za-z]{3,9}\.? \d{1,2}, \d{4})",
            )
            .context("failed to compile date label regex")?,
            date_label_loose: Regex::new(r"(?im)^\s*Date:\s*(\S.*?)\s*$")
                .context("failed to compile loose date label regex")?,
            filename_date: Regex::new(r"(\d{4}-\d{1,2}-\d{1,2}|\d{1,2}[-_.]\d{1,2}[-_.]\d{2,4})")
                .context("failed to compile filename date regex")?,
            facility_label: Regex::new(r"(?im)\bFacility:\s*(.+)$")
                .context("failed to compile facility label regex")?,
            facility_stop: Regex::new(r"(?i)\s*\b(?:Attention|Date|Systems)\b")
                .context("failed to compile facility stop regex")?,
            representative_label: Regex::new(r"(?im)Field Representative:\s*(.+)$")
                .context("failed to compile field representative regex")?,
            chemist_suffix: Regex::new(r"([A-Za-z][A-Za-z .'\-]*?)\s*,\s*Field Chemist")
                .context("failed to compile field chemist regex")?,
        })
    }

    pub(crate) fn extract(
        &self,
        header_text: &str,
        full_text: &str,
        filename: &str,
    ) -> HeaderFields {
        let texts = if header_text == full_text {
            vec![header_text]
        } else {
            vec![header_text, full_text]
        };

        let mut fields = HeaderFields::default();

        let (report_date, date_raw) = texts
            .iter()
            .find_map(|text| self.labeled_date(text))
            .or_else(|| self.filename_date(filename))
            .unwrap_or_default();
        fields.report_date = report_date;
        fields.date_raw = date_raw;

        fields.facility = texts
            .iter()
            .find_map(|text| self.labeled_facility(text).or_else(|| site_report_facility(text)))
            .or_else(|| self.filename_facility(filename));

        fields.technician = texts.iter().find_map(|text| self.technician(text));
        if fields.technician.is_none() {
            if let Some(default) = self
                .settings
                .default_technician
                .as_ref()
                .filter(|name| !name.trim().is_empty())
            {
                fields.technician = Some(default.trim().to_string());
                fields.technician_is_placeholder = true;
            }
        }

        fields
    }

    fn labeled_date(&self, text: &str) -> Option<(Option<NaiveDate>, Option<String>)> {
        if let Some(captures) = self.date_label.captures(text) {
            let raw = captures.get(1)?.as_str().trim().to_string();
            return Some((parse_report_date(&raw), Some(raw)));
        }
        let captures = self.date_label_loose.captures(text)?;
        let raw = captures.get(1)?.as_str().trim().to_string();
        Some((parse_report_date(&raw), Some(raw)))
    }

    fn filename_date(&self, filename: &str) -> Option<(Option<NaiveDate>, Option<String>)> {
        let raw = self.filename_date.captures(filename)?.get(1)?.as_str().to_string();
        Some((parse_report_date(&raw), Some(raw)))
    }

    fn labeled_facility(&self, text: &str) -> Option<String> {
        let captured = self.facility_label.captures(text)?.get(1)?.as_str();
        let cut = match self.facility_stop.find(captured) {
            Some(stop) => &captured[..stop.start()],
            None => captured,
        };
        clean_name(cut)
    }

    fn filename_facility(&self, filename: &str) -> Option<String> {
        let lowered = filename.to_lowercase();
        self.settings
            .facility_aliases
            .iter()
            .find(|alias| {
                !alias.pattern.is_empty() && lowered.contains(&alias.pattern.to_lowercase())
            })
            .map(|alias| alias.facility.clone())
    }

    fn technician(&self, text: &str) -> Option<String> {
        if let Some(name) = self
            .representative_label
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|value| clean_name(value.as_str()))
        {
            return Some(name);
        }

        let lines = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<&str>>();

        if let Some(position) = lines.iter().position(|line| line.contains("Signature")) {
            let name = lines[position + 1..]
                .iter()
                .find(|line| line.chars().any(char::is_alphabetic))
                .and_then(|line| clean_name(line));
            if name.is_some() {
                return name;
            }
        }

        if let Some(name) = self
            .chemist_suffix
            .captures(text)
            .and_then(|captures| captures.get(1))
            .and_then(|value| clean_name(value.as_str()))
        {
            return Some(name);
        }

        if let Some(name) = lines
            .iter()
            .find(|line| line.contains("Field Chemist"))
            .and_then(|line| clean_name(&line.replace("Field Chemist", "")))
        {
            return Some(name);
        }

        let lowered = text.to_lowercase();
        self.settings
            .known_technicians
            .iter()
            .find(|name| !name.trim().is_empty() && lowered.contains(&name.trim().to_lowercase()))
            .map(|name| name.trim().to_string())
    }
}

fn site_report_facility(text: &str) -> Option<String> {
    let lines = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>();
    let position = lines
        .iter()
        .position(|line| line.to_ascii_uppercase().contains(SITE_REPORT_MARKER))?;

    let marker_line = lines[position];
    let upper = marker_line.to_ascii_uppercase();
    let remainder = upper
        .find(SITE_REPORT_MARKER)
        .map(|start| &marker_line[start + SITE_REPORT_MARKER.len()..])
        .and_then(clean_name);
    remainder.or_else(|| lines.get(position + 1).and_then(|line| clean_name(line)))
}

/// Trims separators and trailing punctuation; empty results are `None`.
fn clean_name(raw: &str) -> Option<String> {
    let value = collapse_whitespace(raw);
    let value = value
        .trim_matches(|character: char| {
            character.is_whitespace() || matches!(character, ':' | ',' | '-' | '_' | '.' | ';')
        })
        .to_string();
    (!value.is_empty()).then_some(value)
}

/// Parses the date formats seen in reports and filenames. `%Y` would read
/// `24` as year 24, so two-digit years only go through `%y` formats.
pub(crate) fn parse_report_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim().trim_end_matches(['.', ',']);
    let has_four_digit_year = value
        .split(|character: char| !character.is_ascii_digit())
        .any(|part| part.len() == 4);
    let formats = if has_four_digit_year {
        FOUR_DIGIT_YEAR_FORMATS
    } else {
        TWO_DIGIT_YEAR_FORMATS
    };
    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
}
