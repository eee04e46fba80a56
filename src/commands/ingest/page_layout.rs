use super::*;

/// Cell grid produced by a table-location strategy. Missing cells are empty
/// strings.
pub(crate) type Grid = Vec<Vec<String>>;

/// One positioned word, in points, origin at the top-left of the page.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Word {
    pub(crate) text: String,
    pub(crate) x0: f64,
    pub(crate) x1: f64,
    pub(crate) top: f64,
    pub(crate) bottom: f64,
}

impl Word {
    pub(crate) fn new(text: &str, x0: f64, top: f64, x1: f64, bottom: f64) -> Self {
        Self {
            text: text.to_string(),
            x0,
            x1,
            top,
            bottom,
        }
    }

    pub(crate) fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub(crate) fn center(&self) -> (f64, f64) {
        ((self.x0 + self.x1) / 2.0, (self.top + self.bottom) / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Orientation {
    Horizontal,
    Vertical,
}

/// A ruling line segment. Horizontal edges have `top == bottom`, vertical
/// edges have `x0 == x1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Edge {
    pub(crate) orientation: Orientation,
    pub(crate) x0: f64,
    pub(crate) x1: f64,
    pub(crate) top: f64,
    pub(crate) bottom: f64,
}

impl Edge {
    pub(crate) fn horizontal(x0: f64, x1: f64, y: f64) -> Self {
        Self {
            orientation: Orientation::Horizontal,
            x0: x0.min(x1),
            x1: x0.max(x1),
            top: y,
            bottom: y,
        }
    }

    pub(crate) fn vertical(x: f64, top: f64, bottom: f64) -> Self {
        Self {
            orientation: Orientation::Vertical,
            x0: x,
            x1: x,
            top: top.min(bottom),
            bottom: top.max(bottom),
        }
    }

    pub(crate) fn length(&self) -> f64 {
        match self.orientation {
            Orientation::Horizontal => self.x1 - self.x0,
            Orientation::Vertical => self.bottom - self.top,
        }
    }
}

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextSource {
    TextLayer,
    Ocr,
    Docx,
}

impl TextSource {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::TextLayer => "text_layer",
            Self::Ocr => "ocr",
            Self::Docx => "docx",
        }
    }
}

/// One page (PDF) or the whole body (DOCX) as seen by the table locator.
#[derive(Debug, Clone)]
pub(crate) struct PageSection {
    pub(crate) number: usize,
    pub(crate) width: f64,
    pub(crate) height: f64,
    pub(crate) words: Vec<Word>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) text: String,
    pub(crate) native_tables: Vec<Grid>,
    pub(crate) source: TextSource,
}

impl PageSection {
    pub(crate) fn from_text(number: usize, text: &str, source: TextSource) -> Self {
        Self {
            number,
            width: 0.0,
            height: 0.0,
            words: Vec::new(),
            edges: Vec::new(),
            text: text.to_string(),
            native_tables: Vec::new(),
            source,
        }
    }

    /// Trimmed, non-empty text lines.
    pub(crate) fn lines(&self) -> Vec<&str> {
        self.text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }
}

/// Everything a reader produced for one file.
#[derive(Debug, Clone)]
pub(crate) struct ExtractedDocument {
    pub(crate) sections: Vec<PageSection>,
    pub(crate) ocr_pages: usize,
}

impl ExtractedDocument {
    /// Text used for header-field extraction: the first page for PDFs, the
    /// whole body for DOCX.
    pub(crate) fn header_text(&self) -> &str {
        self.sections
            .first()
            .map(|section| section.text.as_str())
            .unwrap_or_default()
    }

    pub(crate) fn full_text(&self) -> String {
        self.sections
            .iter()
            .map(|section| section.text.as_str())
            .collect::<Vec<&str>>()
            .join("\n")
    }
}

/// Median of the positive word heights, or `fallback` when there are none.
pub(crate) fn median_glyph_height<'a>(
    words: impl IntoIterator<Item = &'a Word>,
    fallback: f64,
) -> f64 {
    let mut heights = words
        .into_iter()
        .map(Word::height)
        .filter(|height| *height > 0.0)
        .collect::<Vec<f64>>();
    if heights.is_empty() {
        return fallback;
    }
    heights.sort_by(f64::total_cmp);
    heights[heights.len() / 2]
}

/// Words sorted top-to-bottom then left-to-right, joined by spaces.
pub(crate) fn words_to_text(words: &[&Word]) -> String {
    let mut ordered = words.to_vec();
    ordered.sort_by(|left, right| {
        left.top
            .round()
            .total_cmp(&right.top.round())
            .then(left.x0.total_cmp(&right.x0))
    });
    ordered
        .iter()
        .map(|word| word.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}
