use super::*;

/// Run-scoped options for the PDF reader.
#[derive(Debug, Clone)]
pub(crate) struct PdfReadOptions {
    pub(crate) ocr_mode: OcrMode,
    pub(crate) ocr_lang: String,
    pub(crate) ocr_min_text_chars: usize,
}

impl Default for PdfReadOptions {
    fn default() -> Self {
        Self {
            ocr_mode: OcrMode::Off,
            ocr_lang: "eng".to_string(),
            ocr_min_text_chars: 40,
        }
    }
}

/// Words and page size for one page of `pdftotext -bbox` output.
#[derive(Debug, Clone, Default)]
pub(crate) struct BboxPage {
    pub(crate) width: f64,
    pub(crate) height: f64,
    pub(crate) words: Vec<Word>,
}

pub(crate) fn read_pdf(pdf_path: &Path, options: &PdfReadOptions) -> Result<ExtractedDocument> {
    let page_texts = extract_pages_with_pdftotext(pdf_path)?;

    let bbox_pages = match extract_word_boxes(pdf_path) {
        Ok(pages) => pages,
        Err(error) => {
            warn!(
                filename = %pdf_path.display(),
                error = %error,
                "word boxes unavailable; geometric strategies disabled"
            );
            Vec::new()
        }
    };

    let page_edges = match load_page_edges(pdf_path, &bbox_pages) {
        Ok(edges) => edges,
        Err(error) => {
            warn!(
                filename = %pdf_path.display(),
                error = %error,
                "ruling lines unavailable; ruled-line strategy disabled"
            );
            Vec::new()
        }
    };

    let page_count = page_texts.len().max(bbox_pages.len());
    if page_count == 0 {
        bail!("no pages extracted from {}", pdf_path.display());
    }

    let ocr_available = options.ocr_mode != OcrMode::Off
        && command_available("pdftoppm")
        && command_available("tesseract");
    if options.ocr_mode != OcrMode::Off && !ocr_available {
        warn!(
            filename = %pdf_path.display(),
            "OCR requested but pdftoppm/tesseract not available; using text layer only"
        );
    }

    let mut sections = Vec::with_capacity(page_count);
    let mut ocr_pages = 0;

    for index in 0..page_count {
        let page_number = index + 1;
        let text = page_texts.get(index).cloned().unwrap_or_default();
        let bbox = bbox_pages.get(index).cloned().unwrap_or_default();
        let edges = page_edges.get(index).cloned().unwrap_or_default();

        let wants_ocr = match options.ocr_mode {
            OcrMode::Off => false,
            OcrMode::Force => true,
            OcrMode::Auto => non_whitespace_char_count(&text) < options.ocr_min_text_chars,
        };

        if wants_ocr && ocr_available {
            match extract_page_with_ocr(pdf_path, page_number, &options.ocr_lang) {
                Ok(ocr_text) => {
                    ocr_pages += 1;
                    sections.push(PageSection {
                        width: bbox.width,
                        height: bbox.height,
                        ..PageSection::from_text(page_number, &ocr_text, TextSource::Ocr)
                    });
                    continue;
                }
                Err(error) => {
                    warn!(
                        filename = %pdf_path.display(),
                        page = page_number,
                        error = %error,
                        "OCR failed; keeping text layer"
                    );
                }
            }
        }

        sections.push(PageSection {
            number: page_number,
            width: bbox.width,
            height: bbox.height,
            words: bbox.words,
            edges,
            text,
            native_tables: Vec::new(),
            source: TextSource::TextLayer,
        });
    }

    Ok(ExtractedDocument {
        sections,
        ocr_pages,
    })
}

pub(crate) fn non_whitespace_char_count(text: &str) -> usize {
    text.chars()
        .filter(|character| !character.is_whitespace())
        .count()
}

fn extract_page_with_ocr(pdf_path: &Path, page_number: usize, ocr_lang: &str) -> Result<String> {
    let pdf_stem = pdf_path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("report");
    let safe_stem = pdf_stem
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() {
                character
            } else {
                '_'
            }
        })
        .collect::<String>();

    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let output_root = std::env::temp_dir().join(format!(
        "fieldreport_ocr_{}_{}_{}_{}",
        safe_stem,
        std::process::id(),
        page_number,
        stamp
    ));
    let png_path = PathBuf::from(format!("{}.png", output_root.display()));

    let pdftoppm_output = Command::new("pdftoppm")
        .arg("-f")
        .arg(page_number.to_string())
        .arg("-l")
        .arg(page_number.to_string())
        .arg("-singlefile")
        .arg("-r")
        .arg("300")
        .arg("-gray")
        .arg("-png")
        .arg(pdf_path)
        .arg(&output_root)
        .output()
        .with_context(|| format!("failed to execute pdftoppm for {}", pdf_path.display()))?;

    if !pdftoppm_output.status.success() {
        let stderr = String::from_utf8_lossy(&pdftoppm_output.stderr);
        bail!(
            "pdftoppm returned non-zero exit status for {} page {}: {}",
            pdf_path.display(),
            page_number,
            stderr.trim()
        );
    }

    if !png_path.exists() {
        bail!(
            "pdftoppm did not produce expected image for {} page {}",
            pdf_path.display(),
            page_number
        );
    }

    let tesseract_output = Command::new("tesseract")
        .arg(&png_path)
        .arg("stdout")
        .arg("-l")
        .arg(ocr_lang)
        .arg("--psm")
        .arg("6")
        .output()
        .with_context(|| format!("failed to execute tesseract for {}", png_path.display()))?;

    let _ = fs::remove_file(&png_path);

    if !tesseract_output.status.success() {
        let stderr = String::from_utf8_lossy(&tesseract_output.stderr);
        bail!(
            "tesseract returned non-zero exit status for {} page {}: {}",
            pdf_path.display(),
            page_number,
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&tesseract_output.stdout)
        .replace('\u{0000}', "")
        .trim()
        .to_string())
}

pub(crate) fn command_available(program: &str) -> bool {
    Command::new(program).arg("-v").output().is_ok()
}

fn extract_pages_with_pdftotext(pdf_path: &Path) -> Result<Vec<String>> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg(pdf_path)
        .arg("-")
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    Ok(split_form_feed_pages(&raw))
}

/// Splits `pdftotext` output on form feeds, dropping trailing blank pages.
pub(crate) fn split_form_feed_pages(raw: &str) -> Vec<String> {
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    pages
}

fn extract_word_boxes(pdf_path: &Path) -> Result<Vec<BboxPage>> {
    let output = Command::new("pdftotext")
        .arg("-enc")
        .arg("UTF-8")
        .arg("-bbox")
        .arg(pdf_path)
        .arg("-")
        .output()
        .with_context(|| {
            format!(
                "failed to execute pdftotext -bbox for {}",
                pdf_path.display()
            )
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext -bbox returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    parse_bbox_document(&String::from_utf8_lossy(&output.stdout))
}

/// Parses the XHTML emitted by `pdftotext -bbox` into per-page word boxes.
pub(crate) fn parse_bbox_document(xhtml: &str) -> Result<Vec<BboxPage>> {
    let page_regex = Regex::new(r#"<page\s+width="([0-9.]+)"\s+height="([0-9.]+)"\s*>"#)
        .context("failed to compile bbox page regex")?;
    let word_regex = Regex::new(
        r#"<word\s+xMin="([0-9.\-]+)"\s+yMin="([0-9.\-]+)"\s+xMax="([0-9.\-]+)"\s+yMax="([0-9.\-]+)"\s*>(.*?)</word>"#,
    )
    .context("failed to compile bbox word regex")?;

    let mut pages = Vec::new();
    let page_starts = page_regex
        .captures_iter(xhtml)
        .filter_map(|captures| {
            let whole = captures.get(0)?;
            let width = captures.get(1)?.as_str().parse::<f64>().ok()?;
            let height = captures.get(2)?.as_str().parse::<f64>().ok()?;
            Some((whole.end(), width, height))
        })
        .collect::<Vec<(usize, f64, f64)>>();

    for (index, (start, width, height)) in page_starts.iter().enumerate() {
        let end = page_starts
            .get(index + 1)
            .map(|(next_start, _, _)| *next_start)
            .unwrap_or(xhtml.len());
        let body = &xhtml[*start..end];

        let words = word_regex
            .captures_iter(body)
            .filter_map(|captures| {
                let x0 = captures.get(1)?.as_str().parse::<f64>().ok()?;
                let top = captures.get(2)?.as_str().parse::<f64>().ok()?;
                let x1 = captures.get(3)?.as_str().parse::<f64>().ok()?;
                let bottom = captures.get(4)?.as_str().parse::<f64>().ok()?;
                let text = unescape_xml(captures.get(5)?.as_str());
                if text.trim().is_empty() {
                    return None;
                }
                Some(Word::new(&text, x0, top, x1, bottom))
            })
            .collect();

        pages.push(BboxPage {
            width: *width,
            height: *height,
            words,
        });
    }

    Ok(pages)
}

fn unescape_xml(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

fn load_page_edges(pdf_path: &Path, bbox_pages: &[BboxPage]) -> Result<Vec<Vec<Edge>>> {
    let document = Document::load(pdf_path)
        .with_context(|| format!("failed to load {} with lopdf", pdf_path.display()))?;

    let mut all_edges = Vec::new();
    for (index, (_page_number, page_id)) in document.get_pages().into_iter().enumerate() {
        let page_height = bbox_pages
            .get(index)
            .map(|page| page.height)
            .filter(|height| *height > 0.0)
            .or_else(|| media_box_height(&document, page_id))
            .unwrap_or(792.0);

        let content = document
            .get_page_content(page_id)
            .with_context(|| format!("failed to read content stream of page {}", index + 1))?;
        let operations = Content::decode(&content)
            .with_context(|| format!("failed to decode content stream of page {}", index + 1))?
            .operations;

        all_edges.push(edges_from_operations(&operations, page_height));
    }

    Ok(all_edges)
}

fn media_box_height(document: &Document, page_id: ObjectId) -> Option<f64> {
    let page = document.get_object(page_id).ok()?.as_dict().ok()?;
    let media_box = page.get(b"MediaBox").ok()?.as_array().ok()?;
    let lower = media_box.get(1).and_then(operand_f64)?;
    let upper = media_box.get(3).and_then(operand_f64)?;
    Some(upper - lower)
}

/// Affine transform `[a b c d e f]` as used by the PDF `cm` operator.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f64; 6]);

impl Matrix {
    const IDENTITY: Self = Self([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// `self` applied first, then `outer`.
    fn then(&self, outer: &Self) -> Self {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = outer.0;
        Self([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }
}

fn operand_f64(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(value) => Some(*value as f64),
        Object::Real(value) => Some(f64::from(*value)),
        _ => None,
    }
}

fn operands_f64<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    if operands.len() < N {
        return None;
    }
    let mut values = [0.0; N];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = operand_f64(operand)?;
    }
    Some(values)
}

/// Slope tolerance, in points, for treating a path segment as axis aligned.
const AXIS_TOLERANCE: f64 = 0.5;

/// Collects horizontal and vertical ruling segments from painted paths.
/// Coordinates are converted to a top-left origin using `page_height`.
pub(crate) fn edges_from_operations(operations: &[Operation], page_height: f64) -> Vec<Edge> {
    let mut edges = Vec::new();
    let mut ctm = Matrix::IDENTITY;
    let mut saved = Vec::new();
    let mut segments: Vec<((f64, f64), (f64, f64))> = Vec::new();
    let mut subpath_start: Option<(f64, f64)> = None;
    let mut current: Option<(f64, f64)> = None;

    for operation in operations {
        let operands = operation.operands.as_slice();
        match operation.operator.as_str() {
            "q" => saved.push(ctm),
            "Q" => {
                if let Some(previous) = saved.pop() {
                    ctm = previous;
                }
            }
            "cm" => {
                if let Some(values) = operands_f64::<6>(operands) {
                    ctm = Matrix(values).then(&ctm);
                }
            }
            "m" => {
                if let Some([x, y]) = operands_f64::<2>(operands) {
                    let point = ctm.apply(x, y);
                    subpath_start = Some(point);
                    current = Some(point);
                }
            }
            "l" => {
                if let (Some([x, y]), Some(from)) = (operands_f64::<2>(operands), current) {
                    let to = ctm.apply(x, y);
                    segments.push((from, to));
                    current = Some(to);
                }
            }
            "h" => {
                if let (Some(from), Some(start)) = (current, subpath_start) {
                    segments.push((from, start));
                    current = Some(start);
                }
            }
            "re" => {
                if let Some([x, y, width, height]) = operands_f64::<4>(operands) {
                    let corners = [
                        ctm.apply(x, y),
                        ctm.apply(x + width, y),
                        ctm.apply(x + width, y + height),
                        ctm.apply(x, y + height),
                    ];
                    for corner in 0..4 {
                        segments.push((corners[corner], corners[(corner + 1) % 4]));
                    }
                    subpath_start = Some(corners[0]);
                    current = Some(corners[0]);
                }
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                if matches!(operation.operator.as_str(), "s" | "b" | "b*") {
                    if let (Some(from), Some(start)) = (current, subpath_start) {
                        segments.push((from, start));
                    }
                }
                for (from, to) in segments.drain(..) {
                    if let Some(edge) = segment_edge(from, to, page_height) {
                        edges.push(edge);
                    }
                }
                subpath_start = None;
                current = None;
            }
            "n" => {
                segments.clear();
                subpath_start = None;
                current = None;
            }
            _ => {}
        }
    }

    edges
}

fn segment_edge(from: (f64, f64), to: (f64, f64), page_height: f64) -> Option<Edge> {
    let (x0, y0) = (from.0, page_height - from.1);
    let (x1, y1) = (to.0, page_height - to.1);

    if (y0 - y1).abs() <= AXIS_TOLERANCE && (x0 - x1).abs() > AXIS_TOLERANCE {
        return Some(Edge::horizontal(x0, x1, (y0 + y1) / 2.0));
    }
    if (x0 - x1).abs() <= AXIS_TOLERANCE && (y0 - y1).abs() > AXIS_TOLERANCE {
        return Some(Edge::vertical((x0 + x1) / 2.0, y0, y1));
    }
    None
}
