use super::*;

/// Reads a word-processor report into a single section.
///
/// Paragraph text and table cell text are kept in document order, one line
/// per paragraph or cell, so header-field patterns see labels wherever the
/// author put them. Every native table also becomes a candidate grid.
pub(crate) fn read_docx(docx_path: &Path) -> Result<ExtractedDocument> {
    let bytes =
        fs::read(docx_path).with_context(|| format!("failed to read {}", docx_path.display()))?;
    let docx = docx_rs::read_docx(&bytes)
        .with_context(|| format!("failed to parse DOCX {}", docx_path.display()))?;

    let mut lines = Vec::new();
    let mut native_tables = Vec::new();

    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(paragraph) => {
                lines.push(paragraph_text(paragraph));
            }
            DocumentChild::Table(table) => {
                let grid = table_grid(table);
                for row in &grid {
                    lines.extend(row.iter().filter(|cell| !cell.is_empty()).cloned());
                }
                native_tables.push(grid);
            }
            _ => {}
        }
    }

    let mut section = PageSection::from_text(1, &lines.join("\n"), TextSource::Docx);
    section.native_tables = native_tables;

    Ok(ExtractedDocument {
        sections: vec![section],
        ocr_pages: 0,
    })
}

fn table_grid(table: &Table) -> Grid {
    let mut grid = Vec::new();
    for row in &table.rows {
        let TableChild::TableRow(table_row) = row;
        let mut cells = Vec::new();
        for cell in &table_row.cells {
            let TableRowChild::TableCell(table_cell) = cell;
            let paragraphs = table_cell
                .children
                .iter()
                .filter_map(|content| match content {
                    TableCellContent::Paragraph(paragraph) => Some(paragraph_text(paragraph)),
                    _ => None,
                })
                .filter(|text| !text.trim().is_empty())
                .collect::<Vec<String>>();
            cells.push(paragraphs.join("\n").trim().to_string());
        }
        grid.push(cells);
    }
    grid
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut output = String::new();
    for child in &paragraph.children {
        match child {
            ParagraphChild::Run(run) => push_run_text(run, &mut output),
            ParagraphChild::Hyperlink(link) => {
                for link_child in &link.children {
                    if let ParagraphChild::Run(run) = link_child {
                        push_run_text(run, &mut output);
                    }
                }
            }
            _ => {}
        }
    }
    output.trim().to_string()
}

fn push_run_text(run: &Run, output: &mut String) {
    for run_child in &run.children {
        match run_child {
            RunChild::Text(text) => output.push_str(&text.text),
            RunChild::Tab(_) => output.push(' '),
            RunChild::Break(_) => output.push('\n'),
            _ => {}
        }
    }
}
