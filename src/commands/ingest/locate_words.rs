use super::*;

/// Last geometric resort: cluster every word on the page into column and
/// row bands scaled by the median glyph height, then drop each run of
/// nearby words into its nearest column.
pub(crate) struct WordClusterStrategy {
    pub(crate) settings: WordClusterSettings,
}

impl TableStrategy for WordClusterStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WordClusters
    }

    fn try_extract(&self, page: &PageSection) -> Option<Grid> {
        cluster_words(&page.words, &self.settings)
    }
}

pub(crate) fn cluster_words(words: &[Word], settings: &WordClusterSettings) -> Option<Grid> {
    let words = words
        .iter()
        .filter(|word| !word.text.trim().is_empty())
        .collect::<Vec<&Word>>();
    if words.is_empty() {
        return None;
    }

    let glyph = median_glyph_height(words.iter().copied(), settings.fallback_glyph_height);

    let columns = column_centers(&words, glyph * settings.column_tolerance);
    if columns.is_empty() {
        return None;
    }

    let mut grid = Vec::new();
    for band in row_bands(&words, glyph * settings.row_tolerance) {
        let mut row_words = words
            .iter()
            .copied()
            .filter(|word| band.contains(&top_key(word.top)))
            .collect::<Vec<&Word>>();
        if row_words.is_empty() {
            continue;
        }
        row_words.sort_by(|left, right| left.x0.total_cmp(&right.x0));

        let mut row: Vec<Option<String>> = vec![None; columns.len()];
        for (x, text) in row_cells(&row_words, glyph, settings) {
            let Some((index, distance)) = columns
                .iter()
                .enumerate()
                .map(|(index, center)| (index, (x - center).abs()))
                .min_by(|left, right| left.1.total_cmp(&right.1))
            else {
                continue;
            };
            if distance >= glyph * settings.assign_tolerance {
                continue;
            }
            row[index] = Some(match row[index].take() {
                Some(existing) => format!("{existing} {text}"),
                None => text,
            });
        }

        grid.push(row.into_iter().map(Option::unwrap_or_default).collect());
    }

    Some(grid)
}

fn top_key(top: f64) -> i64 {
    (top * 1000.0).round() as i64
}

/// Unique left edges (two decimals), merged while consecutive values are
/// closer than `tolerance`; each column is the mean of its members.
fn column_centers(words: &[&Word], tolerance: f64) -> Vec<f64> {
    let mut lefts = words
        .iter()
        .map(|word| (word.x0 * 100.0).round() / 100.0)
        .collect::<Vec<f64>>();
    lefts.sort_by(f64::total_cmp);
    lefts.dedup();

    let mut columns = Vec::new();
    let mut current: Vec<f64> = Vec::new();
    for x in lefts {
        match current.last() {
            Some(last) if x - last < tolerance => current.push(x),
            Some(_) => {
                columns.push(current.iter().sum::<f64>() / current.len() as f64);
                current = vec![x];
            }
            None => current.push(x),
        }
    }
    if !current.is_empty() {
        columns.push(current.iter().sum::<f64>() / current.len() as f64);
    }
    columns
}

/// Unique tops, top to bottom, grouped while within `tolerance` of the
/// first top in the group.
fn row_bands(words: &[&Word], tolerance: f64) -> Vec<Vec<i64>> {
    let mut tops = words.iter().map(|word| word.top).collect::<Vec<f64>>();
    tops.sort_by(f64::total_cmp);
    tops.dedup_by(|left, right| top_key(*left) == top_key(*right));

    let mut bands: Vec<Vec<i64>> = Vec::new();
    let mut band_start: Option<f64> = None;
    for top in tops {
        match (bands.last_mut(), band_start) {
            (Some(band), Some(start)) if top - start < tolerance => band.push(top_key(top)),
            _ => {
                bands.push(vec![top_key(top)]);
                band_start = Some(top);
            }
        }
    }
    bands
}

/// Splits a sorted row into cells at gaps wider than `cell_gap` glyphs.
/// Within a cell, words separated by less than `run_on_gap` glyphs are one
/// token that the text layer split (e.g. `7.` + `9`).
fn row_cells(
    row_words: &[&Word],
    glyph: f64,
    settings: &WordClusterSettings,
) -> Vec<(f64, String)> {
    let mut cells = Vec::new();
    let mut current: Vec<&Word> = Vec::new();

    for word in row_words.iter().copied() {
        if let Some(previous) = current.last() {
            if word.x0 - previous.x1 > glyph * settings.cell_gap {
                cells.push(join_cell(&current, glyph, settings));
                current.clear();
            }
        }
        current.push(word);
    }
    if !current.is_empty() {
        cells.push(join_cell(&current, glyph, settings));
    }
    cells
}

fn join_cell(words: &[&Word], glyph: f64, settings: &WordClusterSettings) -> (f64, String) {
    let x = words.first().map(|word| word.x0).unwrap_or_default();
    let mut text = String::new();
    let mut previous: Option<&Word> = None;
    for word in words.iter().copied() {
        if let Some(previous) = previous {
            if word.x0 - previous.x1 >= glyph * settings.run_on_gap {
                text.push(' ');
            }
        }
        text.push_str(word.text.trim());
        previous = Some(word);
    }
    (x, text)
}
