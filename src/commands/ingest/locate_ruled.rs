use super::*;

/// Tables drawn with ruling lines. Edges are snapped, joined, intersected,
/// and the intersections are walked into cells; the largest group of cells
/// sharing corners is the table.
pub(crate) struct RuledLineStrategy {
    pub(crate) settings: RuledLineSettings,
}

impl TableStrategy for RuledLineStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RuledLines
    }

    fn try_extract(&self, page: &PageSection) -> Option<Grid> {
        if page.edges.is_empty() {
            return None;
        }
        let edges = prepare_edges(page.edges.clone(), &self.settings);
        table_from_edges(&edges, &page.words, self.settings.intersection_tolerance)
    }
}

/// Borderless tables: column boundaries come from words that line up on
/// their left (or right) side, rows still come from horizontal rules.
pub(crate) struct TextAlignmentStrategy {
    pub(crate) ruled: RuledLineSettings,
    pub(crate) settings: TextAlignmentSettings,
}

impl TableStrategy for TextAlignmentStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::TextAlignment
    }

    fn try_extract(&self, page: &PageSection) -> Option<Grid> {
        let horizontal = page
            .edges
            .iter()
            .filter(|edge| edge.orientation == Orientation::Horizontal)
            .copied()
            .collect::<Vec<Edge>>();
        if horizontal.is_empty() || page.words.is_empty() {
            return None;
        }

        let mut edges = horizontal;
        edges.extend(aligned_word_edges(&page.words, &edges, &self.settings));
        let edges = prepare_edges(edges, &self.ruled);
        table_from_edges(&edges, &page.words, self.ruled.intersection_tolerance)
    }
}

fn coordinate_key(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Bounds {
    x0: f64,
    top: f64,
    x1: f64,
    bottom: f64,
}

impl Bounds {
    fn overlaps(&self, other: &Bounds) -> bool {
        self.x0 <= other.x1
            && other.x0 <= self.x1
            && self.top <= other.bottom
            && other.top <= self.bottom
    }

    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.top && y <= self.bottom
    }
}

fn word_bounds(words: &[&Word]) -> Option<Bounds> {
    let first = words.first()?;
    let mut bounds = Bounds {
        x0: first.x0,
        top: first.top,
        x1: first.x1,
        bottom: first.bottom,
    };
    for word in words.iter().skip(1) {
        bounds.x0 = bounds.x0.min(word.x0);
        bounds.top = bounds.top.min(word.top);
        bounds.x1 = bounds.x1.max(word.x1);
        bounds.bottom = bounds.bottom.max(word.bottom);
    }
    Some(bounds)
}

/// Groups sorted values whose neighbours are within `tolerance`.
fn cluster_indices(values: &[(usize, f64)], tolerance: f64) -> Vec<Vec<usize>> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|left, right| left.1.total_cmp(&right.1));

    let mut clusters: Vec<Vec<usize>> = Vec::new();
    let mut last_value: Option<f64> = None;
    for (index, value) in sorted {
        match (clusters.last_mut(), last_value) {
            (Some(cluster), Some(last)) if value - last <= tolerance => cluster.push(index),
            _ => clusters.push(vec![index]),
        }
        last_value = Some(value);
    }
    clusters
}

fn aligned_word_edges(
    words: &[Word],
    horizontal: &[Edge],
    settings: &TextAlignmentSettings,
) -> Vec<Edge> {
    let left = words
        .iter()
        .enumerate()
        .map(|(index, word)| (index, word.x0))
        .collect::<Vec<(usize, f64)>>();
    let right = words
        .iter()
        .enumerate()
        .map(|(index, word)| (index, word.x1))
        .collect::<Vec<(usize, f64)>>();

    let mut candidates = cluster_indices(&left, settings.x_tolerance)
        .into_iter()
        .chain(cluster_indices(&right, settings.x_tolerance))
        .filter(|cluster| cluster.len() >= settings.min_words_vertical)
        .collect::<Vec<Vec<usize>>>();
    candidates.sort_by(|left, right| right.len().cmp(&left.len()));

    let mut kept: Vec<Bounds> = Vec::new();
    for cluster in candidates {
        let members = cluster
            .iter()
            .map(|index| &words[*index])
            .collect::<Vec<&Word>>();
        let Some(bounds) = word_bounds(&members) else {
            continue;
        };
        if kept.iter().any(|existing| existing.overlaps(&bounds)) {
            continue;
        }
        kept.push(bounds);
    }

    if kept.is_empty() {
        return Vec::new();
    }
    kept.sort_by(|left, right| left.x0.total_cmp(&right.x0));

    let mut top = kept.iter().map(|bounds| bounds.top).fold(f64::INFINITY, f64::min);
    let mut bottom = kept
        .iter()
        .map(|bounds| bounds.bottom)
        .fold(f64::NEG_INFINITY, f64::max);
    for edge in horizontal {
        top = top.min(edge.top);
        bottom = bottom.max(edge.bottom);
    }
    let right_boundary = kept
        .iter()
        .map(|bounds| bounds.x1)
        .fold(f64::NEG_INFINITY, f64::max);

    let mut edges = kept
        .iter()
        .map(|bounds| Edge::vertical(bounds.x0, top, bottom))
        .collect::<Vec<Edge>>();
    edges.push(Edge::vertical(right_boundary, top, bottom));
    edges
}

/// Length filter, snap, join, length filter.
fn prepare_edges(edges: Vec<Edge>, settings: &RuledLineSettings) -> Vec<Edge> {
    let edges = edges
        .into_iter()
        .filter(|edge| edge.length() >= settings.min_edge_length)
        .collect::<Vec<Edge>>();
    let edges = snap_edges(edges, settings.snap_tolerance);
    let edges = join_edges(edges, settings.join_tolerance);
    edges
        .into_iter()
        .filter(|edge| edge.length() >= settings.min_edge_length)
        .collect()
}

fn snap_edges(edges: Vec<Edge>, tolerance: f64) -> Vec<Edge> {
    let (mut horizontal, mut vertical): (Vec<Edge>, Vec<Edge>) = edges
        .into_iter()
        .partition(|edge| edge.orientation == Orientation::Horizontal);

    let tops = horizontal
        .iter()
        .enumerate()
        .map(|(index, edge)| (index, edge.top))
        .collect::<Vec<(usize, f64)>>();
    for cluster in cluster_indices(&tops, tolerance) {
        let mean = cluster.iter().map(|index| horizontal[*index].top).sum::<f64>()
            / cluster.len() as f64;
        for index in cluster {
            horizontal[index].top = mean;
            horizontal[index].bottom = mean;
        }
    }

    let lefts = vertical
        .iter()
        .enumerate()
        .map(|(index, edge)| (index, edge.x0))
        .collect::<Vec<(usize, f64)>>();
    for cluster in cluster_indices(&lefts, tolerance) {
        let mean = cluster.iter().map(|index| vertical[*index].x0).sum::<f64>()
            / cluster.len() as f64;
        for index in cluster {
            vertical[index].x0 = mean;
            vertical[index].x1 = mean;
        }
    }

    horizontal.extend(vertical);
    horizontal
}

fn join_edges(edges: Vec<Edge>, tolerance: f64) -> Vec<Edge> {
    let mut groups: BTreeMap<(u8, i64), Vec<Edge>> = BTreeMap::new();
    for edge in edges {
        let key = match edge.orientation {
            Orientation::Horizontal => (0, coordinate_key(edge.top)),
            Orientation::Vertical => (1, coordinate_key(edge.x0)),
        };
        groups.entry(key).or_default().push(edge);
    }

    let mut joined = Vec::new();
    for ((orientation, _), mut group) in groups {
        let horizontal = orientation == 0;
        let start = |edge: &Edge| if horizontal { edge.x0 } else { edge.top };
        group.sort_by(|left, right| start(left).total_cmp(&start(right)));

        let mut current: Option<Edge> = None;
        for edge in group {
            current = match current {
                None => Some(edge),
                Some(mut open) => {
                    if horizontal && edge.x0 <= open.x1 + tolerance {
                        open.x1 = open.x1.max(edge.x1);
                        Some(open)
                    } else if !horizontal && edge.top <= open.bottom + tolerance {
                        open.bottom = open.bottom.max(edge.bottom);
                        Some(open)
                    } else {
                        joined.push(open);
                        Some(edge)
                    }
                }
            };
        }
        if let Some(open) = current {
            joined.push(open);
        }
    }
    joined
}

#[derive(Debug, Clone, Default)]
struct Intersection {
    x: f64,
    y: f64,
    vertical: BTreeSet<usize>,
    horizontal: BTreeSet<usize>,
}

type IntersectionMap = BTreeMap<(i64, i64), Intersection>;

fn find_intersections(edges: &[Edge], tolerance: f64) -> IntersectionMap {
    let mut intersections = IntersectionMap::new();
    for (v_index, vertical) in edges.iter().enumerate() {
        if vertical.orientation != Orientation::Vertical {
            continue;
        }
        for (h_index, horizontal) in edges.iter().enumerate() {
            if horizontal.orientation != Orientation::Horizontal {
                continue;
            }
            let crosses = vertical.top <= horizontal.top + tolerance
                && vertical.bottom >= horizontal.top - tolerance
                && vertical.x0 >= horizontal.x0 - tolerance
                && vertical.x0 <= horizontal.x1 + tolerance;
            if !crosses {
                continue;
            }
            let key = (coordinate_key(vertical.x0), coordinate_key(horizontal.top));
            let entry = intersections.entry(key).or_insert_with(|| Intersection {
                x: vertical.x0,
                y: horizontal.top,
                ..Intersection::default()
            });
            entry.vertical.insert(v_index);
            entry.horizontal.insert(h_index);
        }
    }
    intersections
}

fn edge_connects(intersections: &IntersectionMap, a: (i64, i64), b: (i64, i64)) -> bool {
    let (Some(first), Some(second)) = (intersections.get(&a), intersections.get(&b)) else {
        return false;
    };
    if a.0 == b.0 {
        return !first.vertical.is_disjoint(&second.vertical);
    }
    if a.1 == b.1 {
        return !first.horizontal.is_disjoint(&second.horizontal);
    }
    false
}

fn find_cells(intersections: &IntersectionMap) -> Vec<Bounds> {
    let points = intersections.keys().copied().collect::<Vec<(i64, i64)>>();
    let mut cells = Vec::new();

    for (index, point) in points.iter().enumerate() {
        let rest = &points[index + 1..];
        let below = rest.iter().filter(|other| other.0 == point.0);
        let right = rest
            .iter()
            .filter(|other| other.1 == point.1)
            .collect::<Vec<&(i64, i64)>>();

        'below: for below_point in below {
            if !edge_connects(intersections, *point, *below_point) {
                continue;
            }
            for right_point in &right {
                if !edge_connects(intersections, *point, **right_point) {
                    continue;
                }
                let corner = (right_point.0, below_point.1);
                if intersections.contains_key(&corner)
                    && edge_connects(intersections, corner, **right_point)
                    && edge_connects(intersections, corner, *below_point)
                {
                    if let (Some(origin), Some(far)) =
                        (intersections.get(point), intersections.get(&corner))
                    {
                        cells.push(Bounds {
                            x0: origin.x,
                            top: origin.y,
                            x1: far.x,
                            bottom: far.y,
                        });
                    }
                    break 'below;
                }
            }
        }
    }

    cells
}

fn corner_keys(cell: &Bounds) -> [(i64, i64); 4] {
    let (x0, x1) = (coordinate_key(cell.x0), coordinate_key(cell.x1));
    let (top, bottom) = (coordinate_key(cell.top), coordinate_key(cell.bottom));
    [(x0, top), (x0, bottom), (x1, top), (x1, bottom)]
}

/// Groups cells that share at least one corner.
fn cells_to_tables(cells: Vec<Bounds>) -> Vec<Vec<Bounds>> {
    let mut remaining = cells;
    let mut tables = Vec::new();

    while !remaining.is_empty() {
        let mut corners: BTreeSet<(i64, i64)> = BTreeSet::new();
        let mut table = Vec::new();

        loop {
            let before = table.len();
            let mut index = 0;
            while index < remaining.len() {
                let cell_corners = corner_keys(&remaining[index]);
                let joins = table.is_empty()
                    || cell_corners.iter().any(|corner| corners.contains(corner));
                if joins {
                    corners.extend(cell_corners);
                    table.push(remaining.swap_remove(index));
                } else {
                    index += 1;
                }
            }
            if table.len() == before {
                break;
            }
        }

        if table.len() > 1 {
            tables.push(table);
        }
    }

    tables
}

fn table_from_edges(edges: &[Edge], words: &[Word], tolerance: f64) -> Option<Grid> {
    let intersections = find_intersections(edges, tolerance);
    let cells = find_cells(&intersections);
    let mut tables = cells_to_tables(cells);

    tables.sort_by(|left, right| right.len().cmp(&left.len()));
    let table = tables.into_iter().next()?;

    let mut tops = table.iter().map(|cell| coordinate_key(cell.top)).collect::<Vec<i64>>();
    tops.sort_unstable();
    tops.dedup();
    let mut lefts = table.iter().map(|cell| coordinate_key(cell.x0)).collect::<Vec<i64>>();
    lefts.sort_unstable();
    lefts.dedup();

    let mut grid = vec![vec![String::new(); lefts.len()]; tops.len()];
    for cell in &table {
        let (Ok(row), Ok(column)) = (
            tops.binary_search(&coordinate_key(cell.top)),
            lefts.binary_search(&coordinate_key(cell.x0)),
        ) else {
            continue;
        };
        let inside = words
            .iter()
            .filter(|word| {
                let (x, y) = word.center();
                cell.contains(x, y)
            })
            .collect::<Vec<&Word>>();
        grid[row][column] = words_to_text(&inside);
    }

    Some(grid)
}
