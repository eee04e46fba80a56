use std::path::PathBuf;

use super::*;
use crate::config::FacilityAlias;

fn five_column_config() -> ParserConfig {
    let mut config = ParserConfig::default();
    config.vocabulary.header_layouts = vec![
        ["#", "System Type", "System Name", "Cond.", "pH"]
            .iter()
            .map(|label| label.to_string())
            .collect(),
    ];
    config
}

fn normalizer() -> ColumnNormalizer {
    ColumnNormalizer::new(&Vocabulary::default()).expect("default vocabulary should compile")
}

fn grid(rows: &[&[&str]]) -> Grid {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect())
        .collect()
}

fn temp_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "fieldreport_ingest_{label}_{}_{}",
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    fs::create_dir_all(&dir).expect("temp dir should be created");
    dir
}

fn memory_store() -> Connection {
    let connection = Connection::open_in_memory().expect("in-memory sqlite should open");
    ensure_schema(&connection).expect("schema should be created");
    connection
}

fn docx_cell(text: &str) -> docx_rs::TableCell {
    docx_rs::TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
}

fn write_report_docx(path: &Path, header_lines: &[&str], rows: &[&[&str]]) {
    let mut docx = docx_rs::Docx::new();
    for line in header_lines {
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*line)));
    }
    let table = Table::new(
        rows.iter()
            .map(|row| docx_rs::TableRow::new(row.iter().map(|text| docx_cell(text)).collect()))
            .collect(),
    );
    docx = docx.add_table(table);

    let file = fs::File::create(path).expect("docx fixture should be created");
    docx.build().pack(file).expect("docx fixture should be written");
}

const REPORT_HEADER: &[&str] = &["Facility: Example Park", "Date: 5/1/2024"];
const REPORT_ROWS: &[&[&str]] = &[
    &["#", "System Type", "System Name", "Cond.", "pH"],
    &["1", "Dist", "Cold Loop", "850", "8.1"],
    &["2", "Dist", "Hot Loop", "900", "7.9"],
];

/// A page with a ruled five-column table under the header lines. Cell
/// boundaries sit at x = 50/100/200/300/400/500 and y = 100/130/160.
fn ruled_report_page() -> PageSection {
    let mut page = PageSection::from_text(
        1,
        "Facility: Example Park\nDate: 5/1/2024\n# System Type System Name Cond. pH\n1 Dist Cold Loop 850 8.1",
        TextSource::TextLayer,
    );
    page.width = 612.0;
    page.height = 792.0;

    for x in [50.0, 100.0, 200.0, 300.0, 400.0, 500.0] {
        page.edges.push(Edge::vertical(x, 100.0, 160.0));
    }
    for y in [100.0, 130.0, 160.0] {
        page.edges.push(Edge::horizontal(50.0, 500.0, y));
    }

    page.words = vec![
        Word::new("Facility:", 50.0, 40.0, 90.0, 50.0),
        Word::new("#", 60.0, 110.0, 66.0, 120.0),
        Word::new("System", 110.0, 110.0, 140.0, 120.0),
        Word::new("Type", 145.0, 110.0, 170.0, 120.0),
        Word::new("System", 210.0, 110.0, 240.0, 120.0),
        Word::new("Name", 245.0, 110.0, 270.0, 120.0),
        Word::new("Cond.", 310.0, 110.0, 335.0, 120.0),
        Word::new("pH", 410.0, 110.0, 422.0, 120.0),
        Word::new("1", 60.0, 140.0, 66.0, 150.0),
        Word::new("Dist", 110.0, 140.0, 130.0, 150.0),
        Word::new("Cold", 210.0, 140.0, 230.0, 150.0),
        Word::new("Loop", 235.0, 140.0, 258.0, 150.0),
        Word::new("850", 310.0, 140.0, 328.0, 150.0),
        Word::new("8.1", 410.0, 140.0, 425.0, 150.0),
    ];
    page
}

#[test]
fn normalizer_is_idempotent_on_canonical_keys() {
    let normalizer = normalizer();
    for key in Vocabulary::default().metric_keys {
        assert_eq!(normalizer.normalize(&key), key);
        assert_eq!(normalizer.normalize(&normalizer.normalize(&key)), key);
    }
}

#[test]
fn normalizer_maps_synonyms_to_one_key() {
    let normalizer = normalizer();
    assert_eq!(normalizer.normalize("Cond_uScm"), "conductivity");
    assert_eq!(normalizer.normalize("Cond"), "conductivity");
    assert_eq!(normalizer.normalize("Cond. (µS/cm)"), "conductivity");
    assert_eq!(normalizer.normalize("Cond ÂµS/cm"), "conductivity");
    assert_eq!(normalizer.normalize("Temp\nÂ°F"), "temperature");
    assert_eq!(normalizer.normalize("P Alk"), "p_alkalinity");
    assert_eq!(normalizer.normalize("Max Temp."), "max_temperature");
}

#[test]
fn normalizer_returns_cleaned_form_for_unknown_labels() {
    let normalizer = normalizer();
    let resolved = normalizer.resolve("Silica (ppm):");
    assert_eq!(resolved.key, "silica");
    assert!(!resolved.known);
    assert!(normalizer.resolve("System Name").known);
}

#[test]
fn coercer_extracts_leading_numbers() {
    assert_eq!(coerce_numeric(Some("123.45 mg/L")), Some(123.45));
    assert_eq!(coerce_numeric(Some("85 | 12")), Some(85.0));
    assert_eq!(coerce_numeric(Some("-4")), Some(-4.0));
    assert_eq!(coerce_numeric(Some("")), None);
    assert_eq!(coerce_numeric(None), None);
    assert_eq!(coerce_numeric(Some("OK")), None);
    assert_eq!(coerce_numeric(Some("1.2.3")), None);
}

#[test]
fn clean_cell_blanks_placeholders() {
    assert_eq!(clean_cell(" Cold\n Loop "), "Cold Loop");
    assert_eq!(clean_cell("."), "");
    assert_eq!(clean_cell("None"), "");
}

struct FixedStrategy {
    kind: StrategyKind,
    grid: Option<Grid>,
}

impl TableStrategy for FixedStrategy {
    fn kind(&self) -> StrategyKind {
        self.kind
    }

    fn try_extract(&self, _page: &PageSection) -> Option<Grid> {
        self.grid.clone()
    }
}

#[test]
fn locator_falls_through_when_a_strategy_yields_one_row() {
    let locator = TableLocator::with_strategies(vec![
        Box::new(FixedStrategy {
            kind: StrategyKind::RuledLines,
            grid: Some(grid(&[&["#", "System Name"]])),
        }),
        Box::new(FixedStrategy {
            kind: StrategyKind::TextAlignment,
            grid: None,
        }),
        Box::new(FixedStrategy {
            kind: StrategyKind::WordClusters,
            grid: Some(grid(&[&["#", "System Name"], &["1", "Cold Loop"]])),
        }),
    ]);

    let page = PageSection::from_text(2, "", TextSource::TextLayer);
    let located = locator.locate(&page).expect("third strategy should win");
    assert_eq!(located.strategy, StrategyKind::WordClusters);
    assert_eq!(located.grid.len(), 2);
}

#[test]
fn locator_moves_from_single_row_ruled_table_to_line_pattern() {
    let mut page = PageSection::from_text(2, "1 Dist\nCold Loop\n850\n8.1", TextSource::TextLayer);
    for x in [50.0, 150.0, 250.0] {
        page.edges.push(Edge::vertical(x, 100.0, 130.0));
    }
    for y in [100.0, 130.0] {
        page.edges.push(Edge::horizontal(50.0, 250.0, y));
    }
    page.words = vec![
        Word::new("Name", 60.0, 110.0, 90.0, 120.0),
        Word::new("pH", 160.0, 110.0, 175.0, 120.0),
    ];

    let locator = TableLocator::with_strategies(vec![
        Box::new(RuledLineStrategy {
            settings: RuledLineSettings::default(),
        }),
        Box::new(LinePatternStrategy::new().expect("line pattern regexes compile")),
    ]);

    let located = locator.locate(&page).expect("line pattern should find the row");
    assert_eq!(located.strategy, StrategyKind::LinePattern);
    assert_eq!(located.layout, GridLayout::Headerless);
    assert_eq!(located.grid, grid(&[&["1", "Dist", "Cold Loop", "850", "8.1"]]));
}

#[test]
fn ruled_lines_build_a_cell_grid() {
    let mut page = PageSection::from_text(1, "", TextSource::TextLayer);
    for x in [50.0, 150.0, 250.0] {
        page.edges.push(Edge::vertical(x, 100.0, 160.0));
    }
    for y in [100.0, 130.0, 160.0] {
        page.edges.push(Edge::horizontal(50.0, 250.0, y));
    }
    page.words = vec![
        Word::new("Name", 70.0, 110.0, 100.0, 120.0),
        Word::new("pH", 170.0, 110.0, 185.0, 120.0),
        Word::new("Tower", 70.0, 140.0, 100.0, 150.0),
        Word::new("7.5", 170.0, 140.0, 185.0, 150.0),
    ];

    let strategy = RuledLineStrategy {
        settings: RuledLineSettings::default(),
    };
    let extracted = strategy.try_extract(&page).expect("ruled table should be found");
    assert_eq!(extracted, grid(&[&["Name", "pH"], &["Tower", "7.5"]]));
}

#[test]
fn ruled_lines_ignore_pages_without_edges() {
    let strategy = RuledLineStrategy {
        settings: RuledLineSettings::default(),
    };
    let page = PageSection::from_text(1, "Date: 5/1/2024", TextSource::TextLayer);
    assert!(strategy.try_extract(&page).is_none());
}

#[test]
fn word_clusters_merge_split_tokens_and_assign_columns() {
    let words = vec![
        Word::new("#", 50.0, 100.0, 56.0, 110.0),
        Word::new("Name", 100.0, 100.0, 120.0, 110.0),
        Word::new("pH", 200.0, 100.0, 212.0, 110.0),
        Word::new("1", 51.0, 130.0, 56.0, 140.0),
        Word::new("Cold", 101.0, 130.0, 111.0, 140.0),
        Word::new("Loop", 113.0, 130.0, 125.0, 140.0),
        Word::new("7.", 200.0, 130.0, 207.0, 140.0),
        Word::new("9", 207.5, 130.0, 212.0, 140.0),
    ];

    let clustered =
        cluster_words(&words, &WordClusterSettings::default()).expect("words should cluster");
    assert_eq!(
        clustered,
        grid(&[&["#", "Name", "pH"], &["1", "Cold Loop", "7.9"]])
    );
}

#[test]
fn line_pattern_reads_one_cell_per_line() {
    let strategy = LinePatternStrategy::new().expect("line pattern regexes compile");
    let lines = vec![
        "SYSTEMS REPORT",
        "1 Dist",
        "Cold Loop",
        "850",
        "8.1",
        "72",
        "2 Nitrite",
        "Chiller",
        "900",
        "9.5",
        "800",
        "30%/-10",
        "- Dist",
        "Note",
    ];

    let rows = strategy.parse_lines(&lines);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], vec!["1", "Dist", "Cold Loop", "850", "8.1", "72"]);
    assert_eq!(
        rows[1],
        vec!["2", "Nitrite", "Chiller", "900", "9.5", "800", "30%/-10"]
    );
    assert_eq!(rows[2][0], "-");
}

#[test]
fn line_pattern_leaves_name_empty_when_values_follow_directly() {
    let strategy = LinePatternStrategy::new().expect("line pattern regexes compile");
    let rows = strategy.parse_lines(&["3 Dist", "850", "8.1"]);
    assert_eq!(rows, grid(&[&["3", "Dist", "", "850", "8.1"]]));
}

#[test]
fn vertical_label_run_reads_samples_and_skips_ranges() {
    let strategy = VerticalLabelRunStrategy::new(normalizer(), &Vocabulary::default())
        .expect("vertical strategy should build");
    let lines = vec![
        "Water Analysis",
        "Sample ID",
        "pH",
        "Cond",
        "Tower 1",
        "7.8",
        "900",
        "Range",
        "6-8",
        "500-1000",
        "Boiler",
        "Feed",
        "8.5",
        "1200",
    ];

    let rows = strategy.parse_lines(&lines);
    assert_eq!(
        rows,
        grid(&[
            &["Sample ID", "pH", "Cond"],
            &["Tower 1", "7.8", "900"],
            &["Boiler Feed", "8.5", "1200"],
        ])
    );

    let assembler = RowAssembler::new(normalizer(), &Vocabulary::default())
        .expect("assembler should build");
    let assembly = assembler.assemble(&LocatedTable {
        strategy: StrategyKind::VerticalLabelRun,
        layout: GridLayout::Labeled,
        grid: rows,
    });
    assert_eq!(assembly.mode, AssemblyMode::Labeled);
    assert_eq!(assembly.records.len(), 2);
    assert_eq!(assembly.records[1].system_name, "Boiler Feed");
    assert_eq!(assembly.records[1].value("conductivity"), Some("1200"));
}

#[test]
fn exact_header_mode_requires_every_row_to_match() {
    let config = five_column_config();
    let assembler = RowAssembler::new(
        ColumnNormalizer::new(&config.vocabulary).expect("normalizer"),
        &config.vocabulary,
    )
    .expect("assembler should build");

    let matching = grid(&[
        &["#", "System Type", "System Name", "Cond.", "pH"],
        &["1", "Dist", "Cold Loop", "850", "8.1"],
    ]);
    let assembly = assembler.assemble(&LocatedTable {
        strategy: StrategyKind::RuledLines,
        layout: GridLayout::Tabular,
        grid: matching.clone(),
    });
    assert_eq!(assembly.mode, AssemblyMode::ExactHeader);
    assert_eq!(assembly.records.len(), 1);
    assert_eq!(assembly.records[0].system_type, "Dist");
    assert_eq!(assembly.records[0].system_name, "Cold Loop");
    assert_eq!(assembly.records[0].value("conductivity"), Some("850"));
    assert_eq!(assembly.records[0].value("ph"), Some("8.1"));

    let mut ragged = matching;
    ragged.push(vec!["2".to_string(), "Dist".to_string(), "Hot Loop".to_string()]);
    let assembly = assembler.assemble(&LocatedTable {
        strategy: StrategyKind::RuledLines,
        layout: GridLayout::Tabular,
        grid: ragged,
    });
    assert_eq!(assembly.mode, AssemblyMode::Positional);
}

#[test]
fn positional_mode_assigns_distribution_scheme() {
    let assembler = RowAssembler::new(normalizer(), &Vocabulary::default())
        .expect("assembler should build");
    let assembly = assembler.assemble(&LocatedTable {
        strategy: StrategyKind::WordClusters,
        layout: GridLayout::Tabular,
        grid: grid(&[
            &["#", "System", "Values"],
            &[
                "2", "Dist", "Hot Loop", "900", "7.9", "22", "150", "50", "5", "3", "0.2", "0.5",
                "0.1", "1.2", "0.8",
            ],
        ]),
    });

    assert_eq!(assembly.mode, AssemblyMode::Positional);
    assert_eq!(assembly.records.len(), 1);
    let record = &assembly.records[0];
    assert_eq!(record.system_name, "Hot Loop");
    assert_eq!(record.value("conductivity"), Some("900"));
    assert_eq!(record.value("ph"), Some("7.9"));
    assert_eq!(record.value("temperature"), Some("22"));
    assert_eq!(record.value("p_alkalinity"), Some("150"));
    assert_eq!(record.value("m_alkalinity"), Some("50"));
    assert_eq!(record.value("chloride"), Some("5"));
    assert_eq!(record.value("hardness"), Some("3"));
    assert_eq!(record.value("calcium"), Some("0.2"));
    assert_eq!(record.value("po4"), Some("0.5"));
    assert_eq!(record.value("so2"), Some("0.1"));
    assert_eq!(record.value("mo"), None);
    assert_eq!(record.value("free_chlorine"), Some("1.2"));
    assert_eq!(record.value("total_chlorine"), Some("0.8"));
}

#[test]
fn positional_mode_handles_nitrite_and_short_rows() {
    let assembler = RowAssembler::new(normalizer(), &Vocabulary::default())
        .expect("assembler should build");
    let assembly = assembler.assemble(&LocatedTable {
        strategy: StrategyKind::LinePattern,
        layout: GridLayout::Headerless,
        grid: grid(&[
            &["1", "Dist", "Cold Loop", "850", "8.1", "72"],
            &["2", "Nitrite", "Chiller", "900", "9.5", "800", "30%/-10"],
            &["3", "Softener", "Unit A", "10", "7.0"],
        ]),
    });

    assert_eq!(assembly.records.len(), 2);
    assert_eq!(assembly.records[0].system_name, "Cold Loop");
    assert!(assembly.records[0].values.is_empty());
    assert_eq!(assembly.records[1].value("no2"), Some("800"));
    assert_eq!(assembly.records[1].value("glycol"), Some("30%/-10"));
    assert_eq!(assembly.dropped_rows, 1);
}

#[test]
fn dash_rows_are_excluded_in_every_mode() {
    let config = five_column_config();
    let assembler = RowAssembler::new(
        ColumnNormalizer::new(&config.vocabulary).expect("normalizer"),
        &config.vocabulary,
    )
    .expect("assembler should build");

    let exact = assembler.assemble(&LocatedTable {
        strategy: StrategyKind::RuledLines,
        layout: GridLayout::Tabular,
        grid: grid(&[
            &["#", "System Type", "System Name", "Cond.", "pH"],
            &["-", "", "", "", ""],
            &["1", "Dist", "Cold Loop", "850", "8.1"],
        ]),
    });
    assert_eq!(exact.mode, AssemblyMode::ExactHeader);
    assert_eq!(exact.records.len(), 1);
    assert_eq!(exact.dropped_rows, 1);

    let positional = assembler.assemble(&LocatedTable {
        strategy: StrategyKind::LinePattern,
        layout: GridLayout::Headerless,
        grid: grid(&[
            &["-", "Dist", "Spare"],
            &["1", "Dist", "Cold Loop", "850", "8.1", "72", "1.0", "0.9"],
        ]),
    });
    assert_eq!(positional.mode, AssemblyMode::Positional);
    assert_eq!(positional.records.len(), 1);
    assert!(positional
        .records
        .iter()
        .all(|record| record.system_name != "Spare"));
}

#[test]
fn glycol_values_in_other_columns_are_relocated() {
    let assembler = RowAssembler::new(normalizer(), &Vocabulary::default())
        .expect("assembler should build");
    let assembly = assembler.assemble(&LocatedTable {
        strategy: StrategyKind::NativeTable,
        layout: GridLayout::Labeled,
        grid: grid(&[
            &["System Name", "pH", "Freeze Point", "Glycol"],
            &["Chiller", "8.2", "35% PG", ""],
            &["Tower", "8.4", "clean", "20%"],
        ]),
    });

    assert_eq!(assembly.glycol_relocations, 1);
    assert_eq!(assembly.records[0].value("glycol"), Some("35% PG"));
    assert_eq!(assembly.records[0].value("freeze_point"), None);
    assert_eq!(assembly.records[1].value("glycol"), Some("20%"));
    assert_eq!(assembly.records[1].value("freeze_point"), Some("clean"));
}

#[test]
fn labeled_mode_records_unmapped_labels() {
    let assembler = RowAssembler::new(normalizer(), &Vocabulary::default())
        .expect("assembler should build");
    let assembly = assembler.assemble(&LocatedTable {
        strategy: StrategyKind::NativeTable,
        layout: GridLayout::Labeled,
        grid: grid(&[
            &["GWT Names", "P Alkalinity", "Silica (ppm)"],
            &["Tower 1", "120", "14"],
            &["", "5", "6"],
        ]),
    });

    assert_eq!(assembly.records.len(), 1);
    assert_eq!(assembly.records[0].system_name, "Tower 1");
    assert_eq!(assembly.records[0].value("p_alkalinity"), Some("120"));
    assert_eq!(assembly.records[0].value("silica"), Some("14"));
    assert!(assembly.unmapped_labels.contains("silica"));
    assert_eq!(assembly.dropped_rows, 1);
}

#[test]
fn edges_come_from_rectangles_and_stroked_lines() {
    let operations = vec![
        Operation::new(
            "re",
            vec![
                Object::Integer(50),
                Object::Integer(100),
                Object::Integer(100),
                Object::Integer(20),
            ],
        ),
        Operation::new("S", vec![]),
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![
                Object::Integer(1),
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(1),
                Object::Integer(10),
                Object::Integer(0),
            ],
        ),
        Operation::new("m", vec![Object::Integer(0), Object::Integer(0)]),
        Operation::new("l", vec![Object::Integer(100), Object::Integer(0)]),
        Operation::new("S", vec![]),
        Operation::new("Q", vec![]),
        Operation::new("m", vec![Object::Integer(0), Object::Integer(0)]),
        Operation::new("l", vec![Object::Integer(0), Object::Integer(300)]),
        Operation::new("n", vec![]),
    ];

    let edges = edges_from_operations(&operations, 792.0);
    assert_eq!(edges.len(), 5);

    let horizontal = edges
        .iter()
        .filter(|edge| edge.orientation == Orientation::Horizontal)
        .collect::<Vec<&Edge>>();
    assert_eq!(horizontal.len(), 3);
    assert!(horizontal
        .iter()
        .any(|edge| edge.top == 692.0 && edge.x0 == 50.0 && edge.x1 == 150.0));
    assert!(horizontal
        .iter()
        .any(|edge| edge.top == 792.0 && edge.x0 == 10.0 && edge.x1 == 110.0));

    let vertical = edges
        .iter()
        .filter(|edge| edge.orientation == Orientation::Vertical)
        .collect::<Vec<&Edge>>();
    assert_eq!(vertical.len(), 2);
    assert!(vertical
        .iter()
        .all(|edge| edge.top == 672.0 && edge.bottom == 692.0));
}

#[test]
fn bbox_output_parses_into_pages_of_words() {
    let xhtml = r#"<html><body><doc>
<page width="612.000000" height="792.000000">
<word xMin="50.000000" yMin="100.000000" xMax="80.000000" yMax="110.000000">pH</word>
<word xMin="90.000000" yMin="100.000000" xMax="120.000000" yMax="110.000000">A&amp;B</word>
</page>
<page width="612.000000" height="792.000000">
</page>
</doc></body></html>"#;

    let pages = parse_bbox_document(xhtml).expect("bbox output should parse");
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].height, 792.0);
    assert_eq!(pages[0].words.len(), 2);
    assert_eq!(pages[0].words[1].text, "A&B");
    assert_eq!(pages[0].words[0].x1, 80.0);
    assert!(pages[1].words.is_empty());
}

#[test]
fn form_feed_split_drops_trailing_blank_pages() {
    let pages = split_form_feed_pages("page one\u{000C}page two\u{000C}\n\u{000C}");
    assert_eq!(pages, vec!["page one".to_string(), "page two".to_string()]);
}

#[test]
fn header_fields_come_from_labels() {
    let extractor =
        HeaderFieldExtractor::new(&HeaderFieldSettings::default()).expect("extractor builds");
    let text = "Facility: Example Park Attention: J. Doe\nDate: 5/1/2024\nField Representative: Pat Lee";
    let fields = extractor.extract(text, text, "report.pdf");

    assert_eq!(fields.facility.as_deref(), Some("Example Park"));
    assert_eq!(fields.report_date, NaiveDate::from_ymd_opt(2024, 5, 1));
    assert_eq!(fields.date_raw.as_deref(), Some("5/1/2024"));
    assert_eq!(fields.technician.as_deref(), Some("Pat Lee"));
    assert!(!fields.technician_is_placeholder);
    assert!(fields.missing_fields().is_empty());
}

#[test]
fn header_fields_fall_back_to_markers_and_filename() {
    let settings = HeaderFieldSettings {
        default_technician: None,
        known_technicians: Vec::new(),
        facility_aliases: vec![FacilityAlias {
            pattern: "Giant City State Park".to_string(),
            facility: "Giant City SP".to_string(),
        }],
    };
    let extractor = HeaderFieldExtractor::new(&settings).expect("extractor builds");

    let text = "SITE VISITATION REPORT\nLake Lodge\nSystems reviewed\nJohn Smith, Field Chemist";
    let fields = extractor.extract(text, text, "Visit 05-01-24.pdf");
    assert_eq!(fields.facility.as_deref(), Some("Lake Lodge"));
    assert_eq!(fields.report_date, NaiveDate::from_ymd_opt(2024, 5, 1));
    assert_eq!(fields.technician.as_deref(), Some("John Smith"));

    let fields = extractor.extract("", "", "Giant City State Park 2023-11-07.pdf");
    assert_eq!(fields.facility.as_deref(), Some("Giant City SP"));
    assert_eq!(fields.report_date, NaiveDate::from_ymd_opt(2023, 11, 7));
    assert!(fields.technician.is_none());
    assert_eq!(fields.missing_fields(), vec!["technician".to_string()]);
}

#[test]
fn signature_block_names_the_technician() {
    let extractor =
        HeaderFieldExtractor::new(&HeaderFieldSettings::default()).expect("extractor builds");
    let text = "Comments and Recommendations:\nAll good.\nSignature\n\nJane Doe\n";
    let fields = extractor.extract(text, text, "report.docx");
    assert_eq!(fields.technician.as_deref(), Some("Jane Doe"));
}

#[test]
fn default_technician_is_flagged_as_placeholder() {
    let settings = HeaderFieldSettings {
        default_technician: Some("Unassigned".to_string()),
        ..HeaderFieldSettings::default()
    };
    let extractor = HeaderFieldExtractor::new(&settings).expect("extractor builds");
    let fields = extractor.extract("Facility: Example Park", "Facility: Example Park", "x.pdf");

    assert_eq!(fields.technician.as_deref(), Some("Unassigned"));
    assert!(fields.technician_is_placeholder);
    assert!(fields.missing_fields().contains(&"technician".to_string()));
    assert!(fields.missing_fields().contains(&"date".to_string()));
}

#[test]
fn report_dates_respect_year_width() {
    assert_eq!(parse_report_date("5/1/24"), NaiveDate::from_ymd_opt(2024, 5, 1));
    assert_eq!(parse_report_date("05-01-2024"), NaiveDate::from_ymd_opt(2024, 5, 1));
    assert_eq!(parse_report_date("2024-05-01"), NaiveDate::from_ymd_opt(2024, 5, 1));
    assert_eq!(parse_report_date("not a date"), None);
}

#[test]
fn ruled_page_yields_document_and_system() {
    let orchestrator = Orchestrator::new(&five_column_config(), PdfReadOptions::default())
        .expect("orchestrator should build");
    let document = ExtractedDocument {
        sections: vec![ruled_report_page()],
        ocr_pages: 0,
    };

    let parsed = orchestrator.parse_document(&document, "example.pdf");
    assert_eq!(parsed.header.facility.as_deref(), Some("Example Park"));
    assert_eq!(parsed.header.report_date, NaiveDate::from_ymd_opt(2024, 5, 1));
    assert_eq!(parsed.pages.len(), 1);
    assert_eq!(parsed.pages[0].strategy, StrategyKind::RuledLines);
    assert_eq!(parsed.pages[0].mode, AssemblyMode::ExactHeader);

    let mut connection = memory_store();
    let document_id = insert_document(
        &connection,
        &NewDocument {
            filename: "example.pdf",
            sha256: None,
            source_kind: ReportKind::PdfText.as_str(),
            header: &parsed.header,
        },
    )
    .expect("document insert");
    let context = SystemContext {
        document_id,
        header: &parsed.header,
        strategy: parsed.pages[0].strategy.as_str(),
        page: parsed.pages[0].page,
    };
    for record in &parsed.pages[0].records {
        insert_system(&mut connection, &context, record).expect("system insert");
    }

    let (facility, date): (String, String) = connection
        .query_row(
            "SELECT facility, report_date FROM documents WHERE id = ?1",
            [document_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("document row");
    assert_eq!(facility, "Example Park");
    assert_eq!(date, "2024-05-01");

    let (system_type, system_name, conductivity, ph): (String, String, f64, f64) = connection
        .query_row(
            "SELECT system_type, system_name, conductivity, ph FROM readings",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .expect("typed reading");
    assert_eq!(system_type, "Dist");
    assert_eq!(system_name, "Cold Loop");
    assert_eq!(conductivity, 850.0);
    assert_eq!(ph, 8.1);
}

#[test]
fn cover_page_tables_are_skipped_for_multi_page_reports() {
    let orchestrator = Orchestrator::new(&five_column_config(), PdfReadOptions::default())
        .expect("orchestrator should build");
    let mut second = ruled_report_page();
    second.number = 2;
    second.text = "2 Dist\nHot Loop\n900\n7.9\n22\n1.2\n0.8".to_string();
    second.edges.clear();
    second.words.clear();

    let document = ExtractedDocument {
        sections: vec![ruled_report_page(), second],
        ocr_pages: 0,
    };
    let parsed = orchestrator.parse_document(&document, "example.pdf");

    assert_eq!(parsed.header.facility.as_deref(), Some("Example Park"));
    assert_eq!(parsed.pages.len(), 1);
    assert_eq!(parsed.pages[0].page, 2);
    assert_eq!(parsed.pages[0].strategy, StrategyKind::LinePattern);
    assert_eq!(parsed.pages[0].records[0].value("total_chlorine"), Some("0.8"));
}

#[test]
fn prose_page_is_claimed_by_word_clusters_without_systems() {
    let orchestrator = Orchestrator::new(&ParserConfig::default(), PdfReadOptions::default())
        .expect("orchestrator should build");
    let mut page = PageSection::from_text(1, "Thanks for\nall help", TextSource::TextLayer);
    page.words = vec![
        Word::new("Thanks", 50.0, 100.0, 80.0, 110.0),
        Word::new("for", 300.0, 100.0, 315.0, 110.0),
        Word::new("all", 50.0, 130.0, 65.0, 140.0),
        Word::new("help", 300.0, 130.0, 320.0, 140.0),
    ];
    let document = ExtractedDocument {
        sections: vec![page],
        ocr_pages: 0,
    };

    let parsed = orchestrator.parse_document(&document, "letter.pdf");
    assert!(parsed.pages_without_table.is_empty());
    assert_eq!(parsed.pages.len(), 1);
    assert_eq!(parsed.pages[0].strategy, StrategyKind::WordClusters);
    assert!(parsed.pages[0].records.is_empty());
    assert_eq!(parsed.system_count(), 0);
}

#[test]
fn placeholder_cells_keep_their_positional_slot() {
    let assembler = RowAssembler::new(normalizer(), &Vocabulary::default())
        .expect("assembler should build");
    let assembly = assembler.assemble(&LocatedTable {
        strategy: StrategyKind::LinePattern,
        layout: GridLayout::Headerless,
        grid: grid(&[&[
            "1", "Dist", "Cold Loop", "850", "8.1", "72", ".", "120", "30", "150", "60", "5",
            "8", "2", "1.0", "1.2",
        ]]),
    });

    assert_eq!(assembly.mode, AssemblyMode::Positional);
    let record = &assembly.records[0];
    assert_eq!(record.value("temperature"), Some("72"));
    assert_eq!(record.value("p_alkalinity"), None);
    assert_eq!(record.value("m_alkalinity"), Some("120"));
    assert_eq!(record.value("chloride"), Some("30"));
    assert_eq!(record.value("hardness"), Some("150"));
    assert_eq!(record.value("mo"), Some("2"));
    assert_eq!(record.value("free_chlorine"), Some("1.0"));
    assert_eq!(record.value("total_chlorine"), Some("1.2"));
}

#[test]
fn docx_report_is_read_through_native_table() {
    let dir = temp_dir("docx_read");
    let path = dir.join("example.docx");
    write_report_docx(&path, REPORT_HEADER, REPORT_ROWS);

    let document = read_docx(&path).expect("docx should read");
    assert_eq!(document.sections.len(), 1);
    assert_eq!(document.sections[0].native_tables.len(), 1);
    assert!(document.header_text().contains("Facility: Example Park"));

    let orchestrator = Orchestrator::new(&ParserConfig::default(), PdfReadOptions::default())
        .expect("orchestrator should build");
    let parsed = orchestrator.parse_document(&document, "example.docx");
    assert_eq!(parsed.pages[0].strategy, StrategyKind::NativeTable);
    assert_eq!(parsed.pages[0].mode, AssemblyMode::Labeled);
    assert_eq!(parsed.system_count(), 2);
    assert_eq!(parsed.pages[0].records[0].value("ph"), Some("8.1"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn ingest_twice_adds_no_rows() {
    let dir = temp_dir("idempotent");
    write_report_docx(&dir.join("a.docx"), REPORT_HEADER, REPORT_ROWS);
    write_report_docx(
        &dir.join("b.docx"),
        &["Facility: Lake Lodge", "Date: 6/2/2024"],
        REPORT_ROWS,
    );
    fs::write(dir.join("notes.txt"), b"not a report").expect("notes file");
    fs::write(dir.join("blank.docx"), b"").expect("empty file");

    let orchestrator = Orchestrator::new(&ParserConfig::default(), PdfReadOptions::default())
        .expect("orchestrator should build");
    let mut connection = memory_store();

    let (first, documents) = orchestrator
        .ingest_directory(&mut connection, &dir, false)
        .expect("first run");
    assert_eq!(first.file_count, 4);
    assert_eq!(first.documents_inserted, 2);
    assert_eq!(first.systems_inserted, 4);
    assert_eq!(first.skipped_unsupported_count, 2);
    assert!(documents
        .iter()
        .filter(|document| document.status == DocumentStatus::Ingested)
        .all(|document| document.missing_fields == vec!["technician".to_string()]));

    let documents_after_first =
        count_rows(&connection, "SELECT COUNT(*) FROM documents").expect("count");
    let systems_after_first = count_rows(&connection, "SELECT COUNT(*) FROM systems").expect("count");
    let metrics_after_first = count_rows(&connection, "SELECT COUNT(*) FROM metrics").expect("count");

    let (second, _) = orchestrator
        .ingest_directory(&mut connection, &dir, false)
        .expect("second run");
    assert_eq!(second.skipped_complete_count, 2);
    assert_eq!(second.systems_inserted, 0);

    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM documents").expect("count"),
        documents_after_first
    );
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM systems").expect("count"),
        systems_after_first
    );
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM metrics").expect("count"),
        metrics_after_first
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn pending_document_is_resumed_without_duplicates() {
    let dir = temp_dir("resume");
    write_report_docx(&dir.join("plant.docx"), REPORT_HEADER, REPORT_ROWS);

    let mut connection = memory_store();
    let header = HeaderFields {
        facility: Some("Example Park".to_string()),
        report_date: NaiveDate::from_ymd_opt(2024, 5, 1),
        date_raw: Some("5/1/2024".to_string()),
        technician: None,
        technician_is_placeholder: false,
    };
    let document_id = insert_document(
        &connection,
        &NewDocument {
            filename: "plant.docx",
            sha256: None,
            source_kind: ReportKind::Docx.as_str(),
            header: &header,
        },
    )
    .expect("pending document");
    let mut cold_loop = SystemRecord {
        system_type: "Dist".to_string(),
        system_name: "Cold Loop".to_string(),
        ..SystemRecord::default()
    };
    cold_loop
        .values
        .insert("conductivity".to_string(), "850".to_string());
    insert_system(
        &mut connection,
        &SystemContext {
            document_id,
            header: &header,
            strategy: StrategyKind::NativeTable.as_str(),
            page: 1,
        },
        &cold_loop,
    )
    .expect("first system");

    let orchestrator = Orchestrator::new(&ParserConfig::default(), PdfReadOptions::default())
        .expect("orchestrator should build");
    let (counts, documents) = orchestrator
        .ingest_directory(&mut connection, &dir, false)
        .expect("resume run");

    assert_eq!(counts.resumed_count, 1);
    assert_eq!(documents[0].status, DocumentStatus::Resumed);
    assert_eq!(documents[0].systems_inserted, 1);
    assert_eq!(documents[0].systems_duplicate, 1);
    assert_eq!(
        document_state(&connection, "plant.docx").expect("state"),
        DocumentState::Complete(document_id)
    );
    assert_eq!(
        count_rows(&connection, "SELECT COUNT(*) FROM systems").expect("count"),
        2
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn unseen_metric_keys_add_typed_columns() {
    let mut connection = memory_store();
    let header = HeaderFields::default();
    let document_id = insert_document(
        &connection,
        &NewDocument {
            filename: "extra.docx",
            sha256: None,
            source_kind: ReportKind::Docx.as_str(),
            header: &header,
        },
    )
    .expect("document");

    let mut record = SystemRecord {
        system_type: "Tower".to_string(),
        system_name: "Tower 1".to_string(),
        ..SystemRecord::default()
    };
    record.values.insert("silica".to_string(), "14 ppm".to_string());
    record.values.insert("2nd_reading".to_string(), "OK".to_string());

    let context = SystemContext {
        document_id,
        header: &header,
        strategy: StrategyKind::NativeTable.as_str(),
        page: 1,
    };
    let inserted = insert_system(&mut connection, &context, &record).expect("system insert");
    assert!(matches!(inserted, SystemInsert::Inserted(_)));
    assert_eq!(
        insert_system(&mut connection, &context, &record).expect("duplicate insert"),
        SystemInsert::Duplicate
    );

    let columns = table_columns(&connection, "readings").expect("columns");
    assert!(columns.contains(&"silica".to_string()));
    assert!(columns.contains(&"m_2nd_reading".to_string()));

    let (silica, second): (Option<f64>, Option<f64>) = connection
        .query_row("SELECT silica, m_2nd_reading FROM readings", [], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .expect("typed row");
    assert_eq!(silica, Some(14.0));
    assert_eq!(second, None);

    let raw: String = connection
        .query_row(
            "SELECT metric_value FROM metrics WHERE metric_key = '2nd_reading'",
            [],
            |row| row.get(0),
        )
        .expect("raw metric");
    assert_eq!(raw, "OK");
}

#[test]
fn metric_column_names_are_sanitized() {
    assert_eq!(metric_column_name("free_chlorine").as_deref(), Some("free_chlorine"));
    assert_eq!(metric_column_name("cond_µs/cm").as_deref(), Some("cond_s_cm"));
    assert_eq!(metric_column_name("2nd").as_deref(), Some("m_2nd"));
    assert_eq!(metric_column_name("%%"), None);
}

#[test]
fn ensure_schema_is_repeatable() {
    let connection = memory_store();
    ensure_schema(&connection).expect("second schema pass");
    let version: String = connection
        .query_row(
            "SELECT value FROM metadata WHERE key = 'db_schema_version'",
            [],
            |row| row.get(0),
        )
        .expect("schema version");
    assert_eq!(version, DB_SCHEMA_VERSION);
}

#[test]
fn render_ingest_command_includes_ocr_flags_when_enabled() {
    let args = IngestArgs {
        input_dir: PathBuf::from("reports"),
        db_path: PathBuf::from("reports.sqlite"),
        manifest_dir: None,
        recursive: true,
        ocr_mode: OcrMode::Auto,
        ocr_lang: "eng".to_string(),
        ocr_min_text_chars: 200,
    };

    let command = run::render_ingest_command(&args, Some(Path::new("fieldreport.toml")));
    assert!(command.starts_with("fieldreport --config fieldreport.toml ingest"));
    assert!(command.contains("--recursive"));
    assert!(command.contains("--ocr-mode auto"));
    assert!(command.contains("--ocr-lang eng"));
    assert!(command.contains("--ocr-min-text-chars 200"));
}

#[test]
fn run_writes_manifest_and_log() {
    let dir = temp_dir("run");
    let input_dir = dir.join("reports");
    fs::create_dir_all(&input_dir).expect("input dir");
    write_report_docx(&input_dir.join("example.docx"), REPORT_HEADER, REPORT_ROWS);

    let args = IngestArgs {
        input_dir,
        db_path: dir.join("reports.sqlite"),
        manifest_dir: None,
        recursive: false,
        ocr_mode: OcrMode::Off,
        ocr_lang: "eng".to_string(),
        ocr_min_text_chars: 40,
    };
    run(args, &ParserConfig::default(), None).expect("ingest run");

    let manifest_dir = dir.join("manifests");
    let entries = fs::read_dir(&manifest_dir)
        .expect("manifest dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect::<Vec<String>>();
    let manifest_name = entries
        .iter()
        .find(|name| name.ends_with(".json"))
        .expect("json manifest");
    let log_name = entries
        .iter()
        .find(|name| name.ends_with(".log"))
        .expect("run log");

    let manifest: serde_json::Value = serde_json::from_slice(
        &fs::read(manifest_dir.join(manifest_name)).expect("manifest bytes"),
    )
    .expect("manifest json");
    assert_eq!(manifest["status"], "completed");
    assert_eq!(manifest["counts"]["systems_inserted"], 2);
    assert_eq!(manifest["documents"][0]["pages"][0]["strategy"], "native_table");

    let log = fs::read_to_string(manifest_dir.join(log_name)).expect("log text");
    assert!(log.contains("[ingested] example.docx: 2 inserted"));
    assert!(log.contains("missing fields: technician"));

    let _ = fs::remove_dir_all(&dir);
}
