//! End-to-end behaviour: detection scenarios, exception precedence, the
//! round-trip property and the file drivers.

use colshape::expression::{CompressionNode, ExpressionNode, NodeBase};
use colshape::io::{null_mask, BlockSampler};
use colshape::operators::OperatorInfo;
use colshape::patterns::DetectorKind;
use colshape::{
    build_tree, sample_rows, Column, ColshapeConfig, ColshapeError, CompressionPipeline,
    DataType, DecompressionContext, ExpressionTree, TreeType,
};
use proptest::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};

fn columns(n: usize) -> Vec<Column> {
    (0..n)
        .map(|i| Column::new(i.to_string(), format!("c{}", i), DataType::varchar(16)))
        .collect()
}

fn rows(values: &[&[&str]]) -> Vec<Vec<String>> {
    values
        .iter()
        .map(|r| r.iter().map(|v| v.to_string()).collect())
        .collect()
}

fn single_detector(kind: DetectorKind) -> ColshapeConfig {
    ColshapeConfig {
        enabled_detectors: vec![kind],
        ..ColshapeConfig::default()
    }
}

/// Compresses every row, checks the compressed form with `check`, and
/// returns the decompressed rows.
fn compress_and_back(
    tree: &ExpressionTree,
    sample: &[Vec<String>],
    check: impl Fn(&[Column], &[Vec<String>]),
) -> Vec<Vec<String>> {
    let pipeline = CompressionPipeline::new(tree, "null").unwrap();
    let ctx = DecompressionContext::from_compression_tree(tree, "null").unwrap();
    let compressed: Vec<Vec<String>> = sample
        .iter()
        .map(|row| pipeline.compress_row(row).unwrap())
        .collect();
    check(pipeline.compressed_columns(), &compressed);
    sample
        .iter()
        .zip(&compressed)
        .map(|(row, c)| ctx.decompress_row(c, &null_mask(row, "null")).unwrap())
        .collect()
}

fn ids(cols: &[Column]) -> Vec<&str> {
    cols.iter().map(|c| c.col_id.as_str()).collect()
}

//==================================================================================
// Scenarios
//==================================================================================

#[test]
fn test_scenario_constant() {
    let mut config = single_detector(DetectorKind::Constant);
    config.detectors.constant.min_constant_ratio = 0.5;
    let sample = rows(&[&["X"], &["X"], &["X"], &["Y"]]);
    let tree = build_tree(&columns(1), &sample, &config).unwrap();
    assert_eq!(tree.nodes().len(), 1);

    let back = compress_and_back(&tree, &sample, |layout, compressed| {
        assert_eq!(ids(layout), vec!["0__ex"]);
        assert_eq!(compressed, &rows(&[&["null"], &["null"], &["null"], &["Y"]])[..]);
    });
    assert_eq!(back, sample);
}

#[test]
fn test_scenario_dictionary() {
    let mut config = single_detector(DetectorKind::Dictionary);
    config.detectors.dictionary.max_key_ratio = 1.0;
    let sample = rows(&[&["a"], &["b"], &["a"], &["c"]]);
    let tree = build_tree(&columns(1), &sample, &config).unwrap();

    let back = compress_and_back(&tree, &sample, |layout, compressed| {
        assert_eq!(ids(layout), vec!["0__0_0_0", "0__ex"]);
        let codes: Vec<&str> = compressed.iter().map(|r| r[0].as_str()).collect();
        assert_eq!(codes, vec!["0", "1", "0", "2"]);
    });
    assert_eq!(back, sample);

    // Decoding the codes alone, with the learned map.
    let ctx = DecompressionContext::from_compression_tree(&tree, "null").unwrap();
    let decoded: Vec<String> = ["0", "1", "0", "2"]
        .iter()
        .map(|code| ctx.decompress_row(&[*code, "null"], &null_mask(&["a"], "null")).unwrap()[0].clone())
        .collect();
    assert_eq!(decoded, vec!["a", "b", "a", "c"]);
}

#[test]
fn test_scenario_char_set_split() {
    let config = single_detector(DetectorKind::CharSetSplit);
    let sample = rows(&[&["AB12"], &["CD34"]]);
    let tree = build_tree(&columns(1), &sample, &config).unwrap();
    let (_, node) = tree.level_nodes(0)[0];
    assert_eq!(node.base().p_id, "CharSetSplit:??DD");

    let back = compress_and_back(&tree, &sample, |layout, compressed| {
        assert_eq!(ids(layout), vec!["0__0_0_0", "0__0_0_1", "0__ex"]);
        assert_eq!(compressed, &rows(&[&["AB", "12", "null"], &["CD", "34", "null"]])[..]);
    });
    assert_eq!(back, sample);
}

//==================================================================================
// Exception precedence
//==================================================================================

fn dictionary_node(col: &Column, keys: &[&str]) -> ExpressionNode {
    CompressionNode {
        base: NodeBase {
            p_id: "DictPattern".into(),
            p_name: "DictPattern".into(),
            cols_in: vec![col.clone()],
            cols_in_consumed: vec![col.clone()],
            cols_out: vec![col.derive_output(0, 0, 0, DataType::simple("tinyint"))],
            operator_info: OperatorInfo::Dictionary {
                keys: keys.iter().map(|k| k.to_string()).collect(),
            },
            details: BTreeMap::new(),
            pattern_signature: "DictPattern".into(),
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
        },
        cols_ex: vec![col.exception_column()],
    }
    .into()
}

#[test]
fn test_exception_overrides_a_decodable_value() {
    let cols = columns(1);
    let mut tree = ExpressionTree::new(TreeType::Compression, &cols);
    tree.add_level(vec![dictionary_node(&cols[0], &["a", "b"])]).unwrap();

    let pipeline = CompressionPipeline::new(&tree, "null").unwrap();
    assert_eq!(pipeline.compress_row(&["zz"]).unwrap(), vec!["null", "zz"]);

    // Code 0 decodes to "a", but the exception column holds the ground truth.
    let ctx = DecompressionContext::from_compression_tree(&tree, "null").unwrap();
    let mask = null_mask(&["zz"], "null");
    assert_eq!(ctx.decompress_row(&["0", "zz"], &mask).unwrap(), vec!["zz"]);
    assert_eq!(ctx.decompress_row(&["0", "null"], &mask).unwrap(), vec!["a"]);
}

//==================================================================================
// Round-trip property
//==================================================================================

fn row_strategy() -> impl Strategy<Value = Vec<String>> {
    let constant = prop_oneof![
        8 => Just("X".to_string()),
        1 => Just("null".to_string()),
        1 => "[A-Z]".prop_map(|s| s),
    ];
    let country = prop_oneof![
        Just("fr".to_string()),
        Just("de".to_string()),
        Just("it".to_string()),
        Just("null".to_string()),
        "[a-z]{2}".prop_map(|s| s),
    ];
    let city = prop_oneof![
        Just("paris".to_string()),
        Just("berlin".to_string()),
        Just("rome".to_string()),
        "[a-z]{3,6}".prop_map(|s| s),
    ];
    let code = prop_oneof![
        6 => "[A-C]{2}[0-9]{2}".prop_map(|s| s),
        1 => "[a-z]{1,3}".prop_map(|s| s),
        1 => Just("null".to_string()),
    ];
    let amount = prop_oneof![
        4 => "0{0,2}[1-9][0-9]{0,3}".prop_map(|s| s),
        2 => "\\$[1-9][0-9]{0,2}\\.[0-9]{2}".prop_map(|s| s),
        1 => "-[1-9][0-9]?".prop_map(|s| s),
        1 => "[a-z]{2}".prop_map(|s| s),
    ];
    (constant, country, city, code, amount).prop_map(|(a, b, c, d, e)| vec![a, b, c, d, e])
}

fn permissive_config() -> ColshapeConfig {
    let mut config = ColshapeConfig::default();
    config.detectors.constant.min_constant_ratio = 0.6;
    config.detectors.dictionary.max_key_ratio = 0.8;
    config.detectors.column_correlation.min_correlation = 0.5;
    config.builder.min_col_coverage = 0.1;
    config
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_compress_then_decompress_is_identity(
        sample in prop::collection::vec(row_strategy(), 1..40),
        probes in prop::collection::vec(row_strategy(), 0..20),
    ) {
        let cols = columns(5);
        let tree = build_tree(&cols, &sample, &permissive_config()).unwrap();
        let pipeline = CompressionPipeline::new(&tree, "null").unwrap();
        let ctx = DecompressionContext::from_compression_tree(&tree, "null").unwrap();

        // Probes were never seen by the detectors and exercise the exception paths.
        for row in sample.iter().chain(&probes) {
            let compressed = pipeline.compress_row(row).unwrap();
            prop_assert_eq!(compressed.len(), pipeline.compressed_columns().len());
            let rebuilt = ctx.decompress_row(&compressed, &null_mask(row, "null")).unwrap();
            prop_assert_eq!(&rebuilt, row);
        }
    }
}

//==================================================================================
// File drivers
//==================================================================================

fn write_table(path: &std::path::Path, n: usize) -> String {
    let mut text = String::new();
    for i in 0..n {
        let country = ["fr", "de", "it", "null"][i % 4];
        let city = ["paris", "berlin", "rome", "oslo"][i % 4];
        text.push_str(&format!("{}|{}|ID{:04}|{}\n", country, city, i, i % 7));
    }
    std::fs::write(path, &text).unwrap();
    text
}

#[test]
fn test_file_round_trip_with_validation() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("table.csv");
    let text = write_table(&input, 200);
    let config = permissive_config();
    let cols = columns(4);

    let mut sampler = BlockSampler::new(4, 10, 42);
    let sample = sample_rows(
        BufReader::new(File::open(&input).unwrap()),
        200,
        &mut sampler,
        &config,
    )
    .unwrap();
    assert_eq!(sample.len(), 40);

    let tree_path = dir.path().join("tree.json");
    build_tree(&cols, &sample, &config).unwrap().save(&tree_path).unwrap();
    let tree = ExpressionTree::load(&tree_path).unwrap();

    let (data_path, mask_path) = (dir.path().join("data.csv"), dir.path().join("mask.csv"));
    let pipeline = CompressionPipeline::new(&tree, &config.format.null_token).unwrap();
    let stats = pipeline
        .compress_stream(
            BufReader::new(File::open(&input).unwrap()),
            BufWriter::new(File::create(&data_path).unwrap()),
            BufWriter::new(File::create(&mask_path).unwrap()),
            &config,
        )
        .unwrap();
    assert_eq!(stats.valid_rows, 200);
    assert_eq!(stats.out_columns.len(), pipeline.compressed_columns().len());

    let out_path = dir.path().join("out.csv");
    let ctx = DecompressionContext::from_compression_tree(&tree, &config.format.null_token).unwrap();
    let dstats = ctx
        .decompress_and_validate(
            BufReader::new(File::open(&data_path).unwrap()),
            BufReader::new(File::open(&mask_path).unwrap()),
            BufWriter::new(File::create(&out_path).unwrap()),
            BufReader::new(File::open(&input).unwrap()),
            &config,
        )
        .unwrap();
    assert_eq!(dstats.total_rows, 200);
    assert_eq!(dstats.mismatched_rows, 0);
    assert_eq!(std::fs::read_to_string(&out_path).unwrap(), text);
}

#[test]
fn test_validation_can_stop_on_first_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("table.csv");
    let text = write_table(&input, 20);
    let tampered = text.replacen("paris", "lyon", 1);

    let mut config = permissive_config();
    let cols = columns(4);
    let sample: Vec<Vec<String>> = text
        .lines()
        .map(|l| l.split('|').map(str::to_string).collect())
        .collect();
    let tree = build_tree(&cols, &sample, &config).unwrap();
    let pipeline = CompressionPipeline::new(&tree, "null").unwrap();
    let ctx = DecompressionContext::from_compression_tree(&tree, "null").unwrap();

    let (mut data, mut mask) = (Vec::<u8>::new(), Vec::<u8>::new());
    pipeline
        .compress_stream(text.as_bytes(), &mut data, &mut mask, &config)
        .unwrap();

    let stats = ctx
        .decompress_and_validate(
            data.as_slice(),
            mask.as_slice(),
            Vec::<u8>::new(),
            tampered.as_bytes(),
            &config,
        )
        .unwrap();
    assert_eq!(stats.mismatched_rows, 1);

    config.validation.stop_on_first_mismatch = true;
    let err = ctx
        .decompress_and_validate(
            data.as_slice(),
            mask.as_slice(),
            Vec::<u8>::new(),
            tampered.as_bytes(),
            &config,
        )
        .unwrap_err();
    assert!(matches!(err, ColshapeError::ValidationMismatch { .. }));
}
