use std::fs;

use daioe_rollup::io::{read_csv, read_parquet, write_csv};
use daioe_rollup::{
    CsvSource, OutputFormat, OutputStore, PipelineConfig, PipelinePayload, Taxonomy, run_pipeline,
};

use crate::utils::{
    LeafRow, assert_close, employment_batch, f64_values, find_row, leaf_batch, str_values,
    write_inputs,
};

fn leaf_rows() -> Vec<LeafRow<'static>> {
    vec![
        (2020, "0110", vec![Some(0.25)]),
        (2020, "2111", vec![Some(0.4)]),
        (2020, "2112", vec![Some(0.6)]),
        (2021, "2111", vec![None]),
    ]
}

fn write_ssyk2012(dir: &std::path::Path) {
    write_inputs(
        dir,
        Taxonomy::Ssyk2012,
        &leaf_batch(Taxonomy::Ssyk2012, &["daioe_genai"], &leaf_rows()),
        &employment_batch(
            Taxonomy::Ssyk2012,
            2022,
            &[("0110", Some(7.0)), ("2111", Some(2.0)), ("2112", Some(3.0))],
        ),
    );
}

#[test]
fn test_csv_inputs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_ssyk2012(dir.path());

    let config = PipelineConfig {
        taxonomies: vec![Taxonomy::Ssyk2012],
        data_dir: dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    let source = CsvSource::new(config.clone());
    let results = run_pipeline(&source, &config).unwrap();
    let output = &results.outputs[&Taxonomy::Ssyk2012];

    let row = find_row(&output.weighted, 3, "211", 2020);
    assert_close(f64_values(&output.weighted, "daioe_genai")[row], 0.52);

    // the leading zero survives the text round trip at level 4 only
    let row = find_row(&output.weighted, 4, "0110", 2020);
    assert_close(f64_values(&output.weighted, "daioe_genai")[row], 0.25);
    let row = find_row(&output.weighted, 1, "0", 2020);
    assert_close(f64_values(&output.weighted, "daioe_genai")[row], 0.25);

    let row = find_row(&output.weighted, 3, "211", 2021);
    assert_eq!(f64_values(&output.weighted, "daioe_genai")[row], None);
}

#[test]
fn test_semicolon_delimited_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let leaf = leaf_batch(Taxonomy::Ssyk96, &["daioe_genai"], &leaf_rows());
    let employment = employment_batch(Taxonomy::Ssyk96, 2013, &[("2111", Some(1.0))]);
    let leaf_path = dir.path().join("leaf96.csv");
    let employment_path = dir.path().join("emp96.csv");
    write_csv(&leaf_path, &leaf, ';').unwrap();
    write_csv(&employment_path, &employment, ';').unwrap();

    let mut config = PipelineConfig {
        taxonomies: vec![Taxonomy::Ssyk96],
        delimiter: ';',
        ..PipelineConfig::default()
    };
    config.leaf_paths.insert(Taxonomy::Ssyk96, leaf_path);
    config
        .employment_paths
        .insert(Taxonomy::Ssyk96, employment_path);

    let results = run_pipeline(&CsvSource::new(config.clone()), &config).unwrap();
    let output = &results.outputs[&Taxonomy::Ssyk96];
    assert_eq!(output.employment_year, 2013);

    // only 2111 carries a weight
    let row = find_row(&output.weighted, 3, "211", 2020);
    assert_close(f64_values(&output.weighted, "daioe_genai")[row], 0.4);
    let row = find_row(&output.simple, 3, "211", 2020);
    assert_close(f64_values(&output.simple, "daioe_genai")[row], 0.5);
}

#[test]
fn test_store_writes_parquet_and_csv() {
    let dir = tempfile::tempdir().unwrap();
    write_ssyk2012(dir.path());
    let config = PipelineConfig {
        taxonomies: vec![Taxonomy::Ssyk2012],
        data_dir: dir.path().to_path_buf(),
        ..PipelineConfig::default()
    };
    let results = run_pipeline(&CsvSource::new(config.clone()), &config).unwrap();
    let payload = PipelinePayload::combine(&results).unwrap();

    let parquet_dir = dir.path().join("parquet");
    let store = OutputStore::new(&parquet_dir);
    store.save(&payload).unwrap();
    let weighted = read_parquet(&parquet_dir.join("daioe_weighted_v1.parquet")).unwrap();
    assert_eq!(weighted.num_rows(), payload.weighted.num_rows());
    assert_eq!(str_values(&weighted, "code"), str_values(&payload.weighted, "code"));

    let manifest = store.manifest(OutputFormat::Parquet).unwrap().unwrap();
    assert_eq!(manifest.employment_years[&Taxonomy::Ssyk2012], 2022);
    assert_eq!(manifest.simple_rows, payload.simple.num_rows());

    let csv_dir = dir.path().join("csv");
    OutputStore::new(&csv_dir)
        .save_as(&payload, OutputFormat::Csv, ',')
        .unwrap();
    let simple = read_csv(&csv_dir.join("daioe_simple_v1.csv"), ',', &["code"]).unwrap();
    assert_eq!(simple.num_rows(), payload.simple.num_rows());
    assert_eq!(str_values(&simple, "code"), str_values(&payload.simple, "code"));
}

#[test]
fn test_config_from_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{"taxonomies": ["ssyk96"], "delimiter": ";", "data_dir": "inputs", "parallel": false}"#,
    )
    .unwrap();

    let config = PipelineConfig::from_json_file(&path).unwrap();
    assert_eq!(config.taxonomies, vec![Taxonomy::Ssyk96]);
    assert_eq!(config.delimiter, ';');
    assert!(!config.parallel);
    assert_eq!(
        config.leaf_path(Taxonomy::Ssyk96),
        std::path::Path::new("inputs").join("daioe_ssyk96.csv")
    );
    assert_eq!(config.naming.rank_prefix, "pct_rank_");
}
