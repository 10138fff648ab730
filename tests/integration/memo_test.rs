use std::collections::BTreeMap;
use std::sync::Arc;

use daioe_rollup::{
    Error, MemoizedPipeline, MemorySource, OutputStore, PipelineConfig, PipelinePayload,
    PipelineResults, Taxonomy, run_pipeline,
};

use crate::utils::{
    LeafRow, assert_close, employment_batch, f64_values, find_row, leaf_batch, str_values,
};

fn source() -> MemorySource {
    let ssyk2012: Vec<LeafRow<'_>> = vec![
        (2020, "2111", vec![Some(0.4), Some(0.1)]),
        (2020, "2112", vec![Some(0.6), Some(0.3)]),
    ];
    let ssyk96: Vec<LeafRow<'_>> = vec![
        (2020, "2131", vec![Some(0.2)]),
        (2020, "2132", vec![Some(0.8)]),
    ];
    MemorySource::new()
        .with_taxonomy(
            Taxonomy::Ssyk2012,
            leaf_batch(
                Taxonomy::Ssyk2012,
                &["daioe_genai", "daioe_allapps"],
                &ssyk2012,
            ),
            employment_batch(
                Taxonomy::Ssyk2012,
                2022,
                &[("2111", Some(2.0)), ("2112", Some(3.0))],
            ),
        )
        .with_taxonomy(
            Taxonomy::Ssyk96,
            leaf_batch(Taxonomy::Ssyk96, &["daioe_genai"], &ssyk96),
            employment_batch(
                Taxonomy::Ssyk96,
                2013,
                &[("2131", Some(1.0)), ("2132", Some(1.0))],
            ),
        )
}

fn config() -> PipelineConfig {
    PipelineConfig {
        parallel: false,
        ..PipelineConfig::default()
    }
}

#[test]
fn test_combine_stacks_taxonomies_in_order() {
    let results = run_pipeline(&source(), &config()).unwrap();
    let payload = PipelinePayload::combine(&results).unwrap();

    assert_eq!(
        payload.weighted.num_rows(),
        results.outputs[&Taxonomy::Ssyk2012].weighted.num_rows()
            + results.outputs[&Taxonomy::Ssyk96].weighted.num_rows()
    );
    assert_eq!(
        payload.employment_years,
        BTreeMap::from([(Taxonomy::Ssyk2012, 2022), (Taxonomy::Ssyk96, 2013)])
    );

    // ssyk96 has no allapps metric, so its rows are null there
    let allapps = f64_values(&payload.weighted, "daioe_allapps");
    let first_ssyk96 = results.outputs[&Taxonomy::Ssyk2012].weighted.num_rows();
    assert!(allapps[first_ssyk96..].iter().all(Option::is_none));

    let row = find_row(&payload.weighted, 3, "211", 2020);
    assert_close(f64_values(&payload.weighted, "daioe_genai")[row], 0.52);
}

#[test]
fn test_combine_follows_requested_taxonomy_order() {
    let config = PipelineConfig {
        taxonomies: vec![Taxonomy::Ssyk96, Taxonomy::Ssyk2012],
        ..config()
    };
    let results = run_pipeline(&source(), &config).unwrap();
    let payload = PipelinePayload::combine(&results).unwrap();

    let taxonomies = str_values(&payload.simple, "taxonomy");
    let ssyk96_rows = results.outputs[&Taxonomy::Ssyk96].simple.num_rows();
    assert!(taxonomies[..ssyk96_rows].iter().all(|t| t == "ssyk96"));
    assert!(taxonomies[ssyk96_rows..].iter().all(|t| t == "ssyk2012"));

    // metric columns follow the first taxonomy stacked
    let names: Vec<String> = payload
        .weighted
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    let genai = names.iter().position(|n| n == "daioe_genai").unwrap();
    let allapps = names.iter().position(|n| n == "daioe_allapps").unwrap();
    assert!(genai < allapps);
}

#[test]
fn test_combine_without_outputs_is_no_data() {
    let err = PipelinePayload::combine(&PipelineResults::default()).unwrap_err();
    assert!(matches!(err, Error::NoData(_)));
}

#[test]
fn test_load_is_memoized_until_forced() {
    let pipeline = MemoizedPipeline::new(source(), config());

    let first = pipeline.load(false).unwrap();
    let second = pipeline.load(false).unwrap();
    assert!(Arc::ptr_eq(&first, &second));

    let forced = pipeline.load(true).unwrap();
    assert!(!Arc::ptr_eq(&first, &forced));
    assert_eq!(first.weighted, forced.weighted);
    assert_eq!(first.simple, forced.simple);
}

#[test]
fn test_clear_drops_the_memoized_payload() {
    let pipeline = MemoizedPipeline::new(source(), config());
    let first = pipeline.load(false).unwrap();

    pipeline.clear();
    let after_clear = pipeline.load(false).unwrap();
    assert!(!Arc::ptr_eq(&first, &after_clear));
    assert_eq!(first.weighted, after_clear.weighted);

    let again = pipeline.load(false).unwrap();
    assert!(Arc::ptr_eq(&after_clear, &again));
}

#[test]
fn test_store_serves_later_pipelines() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutputStore::new(dir.path());

    let computed = MemoizedPipeline::new(source(), config())
        .with_store(store.clone())
        .load(false)
        .unwrap();
    assert!(dir.path().join("daioe_weighted_v1.parquet").exists());
    assert!(dir.path().join("manifest_v1.json").exists());

    // an empty source would fail, so this payload must come from disk
    let cached = MemoizedPipeline::new(MemorySource::new(), config())
        .with_store(store.clone())
        .load(false)
        .unwrap();
    assert_eq!(cached.weighted.num_rows(), computed.weighted.num_rows());
    assert_eq!(
        f64_values(&cached.weighted, "pct_rank_genai"),
        f64_values(&computed.weighted, "pct_rank_genai")
    );
    assert_eq!(cached.employment_years, computed.employment_years);

    let forced = MemoizedPipeline::new(MemorySource::new(), config())
        .with_store(store)
        .load(true);
    assert!(matches!(forced, Err(Error::NoData(_))));
}
