use sluice_codegen::{Direction, JobType};
use sluice_device::AccessMode;
use sluice_schedule::{GridShape, WorkDomain, SeedOptions, select_seeds};
use test_case::test_case;

use crate::jobs::{BUILTIN_JOBS, builtin, catalog};
use crate::test::fixtures::{NXY_PADDED, record};
use crate::{ArgRole, Error, JobSpec, KernelSignature, NamedArray, SeedRule};

#[test]
fn test_catalog_lists_every_builtin() {
    let jobs = catalog();
    let names: Vec<&str> = jobs.iter().map(|j| j.name.as_str()).collect();
    assert_eq!(names, BUILTIN_JOBS);
    for job in &jobs {
        assert_eq!(job.kernel_name, job.name);
        assert_eq!(job.job_type, JobType::Integration);
        assert_eq!(job.direction, Direction::Downstream);
        assert_eq!(job.signature.args()[0].role, ArgRole::Seeds);
        assert_eq!(job.fragments[0], "essentials.cl");
    }
    assert!(builtin("estimate_density").is_none());
}

#[test_case("map_channel_heads", SeedRule::MaskOnly, 4)]
#[test_case("prune_channel_heads", SeedRule::FlagSet("is_channelhead".into()), 4)]
#[test_case("count_downchannels", SeedRule::FlagSet("is_channelhead".into()), 6)]
#[test_case("flag_downchannels", SeedRule::FlagSet("is_channelhead".into()), 6)]
#[test_case("link_hillslopes", SeedRule::FlagUnset("is_thinchannel".into()), 6)]
#[test_case("label_confluences", SeedRule::FlagSet("is_thinchannel".into()), 7)]
fn test_builtin_layout(name: &str, seeds: SeedRule, n_args: usize) {
    let job = builtin(name).unwrap();
    assert_eq!(job.seeds, seeds);
    assert_eq!(job.signature.len(), n_args);
    assert!(job.signature.has_grid_args());

    let writable: Vec<&str> =
        job.signature.args().iter().filter(|a| a.access.is_writable()).map(|a| a.name.as_str()).collect();
    let expected: &[&str] = if n_args == 4 { &["mapping"] } else { &["mapping", "count", "link"] };
    assert_eq!(writable, expected);
}

#[test]
fn test_custom_job_defaults() {
    let job = JobSpec::builder()
        .name("estimate_density")
        .kernel_name("histogram_univariate")
        .job_type(JobType::Kde)
        .fragments(vec!["kde.cl".to_string()])
        .signature(KernelSignature::new().host("data", AccessMode::ReadOnly).host("histogram", AccessMode::ReadWrite))
        .build();

    assert_eq!(job.kernel_name, "histogram_univariate");
    assert_eq!(job.seeds, SeedRule::MaskOnly);
    assert!(!job.signature.has_grid_args());
    assert_eq!(job.signature.host_args().count(), 2);

    let up = job.with_direction(Direction::Upstream);
    assert_eq!(up.direction, Direction::Upstream);
}

#[test]
fn test_source_without_directory_lists_fragments() {
    let job = builtin("label_confluences").unwrap();
    let source = job.source(None).unwrap();
    assert_eq!(source.name, "label_confluences");
    assert_eq!(source.fragment_names().collect::<Vec<_>>(), ["essentials.cl", "trajectoryfns.cl", "label.cl"]);
}

#[test]
fn test_source_reads_fragments_from_directory() {
    let dir = tempfile::tempdir().unwrap();
    for name in ["essentials.cl", "trajectoryfns.cl", "label.cl"] {
        std::fs::write(dir.path().join(name), format!("// {name}\n")).unwrap();
    }

    let source = builtin("label_confluences").unwrap().source(Some(dir.path())).unwrap();
    let rendered = source.render();
    let first = rendered.find("// essentials.cl").unwrap();
    let last = rendered.find("// label.cl").unwrap();
    assert!(first < last);
}

#[test]
fn test_source_with_missing_fragment() {
    let dir = tempfile::tempdir().unwrap();
    let err = builtin("map_channel_heads").unwrap().source(Some(dir.path())).unwrap_err();
    assert!(matches!(err, Error::Codegen { .. }), "{err}");
}

fn channel_head_arrays<'a>(mask: &'a [bool], uv: &'a [[f32; 2]], mapping: &'a mut [u32]) -> Vec<NamedArray<'a>> {
    vec![NamedArray::read_only("mask", mask), NamedArray::read_only("uv", uv), NamedArray::read_write("mapping", mapping)]
}

#[test]
fn test_signature_accepts_matching_arrays() {
    let job = builtin("map_channel_heads").unwrap();
    let (mask, uv, mut mapping) = (vec![false; NXY_PADDED], vec![[0.0f32; 2]; NXY_PADDED], vec![0u32; NXY_PADDED]);
    let arrays = channel_head_arrays(&mask, &uv, &mut mapping);

    job.signature.check(&job.kernel_name, &arrays).unwrap();
    job.signature.check_grid(&arrays, NXY_PADDED).unwrap();
}

#[test]
fn test_signature_rejects_wrong_count() {
    let job = builtin("count_downchannels").unwrap();
    let (mask, uv, mut mapping) = (vec![false; 4], vec![[0.0f32; 2]; 4], vec![0u32; 4]);
    let arrays = channel_head_arrays(&mask, &uv, &mut mapping);

    let err = job.signature.check(&job.kernel_name, &arrays).unwrap_err();
    assert!(matches!(err, Error::ArgumentMismatch { ref kernel, .. } if kernel == "count_downchannels"), "{err}");
}

#[test]
fn test_signature_rejects_wrong_order() {
    let job = builtin("map_channel_heads").unwrap();
    let (mask, uv, mut mapping) = (vec![false; 4], vec![[0.0f32; 2]; 4], vec![0u32; 4]);
    let arrays =
        vec![NamedArray::read_only("uv", &uv), NamedArray::read_only("mask", &mask), NamedArray::read_write("mapping", &mut mapping)];

    let err = job.signature.check(&job.kernel_name, &arrays).unwrap_err();
    assert!(err.to_string().contains("kernel expects `mask`"), "{err}");
}

#[test]
fn test_signature_rejects_wrong_access() {
    let job = builtin("map_channel_heads").unwrap();
    let (mask, uv, mapping) = (vec![false; 4], vec![[0.0f32; 2]; 4], vec![0u32; 4]);
    let arrays =
        vec![NamedArray::read_only("mask", &mask), NamedArray::read_only("uv", &uv), NamedArray::read_only("mapping", &mapping)];

    let err = job.signature.check(&job.kernel_name, &arrays).unwrap_err();
    assert!(matches!(err, Error::ArgumentMismatch { .. }), "{err}");
}

#[test]
fn test_grid_size_mismatch() {
    let job = builtin("map_channel_heads").unwrap();
    let (mask, uv, mut mapping) = (vec![false; NXY_PADDED], vec![[0.0f32; 2]; NXY_PADDED - 1], vec![0u32; NXY_PADDED]);
    let arrays = channel_head_arrays(&mask, &uv, &mut mapping);

    let err = job.signature.check_grid(&arrays, NXY_PADDED).unwrap_err();
    match err {
        Error::GridSizeMismatch { name, expected, actual } => {
            assert_eq!((name.as_str(), expected, actual), ("uv", NXY_PADDED, NXY_PADDED - 1))
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_seed_rules_resolve_flag_bits() {
    let record = record(8, 2);
    let channelhead = record.uint32("is_channelhead").unwrap();
    let thinchannel = record.uint32("is_thinchannel").unwrap();

    assert_eq!(SeedRule::MaskOnly.flag_test(&record).unwrap(), None);
    assert_eq!(
        SeedRule::FlagSet("is_channelhead".into()).flag_test(&record).unwrap(),
        Some(sluice_schedule::FlagTest::Set(channelhead))
    );
    assert_eq!(
        SeedRule::FlagUnset("is_thinchannel".into()).flag_test(&record).unwrap(),
        Some(sluice_schedule::FlagTest::Unset(thinchannel))
    );

    let err = SeedRule::FlagSet("is_nothing".into()).flag_test(&record).unwrap_err();
    assert!(matches!(err, Error::MissingParameter { ref field } if field == "is_nothing"), "{err}");
}

#[test]
fn test_seed_query_applies_flag_rule() {
    let record = record(8, 2);
    let channelhead = record.uint32("is_channelhead").unwrap();
    let shape = GridShape::new(2, 3);
    let mask = [false, false, true, false, false, false];
    let mapping = [channelhead, 0, channelhead, 0, channelhead | 1, 0];

    let prune = builtin("prune_channel_heads").unwrap();
    let query = prune.seed_query(&record, shape, &mask, &mapping, 0).unwrap();
    assert_eq!(select_seeds(&query).unwrap(), [[0, 0], [1, 1]]);

    let map = builtin("map_channel_heads").unwrap();
    let query = map.seed_query(&record, shape, &mask, &mapping, 0).unwrap();
    let domain = WorkDomain::select(&query, &SeedOptions::default()).unwrap();
    assert_eq!(domain.n_seeds(), 5);
}

#[test]
fn test_seed_query_with_nothing_selected() {
    let record = record(8, 2);
    let shape = GridShape::new(2, 2);
    let mask = [false; 4];
    let mapping = [0u32; 4];

    let query = builtin("count_downchannels").unwrap().seed_query(&record, shape, &mask, &mapping, 0).unwrap();
    let err: Error = select_seeds(&query).unwrap_err().into();
    assert!(err.is_no_work());
}
