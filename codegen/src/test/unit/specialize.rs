use test_case::test_case;

use crate::test::fixtures::{integration_record, kde_record};
use crate::*;

fn rendered(defines: &[Define]) -> Vec<String> {
    defines.iter().map(ToString::to_string).collect()
}

#[test]
fn test_integration_table_order_and_spelling() {
    let defines = specialize(&integration_record(), "count_downchannels", JobType::Integration, Direction::Downstream).unwrap();
    let mut expected = vec![
        "KERNEL_COUNT_DOWNCHANNELS",
        "N_SEED_POINTS=24u",
        "DOWNUP_SIGN=1",
        "INTEGRATOR_STEP_FACTOR=0.5f",
        "MAX_INTEGRATION_STEP_ERROR=0.03f",
        "ADJUSTED_MAX_ERROR=0.015f",
        "MAX_LENGTH=100.0f",
        "PIXEL_SIZE=1.0f",
        "INTEGRATION_HALT_THRESHOLD=0.01f",
        "PAD_WIDTH=1u",
        "PAD_WIDTH_PP5=1.5f",
        "NX=6u",
        "NY=4u",
        "NXF=6.0f",
        "NYF=4.0f",
        "NX_PADDED=8u",
        "NY_PADDED=6u",
        "NXY_PADDED=48u",
        "X_MAX=5.5f",
        "Y_MAX=3.5f",
        "GRID_SCALE=4.0f",
        "COMBO_FACTOR=2.0f",
        "DT_MAX=0.1f",
        "MAX_N_STEPS=400u",
        "TRAJECTORY_RESOLUTION=128u",
        "SEEDS_CHUNK_OFFSET=0u",
        "SUBPIXEL_SEED_POINT_DENSITY=1u",
        "SUBPIXEL_SEED_HALFSPAN=0.0f",
        "SUBPIXEL_SEED_STEP=0.0f",
        "JITTER_MAGNITUDE=0.0f",
        "INTERCHANNEL_MAX_N_STEPS=200u",
        "SEGMENTATION_THRESHOLD=50u",
        "LEFT_FLANK_ADDITION=2147483648u",
    ]
    .into_iter()
    .map(String::from)
    .collect::<Vec<_>>();
    expected.extend(ClassFlags::FIELDS.iter().enumerate().map(|(bit, name)| format!("{}={}u", name.to_uppercase(), 1u32 << bit)));

    assert_eq!(defines.len(), 49);
    assert_eq!(rendered(&defines), expected);
    assert_eq!(rendered(&defines)[33], "IS_CHANNEL=1u");
    assert_eq!(rendered(&defines)[48], "IS_BLOCKAGE=32768u");
}

#[test]
fn test_upstream_flips_sign_and_combo_factor() {
    let defines = rendered(&specialize(&integration_record(), "map", JobType::Integration, Direction::Upstream).unwrap());
    assert!(defines.contains(&"DOWNUP_SIGN=-1".to_string()));
    assert!(defines.contains(&"COMBO_FACTOR=-2.0f".to_string()));
}

#[test]
fn test_debug_flag_appends_last() {
    let record = integration_record().with("debug", true);
    let defines = specialize(&record, "map", JobType::Integration, Direction::Downstream).unwrap();
    assert_eq!(defines.len(), 50);
    assert_eq!(defines.last(), Some(&Define::flag("DEBUG")));

    let record = integration_record().with("debug", false);
    let defines = specialize(&record, "map", JobType::Integration, Direction::Downstream).unwrap();
    assert_eq!(defines.len(), 49);
}

#[test]
fn test_specialization_is_deterministic() {
    let record = integration_record();
    let a = specialize(&record, "label_confluences", JobType::Integration, Direction::Downstream).unwrap();
    let b = specialize(&record.clone(), "label_confluences", JobType::Integration, Direction::Downstream).unwrap();
    assert_eq!(a, b);
}

#[test_case("max_n_steps")]
#[test_case("nx_padded")]
#[test_case("is_blockage")]
#[test_case("n_seed_points")]
fn test_missing_field(field: &str) {
    let mut record = integration_record();
    record.remove(field);
    match specialize(&record, "map", JobType::Integration, Direction::Downstream) {
        Err(Error::MissingParameter { field: missing }) => assert_eq!(missing, field),
        other => panic!("expected MissingParameter, got {other:?}"),
    }
}

#[test]
fn test_optional_fields_default() {
    let mut record = integration_record();
    assert!(record.remove("seeds_chunk_offset").is_none());
    let params = IntegrationParams::from_record(&record).unwrap();
    assert_eq!(params.seeds_chunk_offset, 0);
    assert!(!params.debug);
}

#[test_case("dt_max", f64::NAN)]
#[test_case("max_length", f64::INFINITY)]
#[test_case("pixel_size", 1e300)]
fn test_non_finite_float_rejected(field: &str, value: f64) {
    let record = integration_record().with(field, value);
    let err = specialize(&record, "map", JobType::Integration, Direction::Downstream).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { .. }), "{err}");
}

#[test]
fn test_negative_unsigned_rejected() {
    let record = integration_record().with("max_n_steps", -5i32);
    let err = specialize(&record, "map", JobType::Integration, Direction::Downstream).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter { ref field, .. } if field == "max_n_steps"));
}

#[test]
fn test_kde_table() {
    let defines = rendered(&specialize(&kde_record(), "histogram_bivariate", JobType::Kde, Direction::Upstream).unwrap());
    assert_eq!(defines.len(), 20);
    assert_eq!(defines[0], "KERNEL_HISTOGRAM_BIVARIATE");
    assert_eq!(defines[1], "KDF_BANDWIDTH=0.25f");
    assert_eq!(defines[2], "KDF_IS_TOPHAT");
    assert_eq!(defines[3], "N_DATA=1000u");
    assert_eq!(defines[6], "X_MIN=-1.0f");
    assert_eq!(defines[19], "N_KDF_PART_POINTS_Y=6u");
    assert!(!defines.iter().any(|d| d.starts_with("DOWNUP_SIGN")));
}

#[test]
fn test_kde_ignores_integration_fields() {
    let err = specialize(&integration_record(), "pdf_univariate", JobType::Kde, Direction::Downstream).unwrap_err();
    assert!(matches!(err, Error::MissingParameter { .. }));
}

#[test_case("count downchannels")]
#[test_case("")]
#[test_case("9lives")]
fn test_bad_kernel_name(name: &str) {
    assert!(kernel_selector(name).is_err());
}

#[test]
fn test_direction_sign() {
    assert_eq!(Direction::from_sign(1).unwrap(), Direction::Downstream);
    assert_eq!(Direction::from_sign(-1).unwrap(), Direction::Upstream);
    assert!(Direction::from_sign(0).is_err());
    assert_eq!(Direction::Upstream.sign(), -1);
}
