use test_case::test_case;

use crate::error::Error;
use crate::seeds::*;
use crate::test::helpers::mask_excluding;

const IS_CHANNELHEAD: u32 = 1 << 3;
const IS_THINCHANNEL: u32 = 1 << 5;

#[test]
fn test_all_false_mask_selects_every_cell_once() {
    let shape = GridShape::new(4, 4);
    let mask = vec![false; 16];
    let query = SeedQuery::builder().shape(shape).mask(&mask).build().unwrap();

    let seeds = select_seeds(&query).unwrap();
    assert_eq!(seeds.len(), 16);
    let expected: Vec<[i32; 2]> = (0..4).flat_map(|r| (0..4).map(move |c| [r, c])).collect();
    assert_eq!(seeds, expected);
}

#[test]
fn test_pad_is_subtracted_from_both_coordinates() {
    let shape = GridShape::new(3, 3);
    let mask = mask_excluding(shape, &[(0, 0), (0, 1), (0, 2), (1, 0), (1, 2), (2, 0), (2, 1), (2, 2)]);
    let query = SeedQuery::builder().shape(shape).mask(&mask).pad(1).build().unwrap();

    assert_eq!(select_seeds(&query).unwrap(), vec![[0, 0]]);
}

#[test]
fn test_column_major_emits_column_by_column() {
    let shape = GridShape::new(2, 3);
    let mask = vec![false; 6];
    let query = SeedQuery::builder().shape(shape).order(ScanOrder::ColumnMajor).mask(&mask).build().unwrap();

    assert_eq!(select_seeds(&query).unwrap(), vec![[0, 0], [1, 0], [0, 1], [1, 1], [0, 2], [1, 2]]);
}

#[test]
fn test_flag_only_selects_flagged_cells() {
    let shape = GridShape::new(2, 2);
    let mapping = [0, IS_CHANNELHEAD, IS_CHANNELHEAD | IS_THINCHANNEL, IS_THINCHANNEL];
    let query = SeedQuery::builder().shape(shape).mapping((&mapping[..], FlagTest::Set(IS_CHANNELHEAD))).build().unwrap();

    assert_eq!(select_seeds(&query).unwrap(), vec![[0, 1], [1, 0]]);
}

#[test]
fn test_combined_requires_mask_false_and_flag() {
    let shape = GridShape::new(2, 2);
    let mask = [false, true, false, false];
    let mapping = [IS_CHANNELHEAD, IS_CHANNELHEAD, 0, IS_CHANNELHEAD];
    let query = SeedQuery::builder()
        .shape(shape)
        .mask(&mask)
        .mapping((&mapping[..], FlagTest::Set(IS_CHANNELHEAD)))
        .build()
        .unwrap();

    assert_eq!(select_seeds(&query).unwrap(), vec![[0, 0], [1, 1]]);
}

#[test]
fn test_unset_flag_selects_cells_lacking_it() {
    let shape = GridShape::new(1, 3);
    let mask = [false; 3];
    let mapping = [IS_THINCHANNEL, 0, IS_CHANNELHEAD];
    let query = SeedQuery::builder()
        .shape(shape)
        .mask(&mask)
        .mapping((&mapping[..], FlagTest::Unset(IS_THINCHANNEL)))
        .build()
        .unwrap();

    assert_eq!(select_seeds(&query).unwrap(), vec![[0, 1], [0, 2]]);
}

#[test_case(FlagTest::Set(0b01), 0b11, true)]
#[test_case(FlagTest::Set(0b01), 0b10, false)]
#[test_case(FlagTest::Unset(0b01), 0b10, true)]
#[test_case(FlagTest::Unset(0b01), 0b01, false)]
#[test_case(FlagTest::Unset(0b11), 0b01, true; "any clear bit of a multi-bit flag")]
fn test_flag_test_polarity(test: FlagTest, value: u32, expected: bool) {
    assert_eq!(test.holds(value), expected);
}

#[test]
fn test_fully_masked_grid_is_empty() {
    let mask = vec![true; 9];
    let query = SeedQuery::builder().shape(GridShape::new(3, 3)).mask(&mask).build().unwrap();

    let err = select_seeds(&query).unwrap_err();
    assert!(matches!(err, Error::EmptyWorkDomain));
}

#[test]
fn test_query_without_predicate_is_rejected() {
    let err = SeedQuery::builder().shape(GridShape::new(2, 2)).build().unwrap_err();
    assert!(matches!(err, Error::NoPredicate));
}

#[test]
fn test_mask_length_must_match_grid() {
    let mask = vec![false; 5];
    let err = SeedQuery::builder().shape(GridShape::new(2, 3)).mask(&mask).build().unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { array: "mask", expected: 6, actual: 5 }));
}

#[test]
fn test_mapping_length_must_match_grid() {
    let mask = vec![false; 6];
    let mapping = vec![0u32; 7];
    let err = SeedQuery::builder()
        .shape(GridShape::new(2, 3))
        .mask(&mask)
        .mapping((&mapping[..], FlagTest::Set(1)))
        .build()
        .unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { array: "mapping", .. }));
}

#[test]
fn test_ten_seeds_pad_to_sixteen() {
    let coords: Vec<[i32; 2]> = (0..10).map(|i| [i, 0]).collect();
    let options = SeedOptions::builder().granularity(8).build().unwrap();
    let domain = WorkDomain::build(coords.clone(), &options).unwrap();

    assert_eq!(domain.len(), 16);
    assert_eq!(domain.n_seeds(), 10);
    assert_eq!(domain.padding(), 6);
    assert_eq!(domain.seeds(), &coords[..]);
    assert!(domain.coords()[10..].iter().all(|c| *c == [0, 0]));
}

#[test]
fn test_exact_multiple_needs_no_padding() {
    let coords: Vec<[i32; 2]> = (0..16).map(|i| [0, i]).collect();
    let domain = WorkDomain::build(coords, &SeedOptions::builder().granularity(8).build().unwrap()).unwrap();
    assert_eq!(domain.len(), 16);
    assert_eq!(domain.padding(), 0);
}

#[test]
fn test_truncation_applies_after_shuffle() {
    let coords: Vec<[i32; 2]> = (0..50).map(|i| [i, i]).collect();
    let options = SeedOptions::builder().shuffle_seed(7).max_count(5).build().unwrap();

    let a = WorkDomain::build(coords.clone(), &options).unwrap();
    let b = WorkDomain::build(coords.clone(), &options).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.n_seeds(), 5);
    assert!(a.seeds().iter().all(|c| coords.contains(c)));
}

#[test]
fn test_different_shuffle_seeds_differ() {
    let coords: Vec<[i32; 2]> = (0..64).map(|i| [i, 0]).collect();
    let a = WorkDomain::build(coords.clone(), &SeedOptions::builder().shuffle_seed(1).build().unwrap()).unwrap();
    let b = WorkDomain::build(coords, &SeedOptions::builder().shuffle_seed(2).build().unwrap()).unwrap();
    assert_ne!(a.seeds(), b.seeds());
}

#[test]
fn test_truncation_to_zero_is_empty() {
    let options = SeedOptions::builder().max_count(0).build().unwrap();
    let err = WorkDomain::build(vec![[0, 0]], &options).unwrap_err();
    assert!(matches!(err, Error::EmptyWorkDomain));
}

#[test]
fn test_zero_granularity_is_rejected() {
    let err = SeedOptions::builder().granularity(0).build().unwrap_err();
    assert!(matches!(err, Error::InvalidGranularity { granularity: 0 }));
}

#[test]
fn test_seed_points_are_float_pairs_including_padding() {
    let domain = WorkDomain::build(vec![[3, -1]], &SeedOptions::builder().granularity(2).build().unwrap()).unwrap();
    assert_eq!(domain.seed_points(), vec![[3.0, -1.0], [0.0, 0.0]]);
}

#[test]
fn test_large_grid_scan_keeps_row_major_order() {
    let shape = GridShape::new(300, 300);
    let mask: Vec<bool> = (0..shape.len()).map(|i| i % 7 != 0).collect();
    let query = SeedQuery::builder().shape(shape).mask(&mask).build().unwrap();

    let seeds = select_seeds(&query).unwrap();
    let expected: Vec<[i32; 2]> =
        (0..shape.len()).filter(|i| i % 7 == 0).map(|i| [(i / 300) as i32, (i % 300) as i32]).collect();
    assert_eq!(seeds, expected);
}
