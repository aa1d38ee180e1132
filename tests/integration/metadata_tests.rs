//! Metadata ingestion tests.
//!
//! DICOM JSON documents go in, a pyramid index with the expected tile
//! mapping comes out.

use serde_json::json;
use wsi_dicom_reader::{
    load_series_metadata, parse_series_metadata, MetadataError, PyramidIndex, TilingMode,
};

use super::test_utils::{full_instance_json, series_document, sparse_instance_json};

/// Level 0 as a two-part TILED_FULL concatenation, level 1 as TILED_SPARSE.
fn mixed_document() -> Vec<u8> {
    series_document(vec![
        sparse_instance_json("1.2.3.9", (512, 384), (256, 256), &[(2, 2), (1, 1)]),
        full_instance_json("1.2.3.5", (1024, 768), (256, 256), 7, Some(5)),
        full_instance_json("1.2.3.4", (1024, 768), (256, 256), 5, Some(0)),
    ])
}

#[test]
fn test_parse_mixed_series() {
    let instances = parse_series_metadata(&mixed_document()).unwrap();
    assert_eq!(instances.len(), 3);

    let sparse = &instances[0];
    assert_eq!(sparse.tiling_mode, TilingMode::Sparse);
    assert_eq!(sparse.number_of_frames, 2);
    assert_eq!(sparse.per_frame_tile_coordinates, vec![(2, 2), (1, 1)]);

    let second_part = &instances[1];
    assert_eq!(second_part.tiling_mode, TilingMode::Full);
    assert_eq!(second_part.study_uid, "1.2");
    assert_eq!(second_part.series_uid, "1.2.3");
    assert_eq!(second_part.number_of_frames, 7);
    assert_eq!(second_part.frame_offset(), 5);
}

#[test]
fn test_parsed_series_builds_pyramid() {
    let instances = parse_series_metadata(&mixed_document()).unwrap();
    let pyramid = PyramidIndex::open(&instances).unwrap();

    assert_eq!(pyramid.level_count(), 2);
    assert_eq!(pyramid.downsamples(), &[1.0, 2.0]);
    assert_eq!(pyramid.series_uid(), "1.2.3");

    // Frames 1-5 come from the first part, the rest from the second
    let frame = |x, y, level| {
        let f = pyramid.get_frame(x, y, level).unwrap();
        (f.instance_uid().to_string(), f.frame_index())
    };
    assert_eq!(frame(1, 1, 0), ("1.2.3.4".to_string(), 1));
    assert_eq!(frame(1, 2, 0), ("1.2.3.4".to_string(), 5));
    assert_eq!(frame(2, 2, 0), ("1.2.3.5".to_string(), 1));
    assert_eq!(frame(4, 3, 0), ("1.2.3.5".to_string(), 7));
    assert!(pyramid.level(0).unwrap().is_complete());

    assert_eq!(frame(2, 2, 1), ("1.2.3.9".to_string(), 1));
    assert_eq!(frame(1, 1, 1), ("1.2.3.9".to_string(), 2));
    assert!(pyramid.get_frame(2, 1, 1).is_none());
}

#[test]
fn test_sparse_plane_positions() {
    // Positions are 1-based pixel offsets of each frame's top-left corner
    let mut instance = sparse_instance_json("1.2.3.9", (512, 512), (256, 256), &[]);
    instance["52009230"] = json!({"vr": "SQ", "Value": [
        {"0048021A": {"vr": "SQ", "Value": [{
            "0048021E": {"vr": "SL", "Value": [257]},
            "0048021F": {"vr": "SL", "Value": [1]}
        }]}},
        {"0048021A": {"vr": "SQ", "Value": [{
            "0048021E": {"vr": "SL", "Value": [1]},
            "0048021F": {"vr": "SL", "Value": [257]}
        }]}}
    ]});
    instance["00280008"] = json!({"vr": "IS", "Value": ["2"]});

    let instances = parse_series_metadata(&series_document(vec![instance])).unwrap();
    assert_eq!(instances[0].per_frame_tile_coordinates, vec![(2, 1), (1, 2)]);
}

#[test]
fn test_missing_required_tag() {
    let mut instance = full_instance_json("1.2.3.4", (1024, 768), (256, 256), 12, None);
    instance.as_object_mut().unwrap().remove("00480006");

    let err = parse_series_metadata(&series_document(vec![instance])).unwrap_err();
    assert!(matches!(
        err,
        MetadataError::MissingTag {
            tag: "00480006",
            ..
        }
    ));
}

#[test]
fn test_document_must_be_an_array() {
    let err = parse_series_metadata(br#"{"0020000D": {}}"#).unwrap_err();
    assert!(matches!(err, MetadataError::Json(_)));

    let err = parse_series_metadata(b"not json").unwrap_err();
    assert!(matches!(err, MetadataError::Json(_)));
}

#[tokio::test]
async fn test_load_series_metadata_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("series.json");
    std::fs::write(&path, mixed_document()).unwrap();

    let instances = load_series_metadata(&path).await.unwrap();
    assert_eq!(instances.len(), 3);

    let err = load_series_metadata(dir.path().join("absent.json"))
        .await
        .unwrap_err();
    assert!(matches!(err, MetadataError::Io(_)));
}
