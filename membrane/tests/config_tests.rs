// Copyright (c) 2024 Contributors to the membrane project
//
// This program and the accompanying materials are made available under the
// terms of the Apache Software License 2.0 which is available at
// https://www.apache.org/licenses/LICENSE-2.0, or the MIT license
// which is available at https://opensource.org/licenses/MIT.
//
// SPDX-License-Identifier: Apache-2.0 OR MIT

use membrane::config::{
    ConfigCreationError, DataSegmentConfig, MemPoolConfig, SegmentConfig,
};
use membrane_testing::assert_that;

const VALID_CONFIG: &str = r#"
[[segment]]
reader_group = "sensors"
writer_group = "fusion"

[[segment.mempool]]
size = 128
chunk_count = 10000

[[segment.mempool]]
size = 16384
chunk_count = 1000
"#;

#[test]
fn a_valid_toml_config_is_parsed() {
    let sut = SegmentConfig::from_toml_str(VALID_CONFIG).unwrap();

    assert_that!(sut.segment, len 1);
    let segment = &sut.segment[0];
    assert_that!(segment.reader_group.as_str(), eq "sensors");
    assert_that!(segment.writer_group.as_str(), eq "fusion");
    assert_that!(segment.data.mempool, len 2);
    assert_that!(
        segment.data.mempool[0],
        eq MemPoolConfig { size: 128, chunk_count: 10000 }
    );
}

#[test]
fn garbage_is_rejected() {
    let result = SegmentConfig::from_toml_str("definitely not toml = [");
    assert_that!(result, is_err);
    assert_that!(
        result.err().unwrap(),
        eq ConfigCreationError::UnableToDeserializeContents
    );
}

#[test]
fn a_missing_file_is_reported() {
    let result = SegmentConfig::from_file("/nonexistent/membrane.toml");
    assert_that!(result, is_err);
    assert_that!(
        result.err().unwrap(),
        eq ConfigCreationError::FailedToReadConfigFileContents
    );
}

#[test]
fn unordered_size_classes_fail_validation() {
    let sut = DataSegmentConfig {
        mempool: vec![
            MemPoolConfig {
                size: 1024,
                chunk_count: 10,
            },
            MemPoolConfig {
                size: 128,
                chunk_count: 10,
            },
        ],
    };

    let result = sut.validate();
    assert_that!(result, is_err);
    assert_that!(result.err().unwrap(), eq ConfigCreationError::InvalidMemPoolConfig);
}

#[test]
fn a_zero_chunk_count_fails_validation() {
    let sut = DataSegmentConfig {
        mempool: vec![MemPoolConfig {
            size: 128,
            chunk_count: 0,
        }],
    };

    assert_that!(sut.validate(), is_err);
}

#[test]
fn an_empty_mempool_table_fails_validation() {
    let sut = DataSegmentConfig { mempool: vec![] };
    assert_that!(sut.validate(), is_err);
}

#[test]
fn the_default_config_is_valid() {
    assert_that!(DataSegmentConfig::default().validate(), is_ok);
}

#[test]
fn a_config_survives_a_serialization_round_trip() {
    let sut = SegmentConfig::from_toml_str(VALID_CONFIG).unwrap();

    let serialized = toml::to_string(&sut).unwrap();
    let restored = SegmentConfig::from_toml_str(&serialized).unwrap();
    assert_that!(restored, eq sut);
}
