//! Write/read round trips through the writer, the framer and the reader.

use blobdb_log::{BlobLogReader, BlobLogWriter, LogEntry, LogError, ReaderState, ValueRange};
use blobdb_storage::{FileBackend, StorageBackend};
use blobdb_testkit::prelude::*;
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn fragmentation_is_invisible_to_readers(
        config in config_strategy(),
        records in record_batch_strategy(24, 600),
        seal in any::<bool>(),
    ) {
        let log = TestLog::build(&config, &records, seal);
        let mut reader = log.reader().unwrap();
        prop_assert_eq!(reader.is_sealed(), seal);

        let mut read = Vec::new();
        for entry in reader.by_ref() {
            match entry.unwrap() {
                LogEntry::Record(r) => read.push(r),
                LogEntry::Corruption(event) => {
                    return Err(TestCaseError::fail(format!("unexpected corruption {event}")));
                }
            }
        }
        prop_assert_eq!(reader.state(), ReaderState::Done);
        prop_assert_eq!(read.len(), records.len());
        for ((got, want), location) in read.iter().zip(&records).zip(log.locations()) {
            prop_assert_eq!(&got.record, want);
            prop_assert_eq!(got.location, *location);
        }
    }

    #[test]
    fn footer_matches_records(
        config in config_strategy(),
        records in record_batch_strategy(16, 64),
    ) {
        let log = TestLog::build(&config, &records, true);
        let reader = log.reader().unwrap();
        let footer = *reader.footer().unwrap();

        prop_assert_eq!(footer.record_count(), records.len() as u64);
        let ttls: Vec<u64> = records.iter().filter_map(|r| r.ttl).collect();
        let expected_ttl = ttls
            .iter()
            .copied()
            .min()
            .zip(ttls.iter().copied().max())
            .map(|(low, high)| ValueRange::new(low, high));
        prop_assert_eq!(footer.ttl(), expected_ttl);

        if let (Some(first), Some(last)) = (records.first(), records.last()) {
            prop_assert_eq!(
                footer.sequence_range(),
                (first.sequence.as_u64(), last.sequence.as_u64())
            );
        }
    }
}

#[test]
fn file_round_trip_survives_reopen() {
    let file = TestFile::new("000001.blob");
    let config = LogConfig::default().block_size(512);
    let records: Vec<_> = numbered_records(40, 700)
        .into_iter()
        .enumerate()
        .map(|(i, r)| {
            if i % 3 == 0 {
                r.with_ttl(10_000 + i as u64)
            } else {
                r.with_timestamp(1_700_000_000 + i as u64)
            }
        })
        .collect();
    let locations = file.write(&config, &records, true);

    let backend = file.open_read_only();
    let report = BlobLogReader::open(&backend, &config)
        .and_then(BlobLogReader::recover)
        .unwrap();
    assert!(report.is_clean());
    let read: Vec<_> = report.records.iter().map(|r| r.record.clone()).collect();
    assert_eq!(read, records);
    let read_locations: Vec<_> = report.records.iter().map(|r| r.location).collect();
    assert_eq!(read_locations, locations);

    let reader = BlobLogReader::open(&backend, &config).unwrap();
    let footer = reader.footer().unwrap();
    assert_eq!(footer.record_count(), 40);
    assert_eq!(footer.ttl(), Some(ValueRange::new(10_000, 10_039)));
    assert_eq!(
        footer.timestamp(),
        Some(ValueRange::new(1_700_000_001, 1_700_000_038))
    );
    assert_eq!(footer.sequence_range(), (1, 40));
}

#[test]
fn existing_file_is_not_reopened_for_writing() {
    let file = TestFile::new("000002.blob");
    file.write(&LogConfig::default(), &numbered_records(1, 10), false);

    let backend = FileBackend::open(file.path()).unwrap();
    assert!(matches!(
        BlobLogWriter::open(Box::new(backend), LogConfig::default()),
        Err(LogError::StreamNotEmpty { .. })
    ));
}

#[test]
fn empty_sealed_file() {
    let log = TestLog::build(&LogConfig::default(), &[], true);
    assert_eq!(log.len(), 44 + 64);

    let reader = log.reader().unwrap();
    let footer = *reader.footer().unwrap();
    assert_eq!(footer.record_count(), 0);
    assert_eq!(footer.ttl(), None);
    assert_eq!(footer.timestamp(), None);
    assert_eq!(reader.count(), 0);
}

#[test]
fn unsealed_file_read_to_the_end() {
    let records = numbered_records(7, 2_000);
    let log = TestLog::build(&LogConfig::default().block_size(1024), &records, false);
    let read = read_records(&log);
    assert_eq!(read, records);

    let backend_size = log.backend().size().unwrap();
    assert_eq!(backend_size, log.len());
}

fn read_records(log: &TestLog) -> Vec<BlobRecord> {
    log.recover()
        .unwrap()
        .records
        .into_iter()
        .map(|r| r.record)
        .collect()
}
