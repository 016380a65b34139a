use crate::{
    CUSTOM_EPOCH, Error, SnowflakeClassicId, SnowflakeGenerator, SnowflakeId, TimeSource,
    WallClock,
};
use core::cell::Cell;
use core::fmt;
use core::time::Duration;
use std::collections::HashSet;
use std::thread::scope;

#[derive(Clone)]
struct MockTime {
    millis: u64,
}

impl TimeSource for MockTime {
    fn current_millis(&self) -> u64 {
        self.millis
    }
}

/// Replays a scripted series of clock readings, one per `current_millis`
/// call; the final reading repeats forever.
///
/// Every `next_id` call consumes exactly one reading, plus one reading per
/// busy-wait poll, which makes sequence exhaustion and clock regression
/// reproducible in a single thread.
struct MockScriptTime {
    readings: Vec<u64>,
    index: Cell<usize>,
}

impl MockScriptTime {
    fn new(readings: &[u64]) -> Self {
        Self {
            readings: readings.to_vec(),
            index: Cell::new(0),
        }
    }
}

impl TimeSource for MockScriptTime {
    fn current_millis(&self) -> u64 {
        let i = self.index.get();
        if i + 1 < self.readings.len() {
            self.index.set(i + 1);
        }
        self.readings[i]
    }
}

/// A toy layout with a 2-bit sequence (capacity 4) so rollover tests don't
/// need 4096 allocations per millisecond.
///
/// 52-bit timestamp, 5-bit datacenter ID, 5-bit worker ID, 2-bit sequence.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct SnowflakeToyId {
    id: u64,
}

impl SnowflakeId for SnowflakeToyId {
    fn timestamp(&self) -> u64 {
        (self.id >> 12) & ((1 << 52) - 1)
    }

    fn max_timestamp() -> u64 {
        (1 << 52) - 1
    }

    fn datacenter_id(&self) -> u64 {
        (self.id >> 7) & 0x1f
    }

    fn max_datacenter_id() -> u64 {
        0x1f
    }

    fn worker_id(&self) -> u64 {
        (self.id >> 2) & 0x1f
    }

    fn max_worker_id() -> u64 {
        0x1f
    }

    fn sequence(&self) -> u64 {
        self.id & 0b11
    }

    fn max_sequence() -> u64 {
        0b11
    }

    fn from_components(
        timestamp: u64,
        datacenter_id: u64,
        worker_id: u64,
        sequence: u64,
    ) -> Self {
        Self {
            id: (timestamp << 12) | (datacenter_id << 7) | (worker_id << 2) | sequence,
        }
    }

    fn to_raw(&self) -> u64 {
        self.id
    }

    fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }
}

impl fmt::Display for SnowflakeToyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for SnowflakeToyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SnowflakeToyId({})", self.id)
    }
}

fn classic_at(millis: u64) -> SnowflakeGenerator<SnowflakeClassicId, MockTime> {
    SnowflakeGenerator::new(1, 2, Duration::ZERO, MockTime { millis }).unwrap()
}

#[test]
fn construction_accepts_the_full_id_range() {
    for (dc, worker) in [(0, 0), (0, 31), (31, 0), (31, 31)] {
        let generator = SnowflakeGenerator::<SnowflakeClassicId, _>::new(
            dc,
            worker,
            CUSTOM_EPOCH,
            MockTime { millis: 0 },
        )
        .unwrap();
        assert_eq!(generator.datacenter_id(), dc);
        assert_eq!(generator.worker_id(), worker);
        assert_eq!(generator.epoch(), CUSTOM_EPOCH);
    }
}

#[test]
fn construction_rejects_out_of_range_datacenter_id() {
    let err = SnowflakeGenerator::<SnowflakeClassicId, _>::new(
        32,
        0,
        CUSTOM_EPOCH,
        MockTime { millis: 0 },
    )
    .unwrap_err();
    assert_eq!(
        err,
        Error::InvalidDatacenterId {
            datacenter_id: 32,
            max: 31
        }
    );
}

#[test]
fn construction_rejects_out_of_range_worker_id() {
    let err = SnowflakeGenerator::<SnowflakeClassicId, _>::new(
        0,
        32,
        CUSTOM_EPOCH,
        MockTime { millis: 0 },
    )
    .unwrap_err();
    assert_eq!(
        err,
        Error::InvalidWorkerId {
            worker_id: 32,
            max: 31
        }
    );
}

#[test]
fn sequence_increments_within_the_same_millisecond() {
    let generator = classic_at(42);

    let id1 = generator.next_id().unwrap();
    let id2 = generator.next_id().unwrap();
    let id3 = generator.next_id().unwrap();

    assert_eq!(id1.timestamp(), 42);
    assert_eq!(id2.timestamp(), 42);
    assert_eq!(id3.timestamp(), 42);
    assert_eq!(id1.sequence(), 0);
    assert_eq!(id2.sequence(), 1);
    assert_eq!(id3.sequence(), 2);
    assert!(id1 < id2 && id2 < id3);
}

#[test]
fn advancing_millisecond_resets_the_sequence() {
    let time = MockScriptTime::new(&[42, 42, 43]);
    let generator =
        SnowflakeGenerator::<SnowflakeClassicId, _>::new(1, 2, Duration::ZERO, time).unwrap();

    let id1 = generator.next_id().unwrap();
    let id2 = generator.next_id().unwrap();
    let id3 = generator.next_id().unwrap();

    assert_eq!((id1.timestamp(), id1.sequence()), (42, 0));
    assert_eq!((id2.timestamp(), id2.sequence()), (42, 1));
    assert_eq!((id3.timestamp(), id3.sequence()), (43, 0));
}

#[test]
fn sequence_exhaustion_spins_into_the_next_millisecond() {
    // Four allocations fill millisecond 42 in the toy layout; the fifth call
    // wraps the sequence, polls 42 once more, then lands on 43.
    let time = MockScriptTime::new(&[42, 42, 42, 42, 42, 42, 43]);
    let generator =
        SnowflakeGenerator::<SnowflakeToyId, _>::new(1, 2, Duration::ZERO, time).unwrap();

    let mut ids = Vec::new();
    for _ in 0..5 {
        ids.push(generator.next_id().unwrap());
    }

    for (i, id) in ids.iter().take(4).enumerate() {
        assert_eq!(id.timestamp(), 42);
        assert_eq!(id.sequence(), i as u64);
    }
    assert_eq!(ids[4].timestamp(), 43);
    assert_eq!(ids[4].sequence(), 0);
    assert!(ids[4].timestamp() > ids[3].timestamp());
    assert!(ids[4] > ids[3]);
}

#[test]
fn clock_regression_is_reported_with_both_timestamps() {
    let time = MockScriptTime::new(&[100, 50, 100]);
    let generator =
        SnowflakeGenerator::<SnowflakeClassicId, _>::new(1, 2, Duration::ZERO, time).unwrap();

    let id1 = generator.next_id().unwrap();
    assert_eq!((id1.timestamp(), id1.sequence()), (100, 0));

    let err = generator.next_id().unwrap_err();
    assert_eq!(err, Error::ClockMovedBackward { now: 50, last: 100 });

    // The failed call left `last_millis` untouched: the next reading of 100
    // is treated as the same millisecond, not a fresh one.
    let id2 = generator.next_id().unwrap();
    assert_eq!((id2.timestamp(), id2.sequence()), (100, 1));
}

#[test]
fn regression_is_surfaced_on_every_call_not_retried() {
    let time = MockScriptTime::new(&[100, 50, 60]);
    let generator =
        SnowflakeGenerator::<SnowflakeClassicId, _>::new(1, 2, Duration::ZERO, time).unwrap();

    generator.next_id().unwrap();
    assert_eq!(
        generator.next_id().unwrap_err(),
        Error::ClockMovedBackward { now: 50, last: 100 }
    );
    assert_eq!(
        generator.next_id().unwrap_err(),
        Error::ClockMovedBackward { now: 60, last: 100 }
    );
}

#[test]
fn generated_ids_round_trip_their_components() {
    let time = MockTime { millis: 42 };
    let generator =
        SnowflakeGenerator::<SnowflakeClassicId, _>::new(3, 7, Duration::from_millis(40), time)
            .unwrap();

    let id = generator.next_id().unwrap();
    assert_eq!(id.timestamp(), 2); // 42ms wall clock - 40ms epoch
    assert_eq!(id.datacenter_id(), 3);
    assert_eq!(id.worker_id(), 7);
    assert_eq!(id.sequence(), 0);

    // The same fields fall out of the raw integer via the documented layout.
    let raw = id.to_raw();
    assert_eq!(
        (raw >> SnowflakeClassicId::TIMESTAMP_SHIFT) & SnowflakeClassicId::TIMESTAMP_MASK,
        2
    );
    assert_eq!(
        (raw >> SnowflakeClassicId::DATACENTER_ID_SHIFT) & SnowflakeClassicId::DATACENTER_ID_MASK,
        3
    );
    assert_eq!(
        (raw >> SnowflakeClassicId::WORKER_ID_SHIFT) & SnowflakeClassicId::WORKER_ID_MASK,
        7
    );
    assert_eq!(raw & SnowflakeClassicId::SEQUENCE_MASK, 0);
}

#[test]
fn ids_are_strictly_increasing_under_a_non_decreasing_clock() {
    let time = MockScriptTime::new(&[1, 2, 2, 3, 5, 5, 5, 8]);
    let generator =
        SnowflakeGenerator::<SnowflakeClassicId, _>::new(1, 2, Duration::ZERO, time).unwrap();

    let mut last: Option<SnowflakeClassicId> = None;
    for _ in 0..8 {
        let id = generator.next_id().unwrap();
        if let Some(prev) = last {
            assert!(id.to_raw() > prev.to_raw(), "{id:?} !> {prev:?}");
        }
        last = Some(id);
    }
}

#[test]
fn concurrent_callers_never_observe_a_duplicate() {
    const THREADS: usize = 8;
    const IDS_PER_THREAD: usize = 2048;

    let generator =
        SnowflakeGenerator::<SnowflakeClassicId, _>::new(1, 2, CUSTOM_EPOCH, WallClock).unwrap();

    let mut all = HashSet::with_capacity(THREADS * IDS_PER_THREAD);
    scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let generator = &generator;
                s.spawn(move || {
                    (0..IDS_PER_THREAD)
                        .map(|_| generator.next_id().unwrap().to_raw())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            all.extend(handle.join().unwrap());
        }
    });

    assert_eq!(all.len(), THREADS * IDS_PER_THREAD);
}

#[test]
fn clones_share_allocation_state() {
    let generator = classic_at(42);
    let clone = generator.clone();

    let id1 = generator.next_id().unwrap();
    let id2 = clone.next_id().unwrap();

    assert_eq!(id1.sequence(), 0);
    assert_eq!(id2.sequence(), 1);
}
