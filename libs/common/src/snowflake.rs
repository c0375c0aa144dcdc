use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Custom epoch: 2024-01-01T00:00:00Z in milliseconds since Unix epoch.
const CREWBOARD_EPOCH_MS: u64 = 1_704_067_200_000;

const WORKER_BITS: u64 = 10;
const SEQUENCE_BITS: u64 = 12;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// 64-bit time-ordered ID generator for tasks and chat messages.
///
/// Layout (MSB → LSB): 42-bit millisecond timestamp since the Crewboard
/// epoch, 10-bit worker ID, 12-bit per-millisecond sequence.
pub struct SnowflakeGenerator {
    worker_id: u64,
    state: Mutex<(u64, u64)>, // (last_ms, sequence)
}

impl SnowflakeGenerator {
    pub fn new(worker_id: u16) -> Self {
        assert!(
            (worker_id as u64) < (1 << WORKER_BITS),
            "worker_id must fit in {WORKER_BITS} bits"
        );
        Self {
            worker_id: worker_id as u64,
            state: Mutex::new((0, 0)),
        }
    }

    pub fn generate(&self) -> i64 {
        let mut state = self.state.lock().unwrap();
        let (ref mut last_ms, ref mut sequence) = *state;

        let mut now_ms = current_ms();
        if now_ms < *last_ms {
            panic!("clock moved backwards: last_ms={last_ms}, now_ms={now_ms}");
        }

        if now_ms == *last_ms {
            *sequence = (*sequence + 1) & SEQUENCE_MASK;
            if *sequence == 0 {
                // Sequence exhausted for this millisecond — spin-wait.
                while now_ms == *last_ms {
                    now_ms = current_ms();
                }
            }
        } else {
            *sequence = 0;
        }

        *last_ms = now_ms;

        let ts = now_ms - CREWBOARD_EPOCH_MS;
        ((ts << (WORKER_BITS + SEQUENCE_BITS)) | (self.worker_id << SEQUENCE_BITS) | *sequence)
            as i64
    }
}

fn current_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before Unix epoch")
        .as_millis() as u64
}

/// Extract the creation timestamp (ms since Unix epoch) from a generated ID.
pub fn timestamp_ms(id: i64) -> u64 {
    ((id as u64) >> (WORKER_BITS + SEQUENCE_BITS)) + CREWBOARD_EPOCH_MS
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generates_unique_ids() {
        let gen = SnowflakeGenerator::new(0);
        let mut ids = HashSet::new();
        for _ in 0..10_000 {
            let id = gen.generate();
            assert!(ids.insert(id), "duplicate snowflake: {id}");
        }
    }

    #[test]
    fn ids_are_monotonically_increasing() {
        let gen = SnowflakeGenerator::new(0);
        let mut prev = 0i64;
        for _ in 0..1_000 {
            let id = gen.generate();
            assert!(id > prev, "not monotonic: {prev} >= {id}");
            prev = id;
        }
    }

    #[test]
    fn timestamp_extraction_round_trips() {
        let gen = SnowflakeGenerator::new(0);
        let before = current_ms();
        let id = gen.generate();
        let after = current_ms();

        let extracted = timestamp_ms(id);
        assert!(extracted >= before && extracted <= after);
    }
}
