//! Chronological keys in the same format Firebase generates for `push()`.
//!
//! 8 characters of millisecond timestamp followed by 12 random characters,
//! drawn from an alphabet that is already in ASCII order so keys sort by
//! creation time. Keys minted in the same millisecond bump the random tail by
//! one instead of re-rolling it.

use std::sync::Mutex;

use rand::Rng;

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

const TIME_LEN: usize = 8;
const RAND_LEN: usize = 12;

pub struct PushIdGenerator {
    state: Mutex<PushState>,
}

struct PushState {
    last_time: i64,
    last_rand: [u8; RAND_LEN],
}

impl PushIdGenerator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PushState {
                last_time: i64::MIN,
                last_rand: [0; RAND_LEN],
            }),
        }
    }

    pub fn next(&self) -> String {
        self.next_at(chrono::Utc::now().timestamp_millis())
    }

    pub fn next_at(&self, now_ms: i64) -> String {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        if now_ms == state.last_time {
            // Carry through the tail; wraps only after 64^12 ids in one millisecond.
            for digit in state.last_rand.iter_mut().rev() {
                if *digit == 63 {
                    *digit = 0;
                } else {
                    *digit += 1;
                    break;
                }
            }
        } else {
            state.last_time = now_ms;
            let mut rng = rand::rng();
            for digit in state.last_rand.iter_mut() {
                *digit = rng.random_range(0..64);
            }
        }

        let mut id = [0u8; TIME_LEN + RAND_LEN];
        let mut time = now_ms.max(0) as u64;
        for slot in id[..TIME_LEN].iter_mut().rev() {
            *slot = PUSH_CHARS[(time % 64) as usize];
            time /= 64;
        }
        for (slot, digit) in id[TIME_LEN..].iter_mut().zip(state.last_rand.iter()) {
            *slot = PUSH_CHARS[*digit as usize];
        }

        id.iter().map(|&b| b as char).collect()
    }
}

impl Default for PushIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
