//! Anonymous ballot submitter ids.

use rand::distributions::Alphanumeric;
use rand::Rng;

pub const SUBMITTER_ID_LEN: usize = 10;

/// Fresh random id over `[A-Za-z0-9]`. Collisions are tolerated.
pub fn submitter_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUBMITTER_ID_LEN)
        .map(char::from)
        .collect()
}
