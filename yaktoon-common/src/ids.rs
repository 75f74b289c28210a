//! Id generation
//!
//! Ids embed their creation time in milliseconds so lists can be ordered by id alone.

use rand::Rng;
use uuid::Uuid;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Random lowercase base36 string of `len` characters
pub fn random_base36(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect()
}

/// New user id: `user_{ms}_{9 chars}`
pub fn user_id() -> String {
    format!("user_{}_{}", crate::time::now_millis(), random_base36(9))
}

/// New analysis session id: `medsky_{ms}_{13 chars}`
pub fn medsky_session_id() -> String {
    format!("medsky_{}_{}", crate::time::now_millis(), random_base36(13))
}

/// New UUIDv4 as a string
pub fn uuid() -> String {
    Uuid::new_v4().to_string()
}

/// Creation time embedded in a `medsky_{ms}_{rand}` session id
pub fn session_timestamp(session_id: &str) -> Option<i64> {
    let mut parts = session_id.split('_');
    if parts.next()? != "medsky" {
        return None;
    }
    parts.next()?.parse().ok()
}
