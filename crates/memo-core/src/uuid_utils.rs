//! UUIDv7 helpers.
//!
//! Every row id is a UUIDv7, so ids sort by creation time. Backdated
//! entries get an id stamped with their supplied `created_at`.

use chrono::{DateTime, TimeZone, Utc};
use uuid::{NoContext, Timestamp, Uuid};

/// Generate a new UUIDv7 for the current instant.
#[inline]
pub fn new_v7() -> Uuid {
    Uuid::now_v7()
}

/// Generate a UUIDv7 whose timestamp bits carry `ts`.
///
/// Timestamps before the Unix epoch clamp to the epoch.
pub fn new_v7_at(ts: &DateTime<Utc>) -> Uuid {
    let secs = ts.timestamp().max(0) as u64;
    let nanos = if ts.timestamp() < 0 {
        0
    } else {
        ts.timestamp_subsec_nanos()
    };
    Uuid::new_v7(Timestamp::from_unix(NoContext, secs, nanos))
}

/// Extract the millisecond timestamp from a UUIDv7.
///
/// Returns `None` if the UUID is not version 7.
pub fn extract_timestamp(uuid: &Uuid) -> Option<DateTime<Utc>> {
    let bytes = uuid.as_bytes();
    if (bytes[6] >> 4) != 7 {
        return None;
    }

    let millis = ((bytes[0] as u64) << 40)
        | ((bytes[1] as u64) << 32)
        | ((bytes[2] as u64) << 24)
        | ((bytes[3] as u64) << 16)
        | ((bytes[4] as u64) << 8)
        | (bytes[5] as u64);

    Utc.timestamp_millis_opt(millis as i64).single()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_v7_is_version_7() {
        assert_eq!(new_v7().get_version_num(), 7);
    }

    #[test]
    fn test_new_v7_ordering() {
        let a = new_v7();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let b = new_v7();
        assert!(a < b);
    }

    #[test]
    fn test_new_v7_at_embeds_timestamp() {
        let ts = Utc::now() - Duration::days(12);
        let id = new_v7_at(&ts);
        let extracted = extract_timestamp(&id).unwrap();
        assert_eq!(extracted.timestamp_millis(), ts.timestamp_millis());
    }

    #[test]
    fn test_backdated_id_sorts_before_now() {
        let old = new_v7_at(&(Utc::now() - Duration::days(3)));
        assert!(old < new_v7());
    }

    #[test]
    fn test_extract_timestamp_rejects_v4() {
        assert!(extract_timestamp(&Uuid::new_v4()).is_none());
    }
}
