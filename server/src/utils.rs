use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Upper bound for a measured round-trip time, in milliseconds
pub const MAX_ROUND_TRIP_MS: u32 = 1_000;

// Get current timestamp in milliseconds
pub fn get_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

// Round-trip time of a ping echoed back by a client, None for a timestamp from the future
pub fn round_trip_ms(sent: u64, now: u64) -> Option<u32> {
    let elapsed = now.checked_sub(sent)?;
    Some(elapsed.min(MAX_ROUND_TRIP_MS as u64) as u32)
}
