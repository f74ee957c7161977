/// Estimates transfer speed in kbit/s from a byte count and elapsed ticks.
///
/// Ticks are one second each. A transfer that finishes inside its first
/// tick is treated as having taken one tick.
pub fn throughput_kbps(bytes: u64, elapsed_ticks: u32) -> u32 {
    let ticks = u64::from(elapsed_ticks.max(1));
    let kbps = bytes.saturating_mul(8) / (1024 * ticks);
    u32::try_from(kbps).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_kbps() {
        assert_eq!(throughput_kbps(900, 5), 1);
        assert_eq!(throughput_kbps(128 * 1024, 1), 1024);
        assert_eq!(throughput_kbps(1023, 8), 0);
    }

    #[test]
    fn zero_ticks_counts_as_one() {
        assert_eq!(throughput_kbps(4096, 0), throughput_kbps(4096, 1));
        assert_eq!(throughput_kbps(0, 0), 0);
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        assert_eq!(throughput_kbps(u64::MAX, 1), u32::MAX);
    }
}
