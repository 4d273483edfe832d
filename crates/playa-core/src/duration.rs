//! Duration strings as shown next to items and episodes.

/// Format seconds as `H:MM:SS`, or `MM:SS` under an hour.
pub fn seconds_to_time_str(total: u64) -> String {
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours >= 1 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_under_an_hour() {
        assert_eq!(seconds_to_time_str(0), "00:00");
        assert_eq!(seconds_to_time_str(307), "05:07");
        assert_eq!(seconds_to_time_str(3599), "59:59");
    }

    #[test]
    fn test_hours_are_not_padded() {
        assert_eq!(seconds_to_time_str(3600), "1:00:00");
        assert_eq!(seconds_to_time_str(3723), "1:02:03");
        assert_eq!(seconds_to_time_str(36_000), "10:00:00");
    }
}
