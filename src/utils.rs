//! Formatting and colour helpers shared by the overlay

use tiny_skia::Color;

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Convert [u8; 4] RGBA array to tiny_skia Color
#[inline]
pub fn color_from_rgba(rgba: [u8; 4]) -> Color {
    Color::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3])
}

/// Format a byte rate with a binary unit suffix and two decimals.
///
/// `1023.0` is `"1023.00 B/S"`, `1024.0` is `"1.00 KB/S"`, `1048576.0` is
/// `"1.00 MB/S"`. Negative or non-finite input is shown as zero.
pub fn format_rate(bytes_per_sec: f64) -> String {
    let rate = if bytes_per_sec.is_finite() && bytes_per_sec > 0.0 {
        bytes_per_sec
    } else {
        0.0
    };

    if rate >= MIB {
        format!("{:.2} MB/S", rate / MIB)
    } else if rate >= KIB {
        format!("{:.2} KB/S", rate / KIB)
    } else {
        format!("{:.2} B/S", rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Split "12.34 KB/S" into (12.34, bytes per unit)
    fn parse(formatted: &str) -> (f64, f64) {
        let (number, unit) = formatted.split_once(' ').expect("value and unit");
        let scale = match unit {
            "B/S" => 1.0,
            "KB/S" => KIB,
            "MB/S" => MIB,
            other => panic!("unexpected unit {other}"),
        };
        (number.parse().expect("numeric part"), scale)
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(format_rate(0.0), "0.00 B/S");
        assert_eq!(format_rate(1023.0), "1023.00 B/S");
        assert_eq!(format_rate(1024.0), "1.00 KB/S");
        assert_eq!(format_rate(1_048_575.0), "1024.00 KB/S");
        assert_eq!(format_rate(1_048_576.0), "1.00 MB/S");
    }

    #[test]
    fn test_typical_rates() {
        assert_eq!(format_rate(512.0), "512.00 B/S");
        assert_eq!(format_rate(2048.0), "2.00 KB/S");
        assert_eq!(format_rate(1536.0), "1.50 KB/S");
        assert_eq!(format_rate(5.0 * MIB), "5.00 MB/S");
    }

    #[test]
    fn test_invalid_input_renders_zero() {
        assert_eq!(format_rate(-1.0), "0.00 B/S");
        assert_eq!(format_rate(f64::NAN), "0.00 B/S");
        assert_eq!(format_rate(f64::INFINITY), "0.00 B/S");
    }

    #[test]
    fn test_huge_values_stay_in_mb_band() {
        let formatted = format_rate(1.0e15);
        assert!(formatted.ends_with(" MB/S"), "{formatted}");
    }

    #[test]
    fn test_parsed_value_recovers_input() {
        let mut b = 0.0;
        while b < 64.0 * MIB {
            let formatted = format_rate(b);
            let (shown, scale) = parse(&formatted);

            let expected_scale = if b >= MIB {
                MIB
            } else if b >= KIB {
                KIB
            } else {
                1.0
            };
            assert_eq!(scale, expected_scale, "wrong band for {b}: {formatted}");
            assert!(
                (shown - b / scale).abs() <= 0.005 + 1e-9,
                "{b} rendered as {formatted}"
            );

            b = b * 1.37 + 7.0;
        }
    }
}
