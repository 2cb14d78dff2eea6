//! Human-readable sizes, rates and durations.

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Formats a byte count with two decimals in base 1024 (`"0 B"` for zero).
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_file_size(bytes: u64) -> String {
    scaled(bytes as f64)
}

/// Formats a transfer rate as `<size>/s`.
#[must_use]
pub fn format_speed(bytes_per_second: f64) -> String {
    format!("{}/s", scaled(bytes_per_second))
}

/// Estimated time to transfer `remaining_bytes` at `speed` bytes per second.
///
/// Returns `--` when the speed is not positive.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn format_remaining_time(remaining_bytes: u64, speed: f64) -> String {
    if speed <= 0.0 || !speed.is_finite() {
        return "--".to_string();
    }
    let seconds = (remaining_bytes as f64 / speed).ceil() as u64;
    if seconds < 60 {
        return format!("{seconds}s");
    }
    let minutes = seconds / 60;
    if minutes < 60 {
        return format!("{minutes}m {}s", seconds % 60);
    }
    format!("{}h {}m", minutes / 60, minutes % 60)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn scaled(value: f64) -> String {
    if value <= 0.0 || !value.is_finite() {
        return "0 B".to_string();
    }
    let exponent = (value.ln() / 1024_f64.ln()).floor().clamp(0.0, (UNITS.len() - 1) as f64) as usize;
    let divisor = 1024_f64.powi(exponent as i32);
    format!("{:.2} {}", value / divisor, UNITS[exponent])
}
