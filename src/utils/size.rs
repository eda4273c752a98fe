const UNITS: [&str; 7] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

pub const KIB: u64 = 1024;
pub const MIB: u64 = 1024 * KIB;
pub const GIB: u64 = 1024 * MIB;

/// Formats a byte count with IEC units: `20 B`, `1.5 KiB`, `25 MiB`.
/// One decimal is kept below 10 units, none above.
pub fn human_bytes(bytes: u64) -> String {
    if bytes < 10 {
        return format!("{bytes} B");
    }
    let exp = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let mut exp = exp.min(UNITS.len() - 1);
    let mut value = bytes as f64 / 1024f64.powi(exp as i32);
    value = (value * 10.0 + 0.5).floor() / 10.0;
    // 1023.96 KiB rounds to 1024.0 and belongs to the next unit
    if value >= 1024.0 && exp < UNITS.len() - 1 {
        exp += 1;
        value /= 1024.0;
    }
    if value < 10.0 {
        format!("{value:.1} {}", UNITS[exp])
    } else {
        format!("{value:.0} {}", UNITS[exp])
    }
}
