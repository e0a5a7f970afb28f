//! Human-readable byte sizes for command-line flags

/// Parse `1048576`, `512K`, `8MiB`, `5MB`, `1g` and similar.
///
/// Bare letters and `*iB` suffixes are powers of 1024; `KB`, `MB` and `GB`
/// are powers of 1000.
pub fn parse_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, suffix) = trimmed.split_at(split);

    if digits.is_empty() {
        return Err(format!("'{}' does not start with a number", input));
    }
    let value: u64 = digits
        .parse()
        .map_err(|e| format!("invalid size '{}': {}", input, e))?;

    let multiplier: u64 = match suffix.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kib" => 1 << 10,
        "m" | "mib" => 1 << 20,
        "g" | "gib" => 1 << 30,
        "kb" => 1_000,
        "mb" => 1_000_000,
        "gb" => 1_000_000_000,
        other => return Err(format!("unknown size suffix '{}' in '{}'", other, input)),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size '{}' is too large", input))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_bytes() {
        assert_eq!(parse_size("1048576"), Ok(1_048_576));
        assert_eq!(parse_size("0"), Ok(0));
        assert_eq!(parse_size(" 42b "), Ok(42));
    }

    #[test]
    fn test_binary_suffixes() {
        assert_eq!(parse_size("5MiB"), Ok(5 << 20));
        assert_eq!(parse_size("8M"), Ok(8 << 20));
        assert_eq!(parse_size("512k"), Ok(512 << 10));
        assert_eq!(parse_size("1G"), Ok(1 << 30));
    }

    #[test]
    fn test_decimal_suffixes() {
        assert_eq!(parse_size("5MB"), Ok(5_000_000));
        assert_eq!(parse_size("2 kb"), Ok(2_000));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse_size("").is_err());
        assert!(parse_size("MiB").is_err());
        assert!(parse_size("5 parsecs").is_err());
        assert!(parse_size("1.5M").is_err());
        assert!(parse_size("99999999999999999999G").is_err());
        assert!(parse_size("18446744073709551615G").is_err());
    }
}
