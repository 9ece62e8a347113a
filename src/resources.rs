//! Kubernetes resource quantities as they appear in step requests and in the
//! generated manifest. Parsing only serves validation; nothing is enforced.

use anyhow::{Result, bail};

use crate::pipeline::Resources;

const BINARY_SUFFIXES: [(&str, u64); 6] = [
    ("Ki", 1 << 10),
    ("Mi", 1 << 20),
    ("Gi", 1 << 30),
    ("Ti", 1 << 40),
    ("Pi", 1 << 50),
    ("Ei", 1 << 60),
];

const DECIMAL_SUFFIXES: [(&str, u64); 6] = [
    ("k", 1_000),
    ("M", 1_000_000),
    ("G", 1_000_000_000),
    ("T", 1_000_000_000_000),
    ("P", 1_000_000_000_000_000),
    ("E", 1_000_000_000_000_000_000),
];

/// Parses a CPU quantity (`"1"`, `"0.5"`, `"250m"`) into millicores.
pub fn parse_cpu_millis(value: &str) -> Result<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("CPU quantity cannot be empty");
    }

    if let Some(millis) = trimmed.strip_suffix('m') {
        return millis
            .parse::<u64>()
            .map_err(|_| anyhow::anyhow!("Invalid CPU quantity '{value}'"));
    }

    let cores: f64 = trimmed
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid CPU quantity '{value}'"))?;
    if !cores.is_finite() || cores < 0.0 {
        bail!("Invalid CPU quantity '{value}'");
    }
    Ok((cores * 1_000.0).round() as u64)
}

/// Parses a memory quantity (`"1Gi"`, `"512Mi"`, `"1G"`, `"1048576"`) into bytes.
pub fn parse_memory_bytes(value: &str) -> Result<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        bail!("Memory quantity cannot be empty");
    }

    let (number, multiplier) = BINARY_SUFFIXES
        .iter()
        .chain(DECIMAL_SUFFIXES.iter())
        .find_map(|(suffix, multiplier)| {
            trimmed
                .strip_suffix(suffix)
                .map(|number| (number, *multiplier))
        })
        .unwrap_or((trimmed, 1));

    let amount: f64 = number
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid memory quantity '{value}'"))?;
    if !amount.is_finite() || amount < 0.0 {
        bail!("Invalid memory quantity '{value}'");
    }
    Ok((amount * multiplier as f64).round() as u64)
}

/// Checks both quantities of `resources`, returning one message per problem.
pub fn check_resources(label: &str, resources: &Resources) -> Vec<String> {
    let mut problems = Vec::new();
    if let Err(err) = parse_cpu_millis(&resources.cpu) {
        problems.push(format!("{label}: {err}"));
    }
    if let Err(err) = parse_memory_bytes(&resources.memory) {
        problems.push(format!("{label}: {err}"));
    }
    problems
}

/// Reports where `requests` asks for more than `limits` allows.
pub fn check_requests_within_limits(requests: &Resources, limits: &Resources) -> Vec<String> {
    let mut problems = Vec::new();
    if let (Ok(request), Ok(limit)) = (
        parse_cpu_millis(&requests.cpu),
        parse_cpu_millis(&limits.cpu),
    ) && request > limit
    {
        problems.push(format!(
            "CPU request '{}' exceeds limit '{}'",
            requests.cpu, limits.cpu
        ));
    }
    if let (Ok(request), Ok(limit)) = (
        parse_memory_bytes(&requests.memory),
        parse_memory_bytes(&limits.memory),
    ) && request > limit
    {
        problems.push(format!(
            "Memory request '{}' exceeds limit '{}'",
            requests.memory, limits.memory
        ));
    }
    problems
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_quantities() {
        assert_eq!(parse_cpu_millis("1").unwrap(), 1_000);
        assert_eq!(parse_cpu_millis("0.5").unwrap(), 500);
        assert_eq!(parse_cpu_millis("250m").unwrap(), 250);
        assert!(parse_cpu_millis("one").is_err());
        assert!(parse_cpu_millis("").is_err());
    }

    #[test]
    fn memory_quantities() {
        assert_eq!(parse_memory_bytes("1Gi").unwrap(), 1 << 30);
        assert_eq!(parse_memory_bytes("512Mi").unwrap(), 512 << 20);
        assert_eq!(parse_memory_bytes("1G").unwrap(), 1_000_000_000);
        assert_eq!(parse_memory_bytes("2048").unwrap(), 2048);
        assert!(parse_memory_bytes("1Gb").is_err());
    }

    #[test]
    fn requests_above_limits_are_reported() {
        let requests = Resources {
            cpu: "2".into(),
            memory: "2Gi".into(),
        };
        let limits = Resources::default();
        assert_eq!(check_requests_within_limits(&requests, &limits).len(), 2);
        assert!(check_requests_within_limits(&limits, &requests).is_empty());
    }
}
