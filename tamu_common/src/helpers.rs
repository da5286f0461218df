use std::net::IpAddr;

/// Parse a boolean flag from a string value, or return the given default value otherwise.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let value = match value {
        Some(v) => v,
        None => return default,
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Parse a comma-separated list of IP addresses.
///
/// Returns `None` if the list is explicitly disabled ("none", "false", "0") or empty. Invalid entries are returned in
/// the second element so that the caller can decide how loudly to complain about them.
pub fn parse_ip_list(value: &str) -> (Option<Vec<IpAddr>>, Vec<String>) {
    let trimmed = value.trim();
    if trimmed.is_empty() || ["none", "false", "0"].contains(&trimmed.to_ascii_lowercase().as_str()) {
        return (None, Vec::new());
    }
    let mut invalid = Vec::new();
    let addrs = trimmed
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| match s.parse::<IpAddr>() {
            Ok(ip) => Some(ip),
            Err(_) => {
                invalid.push(s.to_string());
                None
            },
        })
        .collect::<Vec<IpAddr>>();
    (Some(addrs), invalid)
}
