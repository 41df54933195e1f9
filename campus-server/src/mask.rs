use lazy_static::lazy_static;
use regex::Regex;

/// Mask refresh token suitable for use in logs.
pub fn token(value: &str) -> String {
    const DEFAULT_MASK: &str = "************";
    if value.len() < 4 {
        DEFAULT_MASK.to_string()
    } else {
        format!("{}{}", &value[0..4], DEFAULT_MASK)
    }
}

/// Mask email address suitable for use in logs.
pub fn email(address: &str) -> String {
    const DEFAULT_MASK: &str = "****@******";

    lazy_static! {
        static ref EMAIL_MASK_REGEX: Regex = Regex::new(r"^([^@]*)@(.+)$").unwrap();
    }

    if let Some(captures) = EMAIL_MASK_REGEX.captures(address) {
        match (captures.get(1), captures.get(2)) {
            (Some(address), Some(host)) => {
                let address = address.as_str();
                let host = host.as_str();
                let address = if !address.is_empty() {
                    &address[0..1]
                } else {
                    ""
                };
                let host = if host.len() > 2 {
                    &host[(host.len() - 2)..(host.len())]
                } else {
                    ""
                };
                format!("{}{}{}", address, DEFAULT_MASK, host)
            }
            _ => DEFAULT_MASK.to_string(),
        }
    } else {
        DEFAULT_MASK.to_string()
    }
}
