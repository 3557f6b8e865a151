// Utility functions for admin API

mod pagination;

pub use pagination::{Page, PageParams, Paginated, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

use chrono::{DateTime, SecondsFormat, Utc};

/// Format datetime for API responses
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Mask email address, keeping the first two characters of the local part
pub fn mask_email(email: &str) -> String {
    if let Some(at_pos) = email.find('@') {
        let local = &email[..at_pos];
        let domain = &email[at_pos..];

        let Some((cut, _)) = local.char_indices().nth(2) else {
            return email.to_string();
        };

        format!("{}***{}", &local[..cut], domain)
    } else {
        email.to_string()
    }
}
