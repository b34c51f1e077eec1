//! Key pagination shared by the bundled stores.
//!
//! Pages follow object-store listing semantics: keys come back in
//! lexicographic order, at most `max_keys` entries per page, and a truncated
//! page carries an opaque continuation token that resumes after its last entry.
//! With a delimiter, keys sharing a "folder" roll up into one common prefix,
//! which counts as a single entry.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{Error, Result};
use crate::storage::engine::{ListObjectsOptions, Listing, PageInfo};

/// Page size when the caller doesn't ask for one.
pub const DEFAULT_MAX_KEYS: usize = 100;

/// Upper bound on a single page.
pub const MAX_PAGE_SIZE: usize = 1000;

pub fn encode_token(last_entry: &str) -> String {
    URL_SAFE_NO_PAD.encode(last_entry.as_bytes())
}

pub fn decode_token(token: &str) -> Result<String> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|_| Error::InvalidArgument(format!("Invalid continuation token '{}'", token)))?;
    String::from_utf8(bytes)
        .map_err(|_| Error::InvalidArgument(format!("Invalid continuation token '{}'", token)))
}

/// Clamps a requested page size into `1..=MAX_PAGE_SIZE`.
pub fn effective_max_keys(requested: Option<usize>, default: usize) -> usize {
    requested.unwrap_or(default).clamp(1, MAX_PAGE_SIZE)
}

/// Cuts one page out of an ordered key set.
///
/// `keys` must be sorted ascending. Keys outside `prefix` are ignored.
pub fn list_page<'a, I>(
    keys: I,
    prefix: &str,
    options: &ListObjectsOptions,
    default_max_keys: usize,
) -> Result<Listing>
where
    I: IntoIterator<Item = &'a String>,
{
    let max_keys = effective_max_keys(options.max_keys, default_max_keys);
    let start_after = options
        .continuation_token
        .as_deref()
        .map(decode_token)
        .transpose()?;
    let delimiter = options.delimiter.as_deref().filter(|d| !d.is_empty());

    let mut listing = Listing::default();
    let mut last_entry: Option<String> = None;
    let mut truncated = false;

    for key in keys {
        if !key.starts_with(prefix) {
            continue;
        }
        if let Some(after) = &start_after {
            let resumed_folder =
                delimiter.is_some_and(|d| after.ends_with(d)) && key.starts_with(after.as_str());
            if key.as_str() <= after.as_str() || resumed_folder {
                continue;
            }
        }

        let common = delimiter.and_then(|d| {
            key[prefix.len()..]
                .find(d)
                .map(|idx| key[..prefix.len() + idx + d.len()].to_string())
        });

        if let Some(common) = &common {
            if listing.common_prefixes.last() == Some(common) {
                continue;
            }
        }

        if listing.keys.len() + listing.common_prefixes.len() == max_keys {
            truncated = true;
            break;
        }

        match common {
            Some(common) => {
                last_entry = Some(common.clone());
                listing.common_prefixes.push(common);
            }
            None => {
                last_entry = Some(key.clone());
                listing.keys.push(key.clone());
            }
        }
    }

    listing.page = PageInfo {
        is_truncated: truncated,
        key_count: listing.keys.len() + listing.common_prefixes.len(),
        max_keys: Some(max_keys),
        next_continuation_token: if truncated {
            last_entry.as_deref().map(encode_token)
        } else {
            None
        },
    };
    Ok(listing)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(items: &[&str]) -> Vec<String> {
        let mut keys: Vec<String> = items.iter().map(|k| k.to_string()).collect();
        keys.sort();
        keys
    }

    #[test]
    fn test_token_roundtrip() {
        let token = encode_token("test/db/col/42");
        assert_eq!(decode_token(&token).unwrap(), "test/db/col/42");
        assert!(decode_token("!!not base64!!").is_err());
    }

    #[test]
    fn test_pages_resume_after_last_key() -> Result<()> {
        let all = keys(&["p/1", "p/2", "p/3", "p/4", "p/5", "q/1"]);
        let mut options = ListObjectsOptions {
            max_keys: Some(2),
            ..Default::default()
        };

        let mut seen = Vec::new();
        loop {
            let page = list_page(&all, "p/", &options, DEFAULT_MAX_KEYS)?;
            seen.extend(page.keys.clone());
            if !page.page.is_truncated {
                assert!(page.page.next_continuation_token.is_none());
                break;
            }
            assert_eq!(page.page.key_count, 2);
            options.continuation_token = page.page.next_continuation_token;
        }
        assert_eq!(seen, vec!["p/1", "p/2", "p/3", "p/4", "p/5"]);
        Ok(())
    }

    #[test]
    fn test_exact_fit_is_not_truncated() -> Result<()> {
        let all = keys(&["p/1", "p/2"]);
        let options = ListObjectsOptions {
            max_keys: Some(2),
            ..Default::default()
        };
        let page = list_page(&all, "p/", &options, DEFAULT_MAX_KEYS)?;
        assert!(!page.page.is_truncated);
        assert_eq!(page.page.max_keys, Some(2));
        Ok(())
    }

    #[test]
    fn test_delimiter_rolls_up_folders() -> Result<()> {
        let all = keys(&["i/db1/a/1", "i/db1/a/2", "i/db1/b/1", "i/db2/c/1", "i/loose"]);
        let options = ListObjectsOptions {
            delimiter: Some("/".to_string()),
            ..Default::default()
        };
        let page = list_page(&all, "i/", &options, DEFAULT_MAX_KEYS)?;
        assert_eq!(page.common_prefixes, vec!["i/db1/", "i/db2/"]);
        assert_eq!(page.keys, vec!["i/loose"]);
        assert_eq!(page.page.key_count, 3);
        Ok(())
    }

    #[test]
    fn test_delimiter_pagination_skips_resumed_folder() -> Result<()> {
        let all = keys(&["i/a/1", "i/a/2", "i/b/1", "i/c/1"]);
        let mut options = ListObjectsOptions {
            delimiter: Some("/".to_string()),
            max_keys: Some(1),
            continuation_token: None,
        };

        let mut folders = Vec::new();
        loop {
            let page = list_page(&all, "i/", &options, DEFAULT_MAX_KEYS)?;
            folders.extend(page.common_prefixes.clone());
            if !page.page.is_truncated {
                break;
            }
            options.continuation_token = page.page.next_continuation_token;
        }
        assert_eq!(folders, vec!["i/a/", "i/b/", "i/c/"]);
        Ok(())
    }

    #[test]
    fn test_max_keys_is_clamped() {
        assert_eq!(effective_max_keys(Some(0), 100), 1);
        assert_eq!(effective_max_keys(Some(5000), 100), MAX_PAGE_SIZE);
        assert_eq!(effective_max_keys(None, 100), 100);
    }
}
