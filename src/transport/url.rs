use std::collections::BTreeMap;

use url::Url;

use super::RequestError;

/// Join a base url and a (possibly relative) url with a single `/`.
pub fn merge_url(base: Option<&str>, url: &str) -> String {
    match base.filter(|b| !b.is_empty()) {
        None => url.to_owned(),
        Some(base) if url.is_empty() => base.to_owned(),
        Some(base) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            url.trim_start_matches('/')
        ),
    }
}

/// Substitute `{name}` and `:name` placeholders in one pass over `url`.
///
/// Substituted values are never scanned again. `:name` only matches a whole token,
/// so `:id` does not touch `:identity`, and the scheme separator or a port number is
/// left alone unless a parameter is literally named like it. Unknown placeholders
/// stay as they are.
pub fn substitute(url: &str, params: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(url.len());
    let mut rest = url;

    while let Some(at) = rest.find(|c: char| c == '{' || c == ':') {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];

        let matched = if tail.starts_with('{') {
            braced(tail, params)
        } else {
            colon(tail, params)
        };

        match matched {
            Some((consumed, value)) => {
                out.push_str(value);
                rest = &tail[consumed..];
            }
            None => {
                out.push_str(&tail[..1]);
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

/// `{name}` at the start of `tail`: bytes consumed and the value.
fn braced<'a>(tail: &str, params: &'a BTreeMap<String, String>) -> Option<(usize, &'a str)> {
    let close = tail.find('}')?;
    let value = params.get(&tail[1..close])?;
    Some((close + 1, value.as_str()))
}

/// `:name` at the start of `tail`, the longest parameter name ending on a token boundary.
fn colon<'a>(tail: &str, params: &'a BTreeMap<String, String>) -> Option<(usize, &'a str)> {
    let name = &tail[1..];

    params
        .iter()
        .filter(|(key, _)| !key.is_empty() && name.starts_with(key.as_str()))
        .filter(|(key, _)| {
            name[key.len()..]
                .chars()
                .next()
                .map_or(true, |c| !(c.is_alphanumeric() || c == '_'))
        })
        .max_by_key(|(key, _)| key.len())
        .map(|(key, value)| (key.len() + 1, value.as_str()))
}

/// The url a request is actually sent to.
///
/// Base and url are merged, placeholders substituted, the result validated as an
/// absolute url and its trailing `/` trimmed.
pub fn effective_url(
    base: Option<&str>,
    url: &str,
    params: &BTreeMap<String, String>,
) -> Result<String, RequestError> {
    let merged = merge_url(base, url);
    if merged.is_empty() {
        return Err(RequestError::MissingUrl);
    }

    let replaced = substitute(&merged, params);
    let parsed = Url::parse(&replaced).map_err(|e| RequestError::InvalidUrl {
        url: replaced.clone(),
        reason: e.to_string(),
    })?;

    Ok(parsed.as_str().trim_end_matches('/').to_owned())
}
