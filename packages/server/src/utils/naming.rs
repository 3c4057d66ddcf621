//! Derived identifiers: slugs and execution queue names.

/// Longest slug stem derived from free text.
pub const SLUG_MAX_LEN: usize = 180;
/// Longest phase slug.
pub const PHASE_SLUG_MAX_LEN: usize = 198;
/// Longest title prefix used in a queue name.
const QUEUE_TITLE_MAX_LEN: usize = 50;
/// Longest queue name.
pub const QUEUE_NAME_MAX_LEN: usize = 80;

/// Lowercase `text` and collapse every run of non-word characters into `-`.
///
/// Word characters are letters, digits and `_`. Leading and trailing dashes
/// are dropped and the result is cut to `max_len` characters.
pub fn slugify(text: &str, max_len: usize) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_dash = false;

    for c in text.chars().flat_map(char::to_lowercase) {
        if c.is_alphanumeric() || c == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c);
        } else {
            pending_dash = true;
        }
    }

    truncate_chars(&slug, max_len).trim_end_matches('-').to_string()
}

/// `{slugified title}-{id}`.
pub fn challenge_slug(title: &str, id: i32) -> String {
    format!("{}-{}", slugify(title, SLUG_MAX_LEN), id)
}

/// `{first word of title}-{codename}-{challenge id}`, lowercased, spaces in
/// the codename replaced by `-`, cut to 198 characters.
pub fn phase_slug(challenge_title: &str, codename: &str, challenge_id: i32) -> String {
    let first_word = challenge_title.split(' ').next().unwrap_or_default();
    let slug = format!(
        "{}-{}-{}",
        first_word.to_lowercase(),
        codename.replace(' ', "-").to_lowercase(),
        challenge_id
    );
    truncate_chars(&slug, PHASE_SLUG_MAX_LEN).to_string()
}

/// Name of the queue the evaluation worker listens on for this challenge.
///
/// Unique per call: a random suffix follows the title and environment.
pub fn queue_name(title: &str, environment: &str) -> String {
    let name = format!(
        "{}-{}-{}",
        slugify(title, QUEUE_TITLE_MAX_LEN),
        environment,
        uuid::Uuid::new_v4().simple()
    );
    truncate_chars(&name, QUEUE_NAME_MAX_LEN).to_string()
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
