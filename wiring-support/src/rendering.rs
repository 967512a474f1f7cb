//! Text rendering utilities for diagnostics.
//!
//! Resolution paths, type names and suggestions all end up in error
//! messages, so they are rendered the same way everywhere.

/// Separator used between entries of a resolution path.
pub const PATH_SEPARATOR: &str = " -> ";

/// Renders a resolution path as a single line.
///
/// # Examples
/// ```
/// use wiring_support::rendering::render_chain;
///
/// let chain = vec!["Foo", "Bar", "Baz", "Foo"];
/// assert_eq!(render_chain(&chain), "Foo -> Bar -> Baz -> Foo");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(PATH_SEPARATOR)
}

/// Shortens a fully qualified type name for display.
///
/// ```
/// use wiring_support::rendering::shorten_type_name;
///
/// let short = shorten_type_name("my_app::services::user::UserService");
/// assert_eq!(short, "UserService");
///
/// let short = shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>");
/// assert_eq!(short, "Arc<dyn Logger>");
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut chars = full_name.chars().peekable();
    let mut current_segment = String::new();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                current_segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                result.push_str(&current_segment);
                result.push(ch);
                current_segment.clear();
            }
            _ => current_segment.push(ch),
        }
    }

    result.push_str(&current_segment);
    result
}

/// Picks registered type names that look like the requested one.
///
/// Substring matches on the full path rank first, then substring matches on
/// the shortened name, then a shared prefix of at least three characters.
/// At most `max_suggestions` names are returned, best first, ties broken
/// alphabetically.
///
/// ```
/// use wiring_support::rendering::suggest_similar_types;
///
/// let available = ["app::UserService", "app::UserRepository", "app::Mailer"];
/// let suggestions = suggest_similar_types("app::UserServices", &available, 3);
/// assert_eq!(suggestions[0], "app::UserService");
/// ```
pub fn suggest_similar_types(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let requested_full = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let scored = available.iter().filter(|&&name| name != requested).filter_map(|&name| {
        if overlaps(&name.to_lowercase(), &requested_full) {
            return Some((name, 100));
        }
        let short = shorten_type_name(name).to_lowercase();
        if overlaps(&short, &requested_short) {
            return Some((name, 80));
        }
        prefix_score(&short, &requested_short).map(|score| (name, score))
    });
    rank(scored, max_suggestions)
}

/// Picks registered logical names that look like the requested one.
///
/// Same ranking as [`suggest_similar_types`], on the plain text.
///
/// ```
/// use wiring_support::rendering::suggest_similar_names;
///
/// let available = ["primary_db", "replica_db", "mailer"];
/// assert_eq!(suggest_similar_names("primary", &available, 3), vec!["primary_db"]);
/// ```
pub fn suggest_similar_names(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let requested_lower = requested.to_lowercase();

    let scored = available.iter().filter(|&&name| name != requested).filter_map(|&name| {
        let lower = name.to_lowercase();
        if overlaps(&lower, &requested_lower) {
            return Some((name, 100));
        }
        prefix_score(&lower, &requested_lower).map(|score| (name, score))
    });
    rank(scored, max_suggestions)
}

fn overlaps(a: &str, b: &str) -> bool {
    a.contains(b) || b.contains(a)
}

fn prefix_score(a: &str, b: &str) -> Option<usize> {
    let common = a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
    (common >= 3).then_some(common * 10)
}

fn rank<'a>(scored: impl Iterator<Item = (&'a str, usize)>, max_suggestions: usize) -> Vec<String> {
    let mut scored: Vec<(&str, usize)> = scored.collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}
