//! Text rendering for registrar diagnostics.
//!
//! Error messages name contracts and providers by their short type
//! names, render resolution chains, and offer "did you mean?" hints.

/// Shortens a fully qualified type name for display.
///
/// Every path prefix is dropped, generic arguments and trait objects
/// keep their structure.
///
/// ```
/// use registrar_support::rendering::shorten_type_name;
///
/// assert_eq!(shorten_type_name("my_app::services::UserService"), "UserService");
/// assert_eq!(
///     shorten_type_name("alloc::sync::Arc<dyn my_app::traits::Logger>"),
///     "Arc<dyn Logger>"
/// );
/// ```
pub fn shorten_type_name(full_name: &str) -> String {
    let mut result = String::with_capacity(full_name.len());
    let mut segment = String::new();
    let mut chars = full_name.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                segment.clear();
            }
            '<' | '>' | ',' | ' ' | '(' | ')' | '[' | ']' | '&' | ';' => {
                result.push_str(&segment);
                result.push(ch);
                segment.clear();
            }
            _ => segment.push(ch),
        }
    }

    result.push_str(&segment);
    result
}

/// Renders a chain of names joined by arrows.
///
/// ```
/// use registrar_support::rendering::render_chain;
///
/// let chain = ["Reports", "Repository", "Reports"];
/// assert_eq!(render_chain(&chain), "Reports → Repository → Reports");
/// ```
pub fn render_chain(chain: &[impl AsRef<str>]) -> String {
    chain
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" → ")
}

/// One step of a resolution chain: a contract, the provider chosen
/// for it, and the scope of that registration.
#[derive(Debug, Clone)]
pub struct ChainEntry {
    pub contract: String,
    pub provider: String,
    pub scope: String,
}

/// Renders a resolution chain top-down with scope annotations.
///
/// ```text
/// [Singleton] Reports => SqlReports
///             ↓
/// [Managed]   Repository => SqlRepository
/// ```
pub fn render_chain_vertical(entries: &[ChainEntry]) -> String {
    let width = entries.iter().map(|e| e.scope.len()).max().unwrap_or(0);
    let mut out = String::new();

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 {
            out.push_str(&" ".repeat(width + 3));
            out.push_str("↓\n");
        }

        out.push_str(&format!("{:<w$} ", format!("[{}]", entry.scope), w = width + 2));
        if entry.contract == entry.provider {
            out.push_str(&format!("{}\n", entry.contract));
        } else {
            out.push_str(&format!("{} => {}\n", entry.contract, entry.provider));
        }
    }

    out
}

/// Picks up to `max_suggestions` names from `available` that look like
/// `requested`, best match first.
///
/// Substring matches on the full name score highest, then substring
/// matches on the short name, then a shared prefix of three or more
/// characters.
pub fn suggest_similar(requested: &str, available: &[&str], max_suggestions: usize) -> Vec<String> {
    let requested_full = requested.to_lowercase();
    let requested_short = shorten_type_name(requested).to_lowercase();

    let mut scored: Vec<(&str, usize)> = available
        .iter()
        .filter(|&&name| name != requested)
        .filter_map(|&name| {
            let full = name.to_lowercase();
            let short = shorten_type_name(name).to_lowercase();

            if full.contains(&requested_full) || requested_full.contains(&full) {
                return Some((name, 100));
            }
            if short.contains(&requested_short) || requested_short.contains(&short) {
                return Some((name, 80));
            }

            let common = short
                .chars()
                .zip(requested_short.chars())
                .take_while(|(a, b)| a == b)
                .count();

            (common >= 3).then_some((name, common * 10))
        })
        .collect();

    // stable sort keeps the caller's order among equal scores
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .take(max_suggestions)
        .map(|(name, _)| name.to_string())
        .collect()
}
