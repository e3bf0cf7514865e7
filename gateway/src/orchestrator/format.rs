//! Plain-text rendering of search results.

use shared_types::SearchResult;

/// Sources listed for an explicit search request
pub const MAX_LISTED_SOURCES: usize = 5;
const LISTED_SNIPPET_CHARS: usize = 250;
const FALLBACK_SNIPPET_CHARS: usize = 200;

pub const FALLBACK_PREAMBLE: &str =
    "I couldn't generate a direct response, but here's some relevant information:\n\n";

/// First `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => (&text[..idx], true),
        None => (text, false),
    }
}

/// Full report for an explicit search trigger.
pub fn format_search_results(result: &SearchResult) -> String {
    let mut output = format!("🌐 Web Search Results for \"{}\"\n\n", result.query);

    if let Some(answer) = result.direct_answer() {
        output.push_str(&format!("📌 Key Insights:\n{answer}\n\n"));
    }

    output.push_str("🔍 Top Sources:\n");
    for (index, source) in result.sources.iter().take(MAX_LISTED_SOURCES).enumerate() {
        let (snippet, truncated) = truncate_chars(&source.content, LISTED_SNIPPET_CHARS);
        output.push_str(&format!("\n{}. {}\n", index + 1, source.title));
        output.push_str(&format!("   🔗 URL: {}\n", source.url));
        output.push_str(&format!(
            "   📄 Snippet: {}{}\n",
            snippet,
            if truncated { "..." } else { "" }
        ));
    }

    output.push_str("\n💡 Search Details:\n");
    output.push_str(&format!("- Total Sources: {}\n", result.sources.len()));
    output.push_str("- Powered by Tavily AI\n");
    output
}

pub fn format_no_results(query: &str) -> String {
    format!("❌ No results found for \"{query}\".")
}

/// Short answer used when search stands in for a failed completion:
/// the direct answer if present, else a bulleted list of snippets.
pub fn format_fallback_answer(result: &SearchResult, max_snippets: usize) -> String {
    if let Some(answer) = result.direct_answer() {
        return answer.to_string();
    }

    let bullets = result
        .sources
        .iter()
        .take(max_snippets.max(1))
        .map(|source| {
            let (snippet, _) = truncate_chars(&source.content, FALLBACK_SNIPPET_CHARS);
            format!("• {}: {}...", source.title, snippet)
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!("{FALLBACK_PREAMBLE}{bullets}")
}
