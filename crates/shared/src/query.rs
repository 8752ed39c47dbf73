//! Compiles declarative topic templates into the boolean/field query dialect
//! understood by the news search endpoint.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::config::TopicTemplate;
use crate::news::NewsError;

// {{watchlist:NAME}} or {{watchlist:NAME|only:EXACT}}
static WATCHLIST_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\{\{watchlist:([A-Za-z0-9_]+)(?:\|only:([^}]*))?\}\}")
        .expect("watchlist token pattern is valid")
});

/// Normalize a single search term into a token safe to embed in the query.
///
/// Terms that already carry structure (a field operator, a boolean operator,
/// parentheses, or surrounding quotes) pass through untouched; plain
/// multi-word terms get quoted. Malformed input degrades to best-effort
/// pass-through rather than an error.
pub fn quote_term(term: &str) -> String {
    let term = term.trim();
    if term.is_empty() {
        return String::new();
    }

    let already_quoted = term.len() >= 2 && term.starts_with('"') && term.ends_with('"');
    let structured = term.contains(':')
        || term.contains(" AND ")
        || term.contains(" OR ")
        || term.contains('(')
        || term.contains(')');
    if already_quoted || structured {
        return term.to_string();
    }

    if term.chars().any(char::is_whitespace) {
        format!("\"{}\"", term)
    } else {
        term.to_string()
    }
}

/// OR-join a list of raw terms, quoting each and dropping blanks.
/// Zero survivors yield an empty string, one survivor stays bare, and two or
/// more become a parenthesized group in input order.
pub fn or_join(terms: &[String]) -> String {
    let quoted: Vec<String> = terms
        .iter()
        .map(|t| quote_term(t))
        .filter(|t| !t.is_empty())
        .collect();

    match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        _ => format!("({})", quoted.join(" OR ")),
    }
}

/// AND-join already-formed clauses, dropping blanks. A single clause stays
/// bare to avoid needless nesting.
pub fn and_join(clauses: &[String]) -> String {
    let kept: Vec<&str> = clauses
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();

    match kept.as_slice() {
        [] => String::new(),
        [one] => one.to_string(),
        _ => format!("({})", kept.join(" AND ")),
    }
}

/// Replace every `{{watchlist:NAME}}` token in `text` with the OR-group of
/// the named term list. `{{watchlist:NAME|only:EXACT}}` first narrows the
/// list to terms equal to EXACT (case-insensitive); an empty match expands to
/// an empty string. A reference to an unknown watchlist is an error for the
/// whole fragment. Expansion is a single left-to-right pass; inserted text is
/// never re-scanned.
pub fn expand_watchlists(
    text: &str,
    watchlists: &HashMap<String, Vec<String>>,
) -> Result<String, NewsError> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in WATCHLIST_TOKEN.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        let name = &caps[1];
        let terms = watchlists
            .get(name)
            .ok_or_else(|| NewsError::Config(format!("missing watchlist: {}", name)))?;

        let expansion = match caps.get(2) {
            Some(exact) => {
                let filtered: Vec<String> = terms
                    .iter()
                    .filter(|t| t.eq_ignore_ascii_case(exact.as_str()))
                    .cloned()
                    .collect();
                or_join(&filtered)
            }
            None => or_join(terms),
        };

        out.push_str(&text[last..m.start()]);
        out.push_str(&expansion);
        last = m.end();
    }

    out.push_str(&text[last..]);
    Ok(out)
}

/// Compile one topic template into the final query string.
///
/// Clauses are gathered in fixed order (the OR-block, each expanded `and`
/// fragment as its own clause, the global AND suffix verbatim, then the
/// domain exclusions) and AND-joined. An entirely empty template yields an
/// empty string; the caller decides what to do with it.
pub fn compile_query(
    template: &TopicTemplate,
    watchlists: &HashMap<String, Vec<String>>,
    global_and: Option<&str>,
    exclude_domains: &[String],
) -> Result<String, NewsError> {
    let mut clauses: Vec<String> = Vec::new();

    let or_block = or_join(&template.or);
    if !or_block.is_empty() {
        clauses.push(or_block);
    }

    for fragment in &template.and {
        if fragment.trim().is_empty() {
            continue;
        }
        clauses.push(expand_watchlists(fragment, watchlists)?);
    }

    if let Some(suffix) = global_and {
        if !suffix.trim().is_empty() {
            clauses.push(suffix.to_string());
        }
    }

    if !exclude_domains.is_empty() {
        let tokens: Vec<String> = exclude_domains
            .iter()
            .map(|d| format!("domain:{}", d))
            .collect();
        let joined = or_join(&tokens);
        if !joined.is_empty() {
            clauses.push(format!("-{}", joined));
        }
    }

    Ok(and_join(&clauses))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn watchlists() -> HashMap<String, Vec<String>> {
        let mut map = HashMap::new();
        map.insert(
            "competitors".to_string(),
            vec!["Acme".to_string(), "Beta Corp".to_string()],
        );
        map
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    // ==================== Quoting ====================

    #[test]
    fn quote_wraps_multi_word_terms() {
        assert_eq!(quote_term("hello world"), "\"hello world\"");
    }

    #[test]
    fn quote_passes_single_words_through() {
        assert_eq!(quote_term("single"), "single");
    }

    #[test]
    fn quote_leaves_field_operators_alone() {
        assert_eq!(quote_term("domain:x.com"), "domain:x.com");
    }

    #[test]
    fn quote_leaves_structured_fragments_alone() {
        assert_eq!(quote_term("(a OR b)"), "(a OR b)");
        assert_eq!(quote_term("cats AND dogs"), "cats AND dogs");
        assert_eq!(quote_term("\"already quoted\""), "\"already quoted\"");
    }

    #[test]
    fn quote_trims_and_drops_empty() {
        assert_eq!(quote_term("  spaced out  "), "\"spaced out\"");
        assert_eq!(quote_term("   "), "");
    }

    // ==================== OR / AND joins ====================

    #[test]
    fn or_join_of_empty_list_is_empty() {
        assert_eq!(or_join(&[]), "");
        assert_eq!(or_join(&strings(&["", "  "])), "");
    }

    #[test]
    fn or_join_of_one_term_is_bare() {
        assert_eq!(or_join(&strings(&["solar"])), "solar");
    }

    #[test]
    fn or_join_groups_and_preserves_order() {
        assert_eq!(
            or_join(&strings(&["beta", "alpha", "big corp"])),
            "(beta OR alpha OR \"big corp\")"
        );
    }

    #[test]
    fn or_join_skips_blanks_in_place() {
        // Joining with embedded blanks equals joining the cleaned list.
        assert_eq!(
            or_join(&strings(&["a", "", "b"])),
            or_join(&strings(&["a", "b"]))
        );
    }

    #[test]
    fn and_join_of_empty_list_is_empty() {
        assert_eq!(and_join(&[]), "");
    }

    #[test]
    fn and_join_of_one_clause_is_bare() {
        assert_eq!(and_join(&strings(&["solar"])), "solar");
    }

    #[test]
    fn and_join_groups_multiple_clauses() {
        assert_eq!(and_join(&strings(&["a", "b"])), "(a AND b)");
    }

    // ==================== Watchlist expansion ====================

    #[test]
    fn expands_watchlist_to_or_group() {
        let out = expand_watchlists("{{watchlist:competitors}}", &watchlists()).unwrap();
        assert_eq!(out, "(Acme OR \"Beta Corp\")");
    }

    #[test]
    fn expands_only_filter_case_insensitively() {
        let out = expand_watchlists("{{watchlist:competitors|only:acme}}", &watchlists()).unwrap();
        assert_eq!(out, "Acme");
    }

    #[test]
    fn only_filter_with_no_match_expands_to_empty() {
        let out = expand_watchlists("{{watchlist:competitors|only:Gamma}}", &watchlists()).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn unknown_watchlist_is_an_error() {
        let err = expand_watchlists("{{watchlist:nope}}", &watchlists()).unwrap_err();
        assert!(matches!(err, NewsError::Config(_)));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn expands_multiple_tokens_in_surrounding_text() {
        let out = expand_watchlists(
            "{{watchlist:competitors|only:Acme}} layoffs {{watchlist:competitors|only:Beta Corp}}",
            &watchlists(),
        )
        .unwrap();
        assert_eq!(out, "Acme layoffs \"Beta Corp\"");
    }

    #[test]
    fn text_without_tokens_passes_through() {
        let out = expand_watchlists("plain fragment", &watchlists()).unwrap();
        assert_eq!(out, "plain fragment");
    }

    // ==================== Query compilation ====================

    #[test]
    fn empty_template_compiles_to_empty_string() {
        let out = compile_query(&TopicTemplate::default(), &watchlists(), None, &[]).unwrap();
        assert_eq!(out, "");
    }

    #[test]
    fn compiles_all_clause_kinds_in_fixed_order() {
        let template = TopicTemplate {
            or: strings(&["solar power", "wind"]),
            and: strings(&["{{watchlist:competitors}}", "earnings"]),
        };
        let out = compile_query(
            &template,
            &watchlists(),
            Some("sourcelang:english"),
            &strings(&["spam.com", "junk.net"]),
        )
        .unwrap();
        assert_eq!(
            out,
            "((\"solar power\" OR wind) AND (Acme OR \"Beta Corp\") AND earnings \
             AND sourcelang:english AND -(domain:spam.com OR domain:junk.net))"
        );
    }

    #[test]
    fn single_exclusion_domain_stays_bare() {
        let template = TopicTemplate {
            or: strings(&["wind"]),
            and: vec![],
        };
        let out = compile_query(&template, &watchlists(), None, &strings(&["spam.com"])).unwrap();
        assert_eq!(out, "(wind AND -domain:spam.com)");
    }

    #[test]
    fn and_fragments_survive_as_discrete_clauses() {
        let template = TopicTemplate {
            or: vec![],
            and: strings(&["alpha beta", "  ", "gamma"]),
        };
        let out = compile_query(&template, &watchlists(), None, &[]).unwrap();
        assert_eq!(out, "(alpha beta AND gamma)");
    }

    #[test]
    fn unknown_watchlist_fails_compilation() {
        let template = TopicTemplate {
            or: vec![],
            and: strings(&["{{watchlist:ghosts}}"]),
        };
        assert!(compile_query(&template, &watchlists(), None, &[]).is_err());
    }

    #[test]
    fn compilation_is_deterministic() {
        let template = TopicTemplate {
            or: strings(&["one", "two words"]),
            and: strings(&["{{watchlist:competitors}}"]),
        };
        let first = compile_query(&template, &watchlists(), Some("x"), &strings(&["a.com"]))
            .unwrap();
        let second = compile_query(&template, &watchlists(), Some("x"), &strings(&["a.com"]))
            .unwrap();
        assert_eq!(first, second);
    }
}
