//! Template expander module
//!
//! Pure recursive token substitution for question text, section names, and step
//! names. No I/O; the token lookup map is built by the caller (see
//! `services::propagation`) from the current Dependent set.

use std::collections::HashMap;

/// Expand `text`, replacing `{TOKEN}`/`{TOKEN|default}` occurrences using `tokens`,
/// recursing into unresolved defaults, then applying the `{Q#}`/`{S#}` instance
/// substitutions and the trailing typographic fixups.
pub fn expand(
    text: &str,
    tokens: &HashMap<String, String>,
    question_instance: i64,
    step_instance: i64,
) -> String {
    let mut scoped = tokens.clone();
    scoped.insert("Q#".to_string(), question_instance.to_string());
    scoped.insert("S#".to_string(), step_instance.to_string());

    let chars: Vec<char> = text.chars().collect();
    let expanded = expand_chars(&chars, &scoped);

    apply_typographic_fixups(&expanded)
}

fn expand_chars(chars: &[char], tokens: &HashMap<String, String>) -> String {
    let mut result = String::new();
    let mut i = 0;

    while i < chars.len() {
        if chars[i] != '{' {
            result.push(chars[i]);
            i += 1;
            continue;
        }

        match matching_close(chars, i) {
            Some(close) => {
                let inner = &chars[i + 1..close];
                result.push_str(&resolve_token(inner, tokens));
                i = close + 1;
            },
            None => {
                // Unmatched brace: emit literally, matching the source's tolerance
                // for malformed template strings rather than erroring.
                result.push('{');
                i += 1;
            },
        }
    }

    result
}

fn resolve_token(inner: &[char], tokens: &HashMap<String, String>) -> String {
    match find_top_level_pipe(inner) {
        Some(pipe) => {
            let token: String = inner[..pipe].iter().collect();
            match tokens.get(&token) {
                Some(value) => value.clone(),
                None => expand_chars(&inner[pipe + 1..], tokens),
            }
        },
        None => {
            let token: String = inner.iter().collect();
            tokens.get(&token).cloned().unwrap_or_default()
        },
    }
}

/// Finds the `}` matching the `{` at `open`, honoring nested braces (a default
/// region may itself contain `{TOKEN}` placeholders).
fn matching_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 1;
    let mut j = open + 1;

    while j < chars.len() {
        match chars[j] {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            },
            _ => {},
        }
        j += 1;
    }

    None
}

fn find_top_level_pipe(chars: &[char]) -> Option<usize> {
    let mut depth = 0;

    for (k, c) in chars.iter().enumerate() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            '|' if depth == 0 => return Some(k),
            _ => {},
        }
    }

    None
}

fn apply_typographic_fixups(text: &str) -> String {
    let text = text
        .replace(" her's", " her")
        .replace(" his's", " his")
        .replace(" Your's", " Your");

    text.replace("s's", "s'")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_known_token() {
        let tokens = map(&[("NAME", "Dennis")]);
        assert_eq!(expand("Hello {NAME}!", &tokens, 0, 0), "Hello Dennis!");
    }

    #[test]
    fn falls_back_to_default_when_token_absent() {
        let tokens = map(&[]);
        assert_eq!(expand("Hello {NAME|friend}!", &tokens, 0, 0), "Hello friend!");
    }

    #[test]
    fn prefers_token_value_over_default() {
        let tokens = map(&[("NAME", "Dennis")]);
        assert_eq!(expand("Hello {NAME|friend}!", &tokens, 0, 0), "Hello Dennis!");
    }

    #[test]
    fn expands_nested_default() {
        let tokens = map(&[("CITY", "Bangkok")]);
        assert_eq!(
            expand("Where: {COUNTRY|{CITY|Unknown}}", &tokens, 0, 0),
            "Where: Bangkok"
        );
    }

    #[test]
    fn expands_nested_default_fallback() {
        let tokens = map(&[]);
        assert_eq!(
            expand("Where: {COUNTRY|{CITY|Unknown}}", &tokens, 0, 0),
            "Where: Unknown"
        );
    }

    #[test]
    fn replaces_instance_placeholders() {
        let tokens = map(&[]);
        assert_eq!(expand("Pet {Q#}", &tokens, 2, 1), "Pet 2");
        assert_eq!(expand("Family step {S#}", &tokens, 0, 3), "Family step 3");
    }

    #[test]
    fn applies_apostrophe_fixup_for_possessive_pronoun() {
        let tokens = map(&[("NAME", "Dennis")]);
        assert_eq!(
            expand("What is {NAME}'s Birthday?", &tokens, 0, 0),
            "What is Dennis' Birthday?"
        );
    }

    #[test]
    fn applies_her_his_your_fixups() {
        let tokens = map(&[]);
        assert_eq!(expand("ask her's opinion", &tokens, 0, 0), "ask her opinion");
        assert_eq!(expand("ask his's opinion", &tokens, 0, 0), "ask his opinion");
        assert_eq!(expand("check Your's form", &tokens, 0, 0), "check Your form");
    }

    #[test]
    fn unmatched_brace_is_emitted_literally() {
        let tokens = map(&[]);
        assert_eq!(expand("broken {NAME", &tokens, 0, 0), "broken {NAME");
    }
}
