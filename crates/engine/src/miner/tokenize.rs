/// Characters that split log-like text in addition to whitespace. They
/// show up inside URLs, key=value pairs, and timestamps, and keeping them
/// as their own tokens lets the miner wildcard the variable parts between
/// them.
const DELIMITERS: [char; 5] = ['/', '?', '&', '=', ':'];

/// Split log-like text into tokens, preserving everything needed to
/// rebuild it: delimiters become single-char tokens and every whitespace
/// run collapses to one `" "` token, so `join_tokens(tokenize(s))`
/// reproduces `s` modulo collapsed whitespace, and re-tokenizing the join
/// is a fixed point.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut in_whitespace = false;

    for c in text.chars() {
        if c.is_whitespace() {
            if !word.is_empty() {
                tokens.push(std::mem::take(&mut word));
            }
            if !in_whitespace {
                tokens.push(" ".to_owned());
            }
            in_whitespace = true;
        } else {
            in_whitespace = false;
            if DELIMITERS.contains(&c) {
                if !word.is_empty() {
                    tokens.push(std::mem::take(&mut word));
                }
                tokens.push(c.to_string());
            } else {
                word.push(c);
            }
        }
    }

    if !word.is_empty() {
        tokens.push(word);
    }
    tokens
}

/// Inverse of [tokenize] up to whitespace collapsing.
pub fn join_tokens<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut out = String::with_capacity(tokens.iter().map(|t| t.as_ref().len()).sum());
    for t in tokens {
        out.push_str(t.as_ref());
    }
    out
}

#[cfg(test)]
#[path = "tokenize_tests.rs"]
mod tests;
