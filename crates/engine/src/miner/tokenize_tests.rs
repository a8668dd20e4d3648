use super::*;

#[test]
fn splits_on_whitespace_and_keeps_one_space_token() {
    assert_eq!(tokenize("a b"), vec!["a", " ", "b"]);
    assert_eq!(tokenize("a   b"), vec!["a", " ", "b"]);
}

#[test]
fn delimiters_become_their_own_tokens() {
    assert_eq!(
        tokenize("GET /api/orders"),
        vec!["GET", " ", "/", "api", "/", "orders"]
    );
    assert_eq!(tokenize("id=100&x=2"), vec!["id", "=", "100", "&", "x", "=", "2"]);
    assert_eq!(tokenize("12:30:07"), vec!["12", ":", "30", ":", "07"]);
}

#[test]
fn leading_and_trailing_whitespace_survive_as_tokens() {
    assert_eq!(tokenize(" x "), vec![" ", "x", " "]);
}

#[test]
fn empty_input_yields_no_tokens() {
    assert!(tokenize("").is_empty());
}

#[test]
fn whitespace_only_input_yields_one_space_token() {
    assert_eq!(tokenize("   \t\n "), vec![" "]);
}

#[test]
fn join_reproduces_input_modulo_collapsed_whitespace() {
    for s in [
        "GET /api/orders id=100 status=200",
        "plain words only",
        "key=value?query=1&flag",
        " leading and trailing ",
        "tabs\t\tcollapse",
    ] {
        let joined = join_tokens(&tokenize(s));
        let collapsed: String = {
            // Reference: collapse every whitespace run to a single space.
            let mut out = String::new();
            let mut in_ws = false;
            for c in s.chars() {
                if c.is_whitespace() {
                    if !in_ws {
                        out.push(' ');
                    }
                    in_ws = true;
                } else {
                    in_ws = false;
                    out.push(c);
                }
            }
            out
        };
        assert_eq!(joined, collapsed, "input {s:?}");
    }
}

#[test]
fn tokenize_is_idempotent_under_its_own_join() {
    for s in [
        "GET /api/orders id=100 status=200",
        "  doubled  spaces  ",
        "a:b:c/d?e=f",
        "",
    ] {
        let once = tokenize(s);
        let twice = tokenize(&join_tokens(&once));
        assert_eq!(once, twice, "input {s:?}");
    }
}
