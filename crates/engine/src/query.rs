/// A substring predicate: outer AND over groups, inner OR over each
/// group's alternatives. `[["user"], ["login", "logout"]]` matches records
/// containing "user" and at least one of "login" / "logout".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPredicate {
    pub groups: Vec<Vec<String>>,
}

impl SearchPredicate {
    pub fn new(groups: Vec<Vec<String>>) -> Self {
        Self { groups }
    }

    /// One group per term: every term must be contained.
    pub fn contains_all<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            groups: terms.into_iter().map(|t| vec![t.into()]).collect(),
        }
    }

    /// The empty predicate, which matches every record.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Parse the CLI form: whitespace separates AND groups, `|` separates
    /// a group's alternatives. `"user login|logout"` is
    /// `[["user"], ["login", "logout"]]`. Empty alternatives are dropped.
    pub fn parse(input: &str) -> Self {
        let groups = input
            .split_whitespace()
            .map(|group| {
                group
                    .split('|')
                    .filter(|alt| !alt.is_empty())
                    .map(str::to_owned)
                    .collect::<Vec<_>>()
            })
            .filter(|alts: &Vec<String>| !alts.is_empty())
            .collect();
        Self { groups }
    }
}
