//! Boolean search query grammar.
//!
//! ```text
//! Expr    := AndExpr ("OR" AndExpr)*
//! AndExpr := NotExpr (("AND")? NotExpr)*
//! NotExpr := "NOT" Primary | Primary
//! Primary := "(" Expr ")" | '"' phrase '"' | wildcard | term
//! ```
//!
//! Keywords are case-insensitive and must be followed by whitespace or the
//! end of input.  Parsing never fails: an empty query matches everything and
//! an unclosed parenthesis simply runs to the end of the input.

use std::sync::LazyLock;

use regex::Regex;

static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

const KEYWORDS: &[&str] = &["AND", "OR", "NOT"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    MatchAll,
    /// Lowercased term; substring match with optional fuzzy fallback.
    Term(String),
    /// Lowercased phrase; exact substring match.
    Phrase(String),
    /// Lowercased glob pattern matched against individual words.
    Wildcard(WildcardPattern),
    And(Box<Query>, Box<Query>),
    Or(Box<Query>, Box<Query>),
    Not(Box<Query>),
}

impl Query {
    pub fn parse(query: &str) -> Query {
        QueryParser::new(query).parse()
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, Query::MatchAll)
    }

    /// Evaluate against `text`.  `fuzzy_distance > 0` lets plain terms match
    /// any word within that edit distance.
    pub fn matches(&self, text: &str, fuzzy_distance: usize) -> bool {
        let lowered = text.to_lowercase();
        self.matches_lowered(&lowered, fuzzy_distance)
    }

    fn matches_lowered(&self, text: &str, fuzzy_distance: usize) -> bool {
        match self {
            Query::MatchAll => true,
            Query::Term(term) => {
                text.contains(term.as_str())
                    || (fuzzy_distance > 0
                        && tokens(text).any(|word| {
                            levenshtein_distance(term, word) <= fuzzy_distance
                        }))
            }
            Query::Phrase(phrase) => text.contains(phrase.as_str()),
            Query::Wildcard(pattern) => tokens(text).any(|word| pattern.is_match(word)),
            Query::And(left, right) => {
                left.matches_lowered(text, fuzzy_distance)
                    && right.matches_lowered(text, fuzzy_distance)
            }
            Query::Or(left, right) => {
                left.matches_lowered(text, fuzzy_distance)
                    || right.matches_lowered(text, fuzzy_distance)
            }
            Query::Not(inner) => !inner.matches_lowered(text, fuzzy_distance),
        }
    }
}

/// Whitespace-delimited tokens followed by the `\w+` words inside them.
fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split_whitespace()
        .chain(WORD_RE.find_iter(text).map(|m| m.as_str()))
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct QueryParser {
    chars: Vec<char>,
    pos: usize,
}

impl QueryParser {
    fn new(query: &str) -> Self {
        Self {
            chars: query.trim().chars().collect(),
            pos: 0,
        }
    }

    fn parse(&mut self) -> Query {
        if self.chars.is_empty() {
            return Query::MatchAll;
        }
        self.parse_or()
    }

    fn skip_ws(&mut self) {
        while self.chars.get(self.pos).is_some_and(|c| c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    /// Next whitespace-delimited word, uppercased, without consuming it.
    fn peek_word(&mut self) -> String {
        self.skip_ws();
        self.chars[self.pos..]
            .iter()
            .take_while(|c| !c.is_whitespace())
            .collect::<String>()
            .to_uppercase()
    }

    fn match_keyword(&mut self, keyword: &str) -> bool {
        self.skip_ws();
        let len = keyword.chars().count();
        let end = self.pos + len;
        if end > self.chars.len() {
            return false;
        }
        let candidate: String = self.chars[self.pos..end].iter().collect();
        let boundary = self.chars.get(end).map_or(true, |c| c.is_whitespace());
        if candidate.eq_ignore_ascii_case(keyword) && boundary {
            self.pos = end;
            true
        } else {
            false
        }
    }

    fn peek_term(&mut self) -> bool {
        self.skip_ws();
        match self.chars.get(self.pos) {
            None | Some('(') | Some(')') => false,
            Some(_) => {
                let word = self.peek_word();
                !KEYWORDS.contains(&word.as_str())
            }
        }
    }

    fn peek_not(&mut self) -> bool {
        self.peek_word() == "NOT"
    }

    fn parse_or(&mut self) -> Query {
        let mut left = self.parse_and();
        while self.match_keyword("OR") {
            let right = self.parse_and();
            left = Query::Or(Box::new(left), Box::new(right));
        }
        left
    }

    fn parse_and(&mut self) -> Query {
        let mut left = self.parse_not();
        loop {
            let right = if self.match_keyword("AND") {
                self.parse_not()
            } else if self.peek_not() || self.peek_term() {
                self.parse_not()
            } else {
                break;
            };
            left = Query::And(Box::new(left), Box::new(right));
        }
        left
    }

    fn parse_not(&mut self) -> Query {
        if self.match_keyword("NOT") {
            Query::Not(Box::new(self.parse_primary()))
        } else {
            self.parse_primary()
        }
    }

    fn parse_primary(&mut self) -> Query {
        self.skip_ws();
        if self.at_end() {
            return Query::MatchAll;
        }
        match self.chars[self.pos] {
            '(' => {
                self.pos += 1;
                let inner = self.parse_or();
                self.skip_ws();
                if self.chars.get(self.pos) == Some(&')') {
                    self.pos += 1;
                }
                inner
            }
            '"' => self.parse_phrase(),
            _ => self.parse_term(),
        }
    }

    fn parse_phrase(&mut self) -> Query {
        self.pos += 1;
        let start = self.pos;
        while self.chars.get(self.pos).is_some_and(|c| *c != '"') {
            self.pos += 1;
        }
        let phrase: String = self.chars[start..self.pos].iter().collect();
        if !self.at_end() {
            self.pos += 1;
        }
        Query::Phrase(phrase.to_lowercase())
    }

    fn parse_term(&mut self) -> Query {
        let start = self.pos;
        while self
            .chars
            .get(self.pos)
            .is_some_and(|c| !c.is_whitespace() && !matches!(c, '(' | ')' | '"'))
        {
            self.pos += 1;
        }
        let term: String = self.chars[start..self.pos].iter().collect();
        if term.is_empty() || KEYWORDS.contains(&term.to_uppercase().as_str()) {
            return Query::MatchAll;
        }
        let term = term.to_lowercase();
        if !term.contains('*') {
            return Query::Term(term);
        }
        match WildcardPattern::new(&term) {
            Some(pattern) => Query::Wildcard(pattern),
            None => Query::Term(term),
        }
    }
}

// ---------------------------------------------------------------------------
// String helpers
// ---------------------------------------------------------------------------

/// Edit distance over chars, two-row dynamic programming.
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let (a, b): (Vec<char>, Vec<char>) = (a.chars().collect(), b.chars().collect());
    let (long, short) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return long.len();
    }

    let mut previous: Vec<usize> = (0..=short.len()).collect();
    let mut current = vec![0; short.len() + 1];
    for (i, lc) in long.iter().enumerate() {
        current[0] = i + 1;
        for (j, sc) in short.iter().enumerate() {
            let substitution = previous[j] + usize::from(lc != sc);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[short.len()]
}

// ---------------------------------------------------------------------------
// Wildcards
// ---------------------------------------------------------------------------

/// A shell-style pattern (`*`, `?`, `[seq]`, `[!seq]`) compiled to an
/// anchored regex.  Equality compares the pattern text.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    regex: Regex,
}

impl WildcardPattern {
    /// `None` when the translated pattern does not compile, e.g. a reversed
    /// range such as `[z-a]`.
    pub fn new(pattern: &str) -> Option<Self> {
        let regex = Regex::new(&translate_glob(pattern)).ok()?;
        Some(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whole-word match.
    pub fn is_match(&self, word: &str) -> bool {
        self.regex.is_match(word)
    }
}

impl PartialEq for WildcardPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for WildcardPattern {}

fn translate_glob(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::from("(?s)^");
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&char_class(&chars[i + 1..end]));
                    i = end;
                }
                None => out.push_str(r"\["),
            },
            c => out.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
        i += 1;
    }
    out.push('$');
    out
}

/// Index of the `]` closing the class opened at `open`.  A `]` right after
/// `[` or `[!` is a member, not the terminator.
fn class_end(chars: &[char], open: usize) -> Option<usize> {
    let mut start = open + 1;
    if chars.get(start) == Some(&'!') {
        start += 1;
    }
    if chars.get(start) == Some(&']') {
        start += 1;
    }
    (start..chars.len()).find(|&k| chars[k] == ']')
}

fn char_class(members: &[char]) -> String {
    let (negated, members) = match members.split_first() {
        Some(('!', rest)) => (true, rest),
        _ => (false, members),
    };
    let mut class = String::from(if negated { "[^" } else { "[" });
    for c in members {
        if *c == '-' {
            class.push('-');
        } else {
            class.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
        }
    }
    class.push(']');
    class
}
