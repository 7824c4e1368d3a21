use std::{collections::HashMap, fs, io, iter, path::Path};

use jieba_rs::Jieba;
use regex::Regex;

use crate::error::OracleError;

/// Category the taggers use for person names.
pub const PROPER_NAME_TAG: &str = "nr";
/// Category given to anything a tagger does not recognise.
pub const UNKNOWN_TAG: &str = "x";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tagged {
    pub token: String,
    pub tag: String,
}

impl Tagged {
    pub fn new(token: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            tag: tag.into(),
        }
    }
}

/// Part-of-speech tagging capability the pipeline extracts names with.
///
/// Any `Fn(&str) -> Result<Vec<Tagged>, OracleError>` closure is an oracle,
/// so alternative taggers can be plugged in without a new type.
pub trait NameOracle: Send + Sync {
    fn tag(&self, text: &str) -> Result<Vec<Tagged>, OracleError>;
}

impl<F> NameOracle for F
where
    F: Fn(&str) -> Result<Vec<Tagged>, OracleError> + Send + Sync,
{
    fn tag(&self, text: &str) -> Result<Vec<Tagged>, OracleError> {
        self(text)
    }
}

/// Entries of a jieba-style word list: `word [freq] [tag]` per line,
/// `#` comments and blank lines skipped.
fn dictionary_entries(contents: &str) -> Vec<(&str, Option<usize>, Option<&str>)> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let word = fields.next()?;
            let mut next = fields.next();
            // frequency column is optional
            let freq = next.and_then(|f| f.parse::<usize>().ok());
            if freq.is_some() {
                next = fields.next();
            }
            Some((word, freq, next))
        })
        .collect()
}

/// Chinese part-of-speech tagger backed by jieba's bundled dictionary.
///
/// Words missing from the dictionary, such as the invented names of a
/// novel, are tagged [`UNKNOWN_TAG`] unless added through
/// [`with_words`](Self::with_words) or a user dictionary.
pub struct JiebaOracle {
    jieba: Jieba,
}

impl JiebaOracle {
    pub fn new() -> Self {
        Self {
            jieba: Jieba::new(),
        }
    }

    pub fn with_words<I, W, T>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (W, T)>,
        W: AsRef<str>,
        T: AsRef<str>,
    {
        for (word, tag) in entries {
            self.jieba.add_word(word.as_ref(), None, Some(tag.as_ref()));
        }
        self
    }

    /// Adds the entries of a user dictionary (`word [freq] [tag]` per line).
    pub fn load_user_dict(mut self, path: &Path) -> io::Result<Self> {
        let contents = fs::read_to_string(path)?;
        for (word, freq, tag) in dictionary_entries(&contents) {
            self.jieba.add_word(word, freq, tag);
        }
        Ok(self)
    }
}

impl Default for JiebaOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl NameOracle for JiebaOracle {
    fn tag(&self, text: &str) -> Result<Vec<Tagged>, OracleError> {
        Ok(self
            .jieba
            .tag(text, true)
            .into_iter()
            .filter(|tag| !tag.word.trim().is_empty())
            .map(|tag| Tagged::new(tag.word, tag.tag))
            .collect())
    }
}

/// Dictionary tagger doing forward maximum matching.
///
/// The word list uses the jieba dictionary layout, one `word [freq] [tag]`
/// entry per line. Characters not covered by any entry come out as
/// single-character tokens tagged [`UNKNOWN_TAG`]; whitespace is dropped.
#[derive(Debug, Clone, Default)]
pub struct LexiconOracle {
    words: HashMap<String, String>,
    longest: usize,
}

impl LexiconOracle {
    pub fn from_entries<I, W, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (W, T)>,
        W: Into<String>,
        T: Into<String>,
    {
        let mut lexicon = Self::default();
        for (word, tag) in entries {
            lexicon.insert(word.into(), tag.into());
        }
        lexicon
    }

    pub fn parse(contents: &str) -> Self {
        let mut lexicon = Self::default();
        for (word, _, tag) in dictionary_entries(contents) {
            lexicon.insert(word.to_string(), tag.unwrap_or(UNKNOWN_TAG).to_string());
        }
        lexicon
    }

    pub fn load(path: &Path) -> io::Result<Self> {
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    fn insert(&mut self, word: String, tag: String) {
        self.longest = self.longest.max(word.chars().count());
        self.words.insert(word, tag);
    }

    /// Longest dictionary word at the start of `rest`.
    fn longest_match<'a>(&'a self, rest: &str) -> Option<(usize, &'a str)> {
        let ends: Vec<usize> = rest
            .char_indices()
            .skip(1)
            .map(|(i, _)| i)
            .chain(iter::once(rest.len()))
            .take(self.longest)
            .collect();
        ends.into_iter()
            .rev()
            .find_map(|end| self.words.get(&rest[..end]).map(|tag| (end, tag.as_str())))
    }
}

impl NameOracle for LexiconOracle {
    fn tag(&self, text: &str) -> Result<Vec<Tagged>, OracleError> {
        let mut tagged = Vec::new();
        let mut rest = text;
        while let Some(first) = rest.chars().next() {
            let (end, tag) = self
                .longest_match(rest)
                .unwrap_or((first.len_utf8(), UNKNOWN_TAG));
            let token = &rest[..end];
            if !token.trim().is_empty() {
                tagged.push(Tagged::new(token, tag));
            }
            rest = &rest[end..];
        }
        Ok(tagged)
    }
}

/// Regex tagger: tokens matching the name pattern get the name tag.
#[derive(Debug, Clone)]
pub struct PatternOracle {
    tokens: Regex,
    names: Regex,
    name_tag: String,
}

impl PatternOracle {
    pub const DEFAULT_TOKEN_PATTERN: &'static str = r"\w+";
    /// Capitalised words, e.g. `Holmes`.
    pub const DEFAULT_NAME_PATTERN: &'static str = r"^\p{Lu}\p{Ll}+$";

    pub fn new(name_pattern: &str, name_tag: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            tokens: Regex::new(Self::DEFAULT_TOKEN_PATTERN)?,
            names: Regex::new(name_pattern)?,
            name_tag: name_tag.into(),
        })
    }
}

impl NameOracle for PatternOracle {
    fn tag(&self, text: &str) -> Result<Vec<Tagged>, OracleError> {
        Ok(self
            .tokens
            .find_iter(text)
            .map(|m| {
                let tag = if self.names.is_match(m.as_str()) {
                    self.name_tag.as_str()
                } else {
                    UNKNOWN_TAG
                };
                Tagged::new(m.as_str(), tag)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tokens(tagged: &[Tagged]) -> Vec<(&str, &str)> {
        tagged
            .iter()
            .map(|t| (t.token.as_str(), t.tag.as_str()))
            .collect()
    }

    #[test]
    fn lexicon_prefers_longest_word() {
        let oracle = LexiconOracle::from_entries([
            ("萧", "nr"),
            ("萧炎", "nr"),
            ("离开", "v"),
        ]);
        let tagged = oracle.tag("萧炎离开了 萧").unwrap();
        assert_eq!(
            tokens(&tagged),
            vec![
                ("萧炎", "nr"),
                ("离开", "v"),
                ("了", UNKNOWN_TAG),
                ("萧", "nr"),
            ]
        );
    }

    #[test]
    fn lexicon_parses_jieba_layout() {
        let oracle = LexiconOracle::parse(
            "# names\n萧炎 120 nr\n药老 nr\n\n斗气 30\n",
        );
        assert_eq!(oracle.len(), 3);
        let tagged = oracle.tag("药老斗气").unwrap();
        assert_eq!(tokens(&tagged), vec![("药老", "nr"), ("斗气", UNKNOWN_TAG)]);
    }

    #[test]
    fn dictionary_entries_accept_optional_columns() {
        let entries = dictionary_entries("# cast\n萧炎 120 nr\n药老 nr\n  \n斗气 30\n纳兰\n");
        assert_eq!(
            entries,
            vec![
                ("萧炎", Some(120), Some("nr")),
                ("药老", None, Some("nr")),
                ("斗气", Some(30), None),
                ("纳兰", None, None),
            ]
        );
    }

    #[test]
    fn jieba_tags_added_names() {
        let oracle = JiebaOracle::new().with_words([("萧炎", "nr"), ("药老", "nr")]);
        let tagged = oracle.tag("萧炎对药老说话，萧炎笑了。").unwrap();
        let names: Vec<_> = tagged
            .iter()
            .filter(|t| t.tag == PROPER_NAME_TAG)
            .map(|t| t.token.as_str())
            .collect();
        assert_eq!(names, vec!["萧炎", "药老", "萧炎"]);
        assert!(tagged.iter().all(|t| !t.token.trim().is_empty()));
    }

    #[test]
    fn jieba_loads_user_dictionary() {
        let mut dict = tempfile::NamedTempFile::new().unwrap();
        writeln!(dict, "萧炎 nr\n# mentor\n药老 50 nr").unwrap();
        let oracle = JiebaOracle::new().load_user_dict(dict.path()).unwrap();
        let tagged = oracle.tag("药老看着萧炎").unwrap();
        assert!(tagged.contains(&Tagged::new("萧炎", "nr")));
        assert!(tagged.contains(&Tagged::new("药老", "nr")));
    }

    #[test]
    fn empty_lexicon_tags_every_char_unknown() {
        let oracle = LexiconOracle::default();
        assert!(oracle.is_empty());
        let tagged = oracle.tag("甲乙").unwrap();
        assert_eq!(tokens(&tagged), vec![("甲", "x"), ("乙", "x")]);
    }

    #[test]
    fn pattern_tags_capitalised_words() {
        let oracle = PatternOracle::new(PatternOracle::DEFAULT_NAME_PATTERN, "nr").unwrap();
        let tagged = oracle.tag("Holmes met watson and Mary.").unwrap();
        let names: Vec<_> = tagged
            .iter()
            .filter(|t| t.tag == "nr")
            .map(|t| t.token.as_str())
            .collect();
        assert_eq!(names, vec!["Holmes", "Mary"]);
    }

    #[test]
    fn bad_pattern_is_reported() {
        assert!(PatternOracle::new("(", "nr").is_err());
    }

    #[test]
    fn closures_are_oracles() {
        let oracle = |text: &str| -> Result<Vec<Tagged>, OracleError> {
            Ok(vec![Tagged::new(text, "nr")])
        };
        assert_eq!(oracle.tag("甲").unwrap(), vec![Tagged::new("甲", "nr")]);
    }
}
