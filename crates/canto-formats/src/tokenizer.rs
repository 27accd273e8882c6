//! MML score tokenizer.
//!
//! A single regex alternation is tried at each position in a fixed order:
//! note, rest, property, octave step, comment, track marker, whitespace and
//! finally a catch-all that turns any other character into a [`ParseError`].
//! The regex crate's leftmost-first semantics make the alternation ordered.
//!
//! `#` doubles as the sharp sign, so a note directly followed by `##` takes
//! the first `#` as its accidental: `c## ka` is the note `c#` and a plain
//! comment. Lyric comments need whitespace (or a line start) before them.

use arrayvec::ArrayVec;
use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::ParseError;

lazy_static! {
    static ref TOKEN_RE: Regex = Regex::new(concat!(
        r"(?P<note>(?P<key>[a-g])(?P<acc>[+#-]?)(?P<nlen>[0-9]*)(?::(?P<noct>-?[0-9]+))?)",
        r"|(?P<rest>[rp](?P<rlen>[0-9]*))",
        r"|(?P<prop>(?P<pkey>[olt])(?P<pval>[-+]?[0-9.]*))",
        r"|(?P<step>[<>])",
        r"|(?P<comment>#(?P<body>[^\n]*))",
        r"|(?P<track>@(?P<name>\w+))",
        r"|(?P<ws>\s+)",
        r"|(?P<invalid>(?s:.))",
    ))
    .expect("token pattern is valid");
}

/// Token class.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// `c`, `d+8`, `b-16:3`: payload `[letter, accidental, length, octave]`
    Note,
    /// `r`, `p4`: payload `[length]`
    Rest,
    /// `o5`, `l8`, `t140`: payload `[marker, value]`
    Prop,
    /// `>` or `<`: payload `[marker]`
    OctaveStep,
    /// `# text`: payload `[body]`
    Comment,
    /// `## ka sa ta`: payload `[body]`
    LyricComment,
    /// `@name`: payload `[name]`
    TrackMarker,
    /// Whitespace
    Ignore,
}

impl TokenKind {
    /// Lowercase name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Note => "note",
            TokenKind::Rest => "rest",
            TokenKind::Prop => "prop",
            TokenKind::OctaveStep => "octave_step",
            TokenKind::Comment => "comment",
            TokenKind::LyricComment => "lyric_comment",
            TokenKind::TrackMarker => "track_marker",
            TokenKind::Ignore => "ignore",
        }
    }
}

/// A lexed token borrowing from the source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    /// Byte offset of the token in the source
    pub offset: usize,
    /// The full matched text
    pub span: &'a str,
    /// Captured substrings, in pattern order
    pub payload: ArrayVec<&'a str, 4>,
}

impl<'a> Token<'a> {
    /// Captured substring `index`, or `""` if absent.
    pub fn part(&self, index: usize) -> &'a str {
        self.payload.get(index).copied().unwrap_or("")
    }
}

/// Lazy token stream over a score.
///
/// Yields at most one error, after which the stream ends.
pub struct Tokenizer<'a> {
    text: &'a str,
    pos: usize,
    failed: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            pos: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.pos >= self.text.len() {
            return None;
        }

        let caps = TOKEN_RE.captures_at(self.text, self.pos)?;
        let whole = caps.get(0)?;
        let offset = self.pos;
        self.pos = whole.end();

        match classify(&caps) {
            Some((kind, payload)) => Some(Ok(Token {
                kind,
                offset,
                span: whole.as_str(),
                payload,
            })),
            None => {
                self.failed = true;
                let character = whole.as_str().chars().next().unwrap_or('\0');
                Some(Err(ParseError::at(self.text, offset, character)))
            }
        }
    }
}

/// Tokenize a whole score, failing on the first invalid character.
pub fn tokenize(text: &str) -> Result<Vec<Token<'_>>, ParseError> {
    Tokenizer::new(text).collect()
}

fn classify<'a>(caps: &Captures<'a>) -> Option<(TokenKind, ArrayVec<&'a str, 4>)> {
    let group = |name: &str| caps.name(name).map_or("", |m| m.as_str());
    let payload = |names: &[&str]| names.iter().map(|n| group(*n)).collect::<ArrayVec<_, 4>>();

    if caps.name("note").is_some() {
        Some((TokenKind::Note, payload(&["key", "acc", "nlen", "noct"])))
    } else if caps.name("rest").is_some() {
        Some((TokenKind::Rest, payload(&["rlen"])))
    } else if caps.name("prop").is_some() {
        Some((TokenKind::Prop, payload(&["pkey", "pval"])))
    } else if let Some(step) = caps.name("step") {
        Some((TokenKind::OctaveStep, [step.as_str()].into_iter().collect()))
    } else if caps.name("comment").is_some() {
        let body = group("body");
        match body.strip_prefix('#') {
            Some(lyrics) => Some((TokenKind::LyricComment, [lyrics].into_iter().collect())),
            None => Some((TokenKind::Comment, [body].into_iter().collect())),
        }
    } else if caps.name("track").is_some() {
        Some((TokenKind::TrackMarker, payload(&["name"])))
    } else if caps.name("ws").is_some() {
        Some((TokenKind::Ignore, ArrayVec::new()))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text)
            .unwrap()
            .into_iter()
            .filter(|t| t.kind != TokenKind::Ignore)
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn kinds_in_input_order() {
        use TokenKind::*;
        assert_eq!(
            kinds("t140 o5 l8 c d+4 r2 > e- < @lead # hi\n## ka sa\n"),
            [Prop, Prop, Prop, Note, Note, Rest, OctaveStep, Note, OctaveStep, TrackMarker, Comment, LyricComment]
        );
    }

    #[test]
    fn spans_reproduce_input() {
        let text = "@alto\n## la li lu\nt90 o3 c8d8e4 r p16 >f+:5 # end";
        let joined: String = tokenize(text).unwrap().iter().map(|t| t.span).collect();
        assert_eq!(joined, text);
    }

    #[test]
    fn note_payload_captures_parts() {
        let tokens = tokenize("b-16:3").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::Note);
        assert_eq!(tokens[0].payload.as_slice(), &["b", "-", "16", "3"]);

        let tokens = tokenize("c").unwrap();
        assert_eq!(tokens[0].payload.as_slice(), &["c", "", "", ""]);
        assert_eq!(tokens[0].part(7), "");
    }

    #[test]
    fn notes_without_whitespace() {
        let tokens = tokenize("l8cdefgab").unwrap();
        assert_eq!(tokens.len(), 8);
        assert_eq!(tokens[0].payload.as_slice(), &["l", "8"]);
        assert!(tokens[1..].iter().all(|t| t.kind == TokenKind::Note));
    }

    #[test]
    fn lyric_comment_strips_second_marker() {
        let tokens = tokenize("## ka  sa").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::LyricComment);
        assert_eq!(tokens[0].part(0), " ka  sa");

        let tokens = tokenize("# ## not lyrics").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Comment);
    }

    #[test]
    fn sharp_binds_before_lyric_marker() {
        let tokens = tokenize("c## ka").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Note);
        assert_eq!(tokens[0].part(1), "#");
        assert_eq!(tokens[1].kind, TokenKind::Comment);
        assert_eq!(tokens[1].part(0), " ka");

        let tokens = tokenize("c ## ka").unwrap();
        assert_eq!(tokens[0].part(1), "");
        assert_eq!(tokens[2].kind, TokenKind::LyricComment);
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let tokens = tokenize("c # d e f\nd").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            [TokenKind::Note, TokenKind::Ignore, TokenKind::Comment, TokenKind::Ignore, TokenKind::Note]
        );
    }

    #[test]
    fn property_value_may_be_malformed() {
        let tokens = tokenize("t12.5").unwrap();
        assert_eq!(tokens[0].payload.as_slice(), &["t", "12.5"]);
        let tokens = tokenize("o-1").unwrap();
        assert_eq!(tokens[0].payload.as_slice(), &["o", "-1"]);
    }

    #[test]
    fn track_marker_accepts_unicode_names() {
        let tokens = tokenize("@ソプラノ c").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::TrackMarker);
        assert_eq!(tokens[0].part(0), "ソプラノ");
    }

    #[test]
    fn invalid_character_reports_offset() {
        let err = tokenize("cde\nfg x a").unwrap_err();
        assert_eq!(err.character, 'x');
        assert_eq!(err.offset, 7);
        assert_eq!(err.line, 2);
        assert_eq!(err.column, 4);
    }

    #[test]
    fn every_invalid_position_is_reported_exactly() {
        let valid = "t120 l4 cdef gab r";
        for offset in 0..=valid.len() {
            let text = format!("{}%{}", &valid[..offset], &valid[offset..]);
            let err = tokenize(&text).unwrap_err();
            assert_eq!(err.offset, offset, "text {:?}", text);
            assert_eq!(err.character, '%');
        }
    }

    #[test]
    fn iterator_fuses_after_error() {
        let mut tokens = Tokenizer::new("c!d");
        assert!(tokens.next().unwrap().is_ok());
        assert!(tokens.next().unwrap().is_err());
        assert!(tokens.next().is_none());
    }

    #[test]
    fn uppercase_letters_are_invalid() {
        assert_eq!(tokenize("C").unwrap_err().character, 'C');
    }
}
