//! Tokens for free-form G-code text blocks (preamble, postamble, ...)
//! Only the words matter to the post; comments and stray characters are
//! dropped.

use logos::Logos;

/// One letter/number pair such as `G21` or `X-1.5`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Word {
    pub letter: char,
    pub number: f64,
}

impl Word {
    pub fn is(&self, letter: char, number: f64) -> bool {
        self.letter == letter && self.number == number
    }
}

fn word(lex: &mut logos::Lexer<Token>) -> Option<Word> {
    let slice = lex.slice();
    let letter = slice.chars().next()?.to_ascii_uppercase();
    let number = slice[1..].parse::<f64>().ok()?;
    Some(Word { letter, number })
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f\r]+")] // Skip whitespace
#[logos(error = LexerError)]
pub enum Token {
    #[regex(r"[A-Za-z][+-]?([0-9]+\.?[0-9]*|\.[0-9]+)", word)]
    Word(Word),

    #[token("\n")]
    Newline,

    // Comments
    #[regex(r"\([^)\n]*\)", logos::skip)]
    #[regex(r";[^\n]*", logos::skip)]
    Comment,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LexerError;

impl std::fmt::Display for LexerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lexer error")
    }
}

impl std::error::Error for LexerError {}

/// Lex the input string into tokens
pub fn lex(input: &str) -> Vec<(Token, logos::Span)> {
    Token::lexer(input)
        .spanned()
        .filter_map(|(result, span)| match result {
            Ok(token) => Some((token, span)),
            Err(_) => None, // Unknown characters (%, #, ...) are not our business
        })
        .collect()
}

/// All words of a block, in order.
pub fn words(input: &str) -> Vec<Word> {
    lex(input)
        .into_iter()
        .filter_map(|(token, _)| match token {
            Token::Word(w) => Some(w),
            _ => None,
        })
        .collect()
}
