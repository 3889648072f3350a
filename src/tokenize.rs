//! Command-line tokenizer
//!
//! Splits a command string into argv words the way a POSIX shell would for
//! plain words, without any of the shell's operators:
//! 1. Whitespace separates words
//! 2. Single quotes are literal
//! 3. Double quotes allow `\"` and `\\` escapes
//! 4. A backslash outside quotes escapes the next character
//!
//! Quotes can appear mid-word (`--outDir="my dist"` is one word), and an
//! empty quoted string is kept as an empty argument.

use std::iter::Peekable;
use std::str::Chars;

/// Tokenizer error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Unterminated quoted string
    UnterminatedQuote(char),
    /// Backslash at the very end of input
    DanglingEscape,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnterminatedQuote(c) => write!(f, "unterminated {} quote", c),
            Self::DanglingEscape => write!(f, "trailing backslash"),
        }
    }
}

impl std::error::Error for ParseError {}

struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
            } else {
                break;
            }
        }
    }

    fn next_word(&mut self) -> Result<Option<String>, ParseError> {
        self.skip_whitespace();
        if self.chars.peek().is_none() {
            return Ok(None);
        }

        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            match c {
                c if c.is_whitespace() => break,
                '"' | '\'' => {
                    self.chars.next();
                    word.push_str(&self.read_quoted_content(c)?);
                }
                '\\' => {
                    self.chars.next();
                    match self.chars.next() {
                        Some(escaped) => word.push(escaped),
                        None => return Err(ParseError::DanglingEscape),
                    }
                }
                _ => {
                    word.push(c);
                    self.chars.next();
                }
            }
        }

        Ok(Some(word))
    }

    fn read_quoted_content(&mut self, quote: char) -> Result<String, ParseError> {
        let mut content = String::new();

        loop {
            match self.chars.next() {
                Some(c) if c == quote => break,
                Some('\\') if quote == '"' => match self.chars.next() {
                    Some(escaped @ ('"' | '\\')) => content.push(escaped),
                    Some(other) => {
                        content.push('\\');
                        content.push(other);
                    }
                    None => return Err(ParseError::UnterminatedQuote(quote)),
                },
                Some(c) => content.push(c),
                None => return Err(ParseError::UnterminatedQuote(quote)),
            }
        }

        Ok(content)
    }
}

/// Split a command line into its argument words
pub fn tokenize_args(input: &str) -> Result<Vec<String>, ParseError> {
    let mut lexer = Lexer::new(input);
    let mut words = Vec::new();
    while let Some(word) = lexer.next_word()? {
        words.push(word);
    }
    Ok(words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_words() {
        let args = tokenize_args("tsc index.ts --outDir dist").unwrap();
        assert_eq!(args, vec!["tsc", "index.ts", "--outDir", "dist"]);
    }

    #[test]
    fn test_extra_whitespace() {
        let args = tokenize_args("  tsc \t index.ts\n").unwrap();
        assert_eq!(args, vec!["tsc", "index.ts"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize_args("").unwrap().is_empty());
        assert!(tokenize_args("   ").unwrap().is_empty());
    }

    #[test]
    fn test_quotes() {
        let args = tokenize_args(r#"tsc "my file.ts" 'it''s'"#).unwrap();
        assert_eq!(args, vec!["tsc", "my file.ts", "its"]);
    }

    #[test]
    fn test_quote_mid_word() {
        let args = tokenize_args(r#"--outDir="out dir" x"#).unwrap();
        assert_eq!(args, vec!["--outDir=out dir", "x"]);
    }

    #[test]
    fn test_empty_quoted_argument_is_kept() {
        let args = tokenize_args(r#"a "" b"#).unwrap();
        assert_eq!(args, vec!["a", "", "b"]);
    }

    #[test]
    fn test_escapes() {
        let args = tokenize_args(r#"a\ b "say \"hi\"" "c:\d""#).unwrap();
        assert_eq!(args, vec!["a b", "say \"hi\"", "c:\\d"]);
    }

    #[test]
    fn test_single_quotes_are_literal() {
        let args = tokenize_args(r#"'a\"b'"#).unwrap();
        assert_eq!(args, vec![r#"a\"b"#]);
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            tokenize_args("tsc \"open"),
            Err(ParseError::UnterminatedQuote('"'))
        );
        assert_eq!(
            tokenize_args("tsc 'open"),
            Err(ParseError::UnterminatedQuote('\''))
        );
        assert_eq!(tokenize_args("tsc \\"), Err(ParseError::DanglingEscape));
    }
}
