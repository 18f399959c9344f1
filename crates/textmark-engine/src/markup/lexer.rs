//! # Lexer - Tokenizing Markup Source
//!
//! Breaks an HTML/XML-ish fixture into a flat token stream using the
//! [Logos] lexer generator.
//!
//! [Logos]: https://docs.rs/logos
//!
//! Like the rest of the reader this is deliberately tag-soup tolerant: a
//! `<` that does not start a well-formed tag is lexed as text, and every
//! byte of the input ends up in exactly one token.
//!
//! ```
//! use textmark_engine::markup::lexer::lex;
//!
//! let input = "<p class=\"x\">a &lt; b</p>";
//! let reconstructed: String = lex(input).iter().map(|t| t.text).collect();
//! assert_eq!(input, reconstructed);
//! ```

use logos::Logos;

/// Token kinds produced by the Logos lexer.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// `<!DOCTYPE html>` or `<!-- comment -->`; dropped by the builder.
    /// Comments may contain `>`.
    #[regex(r"<![^>]*>")]
    #[regex(r"<!--([^-]|-[^-])*-->")]
    Declaration,

    /// `</p>`
    #[regex(r"</[A-Za-z][A-Za-z0-9:_-]*[ \t\r\n]*>")]
    CloseTag,

    /// `<p class="x">`, `<br/>`
    #[regex(r#"<[A-Za-z][A-Za-z0-9:_-]*([^>"]|"[^"]*")*>"#)]
    OpenTag,

    /// Character data between tags
    #[regex(r"[^<]+")]
    Text,
}

/// A lexed token with its kind and source slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
}

/// Lex the input into a sequence of tokens.
///
/// Unrecognised input (a lone `<`) becomes a `Text` token so nothing is lost.
pub fn lex(input: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut lexer = TokenKind::lexer(input);

    while let Some(result) = lexer.next() {
        let text = lexer.slice();
        let kind = result.unwrap_or(TokenKind::Text);
        tokens.push(Token { kind, text });
    }

    tokens
}
