use std::sync::Arc;

use crate::{SourceMap, Token, TokenType, Tokenizer};

fn tokenize(source: &str) -> Vec<Token> {
    Tokenizer::new(Arc::new(SourceMap::new(source.to_string()))).collect()
}

fn token_types(source: &str) -> Vec<TokenType> {
    tokenize(source)
        .into_iter()
        .map(|token| token.token_type)
        .collect()
}

#[test]
fn tokenizes_punctuation_and_operators() {
    assert_eq!(
        token_types("( ) { } , . - + ; / * ! != = == > >= < <="),
        vec![
            TokenType::LeftParen,
            TokenType::RightParen,
            TokenType::LeftBrace,
            TokenType::RightBrace,
            TokenType::Comma,
            TokenType::Dot,
            TokenType::Minus,
            TokenType::Plus,
            TokenType::Semicolon,
            TokenType::Slash,
            TokenType::Star,
            TokenType::Bang,
            TokenType::BangEquals,
            TokenType::Equals,
            TokenType::EqualsEquals,
            TokenType::Greater,
            TokenType::GreaterEquals,
            TokenType::Less,
            TokenType::LessEquals,
            TokenType::Eof,
        ]
    );
}

#[test]
fn tokenizes_keywords_and_identifiers() {
    assert_eq!(
        token_types("and class else false for fun if nil or print return super this true var while foo _bar"),
        vec![
            TokenType::And,
            TokenType::Class,
            TokenType::Else,
            TokenType::False,
            TokenType::For,
            TokenType::Fun,
            TokenType::If,
            TokenType::Nil,
            TokenType::Or,
            TokenType::Print,
            TokenType::Return,
            TokenType::Super,
            TokenType::This,
            TokenType::True,
            TokenType::Var,
            TokenType::While,
            TokenType::Identifier,
            TokenType::Identifier,
            TokenType::Eof,
        ]
    );
}

#[test]
fn tokenizes_literals_with_lexemes() {
    let source_map = Arc::new(SourceMap::new("12 3.75 \"hello\" name".to_string()));
    let tokens: Vec<Token> = Tokenizer::new(source_map.clone()).collect();

    assert_eq!(tokens[0].token_type, TokenType::Number);
    assert_eq!(
        tokens[0].lexeme(&source_map).iter().collect::<String>(),
        "12"
    );
    assert_eq!(tokens[1].token_type, TokenType::Number);
    assert_eq!(
        tokens[1].lexeme(&source_map).iter().collect::<String>(),
        "3.75"
    );
    assert_eq!(tokens[2].token_type, TokenType::String);
    assert_eq!(
        tokens[2].lexeme(&source_map).iter().collect::<String>(),
        "\"hello\""
    );
    assert_eq!(tokens[3].token_type, TokenType::Identifier);
}

#[test]
fn skips_whitespace_and_comments() {
    assert_eq!(
        token_types("// leading comment\nvar x; // trailing\n"),
        vec![
            TokenType::Var,
            TokenType::Identifier,
            TokenType::Semicolon,
            TokenType::Eof,
        ]
    );
}

#[test]
fn reports_unterminated_strings() {
    let tokens = tokenize("\"oops");
    assert_eq!(tokens[0].token_type, TokenType::Error);
    assert_eq!(
        tokens[0].error_message.as_deref(),
        Some("Unterminated string.")
    );
}

#[test]
fn rejects_strings_spanning_lines() {
    let tokens = tokenize("\"first\nsecond\"");
    assert_eq!(tokens[0].token_type, TokenType::Error);
}

#[test]
fn reports_unexpected_characters() {
    let tokens = tokenize("@");
    assert_eq!(tokens[0].token_type, TokenType::Error);
    assert_eq!(
        tokens[0].error_message.as_deref(),
        Some("Unexpected character: '@'.")
    );
}

#[test]
fn validates_escape_sequences() {
    let tokens = tokenize(r#""line\nbreak""#);
    assert_eq!(tokens[0].token_type, TokenType::String);

    let tokens = tokenize(r#""bad\qescape""#);
    assert_eq!(tokens[0].token_type, TokenType::Error);
}

#[test]
fn number_followed_by_dot_is_not_a_fraction() {
    assert_eq!(
        token_types("1.foo"),
        vec![
            TokenType::Number,
            TokenType::Dot,
            TokenType::Identifier,
            TokenType::Eof,
        ]
    );
}

#[test]
fn tracks_token_lines() {
    let source_map = Arc::new(SourceMap::new("var a;\nvar b;".to_string()));
    let tokens: Vec<Token> = Tokenizer::new(source_map.clone()).collect();

    assert_eq!(tokens[0].line(&source_map), 1);
    assert_eq!(tokens[3].line(&source_map), 2);
}
