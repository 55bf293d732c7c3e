use std::sync::Arc;

use phf::phf_map;

use crate::SourceMap;

#[derive(PartialEq, Eq, Clone, Debug, Copy)]
#[repr(u8)]
pub enum TokenType {
    LeftParen,     // (
    RightParen,    // )
    LeftBrace,     // {
    RightBrace,    // }
    Comma,         // ,
    Dot,           // .
    Minus,         // -
    Plus,          // +
    Semicolon,     // ;
    Slash,         // /
    Star,          // *
    Bang,          // !
    BangEquals,    // !=
    Equals,        // =
    EqualsEquals,  // ==
    Greater,       // >
    GreaterEquals, // >=
    Less,          // <
    LessEquals,    // <=
    Identifier,
    String,
    Number,
    And,
    Class,
    Else,
    False,
    For,
    Fun,
    If,
    Nil,
    Or,
    Print,
    Return,
    Super,
    This,
    True,
    Var,
    While,
    Error,
    Eof,
}

impl TokenType {
    pub fn from_keyword(keyword: &str) -> TokenType {
        *KEYWORDS.get(keyword).unwrap_or(&TokenType::Identifier)
    }
}

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::And,
    "class" => TokenType::Class,
    "else" => TokenType::Else,
    "false" => TokenType::False,
    "for" => TokenType::For,
    "fun" => TokenType::Fun,
    "if" => TokenType::If,
    "nil" => TokenType::Nil,
    "or" => TokenType::Or,
    "print" => TokenType::Print,
    "return" => TokenType::Return,
    "super" => TokenType::Super,
    "this" => TokenType::This,
    "true" => TokenType::True,
    "var" => TokenType::Var,
    "while" => TokenType::While,
};

#[derive(PartialEq, Clone, Debug)]
pub struct Token {
    pub token_type: TokenType,
    pub start: usize,
    pub end: usize,
    pub error_message: Option<String>,
}

impl Token {
    pub fn lexeme<'a>(&self, source_map: &'a SourceMap) -> &'a [char] {
        &source_map.get_source()[self.start..self.end]
    }

    pub fn line(&self, source_map: &SourceMap) -> u32 {
        source_map.get_line_number(self.start)
    }
}

impl Default for Token {
    fn default() -> Self {
        Self {
            token_type: TokenType::Eof,
            start: 0,
            end: 0,
            error_message: None,
        }
    }
}

/// Produces one token at a time on demand. Once the end of input is
/// reached, `next_token` keeps returning `Eof` tokens.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    source_map: Arc<SourceMap>,
    location: usize,
    finished: bool,
}

impl Tokenizer {
    pub fn new(source_map: Arc<SourceMap>) -> Self {
        Self {
            source_map,
            location: 0,
            finished: false,
        }
    }

    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();

        if self.is_at_end() {
            self.finished = true;
            return Token {
                token_type: TokenType::Eof,
                start: self.location,
                end: self.location,
                error_message: None,
            };
        }

        let start = self.location;
        let c = self.advance();

        match c {
            '(' => self.make_token(TokenType::LeftParen, start),
            ')' => self.make_token(TokenType::RightParen, start),
            '{' => self.make_token(TokenType::LeftBrace, start),
            '}' => self.make_token(TokenType::RightBrace, start),
            ',' => self.make_token(TokenType::Comma, start),
            '.' => self.make_token(TokenType::Dot, start),
            '-' => self.make_token(TokenType::Minus, start),
            '+' => self.make_token(TokenType::Plus, start),
            ';' => self.make_token(TokenType::Semicolon, start),
            '*' => self.make_token(TokenType::Star, start),
            '/' => self.make_token(TokenType::Slash, start),
            '!' if self.match_char('=') => self.make_token(TokenType::BangEquals, start),
            '!' => self.make_token(TokenType::Bang, start),
            '=' if self.match_char('=') => self.make_token(TokenType::EqualsEquals, start),
            '=' => self.make_token(TokenType::Equals, start),
            '<' if self.match_char('=') => self.make_token(TokenType::LessEquals, start),
            '<' => self.make_token(TokenType::Less, start),
            '>' if self.match_char('=') => self.make_token(TokenType::GreaterEquals, start),
            '>' => self.make_token(TokenType::Greater, start),
            '"' => self.string(start),
            c if c.is_ascii_digit() => self.number(start),
            c if c.is_ascii_alphabetic() || c == '_' => self.identifier(start),
            _ => self.error_token(start, format!("Unexpected character: '{}'.", c)),
        }
    }

    fn advance(&mut self) -> char {
        let c = self.source_map.get_source()[self.location];
        self.location += 1;
        c
    }

    fn peek_char(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source_map.get_source()[self.location]
        }
    }

    fn peek_next_char(&self) -> char {
        if self.location + 1 >= self.source_map.get_source().len() {
            '\0'
        } else {
            self.source_map.get_source()[self.location + 1]
        }
    }

    fn is_at_end(&self) -> bool {
        self.location >= self.source_map.get_source().len()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek_char() != expected {
            false
        } else {
            self.location += 1;
            true
        }
    }

    fn skip_whitespace(&mut self) {
        loop {
            match self.peek_char() {
                ' ' | '\r' | '\t' | '\n' => {
                    self.location += 1;
                }
                '/' if self.peek_next_char() == '/' => {
                    while self.peek_char() != '\n' && !self.is_at_end() {
                        self.location += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn make_token(&self, token_type: TokenType, start: usize) -> Token {
        Token {
            token_type,
            start,
            end: self.location,
            error_message: None,
        }
    }

    fn error_token(&self, start: usize, message: String) -> Token {
        Token {
            token_type: TokenType::Error,
            start,
            end: self.location,
            error_message: Some(message),
        }
    }

    fn string(&mut self, start: usize) -> Token {
        while self.peek_char() != '"' && !self.is_at_end() {
            if self.peek_char() == '\n' {
                return self.error_token(start, "Unterminated string.".to_string());
            }

            if self.peek_char() == '\\' {
                self.location += 1;
                match self.peek_char() {
                    'n' | 't' | 'r' | '\\' | '"' | '\'' | '0' => {
                        self.location += 1;
                    }
                    escaped => {
                        return self.error_token(
                            start,
                            format!("Invalid escape sequence: \\{}.", escaped),
                        );
                    }
                }
            } else {
                self.location += 1;
            }
        }

        if self.is_at_end() {
            return self.error_token(start, "Unterminated string.".to_string());
        }

        self.location += 1; // closing quote
        self.make_token(TokenType::String, start)
    }

    fn number(&mut self, start: usize) -> Token {
        while self.peek_char().is_ascii_digit() {
            self.location += 1;
        }

        if self.peek_char() == '.' && self.peek_next_char().is_ascii_digit() {
            self.location += 1;
            while self.peek_char().is_ascii_digit() {
                self.location += 1;
            }
        }

        self.make_token(TokenType::Number, start)
    }

    fn identifier(&mut self, start: usize) -> Token {
        while self.peek_char().is_ascii_alphanumeric() || self.peek_char() == '_' {
            self.location += 1;
        }

        let word: String = self.source_map.get_source()[start..self.location]
            .iter()
            .collect();

        self.make_token(TokenType::from_keyword(&word), start)
    }
}

impl Iterator for Tokenizer {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            None
        } else {
            Some(self.next_token())
        }
    }
}
