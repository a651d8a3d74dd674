use log::info;
use serde::Serialize;
use std::fmt;
use std::mem;

/// The different kinds of tokens the Qanun scanner produces.
///
/// Variants without data represent single/double‑character operators and
/// keywords.  `STRING(String)` and `NUMBER(f64)` carry their literal values.
/// `IDENTIFIER` is used for user‑defined names.  `EOF` marks the end of input.
///
/// The core never scans source text itself; this type is the interface it
/// consumes from the external scanner.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Serialize)]
pub enum TokenType {
    /// '('
    LEFT_PAREN,

    /// ')'
    RIGHT_PAREN,

    /// '{'
    LEFT_BRACE,

    /// '}'
    RIGHT_BRACE,

    /// '['
    LEFT_BRACKET,

    /// ']'
    RIGHT_BRACKET,

    /// ','
    COMMA,

    /// '.'
    DOT,

    /// ':'
    COLON,

    /// ';'
    SEMICOLON,

    /// '?'
    QUESTION_MARK,

    /// '-'
    MINUS,

    /// '--'
    MINUS_MINUS,

    /// '+'
    PLUS,

    /// '++'
    PLUS_PLUS,

    /// '/'
    SLASH,

    /// '*'
    STAR,

    /// '%'
    PERCENT,

    /// '!'
    BANG,

    /// '!='
    BANG_EQUAL,

    /// '='
    EQUAL,

    /// '=='
    EQUAL_EQUAL,

    /// '>'
    GREATER,

    /// '>='
    GREATER_EQUAL,

    /// '<'
    LESS,

    /// '<='
    LESS_EQUAL,

    /// A user‑defined identifier
    IDENTIFIER,

    /// A string literal (contents without quotes)
    STRING(String),

    /// A numeric literal
    NUMBER(f64),

    /// 'and'
    AND,

    /// 'or'
    OR,

    /// 'break'
    BREAK,

    /// 'case'
    CASE,

    /// 'class'
    CLASS,

    /// 'continue'
    CONTINUE,

    /// 'default'
    DEFAULT,

    /// 'else'
    ELSE,

    /// 'false'
    FALSE,

    /// 'fun'
    FUN,

    /// 'for'
    FOR,

    /// 'foreach'
    FOREACH,

    /// 'if'
    IF,

    /// 'import'
    IMPORT,

    /// 'module'
    MODULE,

    /// 'nil'
    NIL,

    /// 'return'
    RETURN,

    /// 'static'
    STATIC,

    /// 'super'
    SUPER,

    /// 'switch'
    SWITCH,

    /// 'this'
    THIS,

    /// 'true'
    TRUE,

    /// 'val'
    VAL,

    /// 'var'
    VAR,

    /// 'while'
    WHILE,

    /// End‑of‑file marker
    EOF,
}

impl PartialEq for TokenType {
    /// Two TokenTypes are equal if they share the same variant
    /// (ignoring any inner data). Uses `mem::discriminant` to compare.
    fn eq(&self, other: &Self) -> bool {
        mem::discriminant(self) == mem::discriminant(other)
    }
}

/// A scanned token: its kind, the original lexeme, and the 1‑based source
/// line where it was found.
///
/// Tokens are the opaque identity behind every variable and field name; the
/// environment and resolver compare them by lexeme text only.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Token {
    /// The category of this token.
    pub token_type: TokenType,

    /// The exact substring from the source that produced this token.
    pub lexeme: String,

    /// 1‑based line number in the source.
    pub line: usize,
}

impl Token {
    /// Create a new Token with the given type, lexeme, and line.
    pub fn new(token_type: TokenType, lexeme: impl Into<String>, line: usize) -> Self {
        let lexeme: String = lexeme.into();

        info!(
            "Creating new token: type={:?}, lexeme={}, line={}",
            token_type, lexeme, line
        );

        Self {
            token_type,
            lexeme,
            line,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.token_type == TokenType::EOF {
            write!(f, "end")
        } else {
            write!(f, "{}", self.lexeme)
        }
    }
}
