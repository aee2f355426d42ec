use compile::lexer::{lex, TokenKind};
use nu_ansi_term::{Color, Style};
use reedline::{Highlighter, StyledText};

pub(crate) struct SqlHighlighter;

impl SqlHighlighter {
    pub(crate) fn new() -> Self {
        SqlHighlighter
    }
}

fn style_of(token: &TokenKind) -> Style {
    match token {
        token if token.is_keyword() => Style::new().fg(Color::Green),
        token if token.is_operator() => Style::new().fg(Color::Magenta),
        TokenKind::Integer(_) | TokenKind::Float(_) | TokenKind::Star => {
            Style::new().fg(Color::Yellow)
        }
        TokenKind::String(_) => Style::new().fg(Color::LightRed),
        TokenKind::Ident(_) => Style::new().fg(Color::LightBlue),
        _ => Style::new().fg(Color::DarkGray),
    }
}

impl Highlighter for SqlHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled_text = StyledText::new();
        let mut position = 0;

        for (token, span) in lex(line) {
            if span.start > position {
                styled_text.push((Style::new(), line[position..span.start].to_string()));
            }
            let style = match &token {
                Ok(token) => style_of(token),
                Err(_) => Style::new().fg(Color::Red).underline(),
            };
            styled_text.push((style, line[span.clone()].to_string()));
            position = span.end;
        }
        if position < line.len() {
            styled_text.push((Style::new(), line[position..].to_string()));
        }

        styled_text
    }
}
