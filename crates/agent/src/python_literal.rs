//! Permissive parser for Python-style literal structures.
//!
//! Accepts what `json` rejects but chat models commonly emit: single-quoted strings,
//! tuples, `True`/`False`/`None`, trailing commas and tuple dictionary keys. Tuple keys
//! become strings joined with `,` so `('duration', 'y')` turns into `"duration,y"`.

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("literal parse error at byte {offset}: {message}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

pub fn parse(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser { src: input.as_bytes(), text: input, pos: 0 };
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != parser.src.len() {
        return Err(parser.error("trailing characters after literal"));
    }
    Ok(value)
}

struct Parser<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: &str) -> LiteralError {
        LiteralError { offset: self.pos, message: message.to_string() }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_ws(&mut self) {
        while let Some(byte) = self.peek() {
            if byte.is_ascii_whitespace() {
                self.pos += 1;
            } else if byte == b'#' {
                while let Some(byte) = self.peek() {
                    if byte == b'\n' {
                        break;
                    }
                    self.pos += 1;
                }
            } else {
                break;
            }
        }
    }

    fn expect(&mut self, byte: u8) -> Result<(), LiteralError> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected `{}`", byte as char)))
        }
    }

    fn value(&mut self) -> Result<Value, LiteralError> {
        match self.peek() {
            Some(b'{') => self.dict(),
            Some(b'[') => self.sequence(b'[', b']').map(Value::Array),
            Some(b'(') => self.sequence(b'(', b')').map(Value::Array),
            Some(b'\'') | Some(b'"') => self.string().map(Value::String),
            Some(byte) if byte == b'-' || byte == b'+' || byte == b'.' || byte.is_ascii_digit() => {
                self.number()
            }
            Some(byte) if byte.is_ascii_alphabetic() => self.keyword(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn dict(&mut self) -> Result<Value, LiteralError> {
        self.expect(b'{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(b'}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }
            let key = self.value()?;
            self.skip_ws();
            self.expect(b':')?;
            self.skip_ws();
            let value = self.value()?;
            map.insert(key_string(&key), value);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {}
                _ => return Err(self.error("expected `,` or `}` in dict")),
            }
        }
    }

    fn sequence(&mut self, open: u8, close: u8) -> Result<Vec<Value>, LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(items);
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(byte) if byte == close => {}
                _ => return Err(self.error("expected `,` or closing bracket")),
            }
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let quote = self.peek().ok_or_else(|| self.error("expected string"))?;
        self.pos += 1;
        let text = self.text;
        let mut out = String::new();
        loop {
            let rest = &text[self.pos..];
            let mut chars = rest.chars();
            let ch = chars.next().ok_or_else(|| self.error("unterminated string"))?;
            self.pos += ch.len_utf8();
            match ch {
                '\\' => {
                    let escaped = chars.next().ok_or_else(|| self.error("dangling escape"))?;
                    self.pos += escaped.len_utf8();
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        'u' => out.push(self.unicode_escape()?),
                        '\n' => {}
                        other => out.push(other),
                    }
                }
                ch if ch as u32 == u32::from(quote) => return Ok(out),
                ch => out.push(ch),
            }
        }
    }

    fn unicode_escape(&mut self) -> Result<char, LiteralError> {
        let end = self.pos + 4;
        let hex = self.text.get(self.pos..end).ok_or_else(|| self.error("short \\u escape"))?;
        let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("invalid \\u escape"))?;
        self.pos = end;
        char::from_u32(code).ok_or_else(|| self.error("invalid code point"))
    }

    fn number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte.is_ascii_digit() || matches!(byte, b'-' | b'+' | b'.' | b'e' | b'E' | b'_') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let raw: String = self.text[start..self.pos].chars().filter(|c| *c != '_').collect();
        if let Ok(int) = raw.parse::<i64>() {
            return Ok(Value::Number(int.into()));
        }
        raw.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError { offset: start, message: format!("invalid number `{raw}`") })
    }

    fn keyword(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while let Some(byte) = self.peek() {
            if byte.is_ascii_alphanumeric() || byte == b'_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        match &self.text[start..self.pos] {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" => Ok(Value::Null),
            other => Err(LiteralError { offset: start, message: format!("unknown name `{other}`") }),
        }
    }
}

fn key_string(key: &Value) -> String {
    match key {
        Value::String(text) => text.clone(),
        Value::Array(items) => items.iter().map(key_string).collect::<Vec<_>>().join(","),
        Value::Null => "None".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::parse;

    #[test]
    fn parses_python_dict_with_tuple_keys_and_trailing_commas() {
        let value = parse(
            "{'target_col': 'y', 'flags': (True, False, None),\n \
             'inference_bivariate': {('duration', 'y'): 'Longer calls convert',},\n \
             'ratio': 0.25, 'count': -3,}",
        )
        .expect("literal should parse");

        assert_eq!(
            value,
            json!({
                "target_col": "y",
                "flags": [true, false, null],
                "inference_bivariate": {"duration,y": "Longer calls convert"},
                "ratio": 0.25,
                "count": -3
            })
        );
    }

    #[test]
    fn keeps_escaped_quotes_and_unicode() {
        let value = parse(r#"{'note': 'the customer\'s job', "emoji": "📌 ok", 'u': 'é'}"#)
            .expect("literal should parse");
        assert_eq!(value["note"], "the customer's job");
        assert_eq!(value["emoji"], "📌 ok");
        assert_eq!(value["u"], "é");
    }

    #[test]
    fn rejects_unbalanced_or_trailing_input() {
        assert!(parse("{'a': 1").is_err());
        assert!(parse("{'a': 1} and more").is_err());
        assert!(parse("{'a': undefined}").is_err());
    }
}
