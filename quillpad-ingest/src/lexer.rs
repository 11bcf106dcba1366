//! Lenient tokenizer for pasted markup.
//!
//! External paste sources produce everything from tidy article markup to
//! office-suite soup, so the tokenizer never fails: anything it cannot read
//! as a tag is emitted as text. Comments, doctypes, and processing
//! instructions are skipped; script/style bodies are consumed raw and
//! dropped.

/// One lexical unit of markup.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Open {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    Close(String),
    Text(String),
}

struct Scanner<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src: src.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn starts_with(&self, s: &str) -> bool {
        self.src[self.pos..]
            .iter()
            .zip(s.as_bytes())
            .filter(|(a, b)| a.eq_ignore_ascii_case(b))
            .count()
            == s.len()
    }

    fn skip_until(&mut self, marker: &str) {
        while !self.is_eof() && !self.starts_with(marker) {
            self.pos += 1;
        }
        self.pos = (self.pos + marker.len()).min(self.src.len());
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn read_name(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'-' || b == b':')
        {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).to_ascii_lowercase()
    }

    fn read_attr_value(&mut self) -> String {
        match self.peek() {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let start = self.pos;
                while !self.is_eof() && self.peek() != Some(quote) {
                    self.pos += 1;
                }
                let value = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                self.bump(); // closing quote
                value
            }
            _ => {
                let start = self.pos;
                while matches!(self.peek(), Some(b) if !b.is_ascii_whitespace() && b != b'>') {
                    self.pos += 1;
                }
                String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
            }
        }
    }

    /// Parse the inside of a tag after `<name`. Returns attrs and whether
    /// the tag self-closes. Stops past the closing `>` (or EOF).
    fn read_tag_rest(&mut self) -> (Vec<(String, String)>, bool) {
        let mut attrs = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(b'>') => {
                    self.pos += 1;
                    break;
                }
                Some(b'/') => {
                    self.pos += 1;
                    self_closing = true;
                }
                Some(_) => {
                    let name = self.read_name();
                    if name.is_empty() {
                        // unreadable byte inside a tag; step over it
                        self.pos += 1;
                        continue;
                    }
                    self.skip_whitespace();
                    let value = if self.peek() == Some(b'=') {
                        self.pos += 1;
                        self.skip_whitespace();
                        self.read_attr_value()
                    } else {
                        String::new()
                    };
                    attrs.push((name, decode_entities(&value)));
                }
            }
        }

        (attrs, self_closing)
    }

    fn read_text(&mut self) -> String {
        let start = self.pos;
        while !self.is_eof() && self.peek() != Some(b'<') {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }
}

/// Tokenize markup. Never fails; hopeless input degrades to text tokens.
pub fn tokenize(markup: &str) -> Vec<Token> {
    let mut scanner = Scanner::new(markup);
    let mut tokens = Vec::new();

    while !scanner.is_eof() {
        if scanner.peek() != Some(b'<') {
            let text = scanner.read_text();
            if !text.is_empty() {
                tokens.push(Token::Text(decode_entities(&text)));
            }
            continue;
        }

        if scanner.starts_with("<!--") {
            scanner.pos += 4;
            scanner.skip_until("-->");
            continue;
        }
        if scanner.starts_with("<!") || scanner.starts_with("<?") {
            scanner.skip_until(">");
            continue;
        }
        if scanner.starts_with("</") {
            scanner.pos += 2;
            let name = scanner.read_name();
            scanner.skip_until(">");
            if !name.is_empty() {
                tokens.push(Token::Close(name));
            }
            continue;
        }

        // candidate open tag
        let mark = scanner.pos;
        scanner.pos += 1;
        let name = scanner.read_name();
        if name.is_empty() {
            // a bare '<' in text
            scanner.pos = mark + 1;
            tokens.push(Token::Text("<".to_string()));
            continue;
        }
        let (attrs, self_closing) = scanner.read_tag_rest();

        // script/style bodies are raw text we never ingest
        if !self_closing && (name == "script" || name == "style") {
            scanner.skip_until(&format!("</{name}"));
            scanner.skip_until(">");
            continue;
        }

        tokens.push(Token::Open {
            name,
            attrs,
            self_closing,
        });
    }

    tokens
}

/// Decode the handful of entities common in pasted markup. Unknown
/// entities pass through verbatim.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let window = &rest.as_bytes()[..rest.len().min(10)];
        let semi = match window.iter().position(|&b| b == b';') {
            Some(i) => i,
            None => {
                out.push('&');
                rest = &rest[1..];
                continue;
            }
        };
        let entity = &rest[1..semi];
        let decoded = match entity {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some(' '),
            _ => entity.strip_prefix('#').and_then(|num| {
                let code = if let Some(hex) = num.strip_prefix(['x', 'X']) {
                    u32::from_str_radix(hex, 16).ok()
                } else {
                    num.parse::<u32>().ok()
                };
                code.and_then(char::from_u32)
            }),
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
