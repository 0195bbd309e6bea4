//! Minimal Markdown to HTML conversion for model narratives
//!
//! Covers what analysis replies actually use: ATX headings, paragraphs,
//! bullet and numbered lists, block quotes, fenced code, rules, and inline
//! strong/emphasis/code. Everything else passes through as escaped text.

/// Escape text for HTML bodies and attributes
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render inline spans
fn inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;

    while i < text.len() {
        let rest = &text[i..];

        if let Some(body) = rest.strip_prefix('`') {
            if let Some(end) = body.find('`') {
                out.push_str("<code>");
                out.push_str(&escape_html(&body[..end]));
                out.push_str("</code>");
                i += end + 2;
                continue;
            }
        } else if let Some(body) = rest.strip_prefix("**") {
            if let Some(end) = body.find("**").filter(|&e| e > 0) {
                out.push_str("<strong>");
                out.push_str(&inline(&body[..end]));
                out.push_str("</strong>");
                i += end + 4;
                continue;
            }
        } else if let Some(body) = rest.strip_prefix('*') {
            if let Some(end) = body.find('*').filter(|&e| e > 0) {
                out.push_str("<em>");
                out.push_str(&inline(&body[..end]));
                out.push_str("</em>");
                i += end + 2;
                continue;
            }
        }

        let c = rest.chars().next().unwrap_or_default();
        out.push_str(&escape_html(c.encode_utf8(&mut [0; 4])));
        i += c.len_utf8().max(1);
    }

    out
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Ordered,
}

impl ListKind {
    fn tag(self) -> &'static str {
        match self {
            Self::Bullet => "ul",
            Self::Ordered => "ol",
        }
    }
}

fn list_item(line: &str) -> Option<(ListKind, &str)> {
    for marker in ["- ", "* ", "+ "] {
        if let Some(item) = line.strip_prefix(marker) {
            return Some((ListKind::Bullet, item));
        }
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        if let Some(item) = line[digits..]
            .strip_prefix(". ")
            .or_else(|| line[digits..].strip_prefix(") "))
        {
            return Some((ListKind::Ordered, item));
        }
    }
    None
}

fn heading(line: &str) -> Option<(usize, &str)> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&level) {
        let text = line[level..].strip_prefix(' ')?;
        return Some((level, text.trim_end_matches('#').trim()));
    }
    None
}

fn is_rule(line: &str) -> bool {
    let compact: String = line.chars().filter(|c| !c.is_whitespace()).collect();
    compact.len() >= 3
        && ["-", "*", "_"]
            .iter()
            .any(|m| compact.chars().all(|c| c.to_string() == *m))
}

#[derive(Default)]
struct Renderer {
    html: String,
    paragraph: Vec<String>,
    quote: Vec<String>,
    list: Option<ListKind>,
}

impl Renderer {
    fn flush_paragraph(&mut self) {
        if !self.paragraph.is_empty() {
            let text = self.paragraph.join(" ");
            self.html.push_str(&format!("<p>{}</p>\n", inline(&text)));
            self.paragraph.clear();
        }
    }

    fn flush_quote(&mut self) {
        if !self.quote.is_empty() {
            let text = self.quote.join(" ");
            self.html
                .push_str(&format!("<blockquote><p>{}</p></blockquote>\n", inline(&text)));
            self.quote.clear();
        }
    }

    fn close_list(&mut self) {
        if let Some(kind) = self.list.take() {
            self.html.push_str(&format!("</{}>\n", kind.tag()));
        }
    }

    fn flush_all(&mut self) {
        self.flush_paragraph();
        self.flush_quote();
        self.close_list();
    }
}

/// Convert Markdown to an HTML fragment
pub fn to_html(markdown: &str) -> String {
    let mut r = Renderer::default();
    let mut code: Option<Vec<String>> = None;

    for raw in markdown.lines() {
        if let Some(block) = code.as_mut() {
            if raw.trim_start().starts_with("```") {
                r.html.push_str(&format!(
                    "<pre><code>{}</code></pre>\n",
                    escape_html(&block.join("\n"))
                ));
                code = None;
            } else {
                block.push(raw.to_string());
            }
            continue;
        }

        let line = raw.trim();

        if line.starts_with("```") {
            r.flush_all();
            code = Some(Vec::new());
        } else if line.is_empty() {
            r.flush_all();
        } else if let Some((level, text)) = heading(line) {
            r.flush_all();
            r.html
                .push_str(&format!("<h{level}>{}</h{level}>\n", inline(text)));
        } else if is_rule(line) {
            r.flush_all();
            r.html.push_str("<hr>\n");
        } else if let Some(text) = line.strip_prefix('>') {
            r.flush_paragraph();
            r.close_list();
            r.quote.push(text.trim().to_string());
        } else if let Some((kind, item)) = list_item(line) {
            r.flush_paragraph();
            r.flush_quote();
            if r.list != Some(kind) {
                r.close_list();
                r.html.push_str(&format!("<{}>\n", kind.tag()));
                r.list = Some(kind);
            }
            r.html.push_str(&format!("<li>{}</li>\n", inline(item)));
        } else {
            r.flush_quote();
            r.close_list();
            r.paragraph.push(line.to_string());
        }
    }

    // Unterminated fence
    if let Some(block) = code {
        r.html.push_str(&format!(
            "<pre><code>{}</code></pre>\n",
            escape_html(&block.join("\n"))
        ));
    }
    r.flush_all();
    r.html
}
