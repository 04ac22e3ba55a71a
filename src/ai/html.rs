//! 以正規表達式處理文章 HTML：清理、擷取摘要、閱讀時間、插入圖片

use regex::Regex;
use std::sync::OnceLock;

const WORDS_PER_MINUTE: usize = 200;

fn regex(cell: &'static OnceLock<Regex>, pattern: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(pattern).expect("static html regex is valid"))
}

fn script_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r"(?is)<(script|style|iframe|object|embed)\b[^>]*>.*?</(script|style|iframe|object|embed)\s*>",
    )
}

fn dangling_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?i)</?(script|style|iframe|object|embed)\b[^>]*>")
}

fn event_attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r#"(?i)[\s/]+on[a-z]+\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#)
}

fn js_url_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(
        &RE,
        r#"(?i)\b(href|src|action|formaction)\s*=\s*("\s*javascript:[^"]*"|'\s*javascript:[^']*'|javascript:[^\s>]*)"#,
    )
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?s)<[^>]*>")
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"\s+")
}

fn h2_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    regex(&RE, r"(?is)<h2\b[^>]*>.*?</h2\s*>")
}

/// 移除可執行內容：script/style 等區塊、on* 事件屬性、javascript: 連結
pub fn sanitize(html: &str) -> String {
    let cleaned = script_re().replace_all(html, "");
    let cleaned = dangling_tag_re().replace_all(&cleaned, "");
    let cleaned = event_attr_re().replace_all(&cleaned, "");
    js_url_re()
        .replace_all(&cleaned, "${1}=\"#\"")
        .trim()
        .to_string()
}

/// 轉為純文字並壓縮空白
pub fn strip_tags(html: &str) -> String {
    let without_blocks = script_re().replace_all(html, " ");
    let text = tag_re().replace_all(&without_blocks, " ");
    let text = decode_entities(&text);
    whitespace_re().replace_all(&text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// 取前 `max_chars` 個字元的純文字摘要，在字詞邊界截斷並加上 "…"
pub fn excerpt(html: &str, max_chars: usize) -> String {
    let text = strip_tags(html);
    if text.chars().count() <= max_chars {
        return text;
    }

    let cut: String = text.chars().take(max_chars).collect();
    let trimmed = match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => &cut[..pos],
        _ => cut.as_str(),
    };
    let trimmed = trimmed.trim_end_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace());
    format!("{}…", trimmed)
}

pub fn word_count(html: &str) -> usize {
    strip_tags(html).split_whitespace().count()
}

/// 以每分鐘 200 字估算，至少 1 分鐘
pub fn reading_minutes(html: &str) -> u32 {
    let words = word_count(html);
    let minutes = words.div_ceil(WORDS_PER_MINUTE).max(1);
    u32::try_from(minutes).unwrap_or(u32::MAX)
}

/// 標題錨點 id
pub fn heading_id(text: &str) -> String {
    let text = strip_tags(text);
    if text.chars().any(|c| c.is_ascii_alphanumeric()) {
        crate::core::store::slugify(&text)
    } else {
        "section".to_string()
    }
}

pub fn figure(src: &str, alt: &str) -> String {
    format!(
        "<figure><img src=\"{}\" alt=\"{}\" loading=\"lazy\"></figure>",
        escape(src),
        escape(alt)
    )
}

/// 在第 `index` 個 (從 0 起算) `<h2>` 之後插入片段；找不到時回傳 `None`
pub fn insert_after_heading(html: &str, index: usize, snippet: &str) -> Option<String> {
    let heading = h2_re().find_iter(html).nth(index)?;
    let mut out = String::with_capacity(html.len() + snippet.len());
    out.push_str(&html[..heading.end()]);
    out.push_str(snippet);
    out.push_str(&html[heading.end()..]);
    Some(out)
}

pub fn heading_count(html: &str) -> usize {
    h2_re().find_iter(html).count()
}
