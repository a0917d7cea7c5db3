//! Heuristic extraction of company facts from free-form generated text.
//!
//! Each field has an ordered list of pattern rules; the first rule that
//! matches wins. Fields with no matching rule stay empty. Nothing here fails.

use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::Entity;

const MAX_INVESTORS: usize = 12;
const MAX_HEADLINES: usize = 10;
const MAX_FIELD_CHARS: usize = 120;

fn rules(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| Regex::new(pattern).expect("invalid extraction regex"))
        .collect()
}

static FOUNDING_YEAR: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"(?i)founding\s+year\s*[:\-]\s*(\d{4})",
        r"(?i)\bfounded\s*(?::|in|-)?\s*(?:[A-Za-z]+\s+)?(\d{4})",
        r"(?i)\bestablished\s*(?::|in|-)?\s*(\d{4})",
        r"(?i)\bincorporated\s+in\s+(\d{4})",
    ])
});

static LOCATION: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"(?i)headquarters\s*[:\-]\s*([^\n;]+)",
        r"(?i)headquartered\s+in\s+([^\n;]+)",
        r"(?i)\blocation\s*[:\-]\s*([^\n;]+)",
        r"(?i)\bbased\s+in\s+([^\n;]+)",
    ])
});

static FOCUS_AREA: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"(?i)focus\s+area\s*[:\-]\s*([^\n;.]+)",
        r"(?i)\bindustry\s*[:\-]\s*([^\n;.]+)",
        r"(?i)\bsector\s*[:\-]\s*([^\n;.]+)",
        r"(?i)speciali[sz]es\s+in\s+([^\n;.]+)",
        r"(?i)\bfocus(?:es|ed)?\s+on\s+([^\n;.]+)",
    ])
});

static FUNDING_AMOUNT: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"(?i)total\s+funding\s*(?:of|:|-)?\s*(\$\s?\d[\d,]*(?:\.\d+)?\s*(?:billion|million|thousand|bn|[bmk])?)",
        r"(?i)funding(?:\s+amount)?\s*[:\-]\s*(\$\s?\d[\d,]*(?:\.\d+)?\s*(?:billion|million|thousand|bn|[bmk])?)",
        r"(?i)raised\s+(?:a\s+total\s+of\s+|over\s+|approximately\s+)?(\$\s?\d[\d,]*(?:\.\d+)?\s*(?:billion|million|thousand|bn|[bmk])?)",
        r"(\$\s?\d[\d,]*(?:\.\d+)?\s*(?:billion|million|bn|[BM])\b)",
    ])
});

static INVESTORS: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"(?i)\b(?:key\s+)?investors?\s*(?::|-|including|include)\s*([^\n]+)",
        r"(?i)\bbacked\s+by\s+([^\n]+)",
        r"(?i)\bled\s+by\s+([^\n]+?)(?:\.|$)",
    ])
});

static WEBSITE: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"(?i)website\s*[:\-]\s*(https?://[^\s)\]>]+)",
        r"(?i)website\s*[:\-]\s*((?:www\.)?[a-z0-9\-]+(?:\.[a-z0-9\-]+)+)",
        r"(https?://[^\s)\]>]+)",
    ])
});

static STOCK_SYMBOL: Lazy<Vec<Regex>> = Lazy::new(|| {
    rules(&[
        r"\((?:NASDAQ|NYSE|NYSE\s+American|AMEX|TSX|LSE)\s*:\s*([A-Z]{1,5}(?:\.[A-Z])?)\)",
        r"(?:NASDAQ|NYSE|AMEX)\s*:\s*([A-Z]{1,5}(?:\.[A-Z])?)\b",
        r"(?i:stock\s+symbol|ticker(?:\s+symbol)?)\s*[:\-]?\s*\$?([A-Z]{1,5}(?:\.[A-Z])?)\b",
    ])
});

/// Public-listing rules; the first match decides.
static PUBLIC_STATUS: Lazy<Vec<(Regex, bool)>> = Lazy::new(|| {
    vec![
        (r"(?i)\bnot\s+publicly\s+traded\b", false),
        (r"(?i)\bprivately[\s\-]+held\b", false),
        (r"(?i)\bprivate\s+company\b", false),
        (r"(?i)\bpublicly[\s\-]+traded\b", true),
        (r"(?i)\blisted\s+on\s+(?:the\s+)?(?:nasdaq|nyse|london\s+stock\s+exchange)", true),
        (r"(?i)\bpublic\s+company\b", true),
    ]
    .into_iter()
    .map(|(pattern, public)| {
        (
            Regex::new(pattern).expect("invalid public status regex"),
            public,
        )
    })
    .collect()
});

static HEADLINE_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:#+\s*)?(?:\*\*)?\s*(?:recent\s+|latest\s+)?(?:news(?:\s+headlines)?|headlines)\b",
    )
    .expect("invalid headline header regex")
});

static BULLET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+)$").expect("invalid bullet regex")
});

static INLINE_HEADLINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:[-*•]\s*)?(?:headline|news)\s*[:\-]\s*(.+)$")
        .expect("invalid inline headline regex")
});

fn first_capture<'t>(rules: &[Regex], text: &'t str) -> Option<&'t str> {
    rules.iter().find_map(|rule| {
        rule.captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
    })
}

fn clean_value(raw: &str) -> Option<String> {
    let trimmed = raw
        .trim()
        .trim_matches(|ch: char| ch == '*' || ch == '"' || ch == '`')
        .trim_end_matches(['.', ',', ':'])
        .trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("unknown")
        || trimmed.eq_ignore_ascii_case("n/a")
    {
        return None;
    }
    Some(trimmed.chars().take(MAX_FIELD_CHARS).collect())
}

pub fn extract_founding_year(text: &str) -> Option<u16> {
    let current = Utc::now().year();
    FOUNDING_YEAR.iter().find_map(|rule| {
        rule.captures_iter(text)
            .filter_map(|caps| caps.get(1)?.as_str().parse::<i32>().ok())
            .find(|year| (1800..=current).contains(year))
            .and_then(|year| u16::try_from(year).ok())
    })
}

pub fn extract_location(text: &str) -> Option<String> {
    first_capture(&LOCATION, text)
        .map(|raw| raw.split(". ").next().unwrap_or(raw))
        .and_then(clean_value)
}

pub fn extract_focus_area(text: &str) -> Option<String> {
    first_capture(&FOCUS_AREA, text).and_then(clean_value)
}

pub fn extract_funding_amount(text: &str) -> Option<String> {
    first_capture(&FUNDING_AMOUNT, text).and_then(|raw| clean_value(&raw.replace("$ ", "$")))
}

pub fn extract_investors(text: &str) -> Vec<String> {
    let Some(raw) = first_capture(&INVESTORS, text) else {
        return Vec::new();
    };
    let mut investors: Vec<String> = Vec::new();
    for part in raw.split([',', ';']).flat_map(|chunk| chunk.split(" and ")) {
        let name = part.trim().trim_start_matches("and ").trim();
        if let Some(name) = clean_value(name) {
            if !investors.iter().any(|known| known.eq_ignore_ascii_case(&name)) {
                investors.push(name);
            }
        }
        if investors.len() >= MAX_INVESTORS {
            break;
        }
    }
    investors
}

pub fn extract_headlines(text: &str) -> Vec<String> {
    let mut headlines = Vec::new();
    let mut in_section = false;

    for line in text.lines() {
        if HEADLINE_HEADER.is_match(line) {
            in_section = true;
            continue;
        }
        if !in_section {
            continue;
        }
        if line.trim().is_empty() {
            if !headlines.is_empty() {
                break;
            }
            continue;
        }
        match BULLET.captures(line).and_then(|caps| caps.get(1)) {
            Some(item) => {
                if let Some(headline) = clean_value(item.as_str()) {
                    headlines.push(headline);
                }
            }
            None => break,
        }
    }

    if headlines.is_empty() {
        headlines = text
            .lines()
            .filter_map(|line| INLINE_HEADLINE.captures(line)?.get(1))
            .filter_map(|m| clean_value(m.as_str()))
            .collect();
    }

    headlines.truncate(MAX_HEADLINES);
    headlines
}

pub fn extract_website(text: &str) -> Option<String> {
    let raw = clean_value(first_capture(&WEBSITE, text)?)?;
    if raw.starts_with("http://") || raw.starts_with("https://") {
        Some(raw)
    } else {
        Some(format!("https://{raw}"))
    }
}

pub fn extract_stock_symbol(text: &str) -> Option<String> {
    first_capture(&STOCK_SYMBOL, text).map(str::to_string)
}

pub fn extract_public_status(text: &str) -> Option<bool> {
    PUBLIC_STATUS
        .iter()
        .find(|(rule, _)| rule.is_match(text))
        .map(|(_, public)| *public)
}

/// Build an entity from generated text. Scores and steps are filled in later.
pub fn extract_entity(company_name: &str, text: &str) -> Entity {
    let stock_symbol = extract_stock_symbol(text);
    let is_public = extract_public_status(text).unwrap_or(stock_symbol.is_some());

    Entity {
        name: company_name.trim().to_string(),
        founding_year: extract_founding_year(text),
        location: extract_location(text),
        focus_area: extract_focus_area(text),
        investors: extract_investors(text),
        funding_amount: extract_funding_amount(text),
        news_headlines: extract_headlines(text),
        website_url: extract_website(text).unwrap_or_default(),
        is_public,
        stock_symbol: if is_public { stock_symbol } else { None },
        ..Entity::default()
    }
}
