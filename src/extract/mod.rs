//! Security-relevant HTML evidence extraction
//!
//! Distills raw page HTML into small, bounded excerpts (iframes, forms,
//! meta tags, price context) suitable for an LLM prompt. Everything is
//! capped so a pathological page cannot blow up the prompt.

use regex::{Regex, RegexBuilder};

const MAX_IFRAMES: usize = 20;
const MAX_FORMS: usize = 15;
const MAX_META: usize = 15;
const MAX_PRICES_WITH_CONTEXT: usize = 15;
const IFRAME_EXCERPT_CHARS: usize = 500;

/// Bounded excerpts from one page, formatted for prompt inclusion
#[derive(Debug, Clone, Default)]
pub struct SecurityEvidence {
    pub iframes: String,
    pub forms: String,
    pub meta: String,
    pub price_context: String,
}

pub struct EvidenceExtractor {
    iframe_re: Regex,
    iframe_body_re: Regex,
    form_re: Regex,
    form_tag_re: Regex,
    input_re: Regex,
    meta_re: Regex,
    json_ld_re: Regex,
    price_context_re: Regex,
    h1_re: Regex,
    price_class_re: Regex,
    tag_strip_re: Regex,
}

impl EvidenceExtractor {
    pub fn new() -> Self {
        Self {
            iframe_re: dotall_ci(r"<iframe[^>]*>.*?</iframe>|<iframe[^>]*/>"),
            iframe_body_re: dotall_ci(r">.*?</iframe>"),
            form_re: dotall_ci(r"<form[^>]*>.*?</form>"),
            form_tag_re: Regex::new(r"(?i)<form[^>]*>").unwrap(),
            input_re: Regex::new(r"(?i)<input[^>]*>").unwrap(),
            meta_re: Regex::new(
                r"(?i)<meta[^>]*(?:security|csp|x-frame|cors|og:title|og:price|product:price)[^>]*>",
            )
            .unwrap(),
            json_ld_re: dotall_ci(r#"<script type="application/ld\+json"[^>]*>(.*?)</script>"#),
            price_context_re: Regex::new(
                r"(?s)(.{0,50})([\$€£¥]\s?\d{1,3}(?:[,.]\d{3})*(?:[.,]\d{2})?)(.{0,50})",
            )
            .unwrap(),
            h1_re: dotall_ci(r"<h1[^>]*>.*?</h1>"),
            price_class_re: Regex::new(
                r#"(?i)<[^>]*class=["'][^"']*(?:price|amount|cost)[^"']*["'][^>]*>[^<]*<"#,
            )
            .unwrap(),
            tag_strip_re: Regex::new(r"<[^>]+>").unwrap(),
        }
    }

    /// Extract all four evidence sections from page HTML
    pub fn extract(&self, html: &str) -> SecurityEvidence {
        SecurityEvidence {
            iframes: self.extract_iframes(html),
            forms: self.extract_forms(html),
            meta: self.extract_meta(html),
            price_context: self.extract_price_context(html),
        }
    }

    fn extract_iframes(&self, html: &str) -> String {
        self.iframe_re
            .find_iter(html)
            .take(MAX_IFRAMES)
            .enumerate()
            .map(|(idx, m)| {
                // Collapse iframe bodies; only the tag attributes matter
                let collapsed = self.iframe_body_re.replace(m.as_str(), ">[...]</iframe>");
                let excerpt: String = collapsed.chars().take(IFRAME_EXCERPT_CHARS).collect();
                format!("iframe_{}: {}", idx + 1, excerpt)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn extract_forms(&self, html: &str) -> String {
        self.form_re
            .find_iter(html)
            .take(MAX_FORMS)
            .enumerate()
            .map(|(idx, m)| {
                let form = m.as_str();
                let mut parts = Vec::new();

                if let Some(tag) = self.form_tag_re.find(form) {
                    parts.push(format!("tag: {}", tag.as_str()));
                }

                let inputs: Vec<&str> =
                    self.input_re.find_iter(form).map(|i| i.as_str()).collect();

                let hidden: Vec<&str> = inputs
                    .iter()
                    .filter(|i| i.to_lowercase().contains("hidden"))
                    .take(10)
                    .copied()
                    .collect();
                if !hidden.is_empty() {
                    parts.push(format!("hidden_inputs: {}", hidden.join(", ")));
                }

                let critical: Vec<&str> = inputs
                    .iter()
                    .filter(|i| {
                        let lower = i.to_lowercase();
                        ["password", "email", "card", "cvv", "payment"]
                            .iter()
                            .any(|t| lower.contains(t))
                    })
                    .take(5)
                    .copied()
                    .collect();
                if !critical.is_empty() {
                    parts.push(format!("critical_inputs: {}", critical.join(", ")));
                }

                format!("form_{}: {}", idx + 1, parts.join(" | "))
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn extract_meta(&self, html: &str) -> String {
        self.meta_re
            .find_iter(html)
            .take(MAX_META)
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Price/product context in descending order of reliability:
    /// JSON-LD, product titles, product meta, price-class elements,
    /// raw currency matches with surrounding text.
    fn extract_price_context(&self, html: &str) -> String {
        let mut sections = Vec::new();

        let json_ld: Vec<&str> = self
            .json_ld_re
            .captures_iter(html)
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .filter(|s| s.contains(r#""Product""#) || s.contains(r#""Offer""#))
            .take(2)
            .collect();
        if !json_ld.is_empty() {
            sections.push(format!(
                "JSON-LD Structured Data (HIGH RELIABILITY):\n{}",
                json_ld.join("\n---\n")
            ));
        }

        let titles: Vec<String> = self
            .h1_re
            .find_iter(html)
            .take(3)
            .map(|m| self.strip_tags(m.as_str()))
            .collect();
        if !titles.is_empty() {
            sections.push(format!("Possible Product Titles: {}", titles.join(" | ")));
        }

        let product_meta: Vec<&str> = self
            .meta_re
            .find_iter(html)
            .take(MAX_META)
            .map(|m| m.as_str())
            .filter(|m| m.contains("og:title") || m.contains("price"))
            .collect();
        if !product_meta.is_empty() {
            sections.push(format!(
                "Meta Info (HIGH RELIABILITY): {}",
                product_meta.join(" | ")
            ));
        }

        let price_elements: Vec<String> = self
            .price_class_re
            .find_iter(html)
            .take(5)
            .map(|m| self.strip_tags(m.as_str()))
            .filter(|s| !s.is_empty())
            .collect();
        if !price_elements.is_empty() {
            sections.push(format!(
                "Price Elements Content: {}",
                price_elements.join(", ")
            ));
        }

        let prices: Vec<String> = self
            .price_context_re
            .captures_iter(html)
            .take(MAX_PRICES_WITH_CONTEXT)
            .map(|c| {
                let pre = self.strip_tags_to_space(c.get(1).map_or("", |m| m.as_str()));
                let price = c.get(2).map_or("", |m| m.as_str());
                let post = self.strip_tags_to_space(c.get(3).map_or("", |m| m.as_str()));
                format!("...{} [ {} ] {}...", pre, price, post)
            })
            .collect();
        if !prices.is_empty() {
            sections.push(format!(
                "Visible Prices with Context: {}",
                prices.join("\n")
            ));
        }

        sections.join("\n")
    }

    fn strip_tags(&self, html: &str) -> String {
        self.tag_strip_re.replace_all(html, "").trim().to_string()
    }

    fn strip_tags_to_space(&self, html: &str) -> String {
        self.tag_strip_re.replace_all(html, " ").trim().to_string()
    }
}

impl Default for EvidenceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn dotall_ci(pattern: &str) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iframe_bodies_collapsed_and_capped() {
        let big_body = "x".repeat(2000);
        let html = format!(
            r#"<iframe src="https://evil.example"><p>{}</p></iframe>"#,
            big_body
        );
        let extractor = EvidenceExtractor::new();
        let evidence = extractor.extract(&html);

        assert!(evidence.iframes.starts_with("iframe_1:"));
        assert!(evidence.iframes.contains("[...]"));
        assert!(!evidence.iframes.contains(&big_body));
    }

    #[test]
    fn test_iframe_count_bounded() {
        let html = r#"<iframe src="a"></iframe>"#.repeat(40);
        let extractor = EvidenceExtractor::new();
        let evidence = extractor.extract(&html);
        assert!(evidence.iframes.contains("iframe_20:"));
        assert!(!evidence.iframes.contains("iframe_21:"));
    }

    #[test]
    fn test_form_inputs_categorized() {
        let html = r#"<form action="/pay" method="post">
            <input type="hidden" name="csrf_token" value="abc">
            <input type="text" name="card_number">
            <input type="submit">
        </form>"#;
        let extractor = EvidenceExtractor::new();
        let evidence = extractor.extract(html);

        assert!(evidence.forms.contains("tag: <form action=\"/pay\""));
        assert!(evidence.forms.contains("hidden_inputs:"));
        assert!(evidence.forms.contains("critical_inputs:"));
        assert!(evidence.forms.contains("card_number"));
    }

    #[test]
    fn test_price_context_reliability_order() {
        let html = r#"
            <script type="application/ld+json">{"@type": "Product", "offers": {"price": "99.99"}}</script>
            <h1>Zapatillas <b>Runner</b></h1>
            <span class="product-price">$99.990</span>
        "#;
        let extractor = EvidenceExtractor::new();
        let evidence = extractor.extract(html);

        let json_ld_pos = evidence.price_context.find("JSON-LD").unwrap();
        let title_pos = evidence.price_context.find("Product Titles").unwrap();
        let raw_pos = evidence.price_context.find("Visible Prices").unwrap();
        assert!(json_ld_pos < title_pos);
        assert!(title_pos < raw_pos);
        assert!(evidence.price_context.contains("Zapatillas Runner"));
    }

    #[test]
    fn test_empty_html_gives_empty_sections() {
        let extractor = EvidenceExtractor::new();
        let evidence = extractor.extract("<html><body>Hello</body></html>");
        assert!(evidence.iframes.is_empty());
        assert!(evidence.forms.is_empty());
        assert!(evidence.meta.is_empty());
        assert!(evidence.price_context.is_empty());
    }
}
