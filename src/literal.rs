//! RDF literal lexical-form decomposition.
//!
//! Splits a quoted literal like `"PizzaComQueijo"@pt` into its value,
//! optional language tag and optional datatype IRI.

/// `(value, language, datatype)` — language and datatype are mutually
/// exclusive; either, both, or neither may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LiteralParts {
    pub value: Option<String>,
    pub language: Option<String>,
    pub datatype: Option<String>,
}

impl LiteralParts {
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }
}

/// Decompose a literal lexical form into value/language/datatype.
///
/// If `s` doesn't start with `"`, every field is absent (a "null triple").
/// Otherwise the value is everything between the first `"` and the *last*
/// `"` in the string, and whatever follows the last `"` determines the tag:
/// a leading `@` means language, a leading `^^` means datatype.
pub fn literal_to_parts(s: &str) -> LiteralParts {
    if !s.starts_with('"') {
        return LiteralParts::default();
    }

    let Some(last_quote) = s.rfind('"') else {
        return LiteralParts::default();
    };
    if last_quote == 0 {
        // Only one quote character in the whole string — malformed.
        return LiteralParts::default();
    }

    let value = s[1..last_quote].to_string();
    let remainder = s[last_quote + 1..].trim();

    let mut parts = LiteralParts {
        value: Some(value),
        language: None,
        datatype: None,
    };

    if let Some(lang) = remainder.strip_prefix('@') {
        parts.language = Some(lang.to_string());
    } else if let Some(dt) = remainder.strip_prefix("^^") {
        parts.datatype = Some(dt.to_string());
    }

    parts
}

/// Render `(value, language, datatype)` back into a SPARQL-syntactically
/// valid literal term. The inverse of `literal_to_parts` for well-formed
/// input (round-trip law in the testable-properties section).
pub fn render_literal(value: &str, language: Option<&str>, datatype: Option<&str>) -> String {
    let mut out = String::with_capacity(value.len() + 8);
    out.push('"');
    out.push_str(value);
    out.push('"');
    if let Some(lang) = language {
        out.push('@');
        out.push_str(lang);
    } else if let Some(dt) = datatype {
        out.push_str("^^");
        out.push_str(dt);
    }
    out
}
