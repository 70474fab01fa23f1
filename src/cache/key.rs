//! Logical Key Module
//!
//! Caller-facing cache keys: a plain string or an ordered list of primitive
//! components, normalized into a single string before hashing.

use serde_json::Value;

/// Storage key derived from a logical key.
pub type HashKey = String;

// == Key Part ==
/// One primitive component of a composite key.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPart {
    Str(String),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
}

impl KeyPart {
    /// JSON text of the component. Non-finite floats have no JSON form and
    /// render as the bare tokens `NaN`, `Infinity` and `-Infinity`, which no
    /// other component can produce.
    fn render(&self) -> String {
        match self {
            KeyPart::Str(s) => Value::from(s.as_str()).to_string(),
            KeyPart::Int(i) => i.to_string(),
            KeyPart::UInt(u) => u.to_string(),
            KeyPart::Float(f) if f.is_nan() => "NaN".to_string(),
            KeyPart::Float(f) if f.is_infinite() && *f > 0.0 => "Infinity".to_string(),
            KeyPart::Float(f) if f.is_infinite() => "-Infinity".to_string(),
            KeyPart::Float(f) => Value::from(*f).to_string(),
            KeyPart::Bool(b) => b.to_string(),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

impl From<&String> for KeyPart {
    fn from(value: &String) -> Self {
        KeyPart::Str(value.clone())
    }
}

impl From<i32> for KeyPart {
    fn from(value: i32) -> Self {
        KeyPart::Int(i64::from(value))
    }
}

impl From<i64> for KeyPart {
    fn from(value: i64) -> Self {
        KeyPart::Int(value)
    }
}

impl From<u32> for KeyPart {
    fn from(value: u32) -> Self {
        KeyPart::UInt(u64::from(value))
    }
}

impl From<u64> for KeyPart {
    fn from(value: u64) -> Self {
        KeyPart::UInt(value)
    }
}

impl From<usize> for KeyPart {
    fn from(value: usize) -> Self {
        KeyPart::UInt(value as u64)
    }
}

impl From<f64> for KeyPart {
    fn from(value: f64) -> Self {
        KeyPart::Float(value)
    }
}

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

// == Logical Key ==
/// Identifier supplied by the caller for a cached value.
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalKey {
    /// Rendered as a JSON string, e.g. `"integer"`
    Plain(String),
    /// Rendered as compact JSON array text, e.g. `["user",159]`
    Composite(Vec<KeyPart>),
}

impl LogicalKey {
    /// Joins the key into the single string that gets hashed and stored in
    /// the hash table.
    ///
    /// Both kinds render as JSON text, so a plain key always starts with `"`
    /// and a composite key with `[`; the plain key `["user",159]` and the
    /// composite key `("user", 159)` never meet. Inside a composite, component
    /// boundaries and types stay distinguishable: `["ab","c"]`, `["a","bc"]`
    /// and `["1"]`, `[1]` all normalize differently. Changing this rendering
    /// invalidates every persisted hash key.
    pub fn normalize(&self) -> String {
        match self {
            LogicalKey::Plain(s) => Value::from(s.as_str()).to_string(),
            LogicalKey::Composite(parts) => {
                let rendered: Vec<String> = parts.iter().map(KeyPart::render).collect();
                format!("[{}]", rendered.join(","))
            }
        }
    }
}

impl From<&str> for LogicalKey {
    fn from(value: &str) -> Self {
        LogicalKey::Plain(value.to_string())
    }
}

impl From<String> for LogicalKey {
    fn from(value: String) -> Self {
        LogicalKey::Plain(value)
    }
}

impl From<&String> for LogicalKey {
    fn from(value: &String) -> Self {
        LogicalKey::Plain(value.clone())
    }
}

impl From<&LogicalKey> for LogicalKey {
    fn from(value: &LogicalKey) -> Self {
        value.clone()
    }
}

impl From<Vec<KeyPart>> for LogicalKey {
    fn from(parts: Vec<KeyPart>) -> Self {
        LogicalKey::Composite(parts)
    }
}

impl<A, B> From<(A, B)> for LogicalKey
where
    A: Into<KeyPart>,
    B: Into<KeyPart>,
{
    fn from((a, b): (A, B)) -> Self {
        LogicalKey::Composite(vec![a.into(), b.into()])
    }
}

impl<A, B, C> From<(A, B, C)> for LogicalKey
where
    A: Into<KeyPart>,
    B: Into<KeyPart>,
    C: Into<KeyPart>,
{
    fn from((a, b, c): (A, B, C)) -> Self {
        LogicalKey::Composite(vec![a.into(), b.into(), c.into()])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_key_rendering() {
        assert_eq!(LogicalKey::from("integer").normalize(), r#""integer""#);
        assert_eq!(LogicalKey::from("").normalize(), r#""""#);
        assert_eq!(LogicalKey::from("say \"hi\"").normalize(), r#""say \"hi\"""#);
    }

    #[test]
    fn test_plain_key_never_matches_composite() {
        let plain = LogicalKey::from(r#"["user",159]"#).normalize();
        let composite = LogicalKey::from(("user", 159)).normalize();
        assert_ne!(plain, composite);

        let plain = LogicalKey::from("[]").normalize();
        let empty = LogicalKey::from(Vec::<KeyPart>::new()).normalize();
        assert_ne!(plain, empty);
    }

    #[test]
    fn test_non_finite_floats_are_distinct() {
        let nan = LogicalKey::from(("x", f64::NAN)).normalize();
        let inf = LogicalKey::from(("x", f64::INFINITY)).normalize();
        let neg_inf = LogicalKey::from(("x", f64::NEG_INFINITY)).normalize();
        let text = LogicalKey::from(("x", "NaN")).normalize();

        assert_eq!(nan, r#"["x",NaN]"#);
        assert_eq!(inf, r#"["x",Infinity]"#);
        assert_eq!(neg_inf, r#"["x",-Infinity]"#);
        assert_ne!(nan, text);
        assert_ne!(nan, LogicalKey::from(("x", KeyPart::Bool(false))).normalize());
    }

    #[test]
    fn test_finite_float_differs_from_integer() {
        let float = LogicalKey::from(("x", 1.0)).normalize();
        let int = LogicalKey::from(("x", 1)).normalize();
        assert_eq!(float, r#"["x",1.0]"#);
        assert_ne!(float, int);
    }

    #[test]
    fn test_composite_key_rendering() {
        let key = LogicalKey::from(("user", 159));
        assert_eq!(key.normalize(), r#"["user",159]"#);

        let key = LogicalKey::from(("Valid", 3usize, true));
        assert_eq!(key.normalize(), r#"["Valid",3,true]"#);
    }

    #[test]
    fn test_composite_key_is_unambiguous() {
        let a = LogicalKey::from(("ab", "c")).normalize();
        let b = LogicalKey::from(("a", "bc")).normalize();
        assert_ne!(a, b);

        let text = LogicalKey::from(vec![KeyPart::from("1")]).normalize();
        let number = LogicalKey::from(vec![KeyPart::from(1)]).normalize();
        assert_ne!(text, number);
    }

    #[test]
    fn test_composite_key_escapes_quotes() {
        let key = LogicalKey::from(("a\",\"b", 1));
        assert_eq!(key.normalize(), r#"["a\",\"b",1]"#);
    }
}
