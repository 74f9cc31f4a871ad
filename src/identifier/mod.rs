/// Qualified identifier codec
///
/// Converts between the flat wire form of a database/retention-policy pair
/// (`mydb.myrp` or `"mydb"."myrp"`) and its structured form.
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Separator between the namespace and the qualifier
pub const SEPARATOR: char = '.';

/// Form reported back to the user when an identifier cannot be parsed
pub const EXPECTED_FORM: &str = "\"my_db\".\"my_rp\"";

/// Errors produced while parsing wire-form identifiers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("error parsing database retention policy: {raw}. Expected form: {expected}")]
    MalformedIdentifier { raw: String, expected: &'static str },
}

/// A (namespace, qualifier) pair such as a database and its retention policy
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedIdentifier {
    namespace: String,
    qualifier: String,
}

impl QualifiedIdentifier {
    pub fn new(namespace: impl Into<String>, qualifier: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            qualifier: qualifier.into(),
        }
    }

    /// Database name
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Retention policy name
    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

impl fmt::Display for QualifiedIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.namespace, SEPARATOR, self.qualifier)
    }
}

impl FromStr for QualifiedIdentifier {
    type Err = IdentifierError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = raw.split(SEPARATOR).collect();
        let [namespace, qualifier] = segments.as_slice() else {
            return Err(IdentifierError::MalformedIdentifier {
                raw: raw.to_string(),
                expected: EXPECTED_FORM,
            });
        };

        // Quotes are removed wherever they appear, not matched in pairs.
        Ok(Self::new(
            namespace.replace('"', ""),
            qualifier.replace('"', ""),
        ))
    }
}

/// Parse a list of wire-form identifiers, stopping at the first malformed entry
pub fn parse<I, S>(raw: I) -> Result<Vec<QualifiedIdentifier>, IdentifierError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter().map(|s| s.as_ref().parse()).collect()
}

/// Render identifiers in their canonical wire form, preserving order
pub fn serialize(list: &[QualifiedIdentifier]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qi(namespace: &str, qualifier: &str) -> QualifiedIdentifier {
        QualifiedIdentifier::new(namespace, qualifier)
    }

    #[test]
    fn test_parse_bare() {
        assert_eq!(parse(["mydb.myrp"]).unwrap(), vec![qi("mydb", "myrp")]);
    }

    #[test]
    fn test_parse_strips_quotes() {
        assert_eq!(
            parse(["\"mydb\".\"myrp\""]).unwrap(),
            vec![qi("mydb", "myrp")]
        );
    }

    #[test]
    fn test_parse_single_segment_fails() {
        let err = parse(["onlyonepart"]).unwrap_err();
        assert_eq!(
            err,
            IdentifierError::MalformedIdentifier {
                raw: "onlyonepart".to_string(),
                expected: EXPECTED_FORM,
            }
        );
        let msg = err.to_string();
        assert!(msg.contains("onlyonepart"));
        assert!(msg.contains("\"my_db\".\"my_rp\""));
    }

    #[test]
    fn test_parse_embedded_dots_fail() {
        // Quoting does not protect dots inside a segment.
        let result = parse(["\"my.db\".\"my.rp\""]);
        assert!(matches!(
            result,
            Err(IdentifierError::MalformedIdentifier { .. })
        ));
    }

    #[test]
    fn test_parse_stops_at_first_failure() {
        let err = parse(["a.b", "bad", "also.bad.too"]).unwrap_err();
        let IdentifierError::MalformedIdentifier { raw, .. } = err;
        assert_eq!(raw, "bad");
    }

    #[test]
    fn test_empty_lists() {
        assert!(parse(Vec::<String>::new()).unwrap().is_empty());
        assert!(serialize(&[]).is_empty());
    }

    #[test]
    fn test_serialize_preserves_order() {
        assert_eq!(
            serialize(&[qi("a", "b"), qi("c", "d")]),
            vec!["a.b".to_string(), "c.d".to_string()]
        );
    }

    #[test]
    fn test_round_trip() {
        let pairs = [
            qi("telegraf", "autogen"),
            qi("my_db", "two_weeks"),
            qi("x", "y"),
        ];
        let wire = serialize(&pairs);
        assert_eq!(parse(&wire).unwrap(), pairs.to_vec());

        let raw = vec!["telegraf.autogen", "metrics.one_day"];
        assert_eq!(serialize(&parse(&raw).unwrap()), raw);
    }

    #[test]
    fn test_from_str_and_accessors() {
        let id: QualifiedIdentifier = "db.rp".parse().unwrap();
        assert_eq!(id.namespace(), "db");
        assert_eq!(id.qualifier(), "rp");
        assert_eq!(id.to_string(), "db.rp");
    }
}
