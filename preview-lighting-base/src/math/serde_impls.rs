#![allow(clippy::missing_inline_in_public_items)]

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::math::Aab;

#[derive(Debug, Deserialize, Serialize)]
struct AabSer {
    lower: [f64; 3],
    upper: [f64; 3],
}

impl Serialize for Aab {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        AabSer {
            lower: self.lower_bounds_p().to_array(),
            upper: self.upper_bounds_p().to_array(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Aab {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let AabSer { lower, upper } = AabSer::deserialize(deserializer)?;
        Aab::checked_from_lower_upper(lower.into(), upper.into())
            .ok_or_else(|| {
                serde::de::Error::custom(format_args!(
                    "box corners out of order or NaN: {lower:?} to {upper:?}"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn json_form() {
        let aab = Aab::new(0.0, 64.0, 0.0, 64.0, -8.0, 0.0);
        let json = serde_json::to_value(aab).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"lower": [0.0, 0.0, -8.0], "upper": [64.0, 64.0, 0.0]})
        );
        assert_eq!(serde_json::from_value::<Aab>(json).unwrap(), aab);
    }

    #[test]
    fn rejects_misordered() {
        let error = serde_json::from_str::<Aab>(r#"{"lower": [1, 0, 0], "upper": [0, 1, 1]}"#)
            .unwrap_err();
        assert!(
            error.to_string().starts_with("box corners out of order or NaN"),
            "{error}"
        );
    }
}
