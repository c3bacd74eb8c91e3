use std::{cmp::Ordering, fmt};

use bucket_sort::BucketKey;
use serde::{
    de::{self, Visitor},
    Deserialize, Deserializer, Serialize, Serializer,
};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(ArrayId);

/// Contents of an array record.
///
/// Serialized as a plain JSON array. A sequence of JSON integers that all fit
/// `i64` decodes as `Integers`. Anything else (a fractional or exponent
/// element, or an integer above `i64::MAX`) decodes as `Mixed`, where every
/// element keeps its own kind and integers stay exact. Anything that is not a
/// flat array of numbers is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged, expecting = "a JSON array of numbers")]
pub enum ArrayData {
    Integers(Vec<i64>),
    Mixed(Vec<Number>),
}

impl ArrayData {
    pub fn len(&self) -> usize {
        match self {
            Self::Integers(values) => values.len(),
            Self::Mixed(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ArrayData {
    fn default() -> Self {
        Self::Integers(Vec::new())
    }
}

impl From<Vec<i64>> for ArrayData {
    fn from(values: Vec<i64>) -> Self {
        Self::Integers(values)
    }
}

impl From<Vec<f64>> for ArrayData {
    fn from(values: Vec<f64>) -> Self {
        Self::Mixed(values.into_iter().map(Number::Float).collect())
    }
}

/// One JSON number, integer or float, ordered by numeric value.
///
/// `Int` spans every JSON integer serde can hand over (`i64` and `u64`).
/// Comparisons between the two kinds are exact: `9007199254740993` sorts
/// above `9007199254740992.0` even though both round to the same `f64`.
#[derive(Debug, Clone, Copy)]
pub enum Number {
    Int(i128),
    Float(f64),
}

/// 2^127, the first float above every `i128`.
const I128_CEILING: f64 = 170_141_183_460_469_231_731_687_303_715_884_105_728.0;

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Self::Int(value) => value as f64,
            Self::Float(value) => value,
        }
    }
}

fn cmp_int_float(int: i128, float: f64) -> Option<Ordering> {
    // Rounding to f64 is monotonic, so only a tie needs an exact check. A tie
    // means `float` is integral.
    match (int as f64).partial_cmp(&float)? {
        Ordering::Equal if float >= I128_CEILING => Some(Ordering::Less),
        Ordering::Equal => Some(int.cmp(&(float as i128))),
        other => Some(other),
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (*self, *other) {
            (Self::Int(a), Self::Int(b)) => Some(a.cmp(&b)),
            (Self::Float(a), Self::Float(b)) => a.partial_cmp(&b),
            (Self::Int(a), Self::Float(b)) => cmp_int_float(a, b),
            (Self::Float(a), Self::Int(b)) => cmp_int_float(b, a).map(Ordering::reverse),
        }
    }
}

impl BucketKey for Number {
    fn bucket_index(self, min: Self, max: Self, buckets: usize) -> usize {
        self.as_f64()
            .bucket_index(min.as_f64(), max.as_f64(), buckets)
    }

    fn total_order(&self, other: &Self) -> Ordering {
        // NaNs fall back to `f64::total_cmp`; zeros of either sign tie.
        self.partial_cmp(other)
            .unwrap_or_else(|| self.as_f64().total_cmp(&other.as_f64()))
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Self::Int(value.into())
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::Int(value) => {
                if let Ok(value) = i64::try_from(value) {
                    serializer.serialize_i64(value)
                } else if let Ok(value) = u64::try_from(value) {
                    serializer.serialize_u64(value)
                } else {
                    serializer.serialize_i128(value)
                }
            }
            Self::Float(value) => serializer.serialize_f64(value),
        }
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct NumberVisitor;

        impl Visitor<'_> for NumberVisitor {
            type Value = Number;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a number")
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<Number, E> {
                Ok(Number::Int(value.into()))
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<Number, E> {
                Ok(Number::Int(value.into()))
            }

            fn visit_i128<E: de::Error>(self, value: i128) -> Result<Number, E> {
                Ok(Number::Int(value))
            }

            fn visit_f64<E: de::Error>(self, value: f64) -> Result<Number, E> {
                Ok(Number::Float(value))
            }
        }

        deserializer.deserialize_any(NumberVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reencode(json: &str) -> String {
        let data: ArrayData = serde_json::from_str(json).expect("json");
        serde_json::to_string(&data).expect("json")
    }

    #[test]
    fn integer_arrays_decode_as_integers() {
        let data: ArrayData = serde_json::from_str("[3, -1, 2]").expect("json");
        assert_eq!(data, ArrayData::Integers(vec![3, -1, 2]));
    }

    #[test]
    fn fractional_element_makes_a_mixed_array() {
        let data: ArrayData = serde_json::from_str("[3, 1.5, 2]").expect("json");
        assert_eq!(
            data,
            ArrayData::Mixed(vec![Number::Int(3), Number::Float(1.5), Number::Int(2)])
        );
    }

    #[test]
    fn mixed_arrays_keep_each_element_kind() {
        assert_eq!(reencode("[3, 1.5, 2, 2.0]"), "[3,1.5,2,2.0]");
        assert_eq!(reencode("[9007199254740993, 0.5]"), "[9007199254740993,0.5]");
    }

    #[test]
    fn integers_above_i64_stay_exact() {
        assert_eq!(
            reencode("[18446744073709551615, 1]"),
            "[18446744073709551615,1]"
        );
        let data: ArrayData = serde_json::from_str("[18446744073709551615, 1]").expect("json");
        assert!(matches!(data, ArrayData::Mixed(_)));
    }

    #[test]
    fn numbers_compare_exactly_across_kinds() {
        let big = Number::Int(9_007_199_254_740_993);
        let rounded = Number::Float(9_007_199_254_740_992.0);
        assert!(big > rounded);
        assert!(rounded < big);
        assert_eq!(Number::Int(2), Number::Float(2.0));
        assert!(Number::Int(i128::MAX) < Number::Float(I128_CEILING));
        assert!(Number::Float(-0.5) < Number::Int(0));
        assert_eq!(Number::Float(f64::NAN).partial_cmp(&Number::Int(1)), None);
        assert_eq!(
            Number::Int(0).total_order(&Number::Float(-0.0)),
            Ordering::Equal
        );
    }

    #[test]
    fn empty_array_decodes_as_integers() {
        let data: ArrayData = serde_json::from_str("[]").expect("json");
        assert!(data.is_empty());
        assert_eq!(data, ArrayData::default());
    }

    #[test]
    fn rejects_non_numeric_elements() {
        assert!(serde_json::from_str::<ArrayData>(r#"[1, "two"]"#).is_err());
        assert!(serde_json::from_str::<ArrayData>(r#"{"a": 1}"#).is_err());
        assert!(serde_json::from_str::<ArrayData>("[[1]]").is_err());
        assert!(serde_json::from_str::<ArrayData>("[1, null]").is_err());
    }

    #[test]
    fn serializes_as_plain_json_array() {
        let json = serde_json::to_string(&ArrayData::Integers(vec![1, 2])).expect("json");
        assert_eq!(json, "[1,2]");
    }
}
