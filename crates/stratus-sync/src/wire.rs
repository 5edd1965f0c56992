//! Normalization of loosely-shaped daemon payloads.

use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

/// Collection the daemon may send either as an array or as an object keyed by
/// entity key. Both decode into the same ordered sequence; object entries keep
/// document order and their keys are discarded (each entity carries its own).
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedCollection<T>(pub Vec<T>);

impl<T> KeyedCollection<T> {
    /// Unwrap into the normalized sequence.
    #[must_use]
    pub fn into_inner(self) -> Vec<T> {
        self.0
    }
}

impl<'de, T> Deserialize<'de> for KeyedCollection<T>
where
    T: Deserialize<'de>,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(KeyedVisitor(PhantomData))
    }
}

struct KeyedVisitor<T>(PhantomData<T>);

impl<'de, T> Visitor<'de> for KeyedVisitor<T>
where
    T: Deserialize<'de>,
{
    type Value = KeyedCollection<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("an array or a keyed object of entities")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(KeyedCollection(items))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut items = Vec::with_capacity(map.size_hint().unwrap_or(0));
        while let Some((_, item)) = map.next_entry::<de::IgnoredAny, T>()? {
            items.push(item);
        }
        Ok(KeyedCollection(items))
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(KeyedCollection(Vec::new()))
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(KeyedCollection(Vec::new()))
    }
}

/// Percent-encode each `/`-separated segment of a path on its own so the
/// separators survive as literal slashes. Empty segments are dropped.
#[must_use]
pub fn encode_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        id: String,
    }

    #[test]
    fn array_and_object_shapes_normalize_alike() {
        let from_array: KeyedCollection<Item> =
            serde_json::from_str(r#"[{"id":"a"},{"id":"b"}]"#).expect("array");
        let from_object: KeyedCollection<Item> =
            serde_json::from_str(r#"{"a":{"id":"a"},"b":{"id":"b"}}"#).expect("object");
        assert_eq!(from_array, from_object);
    }

    #[test]
    fn object_entries_keep_document_order() {
        let parsed: KeyedCollection<Item> =
            serde_json::from_str(r#"{"z":{"id":"z"},"a":{"id":"a"},"m":{"id":"m"}}"#)
                .expect("object");
        let ids: Vec<_> = parsed.into_inner().into_iter().map(|item| item.id).collect();
        assert_eq!(ids, ["z", "a", "m"]);
    }

    #[test]
    fn null_is_an_empty_collection() {
        let parsed: KeyedCollection<Item> = serde_json::from_str("null").expect("null");
        assert!(parsed.into_inner().is_empty());
        assert!(serde_json::from_str::<KeyedCollection<Item>>("42").is_err());
    }

    #[test]
    fn path_segments_encode_independently() {
        assert_eq!(encode_path("movies/a b/c#1.mkv"), "movies/a%20b/c%231.mkv");
        assert_eq!(encode_path("/lead//trail/"), "lead/trail");
        assert_eq!(encode_path("100%/x?y"), "100%25/x%3Fy");
    }
}
