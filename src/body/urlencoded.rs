//! Nested `application/x-www-form-urlencoded` decoding.
//!
//! # Responsibilities
//! - Split `a[b][c]=1` style keys into a path and rebuild the nested value
//! - Combine repeated keys into arrays (`a=1&a=2`, `a[]=1&a[]=2`)
//! - Treat small bracketed indices (`a[3]=x`) as array slots
//!
//! # Design Decisions
//! - Nesting follows every bracket group up to [`DEPTH_LIMIT`]; the rest of a
//!   deeper key is kept as one literal object key, the way qs does past its depth
//! - Keys like `__proto__` or `constructor` are plain data; there is no
//!   prototype chain to pollute, so nothing is filtered
//! - Sparse indices are compacted once the whole body has been merged
//! - Indices above [`ARRAY_LIMIT`] become object keys instead of array slots

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

/// Highest bracketed index still treated as an array slot.
pub const ARRAY_LIMIT: usize = 20;

/// Deepest nesting built from one key, the same bound `serde_json` puts on
/// JSON bodies. Decoding, merging and dropping the tree all recurse per level.
pub const DEPTH_LIMIT: usize = 128;

/// Maximum number of `key=value` pairs read from one body. Extra pairs are ignored.
pub const PARAMETER_LIMIT: usize = 1000;

/// Intermediate tree. Arrays stay sparse until [`Node::into_value`].
#[derive(Debug, Clone, PartialEq)]
enum Node {
    Str(String),
    /// A bare key merged into an object (`a[b]=1&a=2` yields `{"b":"1","2":true}`).
    Flag,
    Arr(Vec<Option<Node>>),
    Obj(BTreeMap<String, Node>),
}

impl Node {
    fn is_composite(&self) -> bool {
        matches!(self, Node::Arr(_) | Node::Obj(_))
    }

    /// `[].concat(self)`: arrays are kept as-is, anything else is wrapped.
    fn into_slots(self) -> Vec<Option<Node>> {
        match self {
            Node::Arr(slots) => slots,
            other => vec![Some(other)],
        }
    }

    fn into_value(self) -> Value {
        match self {
            Node::Str(s) => Value::String(s),
            Node::Flag => Value::Bool(true),
            Node::Arr(slots) => Value::Array(slots.into_iter().flatten().map(Node::into_value).collect()),
            Node::Obj(entries) => Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, v.into_value()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

/// Decode a url-encoded body into a JSON object.
///
/// Decoding never fails: malformed percent escapes are kept literally and
/// invalid UTF-8 is replaced, as browsers do.
pub fn parse(input: &[u8]) -> Value {
    let mut root = Node::Obj(BTreeMap::new());

    for (key, value) in collect_pairs(input) {
        if key.is_empty() {
            continue;
        }
        let chain = split_key(&key);
        root = merge(root, build_chain(&chain, value));
    }

    root.into_value()
}

/// Decode pairs, combining values of identical raw keys in first-seen order.
fn collect_pairs(input: &[u8]) -> Vec<(String, Node)> {
    let mut pairs: Vec<(String, Node)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for (key, value) in url::form_urlencoded::parse(input).take(PARAMETER_LIMIT) {
        let value = Node::Str(value.into_owned());
        match positions.get(key.as_ref()) {
            Some(&idx) => {
                let existing = std::mem::replace(&mut pairs[idx].1, Node::Flag);
                let mut slots = existing.into_slots();
                slots.extend(value.into_slots());
                pairs[idx].1 = Node::Arr(slots);
            }
            None => {
                positions.insert(key.to_string(), pairs.len());
                pairs.push((key.into_owned(), value));
            }
        }
    }

    pairs
}

/// Split `parent[a][b]` into `["parent", "[a]", "[b]"]`.
///
/// Only bracket groups without nested brackets count; text between groups is
/// dropped, text before the first group is the parent. Past [`DEPTH_LIMIT`]
/// groups the remainder of the key becomes a single segment.
fn split_key(key: &str) -> Vec<String> {
    let mut groups: Vec<(usize, usize)> = Vec::new();
    let mut cursor = 0;

    while let Some(offset) = key[cursor..].find('[') {
        let open = cursor + offset;
        match key[open + 1..].find(['[', ']']) {
            Some(inner) if key.as_bytes()[open + 1 + inner] == b']' => {
                let close = open + 1 + inner + 1;
                groups.push((open, close));
                cursor = close;
            }
            // another '[' before any ']': retry from there
            Some(inner) => cursor = open + 1 + inner,
            None => break,
        }
    }

    let mut chain = Vec::with_capacity(groups.len() + 1);
    let parent = match groups.first() {
        Some(&(start, _)) => &key[..start],
        None => key,
    };
    if !parent.is_empty() {
        chain.push(parent.to_string());
    }
    chain.extend(
        groups
            .iter()
            .take(DEPTH_LIMIT)
            .map(|&(start, end)| key[start..end].to_string()),
    );
    if let Some(&(rest, _)) = groups.get(DEPTH_LIMIT) {
        chain.push(format!("[{}]", &key[rest..]));
    }
    chain
}

/// Build the value for one key path, innermost segment first.
fn build_chain(chain: &[String], leaf: Node) -> Node {
    chain.iter().rev().fold(leaf, |leaf, segment| {
        if segment == "[]" {
            return Node::Arr(leaf.into_slots());
        }

        let clean = if segment.len() >= 2 && segment.starts_with('[') && segment.ends_with(']') {
            &segment[1..segment.len() - 1]
        } else {
            segment.as_str()
        };
        let bracketed = clean.len() != segment.len();

        match clean.parse::<usize>() {
            Ok(index) if bracketed && index.to_string() == clean && index <= ARRAY_LIMIT => {
                let mut slots = vec![None; index + 1];
                slots[index] = Some(leaf);
                Node::Arr(slots)
            }
            _ => Node::Obj(BTreeMap::from([(clean.to_string(), leaf)])),
        }
    })
}

fn slots_to_object(slots: Vec<Option<Node>>) -> BTreeMap<String, Node> {
    slots
        .into_iter()
        .enumerate()
        .filter_map(|(i, slot)| slot.map(|node| (i.to_string(), node)))
        .collect()
}

fn merge(target: Node, source: Node) -> Node {
    match (target, source) {
        // scalar source
        (Node::Arr(mut slots), source @ (Node::Str(_) | Node::Flag)) => {
            slots.push(Some(source));
            Node::Arr(slots)
        }
        (Node::Obj(mut entries), Node::Str(key)) => {
            entries.entry(key).or_insert(Node::Flag);
            Node::Obj(entries)
        }
        (Node::Obj(entries), Node::Flag) => Node::Obj(entries),
        (target, source @ (Node::Str(_) | Node::Flag)) => Node::Arr(vec![Some(target), Some(source)]),

        // scalar target, composite source
        (target @ (Node::Str(_) | Node::Flag), source) => {
            let mut slots = vec![Some(target)];
            slots.extend(source.into_slots());
            Node::Arr(slots)
        }

        (Node::Arr(mut target), Node::Arr(source)) => {
            for (index, item) in source.into_iter().enumerate() {
                let Some(item) = item else { continue };
                match target.get_mut(index) {
                    Some(slot) => match slot.take() {
                        Some(existing) if existing.is_composite() && item.is_composite() => {
                            *slot = Some(merge(existing, item));
                        }
                        Some(existing) => {
                            *slot = Some(existing);
                            target.push(Some(item));
                        }
                        None => *slot = Some(item),
                    },
                    None => {
                        target.resize(index, None);
                        target.push(Some(item));
                    }
                }
            }
            Node::Arr(target)
        }
        (Node::Arr(target), Node::Obj(source)) => merge_entries(slots_to_object(target), source),
        (Node::Obj(target), Node::Arr(source)) => merge_entries(target, slots_to_object(source)),
        (Node::Obj(target), Node::Obj(source)) => merge_entries(target, source),
    }
}

fn merge_entries(mut target: BTreeMap<String, Node>, source: BTreeMap<String, Node>) -> Node {
    for (key, value) in source {
        let merged = match target.remove(&key) {
            Some(existing) => merge(existing, value),
            None => value,
        };
        target.insert(key, merged);
    }
    Node::Obj(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_flat_pairs() {
        assert_eq!(parse(b"a=1&b=two"), json!({"a": "1", "b": "two"}));
    }

    #[test]
    fn test_deep_nesting() {
        assert_eq!(parse(b"a[b][c][d]=1"), json!({"a": {"b": {"c": {"d": "1"}}}}));

        let deep = "k[1a][2a][3a][4a][5a][6a][7a][8a][9a][10a][11a][12a]=x";
        let value = parse(deep.as_bytes());
        let mut cursor = &value["k"];
        for level in 1..=12 {
            cursor = &cursor[format!("{level}a")];
        }
        assert_eq!(cursor, &json!("x"));
    }

    #[test]
    fn test_nesting_past_depth_limit_is_a_literal_key() {
        let levels = 20_000;
        let body = format!("a{}=1", "[b]".repeat(levels));
        let value = parse(body.as_bytes());

        let mut cursor = &value["a"];
        for _ in 0..DEPTH_LIMIT {
            cursor = &cursor["b"];
        }
        assert_eq!(cursor["[b]".repeat(levels - DEPTH_LIMIT)], json!("1"));
    }

    #[test]
    fn test_nesting_at_depth_limit_is_kept() {
        let body = format!("a{}=1", "[b]".repeat(DEPTH_LIMIT));
        let value = parse(body.as_bytes());

        let mut cursor = &value["a"];
        for _ in 0..DEPTH_LIMIT {
            cursor = &cursor["b"];
        }
        assert_eq!(cursor, &json!("1"));
    }

    #[test]
    fn test_percent_encoded_brackets_nest() {
        assert_eq!(parse(b"a%5Bb%5D=hello+world"), json!({"a": {"b": "hello world"}}));
    }

    #[test]
    fn test_repeated_keys_become_arrays() {
        assert_eq!(parse(b"a=1&a=2"), json!({"a": ["1", "2"]}));
        assert_eq!(parse(b"a[]=1&a[]=2"), json!({"a": ["1", "2"]}));
        assert_eq!(parse(b"a[b]=1&a[b]=2"), json!({"a": {"b": ["1", "2"]}}));
    }

    #[test]
    fn test_indexed_arrays() {
        assert_eq!(parse(b"a[1]=b&a[0]=c"), json!({"a": ["c", "b"]}));
        // sparse slots are compacted
        assert_eq!(parse(b"a[5]=x"), json!({"a": ["x"]}));
        // past the limit indices are keys
        assert_eq!(parse(b"a[21]=x"), json!({"a": {"21": "x"}}));
    }

    #[test]
    fn test_array_of_objects() {
        assert_eq!(
            parse(b"items[0][id]=1&items[0][name]=a&items[1][id]=2"),
            json!({"items": [{"id": "1", "name": "a"}, {"id": "2"}]})
        );
    }

    #[test]
    fn test_mixed_array_and_object_keys() {
        assert_eq!(parse(b"a[0]=x&a[b]=y"), json!({"a": {"0": "x", "b": "y"}}));
    }

    #[test]
    fn test_bare_key_merged_into_object() {
        assert_eq!(parse(b"a[b]=1&a=2"), json!({"a": {"b": "1", "2": true}}));
    }

    #[test]
    fn test_prototype_like_keys_are_data() {
        assert_eq!(
            parse(b"__proto__[admin]=1&constructor=x&hasOwnProperty=y"),
            json!({"__proto__": {"admin": "1"}, "constructor": "x", "hasOwnProperty": "y"})
        );
    }

    #[test]
    fn test_edge_inputs() {
        assert_eq!(parse(b""), json!({}));
        assert_eq!(parse(b"=orphan&flag"), json!({"flag": ""}));
        assert_eq!(parse(b"a[b=1"), json!({"a[b": "1"}));
        assert_eq!(parse(b"[x]=1"), json!({"x": "1"}));
    }

    #[test]
    fn test_split_key() {
        assert_eq!(split_key("a"), vec!["a"]);
        assert_eq!(split_key("a[b][]"), vec!["a", "[b]", "[]"]);
        assert_eq!(split_key("a[[b]]"), vec!["a[", "[b]"]);

        let deep = format!("a{}[c][d]", "[b]".repeat(DEPTH_LIMIT));
        let chain = split_key(&deep);
        assert_eq!(chain.len(), DEPTH_LIMIT + 2);
        assert_eq!(chain.last().map(String::as_str), Some("[[c][d]]"));
    }
}
