use crate::SharedString;
use std::fmt;
use std::slice::Iter;

/// A key/value pair further describing a metric.
///
/// Tags differentiate the context a metric is emitted from: the same logical
/// metric name can be recorded per endpoint, per host, per table, and so on.
/// Composite metrics also use tags to namespace their sub-metrics, for example
/// appending `statistic=count` to their own identity.
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Debug)]
pub struct Tag(SharedString, SharedString);

impl Tag {
    /// Creates a `Tag` from a key and value.
    pub fn new<K, V>(key: K, value: V) -> Tag
    where
        K: Into<SharedString>,
        V: Into<SharedString>,
    {
        Tag(key.into(), value.into())
    }

    /// Key of this tag.
    pub fn key(&self) -> &str {
        self.0.as_ref()
    }

    /// Value of this tag.
    pub fn value(&self) -> &str {
        self.1.as_ref()
    }

    /// Consumes this `Tag`, returning the key and value.
    pub fn into_parts(self) -> (SharedString, SharedString) {
        (self.0, self.1)
    }
}

impl<K, V> From<&(K, V)> for Tag
where
    K: Into<SharedString> + Clone,
    V: Into<SharedString> + Clone,
{
    fn from(pair: &(K, V)) -> Tag {
        Tag::new(pair.0.clone(), pair.1.clone())
    }
}

/// A value that can be converted to a vector of [`Tag`]s.
pub trait IntoTags {
    /// Consumes this value, turning it into a vector of [`Tag`]s.
    fn into_tags(self) -> Vec<Tag>;
}

impl IntoTags for Vec<Tag> {
    fn into_tags(self) -> Vec<Tag> {
        self
    }
}

impl<T, G> IntoTags for &T
where
    Self: IntoIterator<Item = G>,
    G: Into<Tag>,
{
    fn into_tags(self) -> Vec<Tag> {
        self.into_iter().map(|t| t.into()).collect()
    }
}

/// The immutable identity of a metric: a name plus a set of tags.
///
/// Two configs are equal iff their names and tag sets are equal; tag order at
/// construction does not matter.  A config is created once when a metric is
/// built and never mutated afterwards; composites derive sub-metric identities
/// with [`with_tag`](MetricConfig::with_tag).
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct MetricConfig {
    name: SharedString,
    // Sorted at construction so equality and hashing are order-insensitive.
    tags: Vec<Tag>,
}

impl MetricConfig {
    /// Creates a `MetricConfig` from a name, with no tags.
    pub fn new<N>(name: N) -> MetricConfig
    where
        N: Into<SharedString>,
    {
        MetricConfig { name: name.into(), tags: Vec::new() }
    }

    /// Creates a `MetricConfig` from a name and tags.
    pub fn from_name_and_tags<N, T>(name: N, tags: T) -> MetricConfig
    where
        N: Into<SharedString>,
        T: IntoTags,
    {
        let mut tags = tags.into_tags();
        tags.sort();
        MetricConfig { name: name.into(), tags }
    }

    /// Derives a new config with one additional tag.
    ///
    /// The original config is left untouched; composite metrics use this to
    /// namespace their sub-metrics under a shared identity.
    pub fn with_tag<K, V>(&self, key: K, value: V) -> MetricConfig
    where
        K: Into<SharedString>,
        V: Into<SharedString>,
    {
        let mut tags = self.tags.clone();
        tags.push(Tag::new(key, value));
        tags.sort();
        MetricConfig { name: self.name.clone(), tags }
    }

    /// Name of this config.
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    /// Tags of this config, sorted by key then value.
    pub fn tags(&self) -> Iter<'_, Tag> {
        self.tags.iter()
    }
}

impl fmt::Display for MetricConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tags.is_empty() {
            write!(f, "{}", self.name)
        } else {
            let kv_pairs =
                self.tags.iter().map(|tag| format!("{}={}", tag.0, tag.1)).collect::<Vec<_>>();
            write!(f, "{}[{}]", self.name, kv_pairs.join(", "))
        }
    }
}

impl From<String> for MetricConfig {
    fn from(name: String) -> MetricConfig {
        MetricConfig::new(name)
    }
}

impl From<&'static str> for MetricConfig {
    fn from(name: &'static str) -> MetricConfig {
        MetricConfig::new(name)
    }
}
