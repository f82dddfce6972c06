use crate::InformerError;
use crate::Result;

/// An item held by an informer, identified by `namespace/name`.
///
/// The informer machinery never looks past the key, so any domain type can
/// be watched as long as it can name itself.
pub trait Object: Clone + Send + Sync + 'static {
    /// `None` for cluster-scoped items
    fn namespace(&self) -> Option<&str>;

    fn name(&self) -> &str;

    /// `namespace/name`, or just `name` for cluster-scoped items
    fn key(&self) -> String {
        match self.namespace() {
            Some(ns) if !ns.is_empty() => format!("{}/{}", ns, self.name()),
            _ => self.name().to_string(),
        }
    }
}

/// Splits a `namespace/name` key. Cluster-scoped keys yield an empty
/// namespace.
pub fn split_meta_namespace_key(key: &str) -> Result<(&str, &str)> {
    let mut parts = key.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), None, None) if !name.is_empty() => Ok(("", name)),
        (Some(ns), Some(name), None) if !name.is_empty() => Ok((ns, name)),
        _ => Err(InformerError::InvalidKey(key.to_string()).into()),
    }
}
