use std::sync::Arc;

use crate::cluster::conditions::Condition;
use crate::cluster::conditions::Conditioned;
use crate::IndexFunc;
use crate::Object;

/// Namespaced item with a version that changes on every update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestObject {
    pub namespace: Option<String>,
    pub name: String,
    pub version: u64,
    pub labels: Vec<String>,
}

impl TestObject {
    pub fn new(
        namespace: &str,
        name: &str,
        version: u64,
    ) -> Self {
        Self {
            namespace: Some(namespace.to_string()),
            name: name.to_string(),
            version,
            labels: Vec::new(),
        }
    }

    pub fn cluster_scoped(
        name: &str,
        version: u64,
    ) -> Self {
        Self {
            namespace: None,
            name: name.to_string(),
            version,
            labels: Vec::new(),
        }
    }

    pub fn with_labels(
        mut self,
        labels: &[&str],
    ) -> Self {
        self.labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }
}

impl Object for TestObject {
    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// `ns/a`, `ns/b`, ... at version 1
pub fn objects(names: &[&str]) -> Vec<TestObject> {
    names.iter().map(|n| TestObject::new("ns", n, 1)).collect()
}

pub fn by_label() -> IndexFunc<TestObject> {
    Arc::new(|o: &TestObject| o.labels.clone())
}

/// Binding that references a kubeconfig secret by `namespace/name`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestBinding {
    pub name: String,
    pub kubeconfig_secret: String,
    pub conditions: Vec<Condition>,
}

impl TestBinding {
    pub fn new(
        name: &str,
        kubeconfig_secret: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            kubeconfig_secret: kubeconfig_secret.to_string(),
            conditions: Vec::new(),
        }
    }
}

impl Object for TestBinding {
    fn namespace(&self) -> Option<&str> {
        None
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Conditioned for TestBinding {
    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn conditions_mut(&mut self) -> &mut Vec<Condition> {
        &mut self.conditions
    }
}

pub fn by_kubeconfig_secret() -> IndexFunc<TestBinding> {
    Arc::new(|b: &TestBinding| vec![b.kubeconfig_secret.clone()])
}
