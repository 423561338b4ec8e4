#![allow(dead_code)]

use serde_yaml::{Mapping, Value};

/// Builder for one control block, preserving the order entries are added in
/// (order is compile order and therefore matters to most tests).
pub struct BlockBuilder {
    pins: Mapping,
    entries: Vec<(String, Value)>,
}

impl BlockBuilder {
    pub fn new() -> Self {
        Self {
            pins: Mapping::new(),
            entries: Vec::new(),
        }
    }

    pub fn pin(mut self, name: &str, values: &[&str]) -> Self {
        self.pins.insert(
            Value::String(name.to_string()),
            Value::Sequence(values.iter().map(|v| Value::String(v.to_string())).collect()),
        );
        self
    }

    pub fn pin_bool(mut self, name: &str, value: bool) -> Self {
        self.pins.insert(
            Value::String(name.to_string()),
            Value::Sequence(vec![Value::Bool(value)]),
        );
        self
    }

    pub fn include(mut self, path: &str, filename: &str) -> Self {
        let pair = Value::Sequence(vec![
            Value::String(path.to_string()),
            Value::String(filename.to_string()),
        ]);
        match self.entries.iter_mut().find(|(k, _)| k == "include") {
            Some((_, Value::Sequence(seq))) => seq.push(pair),
            _ => self
                .entries
                .push(("include".to_string(), Value::Sequence(vec![pair]))),
        }
        self
    }

    pub fn template(mut self, name: &str) -> Self {
        let name = Value::String(name.to_string());
        match self.entries.iter_mut().find(|(k, _)| k == "template") {
            Some((_, Value::Sequence(seq))) => seq.push(name),
            _ => self
                .entries
                .push(("template".to_string(), Value::Sequence(vec![name]))),
        }
        self
    }

    pub fn action(mut self, name: &str, args: Value) -> Self {
        self.entries.push((name.to_string(), args));
        self
    }

    pub fn action_strs(self, name: &str, args: &[&str]) -> Self {
        self.action(name, str_seq(args))
    }

    pub fn policy(self, names: &[&str]) -> Self {
        self.action("policy", str_seq(names))
    }

    pub fn build(self) -> Value {
        let mut map = Mapping::new();
        if !self.pins.is_empty() {
            map.insert(Value::String("pin".to_string()), Value::Mapping(self.pins));
        }
        for (key, value) in self.entries {
            map.insert(Value::String(key), value);
        }
        Value::Mapping(map)
    }
}

impl Default for BlockBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a whole configuration document, rendered to YAML so tests can
/// drop it into a mock filesystem.
pub struct DocumentBuilder {
    controls: Vec<Value>,
    templates: Mapping,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self {
            controls: Vec::new(),
            templates: Mapping::new(),
        }
    }

    pub fn block(mut self, block: BlockBuilder) -> Self {
        self.controls.push(block.build());
        self
    }

    pub fn with_template(mut self, name: &str, body: BlockBuilder) -> Self {
        self.templates
            .insert(Value::String(name.to_string()), body.build());
        self
    }

    pub fn to_yaml(self) -> String {
        let mut doc = Mapping::new();
        if !self.templates.is_empty() {
            doc.insert(
                Value::String("templates".to_string()),
                Value::Mapping(self.templates),
            );
        }
        doc.insert(
            Value::String("controls".to_string()),
            Value::Sequence(self.controls),
        );
        serde_yaml::to_string(&Value::Mapping(doc)).expect("document serializes")
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `["a", "b"]` as a YAML sequence value.
pub fn str_seq(values: &[&str]) -> Value {
    Value::Sequence(values.iter().map(|v| Value::String(v.to_string())).collect())
}
