#![allow(dead_code)]

use serde_json::{json, Map, Value};

/// One statement block with its literal inputs, fields and optional body.
#[derive(Debug, Clone)]
pub struct Stmt {
    opcode: String,
    inputs: Vec<(String, Value)>,
    fields: Vec<(String, Value)>,
    body: Option<Vec<Stmt>>,
}

pub fn stmt(opcode: &str) -> Stmt {
    Stmt {
        opcode: opcode.to_string(),
        inputs: Vec::new(),
        fields: Vec::new(),
        body: None,
    }
}

impl Stmt {
    pub fn num(mut self, slot: &str, value: &str) -> Self {
        self.inputs.push((slot.to_string(), json!([1, [4, value]])));
        self
    }

    pub fn text(mut self, slot: &str, value: &str) -> Self {
        self.inputs.push((slot.to_string(), json!([1, [10, value]])));
        self
    }

    /// A variable reporter dropped into `slot`.
    pub fn var_input(mut self, slot: &str, id: &str, name: &str) -> Self {
        self.inputs
            .push((slot.to_string(), json!([3, [12, name, id], [10, ""]])));
        self
    }

    pub fn var(mut self, id: &str, name: &str) -> Self {
        self.fields.push(("VARIABLE".to_string(), json!([name, id])));
        self
    }

    pub fn list(mut self, id: &str, name: &str) -> Self {
        self.fields.push(("LIST".to_string(), json!([name, id])));
        self
    }

    /// A list reporter dropped into `slot`.
    pub fn list_input(mut self, slot: &str, id: &str, name: &str) -> Self {
        self.inputs
            .push((slot.to_string(), json!([3, [13, name, id], [10, ""]])));
        self
    }

    pub fn body(mut self, stmts: Vec<Stmt>) -> Self {
        self.body = Some(stmts);
        self
    }
}

pub fn flag_script(stmts: Vec<Stmt>) -> Vec<Stmt> {
    let mut script = vec![stmt("event_whenflagclicked")];
    script.extend(stmts);
    script
}

/// Builds a `project.json` document: a stage followed by sprites.
#[derive(Debug, Clone, Default)]
pub struct ProjectDoc {
    stage_variables: Map<String, Value>,
    stage_lists: Map<String, Value>,
    sprites: Vec<(String, Vec<Vec<Stmt>>)>,
}

impl ProjectDoc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn variable(mut self, id: &str, name: &str) -> Self {
        self.stage_variables.insert(id.to_string(), json!([name, 0]));
        self
    }

    pub fn list(mut self, id: &str, name: &str) -> Self {
        self.stage_lists.insert(id.to_string(), json!([name, []]));
        self
    }

    pub fn sprite(mut self, name: &str, scripts: Vec<Vec<Stmt>>) -> Self {
        self.sprites.push((name.to_string(), scripts));
        self
    }

    pub fn build(self) -> Value {
        let mut targets = vec![json!({
            "isStage": true,
            "name": "Stage",
            "variables": Value::Object(self.stage_variables),
            "lists": Value::Object(self.stage_lists),
            "blocks": {}
        })];
        for (name, scripts) in self.sprites {
            let mut emitter = Emitter::default();
            for (i, script) in scripts.iter().enumerate() {
                emitter.chain(script, None, Some(i as f64 * 200.0));
            }
            targets.push(json!({
                "isStage": false,
                "name": name,
                "variables": {},
                "blocks": Value::Object(emitter.blocks)
            }));
        }
        json!({ "targets": targets, "meta": { "semver": "3.0.0" } })
    }
}

#[derive(Default)]
struct Emitter {
    blocks: Map<String, Value>,
    next_id: usize,
}

impl Emitter {
    /// Emits a `next` chain and returns the id of its first block.
    fn chain(&mut self, stmts: &[Stmt], parent: Option<String>, top_y: Option<f64>) -> Option<String> {
        let ids: Vec<String> = stmts
            .iter()
            .map(|_| {
                self.next_id += 1;
                format!("b{}", self.next_id)
            })
            .collect();
        for (i, s) in stmts.iter().enumerate() {
            let parent_id = if i == 0 { parent.clone() } else { Some(ids[i - 1].clone()) };
            let mut inputs = Map::new();
            for (slot, value) in &s.inputs {
                inputs.insert(slot.clone(), value.clone());
            }
            if let Some(body) = &s.body {
                if let Some(first) = self.chain(body, Some(ids[i].clone()), None) {
                    inputs.insert("SUBSTACK".to_string(), json!([2, first]));
                }
            }
            let mut fields = Map::new();
            for (name, value) in &s.fields {
                fields.insert(name.clone(), value.clone());
            }
            let top_level = i == 0 && top_y.is_some();
            let mut block = json!({
                "opcode": s.opcode,
                "next": ids.get(i + 1),
                "parent": parent_id,
                "inputs": Value::Object(inputs),
                "fields": Value::Object(fields),
                "shadow": false,
                "topLevel": top_level
            });
            if let (true, Some(y)) = (top_level, top_y) {
                block["x"] = json!(0);
                block["y"] = json!(y);
            }
            self.blocks.insert(ids[i].clone(), block);
        }
        ids.into_iter().next()
    }
}

/// Renames variables throughout a document, ids and display names alike.
pub fn rename(doc: &Value, renames: &[(&str, &str)]) -> Value {
    let mut text = doc.to_string();
    for (from, to) in renames {
        text = text.replace(&format!("\"{}\"", from), &format!("\"{}\"", to));
    }
    serde_json::from_str(&text).expect("renamed document stays valid JSON")
}
