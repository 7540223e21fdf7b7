//! Declarative field schemas checked against raw JSON before anything is
//! decoded into a typed request.
//!
//! Messages come back in declaration order: fields in the order they were
//! added, rules within a field in the order they were chained, then
//! cross-field checks. A missing required field or a wrong type stops the
//! remaining rules of that field only. Fields marked `sanitized` are cleaned
//! before any rule runs, so length limits apply to the text that is stored.

pub mod sanitize;
pub mod schemas;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::ApiError;

pub use sanitize::{sanitize_text, MAX_TEXT_LENGTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Number,
    Bool,
    Object,
    Array,
}

impl FieldKind {
    fn matches(&self, value: &Value) -> bool {
        match self {
            FieldKind::String => value.is_string(),
            FieldKind::Number => value.is_number(),
            FieldKind::Bool => value.is_boolean(),
            FieldKind::Object => value.is_object(),
            FieldKind::Array => value.is_array(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            FieldKind::String => "um texto",
            FieldKind::Number => "um número",
            FieldKind::Bool => "verdadeiro ou falso",
            FieldKind::Object => "um objeto",
            FieldKind::Array => "uma lista",
        }
    }
}

#[derive(Debug, Clone)]
enum Rule {
    MinLength(usize),
    MaxLength(usize),
    Pattern(&'static Regex, String),
    Positive,
    Max(f64),
    OneOf(&'static [&'static str]),
    MinItems(usize, String),
    StringValues,
}

/// One named field and the rules it must satisfy
#[derive(Debug, Clone)]
pub struct Field {
    name: &'static str,
    label: &'static str,
    kind: FieldKind,
    required: bool,
    sanitized: bool,
    rules: Vec<Rule>,
}

impl Field {
    fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            label: name,
            kind,
            required: false,
            sanitized: false,
            rules: Vec::new(),
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, FieldKind::String)
    }

    pub fn number(name: &'static str) -> Self {
        Self::new(name, FieldKind::Number)
    }

    pub fn boolean(name: &'static str) -> Self {
        Self::new(name, FieldKind::Bool)
    }

    pub fn object(name: &'static str) -> Self {
        Self::new(name, FieldKind::Object)
    }

    pub fn array(name: &'static str) -> Self {
        Self::new(name, FieldKind::Array)
    }

    /// Human-facing name used in generated messages
    pub fn label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Free text: run `sanitize_text` on the value before checking it
    pub fn sanitized(mut self) -> Self {
        self.sanitized = true;
        self
    }

    /// Length in characters, not bytes
    pub fn min_len(mut self, min: usize) -> Self {
        self.rules.push(Rule::MinLength(min));
        self
    }

    pub fn max_len(mut self, max: usize) -> Self {
        self.rules.push(Rule::MaxLength(max));
        self
    }

    pub fn pattern(mut self, regex: &'static Regex, message: impl Into<String>) -> Self {
        self.rules.push(Rule::Pattern(regex, message.into()));
        self
    }

    pub fn email(self) -> Self {
        self.pattern(&schemas::EMAIL_RE, "Email inválido")
    }

    pub fn positive(mut self) -> Self {
        self.rules.push(Rule::Positive);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.rules.push(Rule::Max(max));
        self
    }

    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.rules.push(Rule::OneOf(allowed));
        self
    }

    pub fn min_items(mut self, min: usize, message: impl Into<String>) -> Self {
        self.rules.push(Rule::MinItems(min, message.into()));
        self
    }

    /// Every value of an object field must be a string
    pub fn string_values(mut self) -> Self {
        self.rules.push(Rule::StringValues);
        self
    }

    fn check(&self, value: Option<&Value>, errors: &mut Vec<String>) {
        let value = match value {
            None | Some(Value::Null) => {
                if self.required {
                    errors.push(format!("{} é obrigatório", self.label));
                }
                return;
            }
            Some(value) => value,
        };

        if !self.kind.matches(value) {
            errors.push(format!("{} deve ser {}", self.label, self.kind.describe()));
            return;
        }

        for rule in &self.rules {
            if let Some(message) = self.violation(rule, value) {
                errors.push(message);
            }
        }
    }

    fn violation(&self, rule: &Rule, value: &Value) -> Option<String> {
        match rule {
            Rule::MinLength(min) => {
                let len = value.as_str()?.chars().count();
                (len < *min).then(|| format!("{} deve ter pelo menos {} caracteres", self.label, min))
            }
            Rule::MaxLength(max) => {
                let len = value.as_str()?.chars().count();
                (len > *max).then(|| format!("{} deve ter no máximo {} caracteres", self.label, max))
            }
            Rule::Pattern(regex, message) => {
                (!regex.is_match(value.as_str()?)).then(|| message.clone())
            }
            Rule::Positive => {
                (value.as_f64()? <= 0.0).then(|| format!("{} deve ser maior que zero", self.label))
            }
            Rule::Max(max) => {
                (value.as_f64()? > *max).then(|| format!("{} deve ser no máximo {}", self.label, max))
            }
            Rule::OneOf(allowed) => {
                let text = value.as_str()?;
                (!allowed.contains(&text))
                    .then(|| format!("{} deve ser um de: {}", self.label, allowed.join(", ")))
            }
            Rule::MinItems(min, message) => {
                (value.as_array()?.len() < *min).then(|| message.clone())
            }
            Rule::StringValues => {
                let object = value.as_object()?;
                (!object.values().all(Value::is_string))
                    .then(|| format!("{} deve conter apenas textos", self.label))
            }
        }
    }
}

#[derive(Debug, Clone)]
enum CrossCheck {
    MustMatch {
        field: &'static str,
        other: &'static str,
        message: &'static str,
    },
    RequireAny {
        fields: &'static [&'static str],
        message: &'static str,
    },
}

/// Ordered set of field declarations plus cross-field checks
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<Field>,
    cross: Vec<CrossCheck>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Both fields present and unequal yields `message`
    pub fn must_match(mut self, field: &'static str, other: &'static str, message: &'static str) -> Self {
        self.cross.push(CrossCheck::MustMatch { field, other, message });
        self
    }

    /// None of `fields` present yields `message`
    pub fn require_any(mut self, fields: &'static [&'static str], message: &'static str) -> Self {
        self.cross.push(CrossCheck::RequireAny { fields, message });
        self
    }

    pub fn check(&self, input: &Value) -> Result<(), Vec<String>> {
        let Some(object) = input.as_object() else {
            return Err(vec!["O corpo da requisição deve ser um objeto JSON".to_string()]);
        };

        let mut errors = Vec::new();
        for field in &self.fields {
            field.check(object.get(field.name), &mut errors);
        }
        for check in &self.cross {
            if let Some(message) = cross_violation(check, object) {
                errors.push(message.to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Sanitise marked fields, check, then decode into the typed request
    pub fn parse<T: DeserializeOwned>(&self, mut input: Value) -> Result<T, ApiError> {
        self.sanitize(&mut input);
        self.check(&input).map_err(ApiError::validation)?;
        decode(input)
    }

    fn sanitize(&self, input: &mut Value) {
        let Some(object) = input.as_object_mut() else {
            return;
        };
        for field in self.fields.iter().filter(|f| f.sanitized) {
            if let Some(Value::String(text)) = object.get_mut(field.name) {
                *text = sanitize_text(text);
            }
        }
    }
}

fn present<'a>(object: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).filter(|v| !v.is_null())
}

fn cross_violation(check: &CrossCheck, object: &Map<String, Value>) -> Option<&'static str> {
    match check {
        CrossCheck::MustMatch { field, other, message } => {
            let a = present(object, field)?;
            let b = present(object, other)?;
            (a != b).then_some(*message)
        }
        CrossCheck::RequireAny { fields, message } => {
            (!fields.iter().any(|f| present(object, f).is_some())).then_some(*message)
        }
    }
}

/// Decode an already-checked payload; a shape the schema did not catch is still a 400
pub fn decode<T: DeserializeOwned>(input: Value) -> Result<T, ApiError> {
    serde_json::from_value(input).map_err(|e| {
        tracing::debug!("Payload passed schema but failed to decode: {}", e);
        ApiError::validation(vec!["Formato de dados inválido".to_string()])
    })
}
