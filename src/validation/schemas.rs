// Request schemas and the typed requests they guard

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::database::models::{
    MappingChanges, NewMapping, NewReport, ReportLine, ReportStatus, UserChanges,
};
use crate::error::ApiError;
use crate::validation::sanitize::{sanitize_opt, sanitize_text};
use crate::validation::{decode, Field, Schema};

pub static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));
static UPPERCASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]").expect("valid regex"));
static LOWERCASE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z]").expect("valid regex"));
static DIGIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]").expect("valid regex"));
static SPECIAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9]").expect("valid regex"));

pub const SAME_PASSWORD_MESSAGE: &str = "A nova senha deve ser diferente da senha atual";
pub const PLAN_TYPES: &[&str] = &["basic", "professional", "enterprise"];
pub const REPORT_STATUSES: &[&str] = &["processing", "completed", "failed"];

fn password(name: &'static str, label: &'static str) -> Field {
    Field::string(name)
        .label(label)
        .required()
        .min_len(8)
        .pattern(&UPPERCASE_RE, format!("{} deve conter pelo menos uma letra maiúscula", label))
        .pattern(&LOWERCASE_RE, format!("{} deve conter pelo menos uma letra minúscula", label))
        .pattern(&DIGIT_RE, format!("{} deve conter pelo menos um número", label))
        .pattern(&SPECIAL_RE, format!("{} deve conter pelo menos um caractere especial", label))
}

fn name_field() -> Field {
    Field::string("name").label("Nome").sanitized().min_len(2).max_len(100)
}

fn email_field() -> Field {
    Field::string("email").label("Email").max_len(255).email()
}

pub static SIGNUP: Lazy<Schema> = Lazy::new(|| {
    Schema::new()
        .field(name_field().required())
        .field(email_field().required())
        .field(password("password", "Senha"))
});

pub static LOGIN: Lazy<Schema> = Lazy::new(|| {
    Schema::new()
        .field(Field::string("email").label("Email").required())
        .field(Field::string("password").label("Senha").required())
});

pub static PROFILE_UPDATE: Lazy<Schema> = Lazy::new(|| {
    Schema::new()
        .field(name_field())
        .field(email_field())
        .require_any(&["name", "email"], "Informe ao menos um campo para atualizar")
});

pub static PASSWORD_CHANGE: Lazy<Schema> = Lazy::new(|| {
    Schema::new()
        .field(Field::string("currentPassword").label("Senha atual").required())
        .field(password("newPassword", "Nova senha"))
        .field(Field::string("confirmPassword").label("Confirmação de senha").required())
        .must_match("newPassword", "confirmPassword", "As senhas não coincidem")
});

pub static MAPPING_CREATE: Lazy<Schema> = Lazy::new(|| {
    Schema::new()
        .field(Field::string("name").label("Nome").required().sanitized().min_len(1).max_len(100))
        .field(Field::string("description").label("Descrição").sanitized().max_len(500))
        .field(Field::object("mappingData").label("Mapeamento").required().string_values())
        .field(Field::boolean("isDefault"))
});

pub static MAPPING_UPDATE: Lazy<Schema> = Lazy::new(|| {
    Schema::new()
        .field(Field::string("name").label("Nome").sanitized().min_len(1).max_len(100))
        .field(Field::string("description").label("Descrição").sanitized().max_len(500))
        .field(Field::object("mappingData").label("Mapeamento").string_values())
        .require_any(
            &["name", "description", "mappingData"],
            "Informe ao menos um campo para atualizar",
        )
});

pub static REPORT_CREATE: Lazy<Schema> = Lazy::new(|| {
    Schema::new()
        .field(
            Field::string("fileName")
                .label("Nome do arquivo")
                .required()
                .sanitized()
                .min_len(1)
                .max_len(255),
        )
        .field(
            Field::array("items")
                .label("Itens")
                .required()
                .min_items(1, "O relatório deve conter pelo menos um item"),
        )
        .field(Field::number("processingTimeMs"))
        .field(Field::string("status").one_of(REPORT_STATUSES))
});

pub static EXPORT: Lazy<Schema> = Lazy::new(|| {
    Schema::new().field(
        Field::array("items")
            .label("Itens")
            .required()
            .min_items(1, "Nenhum item para exportar"),
    )
});

pub static PAYMENT: Lazy<Schema> = Lazy::new(|| {
    Schema::new()
        .field(Field::number("amount").label("Valor").required().positive().max(1_000_000.0))
        .field(
            Field::string("description")
                .label("Descrição")
                .required()
                .sanitized()
                .min_len(1)
                .max_len(255),
        )
        .field(Field::string("planType").label("Plano").required().one_of(PLAN_TYPES))
        .field(Field::object("customer").label("Cliente"))
});

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    pub fn normalized(self) -> Self {
        Self {
            name: self.name,
            email: self.email.trim().to_lowercase(),
            password: self.password,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl ProfileUpdate {
    pub fn into_changes(self) -> UserChanges {
        UserChanges {
            name: self.name,
            email: self.email.map(|e| e.trim().to_lowercase()),
            password_hash: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

/// Schema messages plus the separate rule that the new password must differ
/// from the current one; the latter is evaluated even when the schema fails.
pub fn parse_password_change(input: Value) -> Result<PasswordChange, ApiError> {
    let mut errors = PASSWORD_CHANGE.check(&input).err().unwrap_or_default();

    let current = input.get("currentPassword").and_then(Value::as_str);
    let new = input.get("newPassword").and_then(Value::as_str);
    if let (Some(current), Some(new)) = (current, new) {
        if current == new {
            errors.push(SAME_PASSWORD_MESSAGE.to_string());
        }
    }

    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }
    decode(input)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingCreate {
    pub name: String,
    pub description: Option<String>,
    pub mapping_data: BTreeMap<String, String>,
    #[serde(default)]
    pub is_default: bool,
}

fn sanitize_mapping(data: BTreeMap<String, String>) -> BTreeMap<String, String> {
    data.into_iter()
        .map(|(header, field)| (sanitize_text(&header), sanitize_text(&field)))
        .collect()
}

impl MappingCreate {
    pub fn into_new_mapping(self) -> NewMapping {
        NewMapping {
            name: self.name,
            description: self.description,
            mapping_data: sanitize_mapping(self.mapping_data),
            is_default: self.is_default,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub mapping_data: Option<BTreeMap<String, String>>,
}

impl MappingUpdate {
    pub fn into_changes(self) -> MappingChanges {
        MappingChanges {
            name: self.name,
            description: self.description,
            mapping_data: self.mapping_data.map(sanitize_mapping),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCreate {
    pub file_name: String,
    pub items: Vec<ReportLine>,
    pub processing_time_ms: Option<i64>,
    pub status: Option<ReportStatus>,
}

fn sanitize_line(line: ReportLine) -> ReportLine {
    ReportLine {
        form_norm: sanitize_opt(line.form_norm),
        descricao: sanitize_opt(line.descricao),
        vendedor: sanitize_opt(line.vendedor),
        data: sanitize_opt(line.data),
        cliente: sanitize_opt(line.cliente),
        categoria: sanitize_opt(line.categoria),
        ..line
    }
}

impl ReportCreate {
    pub fn into_new_report(self) -> NewReport {
        NewReport {
            file_name: self.file_name,
            status: self.status.unwrap_or(ReportStatus::Completed),
            processing_time_ms: self.processing_time_ms.unwrap_or(0).max(0),
            lines: self.items.into_iter().map(sanitize_line).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub items: Vec<ReportLine>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn change(current: &str, new: &str, confirm: &str) -> Value {
        json!({"currentPassword": current, "newPassword": new, "confirmPassword": confirm})
    }

    fn details(err: ApiError) -> Vec<String> {
        match err {
            ApiError::ValidationError { details, .. } => details,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn accepts_a_complete_password_change() {
        let parsed = parse_password_change(change("Antiga@123", "Nova@1234", "Nova@1234")).unwrap();
        assert_eq!(parsed.new_password, "Nova@1234");
    }

    #[test]
    fn each_complexity_rule_is_enforced() {
        for weak in ["nova@1234", "NOVA@1234", "Nova@abcd", "Nova1234x", "Nv@1"] {
            let err = parse_password_change(change("Antiga@123", weak, weak)).unwrap_err();
            assert_eq!(details(err).len(), 1, "{} should break exactly one rule", weak);
        }
    }

    #[test]
    fn reuse_is_rejected_even_when_the_schema_passes() {
        let errors = details(parse_password_change(change("Mesma@123", "Mesma@123", "Mesma@123")).unwrap_err());
        assert_eq!(errors, vec![SAME_PASSWORD_MESSAGE]);
    }

    #[test]
    fn reuse_is_reported_alongside_schema_errors() {
        let errors = details(parse_password_change(change("fraca", "fraca", "outra")).unwrap_err());
        assert!(errors.contains(&SAME_PASSWORD_MESSAGE.to_string()));
        assert!(errors.contains(&"As senhas não coincidem".to_string()));
        assert!(errors.len() > 2);
    }

    #[test]
    fn signup_rejects_bad_email_and_short_name() {
        let errors = SIGNUP
            .check(&json!({"name": "A", "email": "sem-arroba", "password": "Forte@123"}))
            .unwrap_err();
        assert_eq!(errors, vec!["Nome deve ter pelo menos 2 caracteres", "Email inválido"]);
    }

    #[test]
    fn signup_normalises_email_and_sanitises_name() {
        let request: SignupRequest = SIGNUP
            .parse(json!({"name": "<b>Ana</b>", "email": "Ana@Farmacia.com", "password": "Forte@123"}))
            .unwrap();
        let request = request.normalized();
        assert_eq!(request.name, "Ana");
        assert_eq!(request.email, "ana@farmacia.com");
    }

    #[test]
    fn profile_update_needs_a_field() {
        assert_eq!(
            PROFILE_UPDATE.check(&json!({})).unwrap_err(),
            vec!["Informe ao menos um campo para atualizar"]
        );
        assert!(PROFILE_UPDATE.check(&json!({"name": "Ana"})).is_ok());
    }

    #[test]
    fn payment_amount_bounds() {
        let base = |amount: f64| {
            json!({"amount": amount, "description": "Plano", "planType": "basic"})
        };
        assert!(PAYMENT.check(&base(49.9)).is_ok());
        assert!(PAYMENT.check(&base(0.0)).is_err());
        assert!(PAYMENT.check(&base(1_000_001.0)).is_err());

        let errors = PAYMENT
            .check(&json!({"amount": 10, "description": "x", "planType": "gold"}))
            .unwrap_err();
        assert_eq!(errors, vec!["Plano deve ser um de: basic, professional, enterprise"]);
    }

    #[test]
    fn mapping_values_are_sanitised() {
        let request: MappingCreate = MAPPING_CREATE
            .parse(json!({"name": "Padrão", "mappingData": {"Produto": "<i>formNorm</i>"}}))
            .unwrap();
        let mapping = request.into_new_mapping();
        assert_eq!(mapping.mapping_data["Produto"], "formNorm");
        assert!(!mapping.is_default);
    }

    #[test]
    fn names_that_sanitise_to_nothing_are_rejected() {
        let err = SIGNUP
            .parse::<SignupRequest>(json!({"name": "<b></b>", "email": "ana@farmacia.com", "password": "Forte@123"}))
            .unwrap_err();
        assert_eq!(details(err), vec!["Nome deve ter pelo menos 2 caracteres"]);

        let err = MAPPING_CREATE
            .parse::<MappingCreate>(json!({"name": "<i> </i>", "mappingData": {}}))
            .unwrap_err();
        assert_eq!(details(err), vec!["Nome deve ter pelo menos 1 caracteres"]);
    }

    #[test]
    fn report_lines_are_sanitised() {
        let request: ReportCreate = REPORT_CREATE
            .parse(json!({
                "fileName": "<b>março</b>.xlsx",
                "items": [{
                    "descricao": "<script>alert(1)</script>Cápsula",
                    "cliente": "<img src=x onerror=alert(1)>Maria",
                    "vendedor": "javascript:João",
                    "quantidade": 2
                }]
            }))
            .unwrap();
        let report = request.into_new_report();

        assert_eq!(report.file_name, "março.xlsx");
        let line = &report.lines[0];
        assert_eq!(line.descricao.as_deref(), Some("Cápsula"));
        assert_eq!(line.cliente.as_deref(), Some("Maria"));
        assert_eq!(line.vendedor.as_deref(), Some("João"));
        assert_eq!(line.quantidade, Some(2.0));
    }

    #[test]
    fn export_requires_items() {
        assert_eq!(
            EXPORT.check(&json!({"items": []})).unwrap_err(),
            vec!["Nenhum item para exportar"]
        );
    }
}
