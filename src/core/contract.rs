use crate::utils::error::{AppError, Result};
use jsonschema::JSONSchema;
use serde_json::{json, Value};
use std::collections::HashMap;

/// 某個路由宣告的請求 / 回應格式
pub struct Contract {
    request: Option<JSONSchema>,
    response: Option<JSONSchema>,
}

impl Contract {
    pub fn new(request: Option<Value>, response: Option<Value>) -> Result<Self> {
        Ok(Self {
            request: request.as_ref().map(compile).transpose()?,
            response: response.as_ref().map(compile).transpose()?,
        })
    }

    pub fn has_request_schema(&self) -> bool {
        self.request.is_some()
    }

    pub fn has_response_schema(&self) -> bool {
        self.response.is_some()
    }

    pub fn check_request(&self, body: &Value) -> Result<()> {
        match &self.request {
            Some(schema) => check(schema, body),
            None => Ok(()),
        }
    }

    pub fn check_response(&self, body: &Value) -> Result<()> {
        match &self.response {
            Some(schema) => check(schema, body),
            None => Ok(()),
        }
    }
}

fn compile(schema: &Value) -> Result<JSONSchema> {
    JSONSchema::compile(schema).map_err(|e| AppError::ConfigError {
        message: format!("invalid contract schema: {}", e),
    })
}

fn check(schema: &JSONSchema, body: &Value) -> Result<()> {
    if let Err(errors) = schema.validate(body) {
        let errors: Vec<String> = errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    e.to_string()
                } else {
                    format!("{}: {}", path, e)
                }
            })
            .collect();
        return Err(AppError::ContractViolation { errors });
    }
    Ok(())
}

/// 以 `"<METHOD> <route pattern>"` 為鍵的契約表
#[derive(Default)]
pub struct ContractRegistry {
    contracts: HashMap<String, Contract>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: &str, route: &str, contract: Contract) {
        self.contracts
            .insert(format!("{} {}", method.to_uppercase(), route), contract);
    }

    pub fn get(&self, method: &str, route: &str) -> Option<&Contract> {
        self.contracts.get(&format!("{} {}", method.to_uppercase(), route))
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// 公開寫入端點與登入端點的內建契約
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        let email = json!({ "type": "string", "minLength": 3, "maxLength": 254 });
        let optional_text = |max: usize| json!({ "type": ["string", "null"], "maxLength": max });

        registry.register(
            "POST",
            "/api/contact",
            Contract::new(
                Some(json!({
                    "type": "object",
                    "required": ["name", "email", "message"],
                    "properties": {
                        "name": { "type": "string", "minLength": 1, "maxLength": 100 },
                        "email": email,
                        "message": { "type": "string", "minLength": 10, "maxLength": 5000 },
                        "phone": optional_text(40),
                        "company": optional_text(150),
                        "subject": optional_text(200)
                    },
                    "additionalProperties": false
                })),
                Some(json!({
                    "type": "object",
                    "required": ["id", "message"],
                    "properties": { "id": { "type": "integer" }, "message": { "type": "string" } }
                })),
            )?,
        );

        let newsletter = json!({
            "type": "object",
            "required": ["email"],
            "properties": {
                "email": email,
                "name": optional_text(100)
            },
            "additionalProperties": false
        });
        registry.register(
            "POST",
            "/api/newsletter/subscribe",
            Contract::new(
                Some(newsletter.clone()),
                Some(json!({
                    "type": "object",
                    "required": ["email", "already_subscribed"],
                    "properties": {
                        "email": { "type": "string" },
                        "already_subscribed": { "type": "boolean" }
                    }
                })),
            )?,
        );
        registry.register(
            "POST",
            "/api/newsletter/unsubscribe",
            Contract::new(Some(newsletter), None)?,
        );

        registry.register(
            "POST",
            "/api/inquiries",
            Contract::new(
                Some(json!({
                    "type": "object",
                    "required": ["name", "email", "details"],
                    "properties": {
                        "name": { "type": "string", "minLength": 1, "maxLength": 100 },
                        "email": email,
                        "details": { "type": "string", "minLength": 10, "maxLength": 5000 },
                        "phone": optional_text(40),
                        "company": optional_text(150),
                        "service": optional_text(200),
                        "budget": optional_text(100),
                        "timeline": optional_text(100)
                    },
                    "additionalProperties": false
                })),
                None,
            )?,
        );

        registry.register(
            "POST",
            "/api/chat",
            Contract::new(
                Some(json!({
                    "type": "object",
                    "required": ["messages"],
                    "properties": {
                        "messages": {
                            "type": "array",
                            "minItems": 1,
                            "items": {
                                "type": "object",
                                "required": ["role", "content"],
                                "properties": {
                                    "role": { "type": "string", "enum": ["user", "assistant"] },
                                    "content": { "type": "string", "minLength": 1 }
                                }
                            }
                        }
                    }
                })),
                Some(json!({
                    "type": "object",
                    "required": ["reply", "model"],
                    "properties": {
                        "reply": { "type": "string" },
                        "model": { "type": "string" }
                    }
                })),
            )?,
        );

        registry.register(
            "POST",
            "/api/admin/login",
            Contract::new(
                Some(json!({
                    "type": "object",
                    "required": ["email", "password"],
                    "properties": {
                        "email": { "type": "string", "minLength": 1 },
                        "password": { "type": "string", "minLength": 1 }
                    }
                })),
                None,
            )?,
        );

        Ok(registry)
    }
}
