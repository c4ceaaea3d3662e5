//! Operation descriptors (spec.md §4.6.2): the OpenAPI-visible contract for
//! one `(method, pattern)` handler, combining a [`crate::binding::Binding`]'s
//! parameter/body shape with caller-supplied documentation options.

use serde_json::Value;

use crate::binding::{Location, ParameterMeta};

/// Documentation options accepted by `register()`, beyond what the binding
/// plan itself determines (§4.6.2's "tags, summary, description, deprecated,
/// callbacks, security, servers, external docs, response overrides").
#[derive(Debug, Clone, Default)]
pub struct OperationOptions {
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub deprecated: bool,
    pub security: Vec<Value>,
    pub servers: Vec<Value>,
    pub external_docs: Option<Value>,
    /// Response overrides keyed by status code string (e.g. `"404"`),
    /// merged over the default `"200"` entry this module derives from the
    /// handler's output type.
    pub responses: Vec<(String, Value)>,
}

impl OperationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    pub fn response(mut self, status: impl Into<String>, schema: Value) -> Self {
        self.responses.push((status.into(), schema));
        self
    }
}

/// One `(method, pattern)` handler's full OpenAPI-visible contract.
/// Constructed by `OpenApiScope::register` and appended to the server's
/// shared operation list via the hook registry.
#[derive(Debug, Clone)]
pub struct Operation {
    pub method: http::Method,
    pub pattern: String,
    pub parameters: Vec<ParameterMeta>,
    pub request_body: Option<Value>,
    pub options: OperationOptions,
    /// `text/plain` if the handler's output is a bare string, else `"application/json"`.
    pub response_media_type: &'static str,
    pub response_schema: Option<Value>,
}

fn location_in(location: Location) -> &'static str {
    match location {
        Location::Path => "path",
        Location::Query => "query",
        Location::Header => "header",
        Location::Body | Location::Form => unreachable!("body/form aren't parameter locations"),
    }
}

impl Operation {
    /// Render this operation's OpenAPI Operation Object, merging in any
    /// response overrides from `options.responses` over the derived default.
    pub fn to_openapi_operation(&self) -> Value {
        let mut parameters = Vec::with_capacity(self.parameters.len());
        for p in &self.parameters {
            let mut param = serde_json::json!({
                "name": p.name,
                "in": location_in(p.location),
                "required": p.options.required,
            });
            if let Some(obj) = param.as_object_mut() {
                if let Some(desc) = p.options.description {
                    obj.insert("description".to_string(), Value::String(desc.to_string()));
                }
                if p.options.deprecated {
                    obj.insert("deprecated".to_string(), Value::Bool(true));
                }
            }
            parameters.push(param);
        }

        let mut responses = serde_json::Map::new();
        responses.insert(
            "200".to_string(),
            serde_json::json!({
                "description": "OK",
                "content": {
                    self.response_media_type: {
                        "schema": self.response_schema.clone().unwrap_or(serde_json::json!({"type": "string"})),
                    }
                }
            }),
        );
        for (status, schema) in &self.options.responses {
            responses.insert(status.clone(), schema.clone());
        }

        let mut op = serde_json::json!({
            "parameters": parameters,
            "responses": Value::Object(responses),
        });
        let obj = op.as_object_mut().unwrap();

        if let Some(body) = &self.request_body {
            obj.insert(
                "requestBody".to_string(),
                serde_json::json!({
                    "content": { "application/json": { "schema": body } },
                    "required": true,
                }),
            );
        }
        if !self.options.tags.is_empty() {
            obj.insert("tags".to_string(), serde_json::json!(self.options.tags));
        }
        if let Some(summary) = &self.options.summary {
            obj.insert("summary".to_string(), Value::String(summary.clone()));
        }
        if let Some(description) = &self.options.description {
            obj.insert("description".to_string(), Value::String(description.clone()));
        }
        if self.options.deprecated {
            obj.insert("deprecated".to_string(), Value::Bool(true));
        }
        if !self.options.security.is_empty() {
            obj.insert("security".to_string(), serde_json::json!(self.options.security));
        }
        if !self.options.servers.is_empty() {
            obj.insert("servers".to_string(), serde_json::json!(self.options.servers));
        }
        if let Some(ext) = &self.options.external_docs {
            obj.insert("externalDocs".to_string(), ext.clone());
        }

        op
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::FieldOptions;

    fn sample() -> Operation {
        Operation {
            method: http::Method::GET,
            pattern: "/users/{id}".to_string(),
            parameters: vec![ParameterMeta {
                location: Location::Path,
                name: "id",
                options: FieldOptions::new().required().description("user id"),
            }],
            request_body: None,
            options: OperationOptions::new().tag("users").summary("Get a user"),
            response_media_type: "application/json",
            response_schema: Some(serde_json::json!({"type": "object"})),
        }
    }

    #[test]
    fn renders_path_parameter_as_required() {
        let rendered = sample().to_openapi_operation();
        let params = rendered["parameters"].as_array().unwrap();
        assert_eq!(params[0]["in"], "path");
        assert_eq!(params[0]["required"], true);
        assert_eq!(params[0]["description"], "user id");
    }

    #[test]
    fn response_overrides_are_merged_over_the_default_200() {
        let op = sample().options.response("404", serde_json::json!({"description": "not found"}));
        let op = Operation { options: op, ..sample() };
        let rendered = op.to_openapi_operation();
        assert_eq!(rendered["responses"]["404"]["description"], "not found");
        assert_eq!(rendered["responses"]["200"]["description"], "OK");
    }

    #[test]
    fn default_response_media_type_is_text_plain_for_string_outputs() {
        let mut op = sample();
        op.response_media_type = "text/plain";
        op.response_schema = None;
        let rendered = op.to_openapi_operation();
        assert_eq!(rendered["responses"]["200"]["content"]["text/plain"]["schema"]["type"], "string");
    }
}
