//! Document assembly and rendering (spec.md §4.6.3), generalizing
//! `r2e_openapi::builder::build_spec`'s merge-into-`serde_json::Value`
//! approach from a fixed `OpenApiConfig` to full `info`/`servers`/
//! `security`/`tags`/`external-docs` merge semantics over an optional
//! pre-loaded base document.

use serde_json::{json, Map, Value};

use portico_core::error::ConfigFatal;

use crate::operation::Operation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

/// Options accepted at `OpenApiScope` initialization (§4.6.3).
#[derive(Debug, Clone)]
pub struct DocumentOptions {
    pub title: String,
    pub version: String,
    pub base_document: Option<Value>,
    pub info_description: Option<String>,
    pub tags: Vec<Value>,
    pub servers: Vec<Value>,
    pub security: Vec<Value>,
    pub external_docs: Option<Value>,
    pub extensions: Map<String, Value>,
    pub format: DocumentFormat,
    pub docs_ui: bool,
    pub mount_path: String,
}

impl DocumentOptions {
    pub fn new(title: impl Into<String>, mount_path: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            version: "0.1.0".to_string(),
            base_document: None,
            info_description: None,
            tags: Vec::new(),
            servers: Vec::new(),
            security: Vec::new(),
            external_docs: None,
            extensions: Map::new(),
            format: DocumentFormat::Yaml,
            docs_ui: true,
            mount_path: mount_path.into(),
        }
    }
}

/// Strip `$schema`, promote a schema's own `$defs` into `components/schemas`
/// (rewriting internal `$ref`s to point at them), and rewrite any `$ref`s
/// already pointing at `#/$defs/...` within the schema itself.
///
/// Grounded on `r2e_openapi::builder::{sanitize_schema, insert_schema}`,
/// restructured for a schema embedded directly in a requestBody/response
/// rather than indirected through a name-keyed components lookup.
fn promote_defs(schema: &mut Value, components_schemas: &mut Map<String, Value>) {
    let Some(obj) = schema.as_object_mut() else { return };
    obj.remove("$schema");
    if let Some(Value::Object(defs)) = obj.remove("$defs") {
        for (name, mut def_schema) in defs {
            sanitize_refs(&mut def_schema);
            components_schemas.entry(name).or_insert(def_schema);
        }
    }
    sanitize_refs(schema);
}

fn sanitize_refs(value: &mut Value) {
    match value {
        Value::Object(obj) => {
            if let Some(Value::String(r)) = obj.get_mut("$ref") {
                if let Some(rest) = r.strip_prefix("#/$defs/") {
                    *r = format!("#/components/schemas/{rest}");
                }
            }
            for v in obj.values_mut() {
                sanitize_refs(v);
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(sanitize_refs),
        _ => {}
    }
}

fn append_list(obj: &mut Map<String, Value>, key: &str, extra: &[Value]) {
    if extra.is_empty() {
        return;
    }
    let mut list = obj
        .remove(key)
        .and_then(|v| v.as_array().cloned())
        .unwrap_or_default();
    list.extend(extra.iter().cloned());
    obj.insert(key.to_string(), Value::Array(list));
}

fn validate_version(version: &str) -> Result<(), ConfigFatal> {
    if version.starts_with("3.0.") || version.starts_with("3.1.") {
        Ok(())
    } else {
        Err(ConfigFatal(format!(
            "unsupported OpenAPI document version '{version}': only the 3.0.x and 3.1.x families are accepted"
        )))
    }
}

/// Render the full OpenAPI document for `operations` according to `options`.
/// Pure function of its inputs — called once per handler-extraction by the
/// owning `OpenApiScope`'s single-shot hook.
pub fn build_document(options: &DocumentOptions, operations: &[Operation]) -> Result<Value, ConfigFatal> {
    let mut doc = options.base_document.clone().unwrap_or_else(|| json!({}));
    let obj = doc
        .as_object_mut()
        .ok_or_else(|| ConfigFatal("base document must be a JSON object".to_string()))?;

    let openapi_version = obj
        .get("openapi")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "3.1.0".to_string());
    validate_version(&openapi_version)?;
    obj.insert("openapi".to_string(), json!(openapi_version));

    let mut info = obj.remove("info").unwrap_or_else(|| json!({}));
    if !info.is_object() {
        info = json!({});
    }
    let info_obj = info.as_object_mut().expect("just normalized to an object");
    info_obj.insert("title".to_string(), json!(options.title));
    if !options.version.is_empty() {
        info_obj.insert("version".to_string(), json!(options.version));
    }
    if let Some(desc) = &options.info_description {
        info_obj.insert("description".to_string(), json!(desc));
    }
    obj.insert("info".to_string(), info);

    append_list(obj, "tags", &options.tags);
    append_list(obj, "servers", &options.servers);
    append_list(obj, "security", &options.security);

    if let Some(ext_docs) = &options.external_docs {
        obj.insert("externalDocs".to_string(), ext_docs.clone());
    }
    for (k, v) in &options.extensions {
        obj.insert(k.clone(), v.clone());
    }

    let mut components_schemas: Map<String, Value> = Map::new();
    let mut paths = obj
        .remove("paths")
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default();

    for op in operations {
        let mut op = op.clone();
        if let Some(body) = &mut op.request_body {
            promote_defs(body, &mut components_schemas);
        }
        if let Some(resp) = &mut op.response_schema {
            promote_defs(resp, &mut components_schemas);
        }
        let entry = paths.entry(op.pattern.clone()).or_insert_with(|| json!({}));
        if let Some(path_item) = entry.as_object_mut() {
            path_item.insert(op.method.as_str().to_lowercase(), op.to_openapi_operation());
        }
    }
    obj.insert("paths".to_string(), Value::Object(paths));

    let mut components = obj
        .remove("components")
        .filter(Value::is_object)
        .unwrap_or_else(|| json!({}));
    if !components_schemas.is_empty() {
        let comp_obj = components.as_object_mut().expect("just normalized to an object");
        let mut schemas = comp_obj
            .remove("schemas")
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        for (name, schema) in components_schemas {
            schemas.entry(name).or_insert(schema);
        }
        comp_obj.insert("schemas".to_string(), Value::Object(schemas));
    }
    obj.insert("components".to_string(), components);

    Ok(doc)
}

/// Serialize a rendered document according to `options.format`.
pub fn render_bytes(options: &DocumentOptions, operations: &[Operation]) -> Result<Vec<u8>, ConfigFatal> {
    let doc = build_document(options, operations)?;
    match options.format {
        DocumentFormat::Json => {
            serde_json::to_vec_pretty(&doc).map_err(|e| ConfigFatal(format!("rendering JSON: {e}")))
        }
        DocumentFormat::Yaml => serde_yaml::to_string(&doc)
            .map(String::into_bytes)
            .map_err(|e| ConfigFatal(format!("rendering YAML: {e}"))),
    }
}

/// A minimal documentation UI page embedding the rendered document at
/// `document_url` (Swagger UI's CDN bundle, the same approach `r2e-openapi`
/// uses for its own optional docs page).
pub fn docs_ui_html(title: &str, document_url: &str) -> String {
    format!(
        r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>{title}</title>
<link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/swagger-ui-dist/swagger-ui.css">
</head>
<body>
<div id="swagger-ui"></div>
<script src="https://cdn.jsdelivr.net/npm/swagger-ui-dist/swagger-ui-bundle.js"></script>
<script>
window.onload = () => {{
  window.ui = SwaggerUIBundle({{ url: "{document_url}", dom_id: "#swagger-ui" }});
}};
</script>
</body>
</html>"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::{FieldOptions, Location, ParameterMeta};
    use crate::operation::OperationOptions;

    fn op() -> Operation {
        Operation {
            method: http::Method::GET,
            pattern: "/users/{id}".to_string(),
            parameters: vec![ParameterMeta {
                location: Location::Path,
                name: "id",
                options: FieldOptions::new().required(),
            }],
            request_body: None,
            options: OperationOptions::new(),
            response_media_type: "application/json",
            response_schema: None,
        }
    }

    #[test]
    fn rejects_an_unsupported_openapi_version() {
        let options = DocumentOptions {
            base_document: Some(json!({"openapi": "2.0"})),
            ..DocumentOptions::new("Demo", "/docs")
        };
        let err = build_document(&options, &[]).unwrap_err();
        assert!(err.0.contains("2.0"));
    }

    #[test]
    fn operations_populate_the_paths_map() {
        let options = DocumentOptions::new("Demo", "/docs");
        let doc = build_document(&options, &[op()]).unwrap();
        assert!(doc["paths"]["/users/{id}"]["get"].is_object());
    }

    #[test]
    fn base_document_tags_and_override_tags_are_appended() {
        let options = DocumentOptions {
            base_document: Some(json!({"tags": [{"name": "base"}]})),
            tags: vec![json!({"name": "extra"})],
            ..DocumentOptions::new("Demo", "/docs")
        };
        let doc = build_document(&options, &[]).unwrap();
        let tags = doc["tags"].as_array().unwrap();
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn defs_are_promoted_into_components_schemas() {
        let mut body_op = op();
        body_op.request_body = Some(json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "properties": { "addr": { "$ref": "#/$defs/Address" } },
            "$defs": { "Address": { "type": "object" } }
        }));
        let options = DocumentOptions::new("Demo", "/docs");
        let doc = build_document(&options, &[body_op]).unwrap();
        assert!(doc["components"]["schemas"]["Address"].is_object());
        let schema = &doc["paths"]["/users/{id}"]["get"]["requestBody"]["content"]["application/json"]["schema"];
        assert_eq!(schema["properties"]["addr"]["$ref"], "#/components/schemas/Address");
        assert!(schema.get("$defs").is_none());
    }
}
