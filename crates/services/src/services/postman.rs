//! Converts an OpenAPI 3 document into a Postman v2.1 collection.

use serde_json::{Map, Value, json};

pub const COLLECTION_SCHEMA: &str =
    "https://schema.getpostman.com/json/collection/v2.1.0/collection.json";
pub const DOWNLOAD_FILE_NAME: &str = "Project-Management-API.postman_collection.json";

const DEFAULT_BASE_URL: &str = "localhost:8080";
const DEFAULT_FOLDER: &str = "Default";
const METHODS: [&str; 7] = ["get", "post", "put", "patch", "delete", "head", "options"];
const MAX_SAMPLE_DEPTH: usize = 8;

fn base_url(spec: &Value) -> String {
    let url = spec["servers"][0]["url"].as_str().unwrap_or(DEFAULT_BASE_URL);
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    let trimmed = stripped.trim_end_matches('/');
    if trimmed.is_empty() {
        DEFAULT_BASE_URL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn bearer_auth() -> Value {
    json!({
        "type": "bearer",
        "bearer": [{ "key": "token", "value": "{{access_token}}", "type": "string" }],
    })
}

fn resolve<'a>(spec: &'a Value, reference: &str) -> Option<&'a Value> {
    spec.pointer(reference.strip_prefix('#')?)
}

/// Builds a placeholder body from a JSON schema.
fn sample(spec: &Value, schema: &Value, depth: usize) -> Value {
    if depth > MAX_SAMPLE_DEPTH {
        return Value::Null;
    }
    if let Some(reference) = schema.get("$ref").and_then(Value::as_str) {
        return match resolve(spec, reference) {
            Some(target) => sample(spec, target, depth + 1),
            None => Value::Null,
        };
    }
    if let Some(example) = schema.get("example") {
        return example.clone();
    }
    if let Some(first) = schema
        .get("allOf")
        .or_else(|| schema.get("anyOf"))
        .or_else(|| schema.get("oneOf"))
        .and_then(Value::as_array)
        .and_then(|variants| variants.iter().find(|v| v.get("type") != Some(&json!("null"))))
    {
        return sample(spec, first, depth + 1);
    }
    if let Some(first) = schema.get("enum").and_then(Value::as_array).and_then(|v| v.first()) {
        return first.clone();
    }

    let kind = match schema.get("type") {
        Some(Value::String(kind)) => kind.as_str(),
        Some(Value::Array(kinds)) => kinds
            .iter()
            .filter_map(Value::as_str)
            .find(|kind| *kind != "null")
            .unwrap_or("null"),
        _ if schema.get("properties").is_some() => "object",
        _ => "null",
    };
    match kind {
        "string" => match schema.get("format").and_then(Value::as_str) {
            Some("email") => json!("example@example.com"),
            _ => json!("string"),
        },
        "integer" => json!(1),
        "number" => json!(1.0),
        "boolean" => json!(true),
        "array" => json!([]),
        "object" => {
            let body: Map<String, Value> = schema
                .get("properties")
                .and_then(Value::as_object)
                .map(|properties| {
                    properties
                        .iter()
                        .map(|(name, property)| (name.clone(), sample(spec, property, depth + 1)))
                        .collect()
                })
                .unwrap_or_default();
            Value::Object(body)
        }
        _ => Value::Null,
    }
}

fn request_body(spec: &Value, operation: &Value) -> Option<Value> {
    let media = operation.pointer("/requestBody/content/application~1json")?;
    let body = match media.get("example") {
        Some(example) => example.clone(),
        None => sample(spec, media.get("schema").unwrap_or(&Value::Null), 0),
    };
    let raw = serde_json::to_string_pretty(&body).ok()?;
    Some(json!({
        "mode": "raw",
        "raw": raw,
        "options": { "raw": { "language": "json" } },
    }))
}

fn request_url(path: &str, operation: &Value) -> Value {
    let segments: Vec<Value> = path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| json!(segment))
        .collect();
    let parameters = operation
        .get("parameters")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let of_kind = |location: &str| -> Vec<Value> {
        parameters
            .iter()
            .filter(|param| param["in"] == location)
            .map(|param| {
                json!({
                    "key": param["name"],
                    "value": param
                        .pointer("/schema/example")
                        .map(|v| match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        })
                        .unwrap_or_default(),
                    "description": param.get("description").cloned().unwrap_or(json!("")),
                })
            })
            .collect()
    };

    let mut url = Map::new();
    url.insert("raw".to_string(), json!(format!("{{{{base_url}}}}{path}")));
    url.insert("host".to_string(), json!(["{{base_url}}"]));
    url.insert("path".to_string(), Value::Array(segments));
    let variables = of_kind("path");
    if !variables.is_empty() {
        url.insert("variable".to_string(), Value::Array(variables));
    }
    let query: Vec<Value> = of_kind("query")
        .into_iter()
        .map(|mut param| {
            param["disabled"] = json!(true);
            param
        })
        .collect();
    if !query.is_empty() {
        url.insert("query".to_string(), Value::Array(query));
    }
    Value::Object(url)
}

fn item(spec: &Value, method: &str, path: &str, operation: &Value) -> Value {
    let upper = method.to_uppercase();
    let name = operation
        .get("summary")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("{upper} {path}"));

    let mut request = Map::new();
    request.insert("method".to_string(), json!(upper));
    request.insert(
        "header".to_string(),
        json!([
            { "key": "Accept", "value": "application/json" },
            { "key": "Content-Type", "value": "application/json" },
        ]),
    );
    if operation
        .get("security")
        .and_then(Value::as_array)
        .is_some_and(|security| !security.is_empty())
    {
        request.insert("auth".to_string(), bearer_auth());
    }
    request.insert("url".to_string(), request_url(path, operation));
    if let Some(body) = request_body(spec, operation) {
        request.insert("body".to_string(), body);
    }
    if let Some(description) = operation.get("description") {
        request.insert("description".to_string(), description.clone());
    }

    json!({ "name": name, "request": request, "response": [] })
}

/// Pure conversion: the same document always yields the same collection.
pub fn convert(spec: &Value) -> Value {
    let mut folders: Vec<(String, Vec<Value>)> = Vec::new();
    if let Some(paths) = spec.get("paths").and_then(Value::as_object) {
        for (path, operations) in paths {
            for method in METHODS {
                let Some(operation) = operations.get(method) else {
                    continue;
                };
                let tag = operation
                    .pointer("/tags/0")
                    .and_then(Value::as_str)
                    .unwrap_or(DEFAULT_FOLDER);
                let entry = item(spec, method, path, operation);
                match folders.iter_mut().find(|(name, _)| name == tag) {
                    Some((_, items)) => items.push(entry),
                    None => folders.push((tag.to_string(), vec![entry])),
                }
            }
        }
    }

    let items: Vec<Value> = folders
        .into_iter()
        .map(|(name, item)| json!({ "name": name, "item": item }))
        .collect();
    let info = &spec["info"];

    json!({
        "info": {
            "name": info["title"].as_str().unwrap_or("API"),
            "description": info["description"].as_str().unwrap_or(""),
            "schema": COLLECTION_SCHEMA,
        },
        "item": items,
        "auth": bearer_auth(),
        "variable": [
            { "key": "base_url", "value": base_url(spec), "type": "string" },
            { "key": "access_token", "value": "", "type": "string" },
        ],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::docs;

    fn find_item<'a>(collection: &'a Value, folder: &str, name: &str) -> &'a Value {
        collection["item"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["name"] == folder)
            .and_then(|f| f["item"].as_array().unwrap().iter().find(|i| i["name"] == name))
            .unwrap()
    }

    #[test]
    fn groups_by_first_tag_and_synthesizes_bodies() {
        let spec = json!({
            "info": { "title": "Demo" },
            "servers": [{ "url": "https://api.example.com/" }],
            "paths": {
                "/users/{id}": {
                    "put": {
                        "tags": ["Users", "Admin"],
                        "security": [{ "bearerAuth": [] }],
                        "parameters": [
                            { "name": "id", "in": "path", "schema": { "type": "integer", "example": 1 } },
                            { "name": "notify", "in": "query", "schema": { "type": "string" } },
                        ],
                        "requestBody": { "content": { "application/json": {
                            "schema": { "$ref": "#/components/schemas/User" },
                        } } },
                    },
                },
                "/ping": { "get": {} },
            },
            "components": { "schemas": { "User": {
                "type": "object",
                "properties": {
                    "email": { "type": "string", "format": "email" },
                    "name": { "type": "string" },
                    "age": { "type": "integer" },
                    "score": { "type": "number" },
                    "admin": { "type": "boolean" },
                    "tags": { "type": "array", "items": { "type": "string" } },
                    "team": { "$ref": "#/components/schemas/Missing" },
                },
            } } },
        });

        let collection = convert(&spec);
        assert_eq!(collection["info"]["schema"], COLLECTION_SCHEMA);
        assert_eq!(collection["variable"][0]["value"], "api.example.com");

        let put = find_item(&collection, "Users", "PUT /users/{id}");
        assert_eq!(put["request"]["auth"]["type"], "bearer");
        assert_eq!(put["request"]["url"]["raw"], "{{base_url}}/users/{id}");
        assert_eq!(put["request"]["url"]["variable"][0]["key"], "id");
        assert_eq!(put["request"]["url"]["query"][0]["key"], "notify");

        let raw = put["request"]["body"]["raw"].as_str().unwrap();
        let body: Value = serde_json::from_str(raw).unwrap();
        assert_eq!(
            body,
            json!({
                "email": "example@example.com",
                "name": "string",
                "age": 1,
                "score": 1.0,
                "admin": true,
                "tags": [],
                "team": null,
            })
        );

        let ping = find_item(&collection, DEFAULT_FOLDER, "GET /ping");
        assert!(ping["request"].get("auth").is_none());
        assert!(ping["request"].get("body").is_none());
    }

    #[test]
    fn converts_the_api_document() {
        let collection = convert(&docs::openapi("http://localhost:8080"));
        assert_eq!(collection["info"]["name"], docs::API_TITLE);
        assert_eq!(collection["variable"][0]["value"], "localhost:8080");

        let login = find_item(&collection, "Authentication", "Log in and receive tokens");
        let body: Value =
            serde_json::from_str(login["request"]["body"]["raw"].as_str().unwrap()).unwrap();
        assert_eq!(body["email"], "ada@example.com");
        assert!(login["request"].get("auth").is_none());

        let create = find_item(&collection, "Projects", "Create a project");
        assert_eq!(create["request"]["auth"]["bearer"][0]["value"], "{{access_token}}");
        let body: Value =
            serde_json::from_str(create["request"]["body"]["raw"].as_str().unwrap()).unwrap();
        assert_eq!(body["name"], "string");
    }
}
