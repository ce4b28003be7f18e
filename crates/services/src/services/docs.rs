//! Route catalogue of the HTTP API and the OpenAPI document built from it.

use db::models::{
    project::{CreateProject, UpdateProject},
    sprint::{CreateSprint, UpdateSprint},
    sub_task::{CreateSubTask, UpdateSubTask},
    task::{CreateTask, UpdateTask},
};
use schemars::{Schema, SchemaGenerator, generate::SchemaSettings};
use serde_json::{Map, Value, json};

use super::auth::{LoginRequest, RefreshRequest, RegisterRequest};

pub const API_TITLE: &str = "Sprintboard API";
pub const BEARER_SCHEME: &str = "bearerAuth";

type SchemaFn = fn(&mut SchemaGenerator) -> Schema;

#[derive(Debug, Clone, Copy)]
pub enum RequestBody {
    Json {
        schema: SchemaFn,
        example: Option<&'static str>,
    },
    /// `multipart/form-data` with a single `image` file part.
    Image,
}

#[derive(Debug, Clone, Copy)]
pub struct QueryParam {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct RouteDoc {
    pub method: &'static str,
    pub path: &'static str,
    pub name: &'static str,
    pub summary: &'static str,
    pub tag: &'static str,
    pub auth: bool,
    pub status: u16,
    pub body: Option<RequestBody>,
    pub query: &'static [QueryParam],
}

impl RouteDoc {
    pub fn middleware(&self) -> &'static [&'static str] {
        if self.auth { &["api", "auth"] } else { &["api"] }
    }

    pub fn path_params(&self) -> impl Iterator<Item = &'static str> {
        self.path
            .split('/')
            .filter_map(|segment| segment.strip_prefix('{')?.strip_suffix('}'))
    }
}

const PAGING: &[QueryParam] = &[
    QueryParam {
        name: "page",
        description: "1-based page number",
    },
    QueryParam {
        name: "per_page",
        description: "Page size, 1 to 100",
    },
];

const MEMBER_QUERY: &[QueryParam] = &[
    QueryParam {
        name: "role",
        description: "PM or MEMBER",
    },
    QueryParam {
        name: "is_active",
        description: "Boolean filter; unrecognised values are ignored",
    },
    QueryParam {
        name: "search",
        description: "Case-insensitive match on name or email",
    },
    QueryParam {
        name: "page",
        description: "1-based page number",
    },
    QueryParam {
        name: "per_page",
        description: "Page size, 1 to 100",
    },
];

const TASK_QUERY: &[QueryParam] = &[
    QueryParam {
        name: "project_id",
        description: "Only tasks of this project",
    },
    QueryParam {
        name: "sprint_id",
        description: "Only tasks of this sprint; `null` selects the backlog",
    },
    QueryParam {
        name: "assigned_to",
        description: "Only tasks assigned to this user",
    },
    QueryParam {
        name: "status",
        description: "TO_DO, IN_PROGRESS or COMPLETED",
    },
    QueryParam {
        name: "page",
        description: "1-based page number",
    },
    QueryParam {
        name: "per_page",
        description: "Page size, 1 to 100",
    },
];

const ACTIVITY_QUERY: &[QueryParam] = &[
    QueryParam {
        name: "type",
        description: "Only activities of this type",
    },
    QueryParam {
        name: "since",
        description: "RFC 3339 timestamp; only newer activities",
    },
    QueryParam {
        name: "page",
        description: "1-based page number",
    },
];

fn json_body(schema: SchemaFn) -> Option<RequestBody> {
    Some(RequestBody::Json {
        schema,
        example: None,
    })
}

fn json_body_with_example(schema: SchemaFn, example: &'static str) -> Option<RequestBody> {
    Some(RequestBody::Json {
        schema,
        example: Some(example),
    })
}

fn route(method: &'static str, path: &'static str, name: &'static str, tag: &'static str) -> RouteDoc {
    RouteDoc {
        method,
        path,
        name,
        summary: name,
        tag,
        auth: true,
        status: 200,
        body: None,
        query: &[],
    }
}

/// Every `/api` route, sorted by path and then method.
pub fn routes() -> Vec<RouteDoc> {
    let mut routes = vec![
        RouteDoc {
            summary: "Register a new account and receive tokens",
            auth: false,
            status: 201,
            body: json_body_with_example(
                SchemaGenerator::subschema_for::<RegisterRequest>,
                r#"{"full_name":"Ada Lovelace","title":"Engineer","email":"ada@example.com","password":"secret1","role":"MEMBER"}"#,
            ),
            ..route("POST", "/api/auth/register", "auth.register", "Authentication")
        },
        RouteDoc {
            summary: "Log in and receive tokens",
            auth: false,
            body: json_body_with_example(
                SchemaGenerator::subschema_for::<LoginRequest>,
                r#"{"email":"ada@example.com","password":"secret1"}"#,
            ),
            ..route("POST", "/api/auth/login", "auth.login", "Authentication")
        },
        RouteDoc {
            summary: "Exchange a refresh token for a new token pair",
            auth: false,
            body: json_body(SchemaGenerator::subschema_for::<RefreshRequest>),
            ..route("POST", "/api/auth/refresh", "auth.refresh", "Authentication")
        },
        RouteDoc {
            summary: "Revoke the current access token",
            ..route("POST", "/api/auth/logout", "auth.logout", "Authentication")
        },
        RouteDoc {
            summary: "Current user",
            ..route("GET", "/api/auth/me", "auth.me", "Authentication")
        },
        RouteDoc {
            summary: "List visible members",
            query: MEMBER_QUERY,
            ..route("GET", "/api/members", "members.index", "Members")
        },
        RouteDoc {
            summary: "List visible projects",
            query: PAGING,
            ..route("GET", "/api/projects", "projects.index", "Projects")
        },
        RouteDoc {
            summary: "Create a project",
            status: 201,
            body: json_body(SchemaGenerator::subschema_for::<CreateProject>),
            ..route("POST", "/api/projects", "projects.store", "Projects")
        },
        RouteDoc {
            summary: "Project with manager, members, sprints and tasks",
            ..route("GET", "/api/projects/{project_id}", "projects.show", "Projects")
        },
        RouteDoc {
            summary: "Update a project",
            body: json_body(SchemaGenerator::subschema_for::<UpdateProject>),
            ..route("PUT", "/api/projects/{project_id}", "projects.update", "Projects")
        },
        RouteDoc {
            summary: "Delete a project",
            ..route("DELETE", "/api/projects/{project_id}", "projects.destroy", "Projects")
        },
        RouteDoc {
            summary: "List sprints of a project",
            query: PAGING,
            ..route(
                "GET",
                "/api/projects/{project_id}/sprints",
                "projects.sprints.index",
                "Sprints",
            )
        },
        RouteDoc {
            summary: "Create a sprint",
            status: 201,
            body: json_body(SchemaGenerator::subschema_for::<CreateSprint>),
            ..route(
                "POST",
                "/api/projects/{project_id}/sprints",
                "projects.sprints.store",
                "Sprints",
            )
        },
        RouteDoc {
            summary: "Sprint with its tasks",
            ..route(
                "GET",
                "/api/projects/{project_id}/sprints/{sprint_id}",
                "projects.sprints.show",
                "Sprints",
            )
        },
        RouteDoc {
            summary: "Update a sprint",
            body: json_body(SchemaGenerator::subschema_for::<UpdateSprint>),
            ..route(
                "PUT",
                "/api/projects/{project_id}/sprints/{sprint_id}",
                "projects.sprints.update",
                "Sprints",
            )
        },
        RouteDoc {
            summary: "Delete a sprint",
            ..route(
                "DELETE",
                "/api/projects/{project_id}/sprints/{sprint_id}",
                "projects.sprints.destroy",
                "Sprints",
            )
        },
        RouteDoc {
            summary: "List visible tasks",
            query: TASK_QUERY,
            ..route("GET", "/api/tasks", "tasks.index", "Tasks")
        },
        RouteDoc {
            summary: "Create a task",
            status: 201,
            body: json_body(SchemaGenerator::subschema_for::<CreateTask>),
            ..route("POST", "/api/tasks", "tasks.store", "Tasks")
        },
        RouteDoc {
            summary: "Task with relations and recent activity",
            ..route("GET", "/api/tasks/{task_id}", "tasks.show", "Tasks")
        },
        RouteDoc {
            summary: "Update a task",
            body: json_body(SchemaGenerator::subschema_for::<UpdateTask>),
            ..route("PUT", "/api/tasks/{task_id}", "tasks.update", "Tasks")
        },
        RouteDoc {
            summary: "Delete a task",
            ..route("DELETE", "/api/tasks/{task_id}", "tasks.destroy", "Tasks")
        },
        RouteDoc {
            summary: "Upload an image to a task",
            status: 201,
            body: Some(RequestBody::Image),
            ..route("POST", "/api/tasks/{task_id}/assets", "tasks.assets.store", "Tasks")
        },
        RouteDoc {
            summary: "Task activity history",
            query: ACTIVITY_QUERY,
            ..route(
                "GET",
                "/api/tasks/{task_id}/activities",
                "tasks.activities.index",
                "Tasks",
            )
        },
        RouteDoc {
            summary: "List sub-tasks",
            ..route(
                "GET",
                "/api/tasks/{task_id}/sub-tasks",
                "tasks.sub-tasks.index",
                "SubTasks",
            )
        },
        RouteDoc {
            summary: "Create a sub-task",
            status: 201,
            body: json_body(SchemaGenerator::subschema_for::<CreateSubTask>),
            ..route(
                "POST",
                "/api/tasks/{task_id}/sub-tasks",
                "tasks.sub-tasks.store",
                "SubTasks",
            )
        },
        RouteDoc {
            summary: "Update a sub-task",
            body: json_body(SchemaGenerator::subschema_for::<UpdateSubTask>),
            ..route(
                "PUT",
                "/api/tasks/{task_id}/sub-tasks/{sub_task_id}",
                "tasks.sub-tasks.update",
                "SubTasks",
            )
        },
        RouteDoc {
            summary: "Delete a sub-task",
            ..route(
                "DELETE",
                "/api/tasks/{task_id}/sub-tasks/{sub_task_id}",
                "tasks.sub-tasks.destroy",
                "SubTasks",
            )
        },
        RouteDoc {
            summary: "Notification feed",
            query: PAGING,
            ..route("GET", "/api/notifications", "notifications.index", "Notifications")
        },
        RouteDoc {
            summary: "Number of unread notifications",
            ..route(
                "GET",
                "/api/notifications/unread-count",
                "notifications.unread-count",
                "Notifications",
            )
        },
        RouteDoc {
            summary: "Mark every notification read",
            ..route(
                "PATCH",
                "/api/notifications/read-all",
                "notifications.read-all",
                "Notifications",
            )
        },
        RouteDoc {
            summary: "Mark one notification read",
            ..route(
                "PATCH",
                "/api/notifications/{notification_id}/read",
                "notifications.read",
                "Notifications",
            )
        },
        RouteDoc {
            summary: "Delete a notification",
            ..route(
                "DELETE",
                "/api/notifications/{notification_id}",
                "notifications.destroy",
                "Notifications",
            )
        },
        RouteDoc {
            summary: "Postman collection of this API",
            auth: false,
            ..route("GET", "/api/postman-collection", "postman.export", "Docs")
        },
        RouteDoc {
            summary: "Postman collection as a file download",
            auth: false,
            ..route(
                "GET",
                "/api/postman-collection/download",
                "postman.download",
                "Docs",
            )
        },
    ];
    routes.sort_by(|a, b| a.path.cmp(b.path).then_with(|| a.method.cmp(b.method)));
    routes
}

fn parameters(route: &RouteDoc) -> Vec<Value> {
    let path = route.path_params().map(|name| {
        json!({
            "name": name,
            "in": "path",
            "required": true,
            "schema": { "type": "integer", "format": "int64", "example": 1 },
        })
    });
    let query = route.query.iter().map(|param| {
        json!({
            "name": param.name,
            "in": "query",
            "required": false,
            "description": param.description,
            "schema": { "type": "string" },
        })
    });
    path.chain(query).collect()
}

fn request_body(body: &RequestBody, generator: &mut SchemaGenerator) -> Value {
    match body {
        RequestBody::Json { schema, example } => {
            let mut media = Map::new();
            media.insert("schema".to_string(), Value::from(schema(generator)));
            if let Some(example) = example.and_then(|raw| serde_json::from_str::<Value>(raw).ok()) {
                media.insert("example".to_string(), example);
            }
            json!({
                "required": true,
                "content": { "application/json": Value::Object(media) },
            })
        }
        RequestBody::Image => json!({
            "required": true,
            "content": {
                "multipart/form-data": {
                    "schema": {
                        "type": "object",
                        "required": ["image"],
                        "properties": {
                            "image": { "type": "string", "format": "binary" },
                        },
                    },
                },
            },
        }),
    }
}

fn responses(route: &RouteDoc) -> Value {
    let mut responses = Map::new();
    responses.insert(route.status.to_string(), json!({ "description": "Success" }));
    if route.auth {
        responses.insert("401".to_string(), json!({ "description": "Unauthenticated" }));
        responses.insert("403".to_string(), json!({ "description": "Forbidden" }));
    }
    if route.path_params().next().is_some() {
        responses.insert("404".to_string(), json!({ "description": "Not found" }));
    }
    if route.body.is_some() || route.auth {
        responses.insert("422".to_string(), json!({ "description": "Validation error" }));
    }
    Value::Object(responses)
}

/// Builds the OpenAPI 3.0 document for [`routes`].
pub fn openapi(server_url: &str) -> Value {
    let mut generator = SchemaSettings::openapi3().into_generator();
    let mut paths = Map::new();

    for route in routes() {
        let mut operation = Map::new();
        operation.insert("summary".to_string(), json!(route.summary));
        operation.insert("operationId".to_string(), json!(route.name));
        operation.insert("tags".to_string(), json!([route.tag]));
        let params = parameters(&route);
        if !params.is_empty() {
            operation.insert("parameters".to_string(), Value::Array(params));
        }
        if let Some(body) = &route.body {
            operation.insert("requestBody".to_string(), request_body(body, &mut generator));
        }
        if route.auth {
            operation.insert("security".to_string(), json!([{ BEARER_SCHEME: [] }]));
        }
        operation.insert("responses".to_string(), responses(&route));

        let entry = paths
            .entry(route.path.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(methods) = entry {
            methods.insert(route.method.to_lowercase(), Value::Object(operation));
        }
    }

    let schemas: Map<String, Value> = generator
        .definitions()
        .iter()
        .map(|(name, schema)| (name.clone(), schema.clone()))
        .collect();

    json!({
        "openapi": "3.0.3",
        "info": {
            "title": API_TITLE,
            "description": "Projects, sprints, tasks and notifications for agile teams.",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "servers": [{ "url": server_url }],
        "paths": paths,
        "components": {
            "schemas": schemas,
            "securitySchemes": {
                BEARER_SCHEME: { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" },
            },
        },
    })
}

/// Human-readable route listing served at `/api-docs`.
pub fn listing_html() -> String {
    let mut rows = String::new();
    for route in routes() {
        rows.push_str(&format!(
            "<tr><td><code>{}</code></td><td><code>{}</code></td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            route.method,
            route.path,
            route.name,
            route.summary,
            route.middleware().join(", "),
        ));
    }
    format!(
        "<!doctype html>\n<html><head><meta charset=\"utf-8\"><title>{API_TITLE}</title></head>\n\
         <body><h1>{API_TITLE}</h1>\n\
         <p>Machine-readable document: <a href=\"/api-docs.json\">/api-docs.json</a></p>\n\
         <table>\n<tr><th>Method</th><th>Path</th><th>Name</th><th>Summary</th><th>Middleware</th></tr>\n\
         {rows}</table></body></html>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_are_sorted_and_unique() {
        let routes = routes();
        let mut keys: Vec<_> = routes.iter().map(|r| (r.path, r.method)).collect();
        let sorted = keys.clone();
        keys.sort();
        keys.dedup();
        assert_eq!(keys, sorted);
        assert!(routes.iter().all(|r| r.path.starts_with("/api/")));
    }

    #[test]
    fn openapi_document_references_registered_schemas() {
        let doc = openapi("http://localhost:8080");
        assert_eq!(doc["openapi"], "3.0.3");
        assert_eq!(doc["servers"][0]["url"], "http://localhost:8080");

        let store = &doc["paths"]["/api/projects"]["post"];
        assert_eq!(store["tags"][0], "Projects");
        assert!(store["security"].is_array());
        let reference = store["requestBody"]["content"]["application/json"]["schema"]["$ref"]
            .as_str()
            .unwrap();
        let name = reference.rsplit('/').next().unwrap();
        assert!(doc["components"]["schemas"][name]["properties"]["name"].is_object());

        let login = &doc["paths"]["/api/auth/login"]["post"];
        assert!(login.get("security").is_none());
        assert_eq!(
            login["requestBody"]["content"]["application/json"]["example"]["email"],
            "ada@example.com"
        );

        let show = &doc["paths"]["/api/projects/{project_id}/sprints/{sprint_id}"]["get"];
        let names: Vec<_> = show["parameters"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["name"].as_str().unwrap())
            .collect();
        assert_eq!(names, vec!["project_id", "sprint_id"]);
    }

    #[test]
    fn listing_mentions_every_route() {
        let html = listing_html();
        for route in routes() {
            assert!(html.contains(route.path));
        }
    }
}
