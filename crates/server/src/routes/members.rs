use axum::{Extension, Json, Router, extract::State, routing::get};
use db::{
    models::{
        pagination::{DEFAULT_PER_PAGE, Paginated},
        user::{User, UserFilter},
    },
    types::Role,
};
use policy::Actor;
use serde::Deserialize;
use services::services::visibility;

use crate::{
    AppState,
    error::ApiError,
    extract::{AppQuery, PageQuery, parse_bool_flag},
};

#[derive(Debug, Deserialize)]
pub struct MemberQuery {
    pub role: Option<Role>,
    pub is_active: Option<String>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl MemberQuery {
    fn filter(&self) -> UserFilter {
        UserFilter {
            role: self.role,
            is_active: self.is_active.as_deref().and_then(parse_bool_flag),
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|search| !search.is_empty())
                .map(str::to_string),
        }
    }
}

pub async fn list_members(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    AppQuery(query): AppQuery<MemberQuery>,
) -> Result<Json<Paginated<User>>, ApiError> {
    let page = PageQuery {
        page: query.page,
        per_page: query.per_page,
    }
    .page(DEFAULT_PER_PAGE);
    let members = visibility::list_members(state.pool(), &actor, &query.filter(), page).await?;
    Ok(Json(members))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/members", get(list_members))
}
